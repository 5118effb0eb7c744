//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{path::PathBuf, str::FromStr, time::Duration};

use clap::{Args, builder::BoolishValueParser};
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;

use crate::domain::images::{
    CapCheck, DEFAULT_MAX_IMAGE_BYTES, DEFAULT_MAX_IMAGES, ImagePolicy,
};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "storefront";
const ENV_PREFIX: &str = "STOREFRONT";
const DEFAULT_API_TIMEOUT_SECS: u64 = 30;
const DEFAULT_GC_TIME_MS: u64 = 5 * 60 * 1000;

/// Flags that override file and environment configuration.
#[derive(Debug, Args, Clone, Default)]
pub struct ConfigOverrides {
    /// Optional path to a configuration file.
    #[arg(
        long = "config-file",
        env = "STOREFRONT_CONFIG_FILE",
        value_name = "PATH",
        global = true
    )]
    pub config_file: Option<PathBuf>,

    /// Base URL of the storefront API.
    #[arg(
        long = "api-base-url",
        env = "STOREFRONT_API_BASE_URL",
        value_name = "URL",
        global = true
    )]
    pub api_base_url: Option<String>,

    /// Bearer token sent with every API request.
    #[arg(
        long = "api-token",
        env = "STOREFRONT_API_TOKEN",
        value_name = "TOKEN",
        hide_env_values = true,
        global = true
    )]
    pub api_token: Option<String>,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long = "log-level", value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Emit JSON formatted logs.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new(),
        global = true
    )]
    pub log_json: Option<bool>,
}

/// Fully-resolved settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub api: ApiSettings,
    pub logging: LoggingSettings,
    pub cache: CacheSettings,
    pub images: ImageSettings,
}

#[derive(Debug, Clone)]
pub struct ApiSettings {
    pub base_url: Option<Url>,
    pub timeout: Duration,
    pub token: Option<String>,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub stale_time: Option<Duration>,
    pub gc_time: Duration,
}

#[derive(Debug, Clone)]
pub struct ImageSettings {
    pub max_images: usize,
    pub max_image_bytes: u64,
    pub cap_check: CapCheck,
}

impl ImageSettings {
    pub fn policy(&self) -> ImagePolicy {
        ImagePolicy {
            max_images: self.max_images,
            max_image_bytes: self.max_image_bytes,
            cap_check: self.cap_check,
        }
    }
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(overrides: &ConfigOverrides) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = overrides.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;
    raw.apply_overrides(overrides);

    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    api: RawApiSettings,
    logging: RawLoggingSettings,
    cache: RawCacheSettings,
    images: RawImageSettings,
}

impl RawSettings {
    fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(url) = overrides.api_base_url.as_ref() {
            self.api.base_url = Some(url.clone());
        }
        if let Some(token) = overrides.api_token.as_ref() {
            self.api.token = Some(token.clone());
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            api,
            logging,
            cache,
            images,
        } = raw;

        Ok(Self {
            api: build_api_settings(api)?,
            logging: build_logging_settings(logging)?,
            cache: build_cache_settings(cache),
            images: build_image_settings(images)?,
        })
    }
}

fn build_api_settings(api: RawApiSettings) -> Result<ApiSettings, LoadError> {
    let base_url = api
        .base_url
        .filter(|url| !url.trim().is_empty())
        .map(|url| {
            Url::parse(url.trim())
                .map_err(|err| LoadError::invalid("api.base_url", format!("invalid URL: {err}")))
        })
        .transpose()?;

    let timeout_seconds = api.timeout_seconds.unwrap_or(DEFAULT_API_TIMEOUT_SECS);
    if timeout_seconds == 0 {
        return Err(LoadError::invalid(
            "api.timeout_seconds",
            "must be greater than zero",
        ));
    }

    let token = api.token.filter(|token| !token.trim().is_empty());

    Ok(ApiSettings {
        base_url,
        timeout: Duration::from_secs(timeout_seconds),
        token,
    })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_cache_settings(cache: RawCacheSettings) -> CacheSettings {
    CacheSettings {
        stale_time: cache.stale_time_ms.map(Duration::from_millis),
        gc_time: Duration::from_millis(cache.gc_time_ms.unwrap_or(DEFAULT_GC_TIME_MS)),
    }
}

fn build_image_settings(images: RawImageSettings) -> Result<ImageSettings, LoadError> {
    let max_images = non_zero(
        images.max_images.unwrap_or(DEFAULT_MAX_IMAGES as u64),
        "images.max_images",
    )?;
    let max_images = usize::try_from(max_images)
        .map_err(|_| LoadError::invalid("images.max_images", "value exceeds supported range"))?;
    let max_image_bytes = non_zero(
        images.max_image_bytes.unwrap_or(DEFAULT_MAX_IMAGE_BYTES),
        "images.max_image_bytes",
    )?;

    let cap_check = match images.cap_check.as_deref().map(str::trim) {
        None | Some("batch_length") => CapCheck::BatchLength,
        Some("accepted") => CapCheck::Accepted,
        Some(other) => {
            return Err(LoadError::invalid(
                "images.cap_check",
                format!("expected `batch_length` or `accepted`, got `{other}`"),
            ));
        }
    };

    Ok(ImageSettings {
        max_images,
        max_image_bytes,
        cap_check,
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawApiSettings {
    base_url: Option<String>,
    timeout_seconds: Option<u64>,
    token: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    stale_time_ms: Option<u64>,
    gc_time_ms: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawImageSettings {
    max_images: Option<u64>,
    max_image_bytes: Option<u64>,
    cap_check: Option<String>,
}

fn non_zero(value: u64, key: &'static str) -> Result<u64, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    Ok(value)
}
