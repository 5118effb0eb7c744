#![deny(clippy::all, clippy::pedantic)]

use std::sync::Arc;

use storefront::application::wishlist::{WishlistError, WishlistService};
use storefront::cache::{CacheConfig, QueryClient};
use storefront::config::{self, LoadError, Settings};
use storefront::domain::images::ImageLoadError;
use storefront::infra::error::InfraError;
use storefront::infra::http::{HttpTransport, TransportError};
use thiserror::Error;

use crate::args::Cli;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("API base URL is required (use --api-base-url or STOREFRONT_API_BASE_URL)")]
    MissingBaseUrl,
    #[error(transparent)]
    Config(#[from] LoadError),
    #[error(transparent)]
    Telemetry(#[from] InfraError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Wishlist(#[from] WishlistError),
    #[error(transparent)]
    Image(#[from] ImageLoadError),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("failed to render output: {0}")]
    Output(String),
}

/// Resolved settings plus lazily built API clients.
#[derive(Debug, Clone)]
pub struct Ctx {
    pub settings: Settings,
}

impl Ctx {
    pub fn new(settings: Settings) -> Self {
        Self { settings }
    }

    pub fn transport(&self) -> Result<HttpTransport, CliError> {
        let api = &self.settings.api;
        let base = api.base_url.as_ref().ok_or(CliError::MissingBaseUrl)?;
        Ok(HttpTransport::new(
            base.as_str(),
            api.token.clone(),
            api.timeout,
        )?)
    }

    pub fn wishlist(&self) -> Result<WishlistService, CliError> {
        let transport = Arc::new(self.transport()?);
        let queries = QueryClient::new(CacheConfig::from(&self.settings.cache));
        Ok(WishlistService::new(transport, queries))
    }
}

pub fn build_ctx_from_cli(cli: &Cli) -> Result<Ctx, CliError> {
    let settings = config::load(&cli.config)?;
    Ok(Ctx::new(settings))
}
