//! Image staging rules for product drafts.

use std::path::Path;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Default maximum number of staged images.
pub const DEFAULT_MAX_IMAGES: usize = 4;
/// Default per-file size ceiling (5 MiB).
pub const DEFAULT_MAX_IMAGE_BYTES: u64 = 5 * 1024 * 1024;

const IMAGE_MIME_PREFIX: &str = "image/";

/// A candidate image file held in memory before submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageBlob {
    pub name: String,
    pub content_type: String,
    pub size_bytes: u64,
    pub bytes: Bytes,
}

#[derive(Debug, Error)]
pub enum ImageLoadError {
    #[error("failed to read image {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
}

impl ImageBlob {
    pub fn new(name: impl Into<String>, content_type: impl Into<String>, bytes: Bytes) -> Self {
        let size_bytes = bytes.len() as u64;
        Self {
            name: name.into(),
            content_type: content_type.into(),
            size_bytes,
            bytes,
        }
    }

    /// Read a file from disk, guessing its MIME type from the extension.
    ///
    /// The size comes from file metadata. Files larger than `max_bytes` are
    /// not read; they carry their size and an empty payload so the filter can
    /// reject them. Unknown extensions map to `application/octet-stream`,
    /// which the image filter rejects.
    pub async fn from_path(path: &Path, max_bytes: u64) -> Result<Self, ImageLoadError> {
        let io_error = |source| ImageLoadError::Io {
            path: path.display().to_string(),
            source,
        };
        let size_bytes = tokio::fs::metadata(path).await.map_err(io_error)?.len();
        let bytes = if size_bytes > max_bytes {
            debug!(path = %path.display(), size_bytes, max_bytes, "Skipping read of oversized file");
            Bytes::new()
        } else {
            Bytes::from(tokio::fs::read(path).await.map_err(io_error)?)
        };
        let name = path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("upload.bin")
            .to_string();
        let content_type = mime_guess::from_path(path)
            .first_or_octet_stream()
            .essence_str()
            .to_string();
        Ok(Self {
            name,
            content_type,
            size_bytes,
            bytes,
        })
    }

    pub fn is_image(&self) -> bool {
        self.content_type.starts_with(IMAGE_MIME_PREFIX)
    }
}

/// How the image cap is compared against an incoming batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapCheck {
    /// `current + batch length <= max`; an oversized batch is rejected whole.
    #[default]
    BatchLength,
    /// Files are accepted in order until the cap is reached.
    Accepted,
}

/// Limits applied when staging images.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImagePolicy {
    pub max_images: usize,
    pub max_image_bytes: u64,
    pub cap_check: CapCheck,
}

impl Default for ImagePolicy {
    fn default() -> Self {
        Self {
            max_images: DEFAULT_MAX_IMAGES,
            max_image_bytes: DEFAULT_MAX_IMAGE_BYTES,
            cap_check: CapCheck::BatchLength,
        }
    }
}

/// Why a candidate file was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionReason {
    NotAnImage,
    TooLarge,
    OverCapacity,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageRejection {
    pub name: String,
    pub reason: RejectionReason,
}

/// Result of filtering one batch against the staged images.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImageBatchOutcome {
    pub accepted: usize,
    pub rejected: Vec<ImageRejection>,
}

impl ImageBatchOutcome {
    pub fn all_accepted(&self) -> bool {
        self.rejected.is_empty()
    }
}

impl ImagePolicy {
    /// Split `batch` into accepted files and rejections, given `current` staged images.
    ///
    /// Type and size checks take precedence over the capacity check when
    /// reporting a reason.
    pub fn filter(
        &self,
        current: usize,
        batch: Vec<ImageBlob>,
    ) -> (Vec<ImageBlob>, ImageBatchOutcome) {
        let batch_fits = current + batch.len() <= self.max_images;
        let mut accepted = Vec::new();
        let mut outcome = ImageBatchOutcome::default();

        for file in batch {
            let reason = if !file.is_image() {
                Some(RejectionReason::NotAnImage)
            } else if file.size_bytes > self.max_image_bytes {
                Some(RejectionReason::TooLarge)
            } else {
                match self.cap_check {
                    CapCheck::BatchLength if !batch_fits => Some(RejectionReason::OverCapacity),
                    CapCheck::Accepted if current + accepted.len() >= self.max_images => {
                        Some(RejectionReason::OverCapacity)
                    }
                    _ => None,
                }
            };

            match reason {
                Some(reason) => outcome.rejected.push(ImageRejection {
                    name: file.name,
                    reason,
                }),
                None => accepted.push(file),
            }
        }

        outcome.accepted = accepted.len();
        (accepted, outcome)
    }
}
