//! Client-side guard for document uploads. This is a UX check so users get
//! instant feedback; the server validates again.

use anyhow::Context;
use std::path::Path;
use thiserror::Error;

pub use crate::config::MAX_UPLOAD_BYTES as MAX_IMAGE_BYTES;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum UploadError {
    #[error("Please upload an image file (JPG, PNG, WEBP). '{0}' is not supported.")]
    NotAnImage(String),

    #[error("File size must be 10MB or less.")]
    TooLarge,

    #[error("The selected file is empty.")]
    Empty,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ImageUpload {
    pub file_name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

/// Guesses a MIME type from the file extension.
pub fn guess_mime(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "tif" | "tiff" => "image/tiff",
        "pdf" => "application/pdf",
        "txt" => "text/plain",
        _ => "application/octet-stream",
    }
}

pub fn validate_upload(mime: &str, size: usize) -> Result<(), UploadError> {
    if !mime.starts_with("image/") {
        return Err(UploadError::NotAnImage(mime.to_string()));
    }
    if size == 0 {
        return Err(UploadError::Empty);
    }
    if size > MAX_IMAGE_BYTES {
        return Err(UploadError::TooLarge);
    }
    Ok(())
}

impl ImageUpload {
    pub fn new(file_name: impl Into<String>, mime: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            mime: mime.into(),
            bytes,
        }
    }

    pub async fn from_path(path: &Path) -> anyhow::Result<Self> {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".to_string());
        Ok(Self::new(file_name, guess_mime(path), bytes))
    }

    pub fn validate(&self) -> Result<(), UploadError> {
        validate_upload(&self.mime, self.bytes.len())
    }
}
