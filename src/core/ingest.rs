use bytes::Bytes;
use image::{ImageFormat, ImageReader};
use serde::Serialize;
use std::io::Cursor;
use std::path::Path;
use thiserror::Error;

use crate::utils::constants::ALLOWED_EXTENSIONS;
use crate::utils::hash::short_fingerprint;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("No image was uploaded")]
    Empty,

    #[error("Unsupported file type {extension:?}. Supported formats: PNG, JPG, JPEG")]
    UnsupportedFormat { extension: Option<String> },

    #[error("File size ({:.1}MB) exceeds {}MB limit. Please use a smaller image.", *size as f64 / 1024.0 / 1024.0, limit / 1024 / 1024)]
    TooLarge { size: usize, limit: usize },

    #[error("Cannot load image: {0}")]
    Undecodable(String),

    #[error("File content is {detected} but only PNG and JPEG images are accepted")]
    ContentMismatch { detected: String },
}

/// A validated upload, kept only for the duration of one request.
#[derive(Debug, Clone)]
pub struct UploadedImage {
    pub file_name: String,
    pub data: Bytes,
    pub mime_type: &'static str,
    pub width: u32,
    pub height: u32,
    pub fingerprint: String,
}

impl UploadedImage {
    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn metadata(&self) -> ImageMetadata {
        ImageMetadata {
            file_name: self.file_name.clone(),
            mime_type: self.mime_type.to_string(),
            size_bytes: self.size(),
            width: self.width,
            height: self.height,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ImageMetadata {
    pub file_name: String,
    pub mime_type: String,
    pub size_bytes: usize,
    pub width: u32,
    pub height: u32,
}

fn extension_of(file_name: &str) -> Option<String> {
    Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

/// Validates an upload: extension allow-list, size ceiling, then a header
/// decode to confirm the bytes really are a PNG or JPEG.
pub fn ingest(
    file_name: &str,
    data: Bytes,
    max_bytes: usize,
) -> Result<UploadedImage, ValidationError> {
    if data.is_empty() {
        return Err(ValidationError::Empty);
    }

    let extension = extension_of(file_name);
    match extension.as_deref() {
        Some(ext) if ALLOWED_EXTENSIONS.contains(&ext) => {}
        _ => return Err(ValidationError::UnsupportedFormat { extension }),
    }

    if data.len() > max_bytes {
        return Err(ValidationError::TooLarge {
            size: data.len(),
            limit: max_bytes,
        });
    }

    let reader = ImageReader::new(Cursor::new(data.as_ref()))
        .with_guessed_format()
        .map_err(|e| ValidationError::Undecodable(e.to_string()))?;

    let mime_type = match reader.format() {
        Some(ImageFormat::Png) => "image/png",
        Some(ImageFormat::Jpeg) => "image/jpeg",
        Some(other) => {
            return Err(ValidationError::ContentMismatch {
                detected: format!("{:?}", other),
            });
        }
        None => {
            return Err(ValidationError::Undecodable(
                "unrecognized image format".to_string(),
            ));
        }
    };

    let (width, height) = reader
        .into_dimensions()
        .map_err(|e| ValidationError::Undecodable(e.to_string()))?;

    Ok(UploadedImage {
        file_name: file_name.to_string(),
        fingerprint: short_fingerprint(&data),
        data,
        mime_type,
        width,
        height,
    })
}
