use std::path::PathBuf;

use image::ColorType;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CompressorError {
    #[error("Input image not found: {}", .0.display())]
    InputNotFound(PathBuf),

    #[error("Failed to read input image {}: {source}", .path.display())]
    InputUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unsupported image format")]
    UnsupportedFormat,

    #[error("Image decoding error: {0}")]
    DecodeError(#[from] image::ImageError),

    #[error("Cannot encode {color:?} image as JPEG: {reason}")]
    EncodingIncompatible { color: ColorType, reason: String },

    #[error("Compression error: {0}")]
    CompressionError(String),

    #[error("Failed to write output {}: {source}", .path.display())]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),
}

impl CompressorError {
    /// Reading the source failed before any decoding started.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            CompressorError::InputNotFound(_) | CompressorError::InputUnreadable { .. }
        )
    }

    /// The source was read but could not be turned into a raster.
    pub fn is_decode_error(&self) -> bool {
        matches!(
            self,
            CompressorError::UnsupportedFormat | CompressorError::DecodeError(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, CompressorError>;
