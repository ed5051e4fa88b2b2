use std::path::PathBuf;

use thiserror::Error;

/// Every failure a video backend, the façade, the factory or the exporter
/// can surface.
///
/// `IndexOutOfRange` means a position past the backend's frame count.
/// `FrameNotEmbedded` and `FrameNotInStore` mean an original frame number the
/// store does not hold.
#[derive(Error, Debug)]
pub enum VideoError {
    #[error("video source not found: {}", path.display())]
    SourceNotFound { path: PathBuf },

    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("frame index {index} out of range for video with {frames} frames")]
    IndexOutOfRange { index: usize, frames: usize },

    #[error("frame {frame} is not embedded and source video fallback is disabled")]
    FrameNotEmbedded { frame: usize },

    #[error("frame key {key} is not in this store's key space")]
    FrameNotInStore { key: usize },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("failed to decode frame {index}: {reason}")]
    Decode { index: usize, reason: String },

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("ffmpeg error: {0}")]
    Ffmpeg(#[from] ffmpeg_next::Error),

    #[error("image codec error: {0}")]
    Image(#[from] image::ImageError),

    #[error("hdf5 error: {0}")]
    Hdf5(#[from] hdf5::Error),

    #[error("metadata error: {0}")]
    Metadata(#[from] serde_json::Error),

    #[error("array shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),
}

impl VideoError {
    /// True for any of the frame-addressing failures.
    pub fn is_index_error(&self) -> bool {
        matches!(
            self,
            VideoError::IndexOutOfRange { .. }
                | VideoError::FrameNotEmbedded { .. }
                | VideoError::FrameNotInStore { .. }
        )
    }

    pub(crate) fn source_not_found(path: impl Into<PathBuf>) -> Self {
        VideoError::SourceNotFound { path: path.into() }
    }
}
