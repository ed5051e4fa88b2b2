use std::path::{Path, PathBuf};

use ndarray::Array3;

use crate::shared::error::VideoError;
use crate::shared::frame::FrameArray;
use crate::shared::video_metadata::FrameShape;
use crate::video::domain::backend_options::BackendKind;
use crate::video::domain::reset_params::ResetParams;
use crate::video::domain::video_backend::VideoBackend;

/// Synthetic placeholder video: a fixed shape filled with one constant value.
///
/// Never performs I/O; `filename` is only a label.
#[derive(Clone, Debug)]
pub struct DummyBackend {
    filename: Option<PathBuf>,
    shape: FrameShape,
    frames: usize,
    fill: u8,
    bgr: bool,
}

impl DummyBackend {
    pub fn new(
        filename: Option<PathBuf>,
        height: usize,
        width: usize,
        frames: usize,
        channels: usize,
    ) -> Self {
        Self {
            filename,
            shape: FrameShape::new(height, width, channels),
            frames,
            fill: 0,
            bgr: false,
        }
    }

    pub fn with_fill(mut self, fill: u8) -> Self {
        self.fill = fill;
        self
    }

    pub fn fill(&self) -> u8 {
        self.fill
    }
}

impl VideoBackend for DummyBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Dummy
    }

    fn filename(&self) -> Option<&Path> {
        self.filename.as_deref()
    }

    fn is_missing(&self) -> bool {
        false
    }

    fn frames(&mut self) -> Result<usize, VideoError> {
        Ok(self.frames)
    }

    fn frame_shape(&mut self) -> Result<FrameShape, VideoError> {
        Ok(self.shape)
    }

    fn grayscale(&self) -> Option<bool> {
        Some(self.shape.channels == 1)
    }

    fn bgr(&self) -> bool {
        self.bgr
    }

    fn get_frame(&mut self, key: usize) -> Result<FrameArray, VideoError> {
        if key >= self.frames {
            return Err(VideoError::IndexOutOfRange {
                index: key,
                frames: self.frames,
            });
        }
        Ok(Array3::from_elem(self.shape.as_tuple(), self.fill))
    }

    fn reset(&mut self, params: ResetParams) -> Result<(), VideoError> {
        params.validate()?;
        params.require_single_file("dummy")?;

        if let Some(filename) = params.filename {
            self.filename = Some(filename);
        }
        if let Some(gray) = params.grayscale {
            self.shape.channels = if gray { 1 } else { 3 };
        }
        if let Some(bgr) = params.bgr {
            self.bgr = bgr;
        }
        Ok(())
    }

    fn close(&mut self) {}
}
