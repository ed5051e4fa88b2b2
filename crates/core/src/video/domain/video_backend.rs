use std::path::Path;

use crate::shared::error::VideoError;
use crate::shared::frame::{frame_shape, stack_frames, FrameArray, FrameStack};
use crate::shared::video_metadata::{Dtype, FrameShape};
use crate::video::domain::backend_options::BackendKind;
use crate::video::domain::frame_index_map::IndexMode;
use crate::video::domain::reset_params::ResetParams;
use crate::video::domain::source_video_ref::SourceVideoRef;

/// Frame access shared by every storage backend.
///
/// Backends open their resource lazily: constructing one never touches the
/// file, and a missing source surfaces as [`VideoError::SourceNotFound`] on
/// the first call that needs data.
pub trait VideoBackend {
    fn kind(&self) -> BackendKind;

    fn filename(&self) -> Option<&Path>;

    /// True when the underlying resource cannot be located.
    fn is_missing(&self) -> bool;

    fn frames(&mut self) -> Result<usize, VideoError>;

    /// `(height, width, channels)` of frames returned by `get_frame`.
    fn frame_shape(&mut self) -> Result<FrameShape, VideoError>;

    fn dtype(&self) -> Dtype {
        Dtype::Uint8
    }

    /// Only temporally sampled backends know their frame rate.
    fn fps(&mut self) -> Result<Option<f64>, VideoError> {
        Ok(None)
    }

    fn index_mode(&mut self) -> Result<IndexMode, VideoError> {
        Ok(IndexMode::Sequential)
    }

    /// Largest key accepted by `get_frame`, `None` when there are no frames.
    fn last_frame_idx(&mut self) -> Result<Option<usize>, VideoError> {
        Ok(self.frames()?.checked_sub(1))
    }

    /// Every key `get_frame` accepts, in storage order.
    fn frame_keys(&mut self) -> Result<Vec<usize>, VideoError> {
        Ok((0..self.frames()?).collect())
    }

    /// Smallest key accepted by `get_frame`, `None` when there are no frames.
    fn first_frame_key(&mut self) -> Result<Option<usize>, VideoError> {
        Ok((self.frames()? > 0).then_some(0))
    }

    /// Effective grayscale flag; `None` until detected from a frame.
    fn grayscale(&self) -> Option<bool>;

    fn bgr(&self) -> bool;

    fn get_frame(&mut self, key: usize) -> Result<FrameArray, VideoError>;

    /// Frames in request order; duplicates are allowed.
    fn get_frames(&mut self, keys: &[usize]) -> Result<FrameStack, VideoError> {
        let frames = keys
            .iter()
            .map(|&key| self.get_frame(key))
            .collect::<Result<Vec<_>, _>>()?;
        let shape = match frames.first() {
            Some(frame) => frame_shape(frame),
            None => self.frame_shape()?,
        };
        stack_frames(&frames, shape)
    }

    /// Swaps the resource reference and/or conversion parameters in place.
    ///
    /// Either fully applied or rejected with the backend untouched. On success
    /// every cached value derived from the old parameters is dropped.
    fn reset(&mut self, params: ResetParams) -> Result<(), VideoError>;

    /// Releases the resource handle. Idempotent.
    fn close(&mut self);

    /// How to reopen this backend's data from another store, if it has a file.
    fn source_ref(&self) -> Option<SourceVideoRef> {
        None
    }
}
