use std::path::Path;

use ndarray::Axis;

use crate::shared::error::VideoError;
use crate::shared::frame::{FrameArray, FrameStack};
use crate::shared::video_metadata::FrameShape;
use crate::video::domain::backend_options::{BackendKind, BackendOptions};
use crate::video::domain::channel_conversion::{ChannelConversion, GrayscaleProbe};
use crate::video::domain::reset_params::ResetParams;
use crate::video::domain::video_backend::VideoBackend;

/// Frames held in memory as one `(frames, height, width, channels)` array.
pub struct NdarrayBackend {
    array: FrameStack,
    conversion: ChannelConversion,
}

impl NdarrayBackend {
    pub fn new(array: FrameStack, options: &BackendOptions) -> Self {
        Self {
            array,
            conversion: ChannelConversion::new(
                options.grayscale,
                options.bgr,
                GrayscaleProbe::StoredChannels,
            ),
        }
    }

    pub fn array(&self) -> &FrameStack {
        &self.array
    }

    /// Replaces the frames in place. Shape and channel detection start over.
    pub fn set_array(&mut self, array: FrameStack) {
        self.array = array;
        self.conversion.invalidate();
    }
}

impl VideoBackend for NdarrayBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Ndarray
    }

    fn filename(&self) -> Option<&Path> {
        None
    }

    fn is_missing(&self) -> bool {
        false
    }

    fn frames(&mut self) -> Result<usize, VideoError> {
        Ok(self.array.len_of(Axis(0)))
    }

    fn frame_shape(&mut self) -> Result<FrameShape, VideoError> {
        let (_, height, width, stored) = self.array.dim();
        let gray = self.conversion.resolve_stored(stored);
        Ok(FrameShape::new(height, width, if gray { 1 } else { 3 }))
    }

    fn grayscale(&self) -> Option<bool> {
        self.conversion.grayscale()
    }

    fn bgr(&self) -> bool {
        self.conversion.bgr()
    }

    fn get_frame(&mut self, key: usize) -> Result<FrameArray, VideoError> {
        let frames = self.array.len_of(Axis(0));
        if key >= frames {
            return Err(VideoError::IndexOutOfRange { index: key, frames });
        }
        let raw = self.array.index_axis(Axis(0), key).to_owned();
        Ok(self.conversion.apply(raw))
    }

    fn reset(&mut self, params: ResetParams) -> Result<(), VideoError> {
        params.validate()?;
        params.require_no_files("ndarray")?;
        self.conversion.reset(&params);
        Ok(())
    }

    fn close(&mut self) {}
}
