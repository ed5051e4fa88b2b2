use std::path::{Path, PathBuf};

use crate::shared::error::VideoError;
use crate::shared::frame::{frame_shape, stack_frames, FrameArray, FrameStack};
use crate::shared::video_metadata::{Dtype, VideoShape};
use crate::video::backend::Backend;
use crate::video::domain::backend_options::{BackendKind, BackendOptions};
use crate::video::domain::frame_index_map::IndexMode;
use crate::video::domain::frame_key::FrameKey;
use crate::video::domain::reset_params::ResetParams;
use crate::video::domain::video_backend::VideoBackend;
use crate::video::factory::{self, VideoSource};
use crate::video::infrastructure::hdf5_backend::Hdf5Backend;
use crate::video::infrastructure::image_sequence_backend::ImageSequenceBackend;
use crate::video::infrastructure::img_store_backend::ImgStoreBackend;
use crate::video::infrastructure::media_backend::MediaBackend;
use crate::video::infrastructure::ndarray_backend::NdarrayBackend;

/// The handle callers use to read frames, whatever the storage.
///
/// Owns exactly one [`Backend`] and forwards to it. The only state of its
/// own is the frame count and shape, computed once and dropped whenever the
/// backend may have changed (`reset`, `close`, `backend_mut`).
pub struct Video {
    backend: Backend,
    frames: Option<usize>,
    shape: Option<VideoShape>,
}

impl Video {
    pub fn from_backend(backend: impl Into<Backend>) -> Self {
        Self {
            backend: backend.into(),
            frames: None,
            shape: None,
        }
    }

    /// Picks a backend for `path` from its contents or extension.
    pub fn from_filename(path: impl Into<PathBuf>, options: &BackendOptions) -> Result<Self, VideoError> {
        factory::open(VideoSource::Path(path.into()), options)
    }

    pub fn from_media(path: impl Into<PathBuf>, options: &BackendOptions) -> Self {
        Self::from_backend(MediaBackend::new(path, options))
    }

    pub fn from_hdf5(path: impl Into<PathBuf>, options: &BackendOptions) -> Self {
        Self::from_backend(Hdf5Backend::new(path, options))
    }

    pub fn from_image_filenames(filenames: Vec<PathBuf>, options: &BackendOptions) -> Self {
        Self::from_backend(ImageSequenceBackend::from_filenames(filenames, options))
    }

    pub fn from_imgstore(directory: impl Into<PathBuf>, options: &BackendOptions) -> Self {
        Self::from_backend(ImgStoreBackend::new(directory, options))
    }

    pub fn from_ndarray(array: FrameStack, options: &BackendOptions) -> Self {
        Self::from_backend(NdarrayBackend::new(array, options))
    }

    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    /// Mutable access to the backend. Drops the cached frame count and shape.
    pub fn backend_mut(&mut self) -> &mut Backend {
        self.invalidate();
        &mut self.backend
    }

    pub fn into_backend(self) -> Backend {
        self.backend
    }

    pub fn kind(&self) -> BackendKind {
        self.backend.kind()
    }

    pub fn len(&mut self) -> Result<usize, VideoError> {
        if let Some(frames) = self.frames {
            return Ok(frames);
        }
        let frames = self.backend.frames()?;
        self.frames = Some(frames);
        Ok(frames)
    }

    pub fn is_empty(&mut self) -> Result<bool, VideoError> {
        Ok(self.len()? == 0)
    }

    /// `(frames, height, width, channels)`.
    pub fn shape(&mut self) -> Result<VideoShape, VideoError> {
        if let Some(shape) = self.shape {
            return Ok(shape);
        }
        let frames = self.len()?;
        let shape = VideoShape::new(frames, self.backend.frame_shape()?);
        self.shape = Some(shape);
        Ok(shape)
    }

    pub fn height(&mut self) -> Result<usize, VideoError> {
        Ok(self.shape()?.height)
    }

    pub fn width(&mut self) -> Result<usize, VideoError> {
        Ok(self.shape()?.width)
    }

    pub fn channels(&mut self) -> Result<usize, VideoError> {
        Ok(self.shape()?.channels)
    }

    pub fn dtype(&self) -> Dtype {
        self.backend.dtype()
    }

    /// Frame rate, for backends that know one.
    pub fn fps(&mut self) -> Result<Option<f64>, VideoError> {
        self.backend.fps()
    }

    pub fn filename(&self) -> Option<&Path> {
        self.backend.filename()
    }

    pub fn is_missing(&self) -> bool {
        self.backend.is_missing()
    }

    pub fn index_mode(&mut self) -> Result<IndexMode, VideoError> {
        self.backend.index_mode()
    }

    pub fn last_frame_idx(&mut self) -> Result<Option<usize>, VideoError> {
        self.backend.last_frame_idx()
    }

    /// Every key `get_frame` accepts, in storage order.
    pub fn frame_keys(&mut self) -> Result<Vec<usize>, VideoError> {
        self.backend.frame_keys()
    }

    /// The first frame of the video.
    pub fn test_frame(&mut self) -> Result<FrameArray, VideoError> {
        match self.backend.first_frame_key()? {
            Some(key) => self.backend.get_frame(key),
            None => Err(VideoError::IndexOutOfRange { index: 0, frames: 0 }),
        }
    }

    /// Frames selected by `key`, always with a leading frame axis.
    ///
    /// ```no_run
    /// # use framekit_core::video::video::Video;
    /// # use framekit_core::video::domain::backend_options::BackendOptions;
    /// # use framekit_core::video::domain::frame_key::FrameKey;
    /// let mut video = Video::from_media("clip.mp4", &BackendOptions::default());
    /// let first = video.get(0)?;
    /// let every_other = video.get(FrameKey::slice(Some(0), Some(10), 2))?;
    /// assert_eq!(first.dim().0, 1);
    /// # Ok::<(), framekit_core::shared::error::VideoError>(())
    /// ```
    pub fn get(&mut self, key: impl Into<FrameKey>) -> Result<FrameStack, VideoError> {
        let key = key.into();
        let indices = match &key {
            FrameKey::Slice { .. } => {
                let frames = self.len()?;
                key.resolve(frames)?
            }
            FrameKey::Index(_) | FrameKey::List(_) => key.resolve(0)?,
        };
        self.get_frames(&indices)
    }

    pub fn get_frame(&mut self, key: usize) -> Result<FrameArray, VideoError> {
        self.backend.get_frame(key)
    }

    /// Frames in request order. Fails on the first key the backend rejects.
    pub fn get_frames(&mut self, keys: &[usize]) -> Result<FrameStack, VideoError> {
        self.backend.get_frames(keys)
    }

    /// Loads whichever of `keys` can be loaded.
    ///
    /// Returns the loadable keys in their original order with their stacked
    /// frames, or `(vec![], None)` when none load. Never fails.
    pub fn get_frames_safely(&mut self, keys: &[usize]) -> (Vec<usize>, Option<FrameStack>) {
        let mut valid = Vec::with_capacity(keys.len());
        let mut frames = Vec::with_capacity(keys.len());
        for &key in keys {
            match self.backend.get_frame(key) {
                Ok(frame) => {
                    valid.push(key);
                    frames.push(frame);
                }
                Err(e) => log::debug!("Skipping frame {key}: {e}"),
            }
        }
        let Some(first) = frames.first() else {
            return (Vec::new(), None);
        };
        match stack_frames(&frames, frame_shape(first)) {
            Ok(stack) => (valid, Some(stack)),
            Err(e) => {
                log::warn!("Loaded frames could not be stacked: {e}");
                (Vec::new(), None)
            }
        }
    }

    /// Applies new parameters to the backend in place.
    pub fn reset(&mut self, params: ResetParams) -> Result<(), VideoError> {
        self.backend.reset(params)?;
        self.invalidate();
        Ok(())
    }

    /// Releases the backend's file handle or decoder. Idempotent.
    pub fn close(&mut self) {
        self.backend.close();
        self.invalidate();
    }

    pub fn has_embedded_images(&mut self) -> Result<bool, VideoError> {
        match self.backend.as_hdf5_mut() {
            Some(hdf5) => hdf5.has_embedded_images(),
            None => Ok(false),
        }
    }

    pub fn source_video_available(&mut self) -> Result<bool, VideoError> {
        match self.backend.as_hdf5_mut() {
            Some(hdf5) => hdf5.source_video_available(),
            None => Ok(false),
        }
    }

    pub fn embedded_frame_inds(&mut self) -> Result<Vec<usize>, VideoError> {
        match self.backend.as_hdf5_mut() {
            Some(hdf5) => hdf5.embedded_frame_inds(),
            None => Err(VideoError::InvalidArgument(format!(
                "{} videos do not embed frames",
                self.backend.kind()
            ))),
        }
    }

    pub fn set_enable_source_video(&mut self, enable: bool) -> Result<(), VideoError> {
        match self.backend.as_hdf5_mut() {
            Some(hdf5) => {
                hdf5.set_enable_source_video(enable);
                Ok(())
            }
            None => Err(VideoError::InvalidArgument(format!(
                "{} videos have no source video fallback",
                self.backend.kind()
            ))),
        }
    }

    fn invalidate(&mut self) {
        self.frames = None;
        self.shape = None;
    }
}

impl std::fmt::Debug for Video {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Video")
            .field("kind", &self.backend.kind())
            .field("filename", &self.backend.filename())
            .field("shape", &self.shape)
            .finish()
    }
}
