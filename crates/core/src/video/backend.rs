use std::path::Path;

use crate::shared::error::VideoError;
use crate::shared::frame::{FrameArray, FrameStack};
use crate::shared::video_metadata::{Dtype, FrameShape};
use crate::video::domain::backend_options::BackendKind;
use crate::video::domain::frame_index_map::IndexMode;
use crate::video::domain::reset_params::ResetParams;
use crate::video::domain::source_video_ref::SourceVideoRef;
use crate::video::domain::video_backend::VideoBackend;
use crate::video::infrastructure::dummy_backend::DummyBackend;
use crate::video::infrastructure::hdf5_backend::Hdf5Backend;
use crate::video::infrastructure::image_sequence_backend::ImageSequenceBackend;
use crate::video::infrastructure::img_store_backend::ImgStoreBackend;
use crate::video::infrastructure::media_backend::MediaBackend;
use crate::video::infrastructure::ndarray_backend::NdarrayBackend;

/// One storage backend. Every variant implements [`VideoBackend`]; this
/// type forwards each call to the wrapped variant.
pub enum Backend {
    Media(MediaBackend),
    Hdf5(Hdf5Backend),
    ImageSequence(ImageSequenceBackend),
    ImgStore(ImgStoreBackend),
    Ndarray(NdarrayBackend),
    Dummy(DummyBackend),
}

macro_rules! dispatch {
    ($self:expr, $backend:ident => $body:expr) => {
        match $self {
            Backend::Media($backend) => $body,
            Backend::Hdf5($backend) => $body,
            Backend::ImageSequence($backend) => $body,
            Backend::ImgStore($backend) => $body,
            Backend::Ndarray($backend) => $body,
            Backend::Dummy($backend) => $body,
        }
    };
}

impl Backend {
    pub fn as_hdf5(&self) -> Option<&Hdf5Backend> {
        match self {
            Backend::Hdf5(backend) => Some(backend),
            _ => None,
        }
    }

    pub fn as_hdf5_mut(&mut self) -> Option<&mut Hdf5Backend> {
        match self {
            Backend::Hdf5(backend) => Some(backend),
            _ => None,
        }
    }

    pub fn as_img_store_mut(&mut self) -> Option<&mut ImgStoreBackend> {
        match self {
            Backend::ImgStore(backend) => Some(backend),
            _ => None,
        }
    }

    pub fn as_ndarray_mut(&mut self) -> Option<&mut NdarrayBackend> {
        match self {
            Backend::Ndarray(backend) => Some(backend),
            _ => None,
        }
    }
}

impl VideoBackend for Backend {
    fn kind(&self) -> BackendKind {
        dispatch!(self, b => b.kind())
    }

    fn filename(&self) -> Option<&Path> {
        dispatch!(self, b => b.filename())
    }

    fn is_missing(&self) -> bool {
        dispatch!(self, b => b.is_missing())
    }

    fn frames(&mut self) -> Result<usize, VideoError> {
        dispatch!(self, b => b.frames())
    }

    fn frame_shape(&mut self) -> Result<FrameShape, VideoError> {
        dispatch!(self, b => b.frame_shape())
    }

    fn dtype(&self) -> Dtype {
        dispatch!(self, b => b.dtype())
    }

    fn fps(&mut self) -> Result<Option<f64>, VideoError> {
        dispatch!(self, b => b.fps())
    }

    fn index_mode(&mut self) -> Result<IndexMode, VideoError> {
        dispatch!(self, b => b.index_mode())
    }

    fn last_frame_idx(&mut self) -> Result<Option<usize>, VideoError> {
        dispatch!(self, b => b.last_frame_idx())
    }

    fn frame_keys(&mut self) -> Result<Vec<usize>, VideoError> {
        dispatch!(self, b => b.frame_keys())
    }

    fn first_frame_key(&mut self) -> Result<Option<usize>, VideoError> {
        dispatch!(self, b => b.first_frame_key())
    }

    fn grayscale(&self) -> Option<bool> {
        dispatch!(self, b => b.grayscale())
    }

    fn bgr(&self) -> bool {
        dispatch!(self, b => b.bgr())
    }

    fn get_frame(&mut self, key: usize) -> Result<FrameArray, VideoError> {
        dispatch!(self, b => b.get_frame(key))
    }

    fn get_frames(&mut self, keys: &[usize]) -> Result<FrameStack, VideoError> {
        dispatch!(self, b => b.get_frames(keys))
    }

    fn reset(&mut self, params: ResetParams) -> Result<(), VideoError> {
        dispatch!(self, b => b.reset(params))
    }

    fn close(&mut self) {
        dispatch!(self, b => b.close())
    }

    fn source_ref(&self) -> Option<SourceVideoRef> {
        dispatch!(self, b => b.source_ref())
    }
}

impl From<MediaBackend> for Backend {
    fn from(backend: MediaBackend) -> Self {
        Backend::Media(backend)
    }
}

impl From<Hdf5Backend> for Backend {
    fn from(backend: Hdf5Backend) -> Self {
        Backend::Hdf5(backend)
    }
}

impl From<ImageSequenceBackend> for Backend {
    fn from(backend: ImageSequenceBackend) -> Self {
        Backend::ImageSequence(backend)
    }
}

impl From<ImgStoreBackend> for Backend {
    fn from(backend: ImgStoreBackend) -> Self {
        Backend::ImgStore(backend)
    }
}

impl From<NdarrayBackend> for Backend {
    fn from(backend: NdarrayBackend) -> Self {
        Backend::Ndarray(backend)
    }
}

impl From<DummyBackend> for Backend {
    fn from(backend: DummyBackend) -> Self {
        Backend::Dummy(backend)
    }
}
