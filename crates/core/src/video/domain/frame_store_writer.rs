use std::path::Path;

use crate::shared::error::VideoError;
use crate::shared::frame::FrameArray;
use crate::shared::video_metadata::FrameShape;
use crate::video::backend::Backend;
use crate::video::domain::source_video_ref::SourceVideoRef;

/// Everything a writer needs to know before the first frame arrives.
#[derive(Clone, Debug)]
pub struct StoreLayout {
    /// Embedded-frame encoding: `""` for raw arrays, an image format name,
    /// or `"<codec>/<container>"` for a motion clip.
    pub format: String,
    pub frame_shape: FrameShape,
    pub fps: Option<f64>,
    pub source: Option<SourceVideoRef>,
    pub index_by_original: bool,
    pub enable_source_video: bool,
}

/// Writes frames into a new store so the exporter does not depend on a
/// specific storage library.
pub trait FrameStoreWriter {
    fn open(&mut self, destination: &Path, layout: &StoreLayout) -> Result<(), VideoError>;

    /// Appends one frame, recording the original frame number it came from.
    fn write(&mut self, frame_number: usize, frame: &FrameArray) -> Result<(), VideoError>;

    /// Flushes the store, puts it in place of whatever was at the
    /// destination, releases its file handles and returns a backend that
    /// reads the new store.
    fn close(&mut self) -> Result<Backend, VideoError>;

    /// Discards everything written since `open`. The destination is left as
    /// it was before the export started.
    fn abort(&mut self);
}
