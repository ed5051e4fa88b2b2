use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::shared::constants::DEFAULT_HDF5_DATASET;
use crate::shared::error::VideoError;
use crate::shared::frame::FrameArray;
use crate::video::domain::backend_options::BackendOptions;
use crate::video::domain::frame_store_writer::{FrameStoreWriter, StoreLayout};
use crate::video::domain::video_backend::VideoBackend;
use crate::video::infrastructure::hdf5_writer::Hdf5Writer;
use crate::video::infrastructure::img_store_writer::ImgStoreWriter;
use crate::video::video::Video;

/// Kind of store an export produces.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExportTarget {
    /// A group inside an HDF5 file, created or replaced by name.
    Hdf5 { dataset: String },
    ImgStore,
}

impl ExportTarget {
    pub fn hdf5() -> Self {
        ExportTarget::Hdf5 {
            dataset: DEFAULT_HDF5_DATASET.to_string(),
        }
    }

    pub fn writer(&self) -> Box<dyn FrameStoreWriter> {
        match self {
            ExportTarget::Hdf5 { dataset } => Box::new(Hdf5Writer::new(dataset.clone())),
            ExportTarget::ImgStore => Box::new(ImgStoreWriter::new()),
        }
    }
}

/// Which frames to copy and how the new store is keyed.
#[derive(Clone, Debug, PartialEq)]
pub struct ExportRequest {
    /// Source keys to copy, in order. `None` copies every frame.
    pub frame_numbers: Option<Vec<usize>>,
    /// `""` for raw frames (image stores fall back to png), an image format,
    /// or `"<codec>/<container>"` for an image store clip.
    pub format: String,
    pub index_by_original: bool,
    pub enable_source_fallback: bool,
}

impl Default for ExportRequest {
    fn default() -> Self {
        Self {
            frame_numbers: None,
            format: String::new(),
            index_by_original: true,
            enable_source_fallback: true,
        }
    }
}

impl ExportRequest {
    pub fn with_frame_numbers(mut self, frame_numbers: Vec<usize>) -> Self {
        self.frame_numbers = Some(frame_numbers);
        self
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = format.into();
        self
    }

    pub fn with_index_by_original(mut self, index_by_original: bool) -> Self {
        self.index_by_original = index_by_original;
        self
    }

    pub fn with_source_fallback(mut self, enable: bool) -> Self {
        self.enable_source_fallback = enable;
        self
    }
}

/// Keeps the first occurrence of every frame number so the stored mapping
/// stays injective.
fn dedup_frame_numbers(frame_numbers: Vec<usize>) -> Vec<usize> {
    let mut seen = HashSet::with_capacity(frame_numbers.len());
    let mut dropped = 0usize;
    let kept: Vec<usize> = frame_numbers
        .into_iter()
        .filter(|&n| {
            let first = seen.insert(n);
            if !first {
                dropped += 1;
            }
            first
        })
        .collect();
    if dropped > 0 {
        log::warn!("Dropped {dropped} repeated frame numbers from the export request");
    }
    kept
}

/// Copies frames from one video into a new store of another kind.
///
/// The new store records the original frame number of every copied frame
/// and, when the source has a file, a reference back to it. Single use per
/// destination: `execute` closes the writer it was built with.
pub struct ExportFramesUseCase {
    writer: Box<dyn FrameStoreWriter>,
    on_progress: Option<Box<dyn Fn(usize, usize) + Send>>,
}

impl ExportFramesUseCase {
    pub fn new(
        writer: Box<dyn FrameStoreWriter>,
        on_progress: Option<Box<dyn Fn(usize, usize) + Send>>,
    ) -> Self {
        Self {
            writer,
            on_progress,
        }
    }

    pub fn for_target(target: &ExportTarget) -> Self {
        Self::new(target.writer(), None)
    }

    pub fn execute(
        &mut self,
        source: &mut Video,
        destination: &Path,
        request: ExportRequest,
    ) -> Result<Video, VideoError> {
        if source.is_missing() {
            let path = source.filename().unwrap_or(destination).to_path_buf();
            return Err(VideoError::SourceNotFound { path });
        }

        let frame_numbers = match request.frame_numbers {
            Some(numbers) => dedup_frame_numbers(numbers),
            None => source.frame_keys()?,
        };
        let total = frame_numbers.len();
        let layout = StoreLayout {
            format: request.format,
            frame_shape: source.shape()?.frame_shape(),
            fps: source.fps()?,
            source: source.backend().source_ref(),
            index_by_original: request.index_by_original,
            enable_source_video: request.enable_source_fallback,
        };
        log::info!(
            "Exporting {total} frames from {} to {}",
            source
                .filename()
                .map_or_else(|| source.kind().to_string(), |p| p.display().to_string()),
            destination.display()
        );

        // HDF5 will not open a file for writing while it is open for reading,
        // so frames from the destination's own file are read up front.
        let preloaded = if source.filename() == Some(destination) {
            let frames = frame_numbers
                .iter()
                .map(|&n| source.get_frame(n))
                .collect::<Result<Vec<_>, _>>()?;
            source.close();
            Some(frames)
        } else {
            None
        };

        self.writer.open(destination, &layout)?;
        if let Err(e) = self.write_frames(source, &frame_numbers, preloaded) {
            self.writer.abort();
            return Err(e);
        }
        let backend = self.writer.close()?;
        log::info!("Exported {total} frames to {}", destination.display());
        Ok(Video::from_backend(backend))
    }

    fn write_frames(
        &mut self,
        source: &mut Video,
        frame_numbers: &[usize],
        preloaded: Option<Vec<FrameArray>>,
    ) -> Result<(), VideoError> {
        let total = frame_numbers.len();
        let mut preloaded = preloaded.map(Vec::into_iter);
        for (written, &frame_number) in frame_numbers.iter().enumerate() {
            let frame = match preloaded.as_mut().and_then(Iterator::next) {
                Some(frame) => frame,
                None => source.get_frame(frame_number)?,
            };
            self.writer.write(frame_number, &frame)?;
            if let Some(cb) = &self.on_progress {
                cb(written + 1, total);
            }
        }
        Ok(())
    }
}

/// Exports `source` into a new store at `destination`.
pub fn export(
    source: &mut Video,
    target: &ExportTarget,
    destination: &Path,
    request: ExportRequest,
) -> Result<Video, VideoError> {
    ExportFramesUseCase::for_target(target).execute(source, destination, request)
}

/// Builds an image store from still image files, one frame per file.
pub fn imgstore_from_filenames(
    filenames: Vec<PathBuf>,
    destination: &Path,
    format: &str,
) -> Result<Video, VideoError> {
    let mut source = Video::from_image_filenames(filenames, &BackendOptions::default());
    let request = ExportRequest::default()
        .with_format(format)
        .with_index_by_original(false);
    export(&mut source, &ExportTarget::ImgStore, destination, request)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::video::backend::Backend;
    use crate::video::infrastructure::dummy_backend::DummyBackend;
    use crate::video::infrastructure::image_codec;
    use ndarray::{Array3, Array4};
    use std::sync::{Arc, Mutex};

    /// Records what the exporter hands to a writer.
    #[derive(Default)]
    struct RecordingWriter {
        opened: Arc<Mutex<Option<StoreLayout>>>,
        written: Arc<Mutex<Vec<usize>>>,
        aborted: Arc<Mutex<bool>>,
    }

    impl FrameStoreWriter for RecordingWriter {
        fn open(&mut self, _destination: &Path, layout: &StoreLayout) -> Result<(), VideoError> {
            *self.opened.lock().unwrap() = Some(layout.clone());
            Ok(())
        }

        fn write(&mut self, frame_number: usize, _frame: &FrameArray) -> Result<(), VideoError> {
            self.written.lock().unwrap().push(frame_number);
            Ok(())
        }

        fn close(&mut self) -> Result<Backend, VideoError> {
            Ok(DummyBackend::new(None, 1, 1, 0, 1).into())
        }

        fn abort(&mut self) {
            *self.aborted.lock().unwrap() = true;
        }
    }

    fn numbered_video(frames: usize) -> Video {
        let array = Array4::from_shape_fn((frames, 4, 5, 3), |(i, _, _, _)| i as u8);
        Video::from_ndarray(array, &BackendOptions::default())
    }

    #[test]
    fn test_dedup_keeps_first_occurrence_order() {
        assert_eq!(dedup_frame_numbers(vec![5, 2, 5, 9, 2]), vec![5, 2, 9]);
        assert!(dedup_frame_numbers(vec![]).is_empty());
    }

    #[test]
    fn test_writer_sees_requested_order_and_layout() {
        let opened = Arc::new(Mutex::new(None));
        let written = Arc::new(Mutex::new(Vec::new()));
        let progress = Arc::new(Mutex::new(Vec::new()));
        let progress_sink = Arc::clone(&progress);
        let writer = RecordingWriter {
            opened: Arc::clone(&opened),
            written: Arc::clone(&written),
            ..RecordingWriter::default()
        };
        let mut use_case = ExportFramesUseCase::new(
            Box::new(writer),
            Some(Box::new(move |done, total| {
                progress_sink.lock().unwrap().push((done, total));
            })),
        );

        let mut source = numbered_video(6);
        let request = ExportRequest::default()
            .with_frame_numbers(vec![4, 1, 4])
            .with_format("png")
            .with_index_by_original(false);
        use_case
            .execute(&mut source, Path::new("unused"), request)
            .unwrap();

        assert_eq!(*written.lock().unwrap(), vec![4, 1]);
        assert_eq!(*progress.lock().unwrap(), vec![(1, 2), (2, 2)]);
        let layout = opened.lock().unwrap().clone().unwrap();
        assert_eq!(layout.format, "png");
        assert_eq!(layout.frame_shape.as_tuple(), (4, 5, 3));
        assert!(!layout.index_by_original);
        assert!(layout.source.is_none());
    }

    #[test]
    fn test_failed_read_aborts_writer() {
        let writer = RecordingWriter::default();
        let written = Arc::clone(&writer.written);
        let aborted = Arc::clone(&writer.aborted);
        let mut use_case = ExportFramesUseCase::new(Box::new(writer), None);

        let mut source = numbered_video(4);
        let request = ExportRequest::default().with_frame_numbers(vec![0, 9]);
        let result = use_case.execute(&mut source, Path::new("unused"), request);

        assert!(matches!(
            result,
            Err(VideoError::IndexOutOfRange { index: 9, frames: 4 })
        ));
        assert_eq!(*written.lock().unwrap(), vec![0]);
        assert!(*aborted.lock().unwrap());
    }

    #[test]
    fn test_failed_export_keeps_previous_store() {
        let dir = tempfile::tempdir().unwrap();
        let destination = dir.path().join("store");
        let mut source = numbered_video(4);
        export(
            &mut source,
            &ExportTarget::ImgStore,
            &destination,
            ExportRequest::default().with_frame_numbers(vec![0, 1]),
        )
        .unwrap()
        .close();

        let result = export(
            &mut source,
            &ExportTarget::ImgStore,
            &destination,
            ExportRequest::default().with_frame_numbers(vec![0, 9]),
        );
        assert!(result.is_err());
        assert!(destination.join("metadata.json").is_file());
        assert!(!dir.path().join("store.partial").exists());

        let mut store = Video::from_imgstore(&destination, &BackendOptions::default());
        assert_eq!(store.len().unwrap(), 2);
        assert_eq!(store.get_frame(1).unwrap(), source.get_frame(1).unwrap());

        let mut retry = export(
            &mut source,
            &ExportTarget::ImgStore,
            &destination,
            ExportRequest::default().with_frame_numbers(vec![3]),
        )
        .unwrap();
        assert_eq!(retry.frame_keys().unwrap(), vec![3]);
    }

    #[test]
    fn test_all_frames_to_imgstore() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = numbered_video(3);
        let mut exported = export(
            &mut source,
            &ExportTarget::ImgStore,
            &dir.path().join("store"),
            ExportRequest::default(),
        )
        .unwrap();
        assert_eq!(exported.len().unwrap(), 3);
        assert_eq!(exported.get_frame(2).unwrap(), source.get_frame(2).unwrap());
    }

    #[test]
    fn test_missing_source_fails_before_writing() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = Video::from_media(dir.path().join("gone.mp4"), &BackendOptions::default());
        let destination = dir.path().join("store");
        let result = export(
            &mut source,
            &ExportTarget::ImgStore,
            &destination,
            ExportRequest::default(),
        );
        assert!(matches!(result, Err(VideoError::SourceNotFound { .. })));
        assert!(!destination.exists());
    }

    #[test]
    fn test_imgstore_from_filenames() {
        let dir = tempfile::tempdir().unwrap();
        let mut paths = Vec::new();
        for i in 0..3u8 {
            let path = dir.path().join(format!("img{i}.png"));
            image_codec::write_image(&path, &Array3::from_elem((6, 8, 3), i * 50)).unwrap();
            paths.push(path);
        }
        let mut store = imgstore_from_filenames(paths, &dir.path().join("store"), "png").unwrap();
        assert_eq!(store.len().unwrap(), 3);
        assert!(store.get_frame(1).unwrap().iter().all(|&v| v == 50));
    }
}
