use std::path::{Path, PathBuf};

use crate::shared::constants::{
    DEFAULT_IMGSTORE_FORMAT, FALLBACK_FPS, IMGSTORE_METADATA_FILE, STAGING_SUFFIX,
};
use crate::shared::error::VideoError;
use crate::shared::frame::{frame_shape, FrameArray};
use crate::shared::video_metadata::VideoMetadata;
use crate::video::backend::Backend;
use crate::video::domain::backend_options::BackendOptions;
use crate::video::domain::frame_store_writer::{FrameStoreWriter, StoreLayout};
use crate::video::infrastructure::ffmpeg_writer::FfmpegWriter;
use crate::video::infrastructure::image_codec;
use crate::video::infrastructure::img_store_backend::{chunk_file_name, ImgStoreBackend, StoreMetadata};

enum ChunkSink {
    /// One image file per frame.
    Images { extension: String },
    /// All frames in one clip, opened on the first frame.
    Clip {
        codec: String,
        container: String,
        writer: Option<FfmpegWriter>,
    },
}

struct OpenStore {
    destination: PathBuf,
    /// Sibling directory the frames go to until `close`.
    staging: PathBuf,
    layout: StoreLayout,
    sink: ChunkSink,
    frame_numbers: Vec<usize>,
}

/// Writes exported frames into an image store directory.
pub struct ImgStoreWriter {
    store: Option<OpenStore>,
}

impl ImgStoreWriter {
    pub fn new() -> Self {
        Self { store: None }
    }
}

impl Default for ImgStoreWriter {
    fn default() -> Self {
        Self::new()
    }
}

/// Checks that `directory` may hold a new store without touching it.
///
/// A previous store there will be replaced on close. Anything else that is
/// not empty is refused rather than overwritten.
fn check_destination(directory: &Path) -> Result<(), VideoError> {
    if directory.join(IMGSTORE_METADATA_FILE).is_file() {
        log::debug!("Image store {} will be replaced", directory.display());
    } else if directory.is_file() {
        return Err(VideoError::InvalidArgument(format!(
            "{} is a file, expected a directory",
            directory.display()
        )));
    } else if directory.is_dir() && std::fs::read_dir(directory)?.next().is_some() {
        return Err(VideoError::InvalidArgument(format!(
            "{} is not empty and is not an image store",
            directory.display()
        )));
    }
    Ok(())
}

fn staging_directory(destination: &Path) -> Result<PathBuf, VideoError> {
    let name = destination.file_name().ok_or_else(|| {
        VideoError::InvalidArgument(format!(
            "{} does not name a directory",
            destination.display()
        ))
    })?;
    let mut staging = name.to_os_string();
    staging.push(STAGING_SUFFIX);
    Ok(destination.with_file_name(staging))
}

fn create_staging(staging: &Path) -> Result<(), VideoError> {
    if staging.exists() {
        log::debug!("Removing stale staging directory {}", staging.display());
        std::fs::remove_dir_all(staging)?;
    }
    std::fs::create_dir_all(staging)?;
    Ok(())
}

impl OpenStore {
    fn finish(&mut self) -> Result<(), VideoError> {
        if let ChunkSink::Clip {
            writer: Some(clip), ..
        } = &mut self.sink
        {
            clip.close()?;
        }

        let shape = self.layout.frame_shape;
        let metadata = StoreMetadata {
            format: self.layout.format.clone(),
            height: shape.height,
            width: shape.width,
            channels: shape.channels,
            frame_numbers: self.frame_numbers.clone(),
            index_by_original: self.layout.index_by_original,
            fps: self.layout.fps,
            source: self.layout.source.clone(),
        };
        metadata.write(&self.staging)?;

        if self.destination.exists() {
            std::fs::remove_dir_all(&self.destination)?;
        }
        std::fs::rename(&self.staging, &self.destination)?;
        Ok(())
    }

    fn discard(self) {
        let OpenStore { staging, sink, .. } = self;
        drop(sink);
        if let Err(e) = std::fs::remove_dir_all(&staging) {
            log::warn!("Could not remove partial store {}: {e}", staging.display());
        }
    }
}

impl FrameStoreWriter for ImgStoreWriter {
    fn open(&mut self, destination: &Path, layout: &StoreLayout) -> Result<(), VideoError> {
        let format = if layout.format.is_empty() {
            DEFAULT_IMGSTORE_FORMAT.to_string()
        } else {
            layout.format.clone()
        };
        let sink = match format.split_once('/') {
            Some((codec, container)) => ChunkSink::Clip {
                codec: codec.to_string(),
                container: container.to_string(),
                writer: None,
            },
            None => {
                image_codec::image_format(&format)?;
                ChunkSink::Images {
                    extension: format.clone(),
                }
            }
        };
        check_destination(destination)?;
        let staging = staging_directory(destination)?;
        self.abort();
        create_staging(&staging)?;
        log::debug!(
            "Writing image store {} (format '{format}')",
            destination.display()
        );

        self.store = Some(OpenStore {
            destination: destination.to_path_buf(),
            staging,
            layout: StoreLayout {
                format,
                ..layout.clone()
            },
            sink,
            frame_numbers: Vec::new(),
        });
        Ok(())
    }

    fn write(&mut self, frame_number: usize, frame: &FrameArray) -> Result<(), VideoError> {
        let store = self
            .store
            .as_mut()
            .ok_or_else(|| VideoError::InvalidArgument("image store writer is not open".into()))?;
        let shape = store.layout.frame_shape;
        if frame_shape(frame) != shape {
            return Err(VideoError::InvalidArgument(format!(
                "frame {frame_number} has shape {:?}, store expects {:?}",
                frame.dim(),
                shape.as_tuple()
            )));
        }

        let position = store.frame_numbers.len();
        match &mut store.sink {
            ChunkSink::Images { extension } => {
                let path = store.staging.join(chunk_file_name(position, extension));
                image_codec::write_image(&path, frame)?;
            }
            ChunkSink::Clip {
                codec,
                container,
                writer,
            } => {
                if writer.is_none() {
                    let mut clip = FfmpegWriter::with_codec(codec);
                    let metadata = VideoMetadata {
                        width: shape.width as u32,
                        height: shape.height as u32,
                        fps: store.layout.fps.unwrap_or(FALLBACK_FPS),
                        total_frames: 0,
                        codec: codec.clone(),
                        source_path: None,
                    };
                    clip.open(&store.staging.join(chunk_file_name(0, container)), &metadata)?;
                    *writer = Some(clip);
                }
                if let Some(clip) = writer.as_mut() {
                    clip.write(frame)?;
                }
            }
        }
        store.frame_numbers.push(frame_number);
        Ok(())
    }

    fn close(&mut self) -> Result<Backend, VideoError> {
        let mut store = self
            .store
            .take()
            .ok_or_else(|| VideoError::InvalidArgument("image store writer is not open".into()))?;
        if let Err(e) = store.finish() {
            store.discard();
            return Err(e);
        }
        log::debug!(
            "Wrote {} frames to image store {}",
            store.frame_numbers.len(),
            store.destination.display()
        );

        let options = BackendOptions {
            index_by_original: store.layout.index_by_original,
            ..BackendOptions::default()
        };
        Ok(ImgStoreBackend::new(store.destination, &options).into())
    }

    fn abort(&mut self) {
        if let Some(store) = self.store.take() {
            log::debug!(
                "Discarding partial image store for {}",
                store.destination.display()
            );
            store.discard();
        }
    }
}

impl Drop for ImgStoreWriter {
    fn drop(&mut self) {
        self.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::video_metadata::FrameShape;
    use crate::video::domain::video_backend::VideoBackend;
    use ndarray::Array3;

    fn layout(format: &str, channels: usize) -> StoreLayout {
        StoreLayout {
            format: format.to_string(),
            frame_shape: FrameShape::new(8, 10, channels),
            fps: None,
            source: None,
            index_by_original: true,
            enable_source_video: true,
        }
    }

    fn frame(value: u8, channels: usize) -> FrameArray {
        Array3::from_elem((8, 10, channels), value)
    }

    #[test]
    fn test_default_format_is_png_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = dir.path().join("store");
        let mut writer = ImgStoreWriter::new();
        writer.open(&store, &layout("", 3)).unwrap();
        writer.write(12, &frame(40, 3)).unwrap();
        writer.write(5, &frame(80, 3)).unwrap();
        let mut backend = writer.close().unwrap();

        assert!(store.join("000000.png").is_file());
        assert!(store.join("000001.png").is_file());
        let metadata = StoreMetadata::read(&store).unwrap();
        assert_eq!(metadata.format, "png");
        assert_eq!(metadata.frame_numbers, vec![12, 5]);
        assert_eq!(backend.get_frame(5).unwrap(), frame(80, 3));
    }

    #[test]
    fn test_grayscale_frames() {
        let dir = tempfile::tempdir().unwrap();
        let store = dir.path().join("gray");
        let mut writer = ImgStoreWriter::new();
        writer.open(&store, &layout("png", 1)).unwrap();
        writer.write(0, &frame(9, 1)).unwrap();
        let mut backend = writer.close().unwrap();
        assert_eq!(backend.frame_shape().unwrap(), FrameShape::new(8, 10, 1));
        assert_eq!(backend.get_frame(0).unwrap(), frame(9, 1));
    }

    #[test]
    fn test_replaces_existing_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = dir.path().join("store");
        for count in [3, 1] {
            let mut writer = ImgStoreWriter::new();
            writer.open(&store, &layout("png", 3)).unwrap();
            for i in 0..count {
                writer.write(i, &frame(i as u8, 3)).unwrap();
            }
            writer.close().unwrap();
        }
        assert!(!store.join("000002.png").exists());
        assert_eq!(StoreMetadata::read(&store).unwrap().frame_numbers, vec![0]);
    }

    #[test]
    fn test_store_appears_only_on_close() {
        let dir = tempfile::tempdir().unwrap();
        let store = dir.path().join("store");
        let mut writer = ImgStoreWriter::new();
        writer.open(&store, &layout("png", 3)).unwrap();
        writer.write(0, &frame(1, 3)).unwrap();
        assert!(!store.exists());
        assert!(dir.path().join("store.partial").join("000000.png").is_file());

        writer.close().unwrap();
        assert!(store.join(IMGSTORE_METADATA_FILE).is_file());
        assert!(!dir.path().join("store.partial").exists());
    }

    #[test]
    fn test_abort_keeps_previous_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = dir.path().join("store");
        let mut writer = ImgStoreWriter::new();
        writer.open(&store, &layout("png", 3)).unwrap();
        writer.write(4, &frame(40, 3)).unwrap();
        writer.close().unwrap();

        writer.open(&store, &layout("png", 3)).unwrap();
        writer.write(0, &frame(0, 3)).unwrap();
        writer.write(1, &frame(1, 3)).unwrap();
        writer.abort();

        assert!(!dir.path().join("store.partial").exists());
        assert_eq!(StoreMetadata::read(&store).unwrap().frame_numbers, vec![4]);
        assert!(!store.join("000001.png").exists());
    }

    #[test]
    fn test_dropping_open_writer_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let store = dir.path().join("store");
        let mut writer = ImgStoreWriter::new();
        writer.open(&store, &layout("png", 1)).unwrap();
        writer.write(0, &frame(3, 1)).unwrap();
        drop(writer);
        assert!(!store.exists());
        assert!(!dir.path().join("store.partial").exists());
    }

    #[test]
    fn test_refuses_foreign_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"keep me").unwrap();
        let mut writer = ImgStoreWriter::new();
        assert!(matches!(
            writer.open(dir.path(), &layout("png", 3)),
            Err(VideoError::InvalidArgument(_))
        ));
        assert!(dir.path().join("notes.txt").exists());
    }

    #[test]
    fn test_unknown_format() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = ImgStoreWriter::new();
        assert!(matches!(
            writer.open(&dir.path().join("s"), &layout("nope", 3)),
            Err(VideoError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = dir.path().join("empty");
        let mut writer = ImgStoreWriter::new();
        writer.open(&store, &layout("png", 3)).unwrap();
        let mut backend = writer.close().unwrap();
        assert_eq!(backend.frames().unwrap(), 0);
        assert_eq!(backend.frame_shape().unwrap(), FrameShape::new(8, 10, 3));
    }
}
