use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use crate::shared::constants::{
    HDF5_EXTENSIONS, HDF5_MAGIC, HDF5_MAGIC_OFFSETS, IMGSTORE_METADATA_FILE, MEDIA_EXTENSIONS,
};
use crate::shared::error::VideoError;
use crate::shared::frame::FrameStack;
use crate::video::domain::backend_options::{BackendKind, BackendOptions};
use crate::video::infrastructure::hdf5_backend::Hdf5Backend;
use crate::video::infrastructure::image_sequence_backend::{has_image_extension, ImageSequenceBackend};
use crate::video::infrastructure::img_store_backend::ImgStoreBackend;
use crate::video::infrastructure::media_backend::MediaBackend;
use crate::video::infrastructure::ndarray_backend::NdarrayBackend;
use crate::video::video::Video;

/// What a [`Video`] can be opened from.
#[derive(Clone, Debug)]
pub enum VideoSource {
    Path(PathBuf),
    /// Still images, one per frame, in order.
    Filenames(Vec<PathBuf>),
    Array(FrameStack),
}

impl From<PathBuf> for VideoSource {
    fn from(path: PathBuf) -> Self {
        VideoSource::Path(path)
    }
}

impl From<&Path> for VideoSource {
    fn from(path: &Path) -> Self {
        VideoSource::Path(path.to_path_buf())
    }
}

impl From<&str> for VideoSource {
    fn from(path: &str) -> Self {
        VideoSource::Path(PathBuf::from(path))
    }
}

impl From<Vec<PathBuf>> for VideoSource {
    fn from(filenames: Vec<PathBuf>) -> Self {
        VideoSource::Filenames(filenames)
    }
}

impl From<FrameStack> for VideoSource {
    fn from(array: FrameStack) -> Self {
        VideoSource::Array(array)
    }
}

/// Builds a [`Video`] over `source`, choosing the backend from
/// `options.backend` or, failing that, from what the path looks like.
///
/// Only sniffing touches the filesystem; the chosen backend opens its
/// resource on first access, so a missing file is reported then as
/// [`VideoError::SourceNotFound`].
pub fn open(source: impl Into<VideoSource>, options: &BackendOptions) -> Result<Video, VideoError> {
    match source.into() {
        VideoSource::Path(path) => {
            let kind = match options.backend {
                Some(kind) => kind,
                None => detect_kind(&path)?,
            };
            log::debug!("Opening {} as {kind}", path.display());
            open_path(path, kind, options)
        }
        VideoSource::Filenames(filenames) => {
            expect_kind(options, BackendKind::ImageSequence)?;
            Ok(Video::from_backend(ImageSequenceBackend::from_filenames(
                filenames, options,
            )))
        }
        VideoSource::Array(array) => {
            expect_kind(options, BackendKind::Ndarray)?;
            Ok(Video::from_backend(NdarrayBackend::new(array, options)))
        }
    }
}

fn expect_kind(options: &BackendOptions, expected: BackendKind) -> Result<(), VideoError> {
    match options.backend {
        Some(kind) if kind != expected => Err(VideoError::InvalidArgument(format!(
            "backend '{kind}' cannot read this source, expected '{expected}'"
        ))),
        _ => Ok(()),
    }
}

fn open_path(path: PathBuf, kind: BackendKind, options: &BackendOptions) -> Result<Video, VideoError> {
    let video = match kind {
        BackendKind::Media => Video::from_backend(MediaBackend::new(path, options)),
        BackendKind::Hdf5 => Video::from_backend(Hdf5Backend::new(path, options)),
        BackendKind::ImgStore => Video::from_backend(ImgStoreBackend::new(path, options)),
        BackendKind::ImageSequence if path.is_dir() => {
            Video::from_backend(ImageSequenceBackend::from_directory(path, options))
        }
        BackendKind::ImageSequence => {
            Video::from_backend(ImageSequenceBackend::from_filenames(vec![path], options))
        }
        BackendKind::Ndarray | BackendKind::Dummy => {
            return Err(VideoError::InvalidArgument(format!(
                "'{kind}' videos are not opened from a path"
            )))
        }
    };
    Ok(video)
}

/// Classifies `path` by content where it exists, by extension otherwise.
pub fn detect_kind(path: &Path) -> Result<BackendKind, VideoError> {
    if path.is_dir() {
        if path.join(IMGSTORE_METADATA_FILE).is_file() {
            return Ok(BackendKind::ImgStore);
        }
        if directory_has_images(path)? {
            return Ok(BackendKind::ImageSequence);
        }
        return Err(VideoError::UnsupportedFormat(format!(
            "directory {} holds neither an image store nor images",
            path.display()
        )));
    }
    if path.is_file() && has_hdf5_signature(path)? {
        return Ok(BackendKind::Hdf5);
    }

    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    if HDF5_EXTENSIONS.contains(&extension.as_str()) {
        Ok(BackendKind::Hdf5)
    } else if has_image_extension(path) {
        Ok(BackendKind::ImageSequence)
    } else if MEDIA_EXTENSIONS.contains(&extension.as_str()) {
        Ok(BackendKind::Media)
    } else {
        Err(VideoError::UnsupportedFormat(format!(
            "cannot tell what kind of video {} is",
            path.display()
        )))
    }
}

fn directory_has_images(dir: &Path) -> Result<bool, VideoError> {
    Ok(std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .any(|entry| has_image_extension(&entry.path())))
}

/// HDF5 files start with an 8-byte signature, possibly after a user block.
fn has_hdf5_signature(path: &Path) -> Result<bool, VideoError> {
    let mut file = File::open(path)?;
    let len = file.metadata()?.len();
    let mut buf = [0u8; 8];
    for &offset in HDF5_MAGIC_OFFSETS {
        if offset + buf.len() as u64 > len {
            break;
        }
        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(&mut buf)?;
        if &buf == HDF5_MAGIC {
            return Ok(true);
        }
    }
    Ok(false)
}
