use std::path::{Path, PathBuf};

use crate::shared::constants::IMAGE_EXTENSIONS;
use crate::shared::error::VideoError;
use crate::shared::frame::FrameArray;
use crate::shared::video_metadata::FrameShape;
use crate::video::domain::backend_options::{BackendKind, BackendOptions};
use crate::video::domain::channel_conversion::{ChannelConversion, GrayscaleProbe};
use crate::video::domain::reset_params::ResetParams;
use crate::video::domain::resource_state::ResourceState;
use crate::video::domain::source_video_ref::SourceVideoRef;
use crate::video::domain::video_backend::VideoBackend;
use crate::video::infrastructure::frame_cache::FrameCache;
use crate::video::infrastructure::image_codec;

/// Where the still images come from.
#[derive(Clone, Debug, PartialEq)]
enum ImageSource {
    /// Every image file in a directory, in file-name order.
    Directory(PathBuf),
    Files(Vec<PathBuf>),
}

/// A video made of still image files, one file per frame.
///
/// Frame `i` is the `i`-th file. A directory is listed on first use, not at
/// construction.
pub struct ImageSequenceBackend {
    source: ImageSource,
    files: ResourceState<Vec<PathBuf>>,
    cache: FrameCache,
    conversion: ChannelConversion,
    shape: Option<FrameShape>,
}

impl ImageSequenceBackend {
    pub fn from_directory(directory: impl Into<PathBuf>, options: &BackendOptions) -> Self {
        Self::with_source(ImageSource::Directory(directory.into()), options)
    }

    pub fn from_filenames(filenames: Vec<PathBuf>, options: &BackendOptions) -> Self {
        Self::with_source(ImageSource::Files(filenames), options)
    }

    fn with_source(source: ImageSource, options: &BackendOptions) -> Self {
        Self {
            source,
            files: ResourceState::Unopened,
            cache: FrameCache::new(options.frame_cache_capacity),
            conversion: ChannelConversion::new(
                options.grayscale,
                options.bgr,
                GrayscaleProbe::EqualChannels,
            ),
            shape: None,
        }
    }

    /// The image files backing each frame, listing the directory if needed.
    pub fn filenames(&mut self) -> Result<&[PathBuf], VideoError> {
        let source = &self.source;
        let files = self.files.get_or_open(|| list_source(source))?;
        Ok(files.as_slice())
    }

    fn frame_count(&mut self) -> Result<usize, VideoError> {
        Ok(self.filenames()?.len())
    }
}

fn list_source(source: &ImageSource) -> Result<Vec<PathBuf>, VideoError> {
    match source {
        ImageSource::Files(files) => Ok(files.clone()),
        ImageSource::Directory(dir) => {
            if !dir.is_dir() {
                return Err(VideoError::source_not_found(dir));
            }
            let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|path| has_image_extension(path))
                .collect();
            files.sort();
            log::debug!("Found {} images in {}", files.len(), dir.display());
            Ok(files)
        }
    }
}

pub(crate) fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

impl VideoBackend for ImageSequenceBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::ImageSequence
    }

    fn filename(&self) -> Option<&Path> {
        match &self.source {
            ImageSource::Directory(dir) => Some(dir.as_path()),
            ImageSource::Files(files) => files.first().map(PathBuf::as_path),
        }
    }

    fn is_missing(&self) -> bool {
        match &self.source {
            ImageSource::Directory(dir) => !dir.is_dir(),
            ImageSource::Files(files) => files.is_empty() || files.iter().any(|f| !f.exists()),
        }
    }

    fn frames(&mut self) -> Result<usize, VideoError> {
        self.frame_count()
    }

    fn frame_shape(&mut self) -> Result<FrameShape, VideoError> {
        if let Some(shape) = self.shape {
            return Ok(shape);
        }
        let first = self.get_frame(0)?;
        let (height, width, channels) = first.dim();
        let shape = FrameShape::new(height, width, channels);
        self.shape = Some(shape);
        Ok(shape)
    }

    fn grayscale(&self) -> Option<bool> {
        self.conversion.grayscale()
    }

    fn bgr(&self) -> bool {
        self.conversion.bgr()
    }

    fn get_frame(&mut self, key: usize) -> Result<FrameArray, VideoError> {
        if let Some(frame) = self.cache.get(key) {
            return Ok(frame);
        }
        let path = {
            let files = self.filenames()?;
            files
                .get(key)
                .cloned()
                .ok_or(VideoError::IndexOutOfRange {
                    index: key,
                    frames: files.len(),
                })?
        };
        let frame = self.conversion.apply(image_codec::read_image(&path)?);
        self.cache.insert(key, frame.clone());
        Ok(frame)
    }

    fn reset(&mut self, params: ResetParams) -> Result<(), VideoError> {
        params.validate()?;

        if let Some(filename) = &params.filename {
            self.source = if filename.is_dir() {
                ImageSource::Directory(filename.clone())
            } else {
                ImageSource::Files(vec![filename.clone()])
            };
        } else if let Some(filenames) = &params.filenames {
            self.source = ImageSource::Files(filenames.clone());
        }
        self.conversion.reset(&params);
        self.files.close();
        self.cache.clear();
        self.shape = None;
        Ok(())
    }

    fn close(&mut self) {
        self.files.close();
    }

    fn source_ref(&self) -> Option<SourceVideoRef> {
        match &self.source {
            ImageSource::Directory(dir) => Some(SourceVideoRef {
                filename: dir.clone(),
                backend: BackendKind::ImageSequence,
                dataset: None,
                input_format: Default::default(),
                grayscale: self.conversion.grayscale(),
            }),
            ImageSource::Files(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    fn write_images(dir: &Path, count: usize, channels: usize) -> Vec<PathBuf> {
        (0..count)
            .map(|i| {
                let path = dir.join(format!("img{i}.png"));
                let frame = Array3::from_shape_fn((8, 10, channels), |(y, x, c)| {
                    (i * 20 + y + x + c * 30) as u8
                });
                image_codec::write_image(&path, &frame).unwrap();
                path
            })
            .collect()
    }

    #[test]
    fn test_from_filenames() {
        let dir = tempfile::tempdir().unwrap();
        let files = write_images(dir.path(), 3, 3);
        let mut seq = ImageSequenceBackend::from_filenames(files, &BackendOptions::default());
        assert_eq!(seq.frames().unwrap(), 3);
        assert_eq!(seq.frame_shape().unwrap(), FrameShape::new(8, 10, 3));
        assert_eq!(seq.get_frames(&[2, 0]).unwrap().dim(), (2, 8, 10, 3));
    }

    #[test]
    fn test_directory_lists_only_images_sorted() {
        let dir = tempfile::tempdir().unwrap();
        let files = write_images(dir.path(), 2, 3);
        std::fs::write(dir.path().join("notes.txt"), "x").unwrap();
        let mut seq = ImageSequenceBackend::from_directory(dir.path(), &BackendOptions::default());
        assert_eq!(seq.filenames().unwrap(), files.as_slice());
    }

    #[test]
    fn test_missing_directory_is_lazy() {
        let mut seq =
            ImageSequenceBackend::from_directory("/nonexistent/images", &BackendOptions::default());
        assert!(seq.is_missing());
        assert!(matches!(seq.frames(), Err(VideoError::SourceNotFound { .. })));
    }

    #[test]
    fn test_out_of_range() {
        let dir = tempfile::tempdir().unwrap();
        let files = write_images(dir.path(), 1, 3);
        let mut seq = ImageSequenceBackend::from_filenames(files, &BackendOptions::default());
        assert!(matches!(
            seq.get_frame(1),
            Err(VideoError::IndexOutOfRange { index: 1, frames: 1 })
        ));
    }

    #[test]
    fn test_reset_grayscale_and_filenames() {
        let dir = tempfile::tempdir().unwrap();
        let files = write_images(dir.path(), 3, 3);
        let mut seq =
            ImageSequenceBackend::from_filenames(vec![files[0].clone()], &BackendOptions::default());
        seq.get_frame(0).unwrap();

        seq.reset(ResetParams::new().with_filename(&files[0]).with_grayscale(true))
            .unwrap();
        assert_eq!(seq.get_frame(0).unwrap().dim().2, 1);
        assert_eq!(seq.frame_shape().unwrap().channels, 1);

        seq.reset(ResetParams::new().with_filename(&files[0]).with_grayscale(false))
            .unwrap();
        assert_eq!(seq.get_frame(0).unwrap().dim().2, 3);

        seq.reset(ResetParams::new().with_filenames(files.clone())).unwrap();
        assert_eq!(seq.frames().unwrap(), 3);
        assert_eq!(seq.grayscale(), None);

        let conflicting = ResetParams::new()
            .with_filename(&files[0])
            .with_filenames(files.clone());
        assert!(matches!(
            seq.reset(conflicting),
            Err(VideoError::InvalidArgument(_))
        ));
        assert_eq!(seq.frames().unwrap(), 3);
    }

    #[test]
    fn test_gray_images_detected() {
        let dir = tempfile::tempdir().unwrap();
        let files = write_images(dir.path(), 1, 1);
        let mut seq = ImageSequenceBackend::from_filenames(files, &BackendOptions::default());
        assert_eq!(seq.frame_shape().unwrap().channels, 1);
        assert_eq!(seq.grayscale(), Some(true));
    }
}
