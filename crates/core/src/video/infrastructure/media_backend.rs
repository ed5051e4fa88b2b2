use std::path::{Path, PathBuf};

use crate::shared::error::VideoError;
use crate::shared::frame::FrameArray;
use crate::shared::video_metadata::FrameShape;
use crate::video::domain::backend_options::{BackendKind, BackendOptions};
use crate::video::domain::channel_conversion::{ChannelConversion, GrayscaleProbe};
use crate::video::domain::reset_params::ResetParams;
use crate::video::domain::resource_state::ResourceState;
use crate::video::domain::source_video_ref::SourceVideoRef;
use crate::video::domain::video_backend::VideoBackend;
use crate::video::infrastructure::ffmpeg_reader::FfmpegReader;
use crate::video::infrastructure::frame_cache::FrameCache;

/// A container video (mp4, avi, ...) decoded through ffmpeg.
///
/// The decode session is opened on first use. Decoded frames go through the
/// grayscale/bgr conversion and are cached per instance.
pub struct MediaBackend {
    filename: PathBuf,
    reader: ResourceState<FfmpegReader>,
    cache: FrameCache,
    conversion: ChannelConversion,
    test_frame: Option<FrameArray>,
}

impl MediaBackend {
    pub fn new(filename: impl Into<PathBuf>, options: &BackendOptions) -> Self {
        Self {
            filename: filename.into(),
            reader: ResourceState::Unopened,
            cache: FrameCache::new(options.frame_cache_capacity),
            conversion: ChannelConversion::new(
                options.grayscale,
                options.bgr,
                GrayscaleProbe::EqualChannels,
            ),
            test_frame: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.reader.is_open()
    }

    pub fn detects_grayscale(&self) -> bool {
        self.conversion.detects_grayscale()
    }

    fn reader(&mut self) -> Result<&mut FfmpegReader, VideoError> {
        let filename = &self.filename;
        self.reader.get_or_open(|| FfmpegReader::open(filename))
    }

    fn test_frame(&mut self) -> Result<&FrameArray, VideoError> {
        if self.test_frame.is_none() {
            self.test_frame = Some(self.get_frame(0)?);
        }
        self.test_frame
            .as_ref()
            .ok_or_else(|| VideoError::Decode {
                index: 0,
                reason: "no test frame".into(),
            })
    }
}

impl VideoBackend for MediaBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Media
    }

    fn filename(&self) -> Option<&Path> {
        Some(self.filename.as_path())
    }

    fn is_missing(&self) -> bool {
        !self.filename.exists()
    }

    fn frames(&mut self) -> Result<usize, VideoError> {
        Ok(self.reader()?.metadata().total_frames)
    }

    fn frame_shape(&mut self) -> Result<FrameShape, VideoError> {
        let metadata = self.reader()?.metadata();
        let (height, width) = (metadata.height as usize, metadata.width as usize);
        let channels = match self.conversion.channels() {
            Some(channels) => channels,
            None => self.test_frame()?.dim().2,
        };
        Ok(FrameShape::new(height, width, channels))
    }

    fn fps(&mut self) -> Result<Option<f64>, VideoError> {
        Ok(Some(self.reader()?.metadata().fps))
    }

    fn grayscale(&self) -> Option<bool> {
        self.conversion.grayscale()
    }

    fn bgr(&self) -> bool {
        self.conversion.bgr()
    }

    fn get_frame(&mut self, key: usize) -> Result<FrameArray, VideoError> {
        let frames = self.frames()?;
        if key >= frames {
            return Err(VideoError::IndexOutOfRange { index: key, frames });
        }
        if let Some(frame) = self.cache.get(key) {
            return Ok(frame);
        }
        let raw = self.reader()?.read_frame(key)?.ok_or_else(|| VideoError::Decode {
            index: key,
            reason: "stream ended before this frame".into(),
        })?;
        let frame = self.conversion.apply(raw);
        self.cache.insert(key, frame.clone());
        Ok(frame)
    }

    fn reset(&mut self, params: ResetParams) -> Result<(), VideoError> {
        params.validate()?;
        params.require_single_file("media")?;

        if let Some(filename) = params.filename.clone() {
            self.filename = filename;
        }
        self.conversion.reset(&params);
        self.reader.close();
        self.cache.clear();
        self.test_frame = None;
        log::debug!("Reset media backend for {}", self.filename.display());
        Ok(())
    }

    fn close(&mut self) {
        self.reader.close();
    }

    fn source_ref(&self) -> Option<SourceVideoRef> {
        Some(SourceVideoRef {
            filename: self.filename.clone(),
            backend: BackendKind::Media,
            dataset: None,
            input_format: Default::default(),
            grayscale: self.conversion.grayscale(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::video::infrastructure::ffmpeg_writer::test_support::write_test_video;

    fn backend(path: &Path) -> MediaBackend {
        MediaBackend::new(path, &BackendOptions::default())
    }

    #[test]
    fn test_construction_is_lazy() {
        let mut media = backend(Path::new("does-not-exist.mp4"));
        assert!(!media.is_open());
        assert!(media.is_missing());
        assert!(matches!(
            media.frames(),
            Err(VideoError::SourceNotFound { .. })
        ));
    }

    #[test]
    fn test_shape_fps_and_frame() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.mp4");
        write_test_video(&path, 4, 64, 48, 30.0);

        let mut media = backend(&path);
        assert_eq!(media.frames().unwrap(), 4);
        assert_eq!(media.frame_shape().unwrap(), FrameShape::new(48, 64, 3));
        approx::assert_relative_eq!(media.fps().unwrap().unwrap(), 30.0, epsilon = 0.01);
        assert_eq!(media.get_frame(2).unwrap().dim(), (48, 64, 3));
        assert_eq!(media.grayscale(), Some(false));
    }

    #[test]
    fn test_out_of_range_index() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.mp4");
        write_test_video(&path, 3, 64, 48, 30.0);

        let mut media = backend(&path);
        assert!(matches!(
            media.get_frame(3),
            Err(VideoError::IndexOutOfRange { index: 3, frames: 3 })
        ));
    }

    #[test]
    fn test_reset_switches_channels_and_closes_reader() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.mp4");
        write_test_video(&path, 3, 64, 48, 30.0);

        let mut media = backend(&path);
        media.get_frame(0).unwrap();

        media
            .reset(ResetParams::new().with_filename(&path).with_grayscale(true))
            .unwrap();
        assert!(!media.is_open());
        assert_eq!(media.grayscale(), Some(true));
        assert_eq!(media.get_frame(0).unwrap().dim().2, 1);

        media
            .reset(ResetParams::new().with_filename(&path).with_grayscale(false))
            .unwrap();
        assert_eq!(media.get_frame(0).unwrap().dim().2, 3);

        media.reset(ResetParams::new().with_bgr(true)).unwrap();
        assert!(media.detects_grayscale());
        assert!(media.bgr());
    }

    #[test]
    fn test_reset_rejects_filename_list() {
        let mut media = backend(Path::new("a.mp4"));
        let result = media.reset(ResetParams::new().with_filenames(vec![PathBuf::from("b.mp4")]));
        assert!(matches!(result, Err(VideoError::InvalidArgument(_))));
        assert_eq!(media.filename(), Some(Path::new("a.mp4")));
    }
}
