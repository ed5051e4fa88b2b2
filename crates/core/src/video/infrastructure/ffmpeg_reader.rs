use std::path::{Path, PathBuf};

use crate::shared::error::VideoError;
use crate::shared::frame::{from_rgb_pixels, FrameArray};
use crate::shared::video_metadata::VideoMetadata;

/// Random-access decode session over one container file via ffmpeg-next
/// (libavformat + libavcodec).
///
/// Frames are numbered in decode order. Forward requests keep decoding from
/// the current position; a request behind it restarts the session from the
/// beginning of the file. Every frame is converted to RGB24.
pub struct FfmpegReader {
    path: PathBuf,
    ictx: ffmpeg_next::format::context::Input,
    decoder: ffmpeg_next::decoder::Video,
    scaler: ffmpeg_next::software::scaling::Context,
    video_stream_index: usize,
    metadata: VideoMetadata,
    next_index: usize,
    eof_sent: bool,
}

impl FfmpegReader {
    pub fn open(path: &Path) -> Result<Self, VideoError> {
        Self::start(path, None)
    }

    fn start(path: &Path, known_frames: Option<usize>) -> Result<Self, VideoError> {
        if !path.exists() {
            return Err(VideoError::source_not_found(path));
        }
        ffmpeg_next::init()?;

        let ictx = ffmpeg_next::format::input(path)?;

        let stream = ictx
            .streams()
            .best(ffmpeg_next::media::Type::Video)
            .ok_or_else(|| {
                VideoError::UnsupportedFormat(format!("no video stream in {}", path.display()))
            })?;

        let video_stream_index = stream.index();
        let codec_ctx = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())?;
        let decoder = codec_ctx.decoder().video()?;

        let rate = stream.rate();
        let fps = if rate.denominator() != 0 {
            rate.numerator() as f64 / rate.denominator() as f64
        } else {
            0.0
        };
        let reported_frames = stream.frames().max(0) as usize;

        let width = decoder.width();
        let height = decoder.height();

        let scaler = ffmpeg_next::software::scaling::Context::get(
            decoder.format(),
            width,
            height,
            ffmpeg_next::format::Pixel::RGB24,
            width,
            height,
            ffmpeg_next::software::scaling::Flags::BILINEAR,
        )?;

        let total_frames = match known_frames {
            Some(n) => n,
            None if reported_frames > 0 => reported_frames,
            None => count_packets(path, video_stream_index)?,
        };

        let metadata = VideoMetadata {
            width,
            height,
            fps,
            total_frames,
            codec: decoder
                .codec()
                .map(|c| c.name().to_string())
                .unwrap_or_default(),
            source_path: Some(path.to_path_buf()),
        };
        log::debug!(
            "Opened {} ({}x{}, {} frames, {:.2} fps)",
            path.display(),
            width,
            height,
            total_frames,
            fps
        );

        Ok(Self {
            path: path.to_path_buf(),
            ictx,
            decoder,
            scaler,
            video_stream_index,
            metadata,
            next_index: 0,
            eof_sent: false,
        })
    }

    pub fn metadata(&self) -> &VideoMetadata {
        &self.metadata
    }

    /// Decodes frame `index`. Returns `Ok(None)` when the stream ends first.
    pub fn read_frame(&mut self, index: usize) -> Result<Option<FrameArray>, VideoError> {
        if index < self.next_index {
            self.rewind()?;
        }

        let mut decoded = ffmpeg_next::util::frame::video::Video::empty();
        loop {
            while self.decoder.receive_frame(&mut decoded).is_ok() {
                let current = self.next_index;
                self.next_index += 1;
                if current == index {
                    return self.to_rgb(&decoded).map(Some);
                }
            }

            if self.eof_sent {
                return Ok(None);
            }

            match self.ictx.packets().next() {
                Some((stream, packet)) => {
                    if stream.index() != self.video_stream_index {
                        continue;
                    }
                    if let Err(e) = self.decoder.send_packet(&packet) {
                        log::debug!("Skipping undecodable packet: {e}");
                    }
                }
                None => {
                    self.decoder.send_eof()?;
                    self.eof_sent = true;
                }
            }
        }
    }

    fn rewind(&mut self) -> Result<(), VideoError> {
        log::debug!("Restarting decode of {}", self.path.display());
        let path = self.path.clone();
        *self = Self::start(&path, Some(self.metadata.total_frames))?;
        Ok(())
    }

    fn to_rgb(
        &mut self,
        decoded: &ffmpeg_next::util::frame::video::Video,
    ) -> Result<FrameArray, VideoError> {
        let mut rgb_frame = ffmpeg_next::util::frame::video::Video::empty();
        self.scaler.run(decoded, &mut rgb_frame)?;
        let pixels = extract_rgb_pixels(&rgb_frame, self.metadata.width, self.metadata.height);
        from_rgb_pixels(pixels, self.metadata.width, self.metadata.height)
    }
}

/// Counts video packets for containers that do not record a frame count.
fn count_packets(path: &Path, video_stream_index: usize) -> Result<usize, VideoError> {
    let mut ictx = ffmpeg_next::format::input(path)?;
    Ok(ictx
        .packets()
        .filter(|(stream, _)| stream.index() == video_stream_index)
        .count())
}

/// Copies pixel data from an ffmpeg frame into a contiguous RGB buffer.
///
/// ffmpeg frames may have padding bytes at the end of each row (stride > width*3).
/// This function strips that padding to produce a tightly-packed pixel buffer.
fn extract_rgb_pixels(
    rgb_frame: &ffmpeg_next::util::frame::video::Video,
    width: u32,
    height: u32,
) -> Vec<u8> {
    let stride = rgb_frame.stride(0);
    let data = rgb_frame.data(0);
    let w = width as usize;
    let h = height as usize;

    let mut pixels = Vec::with_capacity(w * h * 3);
    for row in 0..h {
        let row_start = row * stride;
        pixels.extend_from_slice(&data[row_start..row_start + w * 3]);
    }
    pixels
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::video::infrastructure::ffmpeg_writer::test_support::write_test_video;

    #[test]
    fn test_open_returns_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.mp4");
        write_test_video(&path, 5, 160, 120, 30.0);

        let reader = FfmpegReader::open(&path).unwrap();
        let meta = reader.metadata();
        assert_eq!(meta.width, 160);
        assert_eq!(meta.height, 120);
        assert_eq!(meta.total_frames, 5);
        assert!(meta.fps > 0.0);
        assert_eq!(meta.source_path, Some(path));
    }

    #[test]
    fn test_open_nonexistent_is_source_not_found() {
        let result = FfmpegReader::open(Path::new("/nonexistent/test.mp4"));
        assert!(matches!(result, Err(VideoError::SourceNotFound { .. })));
    }

    #[test]
    fn test_read_frame_is_rgb_with_frame_dims() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.mp4");
        write_test_video(&path, 3, 160, 120, 30.0);

        let mut reader = FfmpegReader::open(&path).unwrap();
        let frame = reader.read_frame(0).unwrap().unwrap();
        assert_eq!(frame.dim(), (120, 160, 3));
    }

    #[test]
    fn test_backwards_read_matches_forward_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.mp4");
        write_test_video(&path, 6, 64, 48, 30.0);

        let mut reader = FfmpegReader::open(&path).unwrap();
        let first = reader.read_frame(1).unwrap().unwrap();
        reader.read_frame(4).unwrap().unwrap();
        let again = reader.read_frame(1).unwrap().unwrap();
        assert_eq!(first, again);
    }

    #[test]
    fn test_read_past_end_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.mp4");
        write_test_video(&path, 2, 64, 48, 30.0);

        let mut reader = FfmpegReader::open(&path).unwrap();
        assert!(reader.read_frame(10).unwrap().is_none());
        // A request behind the exhausted position restarts the session.
        assert!(reader.read_frame(0).unwrap().is_some());
    }
}
