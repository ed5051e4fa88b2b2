use std::path::Path;

use crate::shared::constants::FALLBACK_FPS;
use crate::shared::error::VideoError;
use crate::shared::frame::{to_channels, FrameArray};
use crate::shared::video_metadata::VideoMetadata;

pub const DEFAULT_CODEC: &str = "mpeg4";

/// Encodes frames into a container file via ffmpeg-next.
///
/// The codec is looked up by ffmpeg encoder name (`mpeg4`, `mjpeg`, ...);
/// the container is chosen by ffmpeg from the output file extension.
pub struct FfmpegWriter {
    codec_name: String,
    octx: Option<ffmpeg_next::format::context::Output>,
    encoder: Option<ffmpeg_next::codec::encoder::video::Encoder>,
    scaler: Option<ffmpeg_next::software::scaling::Context>,
    width: u32,
    height: u32,
    fps: i32,
    frame_count: usize,
    video_stream_index: usize,
}

impl FfmpegWriter {
    pub fn new() -> Self {
        Self::with_codec(DEFAULT_CODEC)
    }

    pub fn with_codec(codec_name: &str) -> Self {
        Self {
            codec_name: codec_name.to_string(),
            octx: None,
            encoder: None,
            scaler: None,
            width: 0,
            height: 0,
            fps: FALLBACK_FPS as i32,
            frame_count: 0,
            video_stream_index: 0,
        }
    }

    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    pub fn open(&mut self, path: &Path, metadata: &VideoMetadata) -> Result<(), VideoError> {
        ffmpeg_next::init()?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        self.width = metadata.width;
        self.height = metadata.height;
        let fps_i = metadata.fps.round() as i32;
        self.fps = if fps_i <= 0 { FALLBACK_FPS as i32 } else { fps_i };

        let mut octx = ffmpeg_next::format::output(path)?;

        let global_header = octx
            .format()
            .flags()
            .contains(ffmpeg_next::format::Flags::GLOBAL_HEADER);

        let codec = ffmpeg_next::encoder::find_by_name(&self.codec_name).ok_or_else(|| {
            VideoError::UnsupportedFormat(format!("encoder '{}' not found", self.codec_name))
        })?;
        let pixel_format = if codec.id() == ffmpeg_next::codec::Id::MJPEG {
            ffmpeg_next::format::Pixel::YUVJ420P
        } else {
            ffmpeg_next::format::Pixel::YUV420P
        };

        let mut ost = octx.add_stream(Some(codec))?;

        let mut encoder_ctx = ffmpeg_next::codec::context::Context::new_with_codec(codec)
            .encoder()
            .video()?;

        encoder_ctx.set_width(metadata.width);
        encoder_ctx.set_height(metadata.height);
        encoder_ctx.set_format(pixel_format);
        encoder_ctx.set_time_base(ffmpeg_next::Rational(1, self.fps));
        encoder_ctx.set_frame_rate(Some(ffmpeg_next::Rational(self.fps, 1)));

        if global_header {
            encoder_ctx.set_flags(ffmpeg_next::codec::Flags::GLOBAL_HEADER);
        }

        let encoder = encoder_ctx.open_with(ffmpeg_next::Dictionary::new())?;
        ost.set_parameters(&encoder);
        self.video_stream_index = ost.index();

        octx.write_header()?;

        let scaler = ffmpeg_next::software::scaling::Context::get(
            ffmpeg_next::format::Pixel::RGB24,
            metadata.width,
            metadata.height,
            pixel_format,
            metadata.width,
            metadata.height,
            ffmpeg_next::software::scaling::Flags::BILINEAR,
        )?;

        self.octx = Some(octx);
        self.encoder = Some(encoder);
        self.scaler = Some(scaler);
        self.frame_count = 0;

        Ok(())
    }

    /// Encodes one frame. Single-channel frames are expanded to RGB first.
    pub fn write(&mut self, frame: &FrameArray) -> Result<(), VideoError> {
        let (Some(encoder), Some(scaler), Some(octx)) = (
            self.encoder.as_mut(),
            self.scaler.as_mut(),
            self.octx.as_mut(),
        ) else {
            return Err(VideoError::InvalidArgument("FfmpegWriter: not opened".into()));
        };

        let (h, w, _) = frame.dim();
        if h != self.height as usize || w != self.width as usize {
            return Err(VideoError::InvalidArgument(format!(
                "frame is {w}x{h}, stream is {}x{}",
                self.width, self.height
            )));
        }
        let rgb = to_channels(frame.clone(), 3);
        let mut rgb_frame = ffmpeg_next::util::frame::video::Video::new(
            ffmpeg_next::format::Pixel::RGB24,
            self.width,
            self.height,
        );
        let stride = rgb_frame.stride(0);
        let data = rgb_frame.data_mut(0);
        for (y, line) in rgb.outer_iter().enumerate() {
            let start = y * stride;
            for (dst, &value) in data[start..start + line.len()].iter_mut().zip(line.iter()) {
                *dst = value;
            }
        }

        let mut yuv_frame = ffmpeg_next::util::frame::video::Video::empty();
        scaler.run(&rgb_frame, &mut yuv_frame)?;
        yuv_frame.set_pts(Some(self.frame_count as i64));

        encoder.send_frame(&yuv_frame)?;
        drain_packets(encoder, octx, self.video_stream_index, self.fps)?;

        self.frame_count += 1;
        Ok(())
    }

    /// Flushes the encoder and writes the trailer. Idempotent.
    pub fn close(&mut self) -> Result<(), VideoError> {
        if let (Some(encoder), Some(octx)) = (self.encoder.as_mut(), self.octx.as_mut()) {
            encoder.send_eof()?;
            drain_packets(encoder, octx, self.video_stream_index, self.fps)?;
            octx.write_trailer()?;
        }

        self.octx = None;
        self.encoder = None;
        self.scaler = None;

        Ok(())
    }
}

impl Default for FfmpegWriter {
    fn default() -> Self {
        Self::new()
    }
}

fn drain_packets(
    encoder: &mut ffmpeg_next::codec::encoder::video::Encoder,
    octx: &mut ffmpeg_next::format::context::Output,
    stream_index: usize,
    fps: i32,
) -> Result<(), VideoError> {
    let ost_time_base = octx
        .stream(stream_index)
        .map(|s| s.time_base())
        .ok_or_else(|| VideoError::InvalidArgument("output stream missing".into()))?;

    let mut encoded = ffmpeg_next::Packet::empty();
    while encoder.receive_packet(&mut encoded).is_ok() {
        encoded.set_stream(stream_index);
        encoded.rescale_ts(ffmpeg_next::Rational(1, fps), ost_time_base);
        encoded.write_interleaved(octx)?;
    }
    Ok(())
}
