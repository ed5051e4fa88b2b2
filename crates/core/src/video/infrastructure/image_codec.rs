use std::io::Cursor;
use std::path::Path;

use image::ImageFormat;

use crate::shared::error::VideoError;
use crate::shared::frame::{frame_to_image, image_to_frame, FrameArray};

/// Maps a format name such as `png` or `jpg` to an `image` codec.
pub fn image_format(name: &str) -> Result<ImageFormat, VideoError> {
    ImageFormat::from_extension(name.trim_start_matches('.'))
        .ok_or_else(|| VideoError::UnsupportedFormat(format!("unknown image format '{name}'")))
}

/// True for `"<codec>/<container>"` names, which select a motion clip.
pub fn is_motion_format(name: &str) -> bool {
    name.contains('/')
}

/// Compresses one frame into a standalone image blob.
pub fn encode(frame: &FrameArray, format: &str) -> Result<Vec<u8>, VideoError> {
    let format = image_format(format)?;
    let img = frame_to_image(frame)?;
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, format)?;
    Ok(buf.into_inner())
}

pub fn decode(bytes: &[u8]) -> Result<FrameArray, VideoError> {
    let img = image::load_from_memory(bytes)?;
    image_to_frame(img)
}

pub fn read_image(path: &Path) -> Result<FrameArray, VideoError> {
    if !path.exists() {
        return Err(VideoError::source_not_found(path));
    }
    image_to_frame(image::open(path)?)
}

pub fn write_image(path: &Path, frame: &FrameArray) -> Result<(), VideoError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    frame_to_image(frame)?.save(path)?;
    Ok(())
}
