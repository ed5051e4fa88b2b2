use image::{DynamicImage, GrayImage, RgbImage};
use ndarray::{s, Array3, Array4, ArrayView3, Axis};

use crate::shared::error::VideoError;
use crate::shared::video_metadata::FrameShape;

/// One decoded frame, `(height, width, channels)`.
pub type FrameArray = Array3<u8>;

/// Several frames stacked along a leading axis, `(n, height, width, channels)`.
pub type FrameStack = Array4<u8>;

pub fn frame_shape(frame: &FrameArray) -> FrameShape {
    let (h, w, c) = frame.dim();
    FrameShape::new(h, w, c)
}

/// A frame counts as grayscale when it has one channel or when every pixel
/// carries the same value in all of its channels.
pub fn is_grayscale(frame: &ArrayView3<u8>) -> bool {
    if frame.dim().2 <= 1 {
        return true;
    }
    frame
        .lanes(Axis(2))
        .into_iter()
        .all(|px| px.iter().all(|&v| v == px[0]))
}

/// Converts a frame to `channels` (1 or 3).
///
/// Single-channel output keeps the first channel. Three-channel output drops
/// anything past the third (alpha); frames with fewer channels get their
/// first channel replicated.
pub fn to_channels(frame: FrameArray, channels: usize) -> FrameArray {
    let (height, width, current) = frame.dim();
    if current == channels {
        return frame;
    }
    if current > channels {
        return frame.slice(s![.., .., 0..channels]).to_owned();
    }
    if current == 0 {
        return Array3::zeros((height, width, channels));
    }
    Array3::from_shape_fn((height, width, channels), |(y, x, _)| frame[[y, x, 0]])
}

/// Swaps RGB <-> BGR. Single-channel frames pass through untouched.
pub fn reverse_channels(frame: FrameArray) -> FrameArray {
    if frame.dim().2 < 3 {
        return frame;
    }
    frame.slice(s![.., .., ..;-1]).to_owned()
}

/// Stacks frames along a new leading axis.
///
/// `shape` is only used when `frames` is empty, so the result still carries
/// the frame dimensions.
pub fn stack_frames(frames: &[FrameArray], shape: FrameShape) -> Result<FrameStack, VideoError> {
    if frames.is_empty() {
        return Ok(Array4::zeros((0, shape.height, shape.width, shape.channels)));
    }
    let views: Vec<_> = frames.iter().map(|f| f.view()).collect();
    Ok(ndarray::stack(Axis(0), &views)?)
}

/// Wraps tightly packed RGB24 bytes as a frame.
pub fn from_rgb_pixels(pixels: Vec<u8>, width: u32, height: u32) -> Result<FrameArray, VideoError> {
    Ok(Array3::from_shape_vec(
        (height as usize, width as usize, 3),
        pixels,
    )?)
}

/// Converts a decoded image into a frame, keeping luma images single-channel.
pub fn image_to_frame(img: DynamicImage) -> Result<FrameArray, VideoError> {
    let (width, height) = (img.width() as usize, img.height() as usize);
    if img.color().has_color() {
        let rgb = img.to_rgb8();
        Ok(Array3::from_shape_vec((height, width, 3), rgb.into_raw())?)
    } else {
        let luma = img.to_luma8();
        Ok(Array3::from_shape_vec((height, width, 1), luma.into_raw())?)
    }
}

/// Converts a 1- or 3-channel frame into an image the `image` crate can encode.
pub fn frame_to_image(frame: &FrameArray) -> Result<DynamicImage, VideoError> {
    let (h, w, c) = frame.dim();
    let data: Vec<u8> = frame.iter().copied().collect();
    let invalid = || VideoError::InvalidArgument(format!("frame buffer does not match {h}x{w}x{c}"));
    match c {
        1 => GrayImage::from_raw(w as u32, h as u32, data)
            .map(DynamicImage::ImageLuma8)
            .ok_or_else(invalid),
        3 => RgbImage::from_raw(w as u32, h as u32, data)
            .map(DynamicImage::ImageRgb8)
            .ok_or_else(invalid),
        _ => Err(VideoError::UnsupportedFormat(format!(
            "cannot encode a frame with {c} channels as an image"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rgb_frame(h: usize, w: usize, rgb: [u8; 3]) -> FrameArray {
        Array3::from_shape_fn((h, w, 3), |(_, _, c)| rgb[c])
    }

    #[test]
    fn test_is_grayscale_detects_equal_channels() {
        let gray = rgb_frame(2, 2, [7, 7, 7]);
        let color = rgb_frame(2, 2, [7, 8, 7]);
        assert!(is_grayscale(&gray.view()));
        assert!(!is_grayscale(&color.view()));
    }

    #[test]
    fn test_single_channel_is_grayscale() {
        let frame = Array3::<u8>::zeros((3, 3, 1));
        assert!(is_grayscale(&frame.view()));
    }

    #[test]
    fn test_to_channels_keeps_first_channel() {
        let frame = rgb_frame(2, 3, [10, 20, 30]);
        let gray = to_channels(frame, 1);
        assert_eq!(gray.dim(), (2, 3, 1));
        assert!(gray.iter().all(|&v| v == 10));
    }

    #[test]
    fn test_to_channels_replicates_single_channel() {
        let frame = Array3::from_elem((2, 2, 1), 42u8);
        let rgb = to_channels(frame, 3);
        assert_eq!(rgb.dim(), (2, 2, 3));
        assert!(rgb.iter().all(|&v| v == 42));
    }

    #[test]
    fn test_to_channels_expands_two_channels_from_first() {
        let frame = Array3::from_shape_fn((2, 2, 2), |(_, _, c)| 7 + c as u8);
        let rgb = to_channels(frame, 3);
        assert_eq!(rgb.dim(), (2, 2, 3));
        assert!(rgb.iter().all(|&v| v == 7));
    }

    #[test]
    fn test_to_channels_drops_alpha() {
        let frame = Array3::from_shape_fn((1, 1, 4), |(_, _, c)| c as u8);
        let rgb = to_channels(frame, 3);
        assert_eq!(rgb.as_slice().unwrap(), &[0, 1, 2]);
    }

    #[test]
    fn test_reverse_channels_swaps_red_and_blue() {
        let frame = rgb_frame(1, 2, [1, 2, 3]);
        let bgr = reverse_channels(frame);
        assert_eq!(bgr[[0, 1, 0]], 3);
        assert_eq!(bgr[[0, 1, 1]], 2);
        assert_eq!(bgr[[0, 1, 2]], 1);
    }

    #[test]
    fn test_stack_frames_preserves_order() {
        let frames = vec![rgb_frame(2, 2, [1, 1, 1]), rgb_frame(2, 2, [2, 2, 2])];
        let stack = stack_frames(&frames, FrameShape::new(2, 2, 3)).unwrap();
        assert_eq!(stack.dim(), (2, 2, 2, 3));
        assert_eq!(stack[[0, 0, 0, 0]], 1);
        assert_eq!(stack[[1, 0, 0, 0]], 2);
    }

    #[test]
    fn test_stack_frames_empty_keeps_frame_dims() {
        let stack = stack_frames(&[], FrameShape::new(4, 5, 1)).unwrap();
        assert_eq!(stack.dim(), (0, 4, 5, 1));
    }

    #[test]
    fn test_stack_frames_rejects_mismatched_shapes() {
        let frames = vec![rgb_frame(2, 2, [0; 3]), rgb_frame(3, 2, [0; 3])];
        assert!(stack_frames(&frames, FrameShape::new(2, 2, 3)).is_err());
    }

    #[test]
    fn test_image_roundtrip_keeps_channel_count() {
        let gray = Array3::from_shape_fn((3, 4, 1), |(y, x, _)| (y * 4 + x) as u8);
        let img = frame_to_image(&gray).unwrap();
        assert_eq!(image_to_frame(img).unwrap(), gray);

        let rgb = rgb_frame(3, 4, [9, 8, 7]);
        let img = frame_to_image(&rgb).unwrap();
        assert_eq!(image_to_frame(img).unwrap(), rgb);
    }

    #[test]
    fn test_frame_to_image_rejects_two_channels() {
        let frame = Array3::<u8>::zeros((2, 2, 2));
        assert!(matches!(
            frame_to_image(&frame),
            Err(VideoError::UnsupportedFormat(_))
        ));
    }
}
