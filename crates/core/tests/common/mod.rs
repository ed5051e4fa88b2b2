#![allow(dead_code)]

use std::path::{Path, PathBuf};

use ndarray::{Array3, Array4};

use framekit_core::shared::frame::{FrameArray, FrameStack};
use framekit_core::shared::video_metadata::VideoMetadata;
use framekit_core::video::infrastructure::ffmpeg_writer::{FfmpegWriter, DEFAULT_CODEC};

pub const CLIP_FRAMES: usize = 12;
pub const CLIP_WIDTH: u32 = 64;
pub const CLIP_HEIGHT: u32 = 48;

/// Flat colour per frame, distinct in every channel.
pub fn clip_frame(i: usize, width: u32, height: u32) -> FrameArray {
    let value = ((i * 17) % 200) as u8 + 20;
    Array3::from_shape_fn((height as usize, width as usize, 3), |(_, _, c)| match c {
        0 => value,
        1 => 250 - value,
        _ => 90,
    })
}

pub fn write_clip(path: &Path, frames: usize, width: u32, height: u32, fps: f64) {
    let mut writer = FfmpegWriter::new();
    let metadata = VideoMetadata {
        width,
        height,
        fps,
        total_frames: frames,
        codec: DEFAULT_CODEC.to_string(),
        source_path: None,
    };
    writer.open(path, &metadata).unwrap();
    for i in 0..frames {
        writer.write(&clip_frame(i, width, height)).unwrap();
    }
    writer.close().unwrap();
}

/// A short mp4 in `dir`, returned by path.
pub fn small_clip(dir: &Path) -> PathBuf {
    let path = dir.join("clip.mp4");
    write_clip(&path, CLIP_FRAMES, CLIP_WIDTH, CLIP_HEIGHT, 30.0);
    path
}

/// Frames whose pixels all hold their own frame index in channel 0.
pub fn numbered_stack(frames: usize, height: usize, width: usize) -> FrameStack {
    Array4::from_shape_fn((frames, height, width, 3), |(i, y, x, c)| match c {
        0 => i as u8,
        1 => (y * 3) as u8,
        _ => (x * 5) as u8,
    })
}

/// Single-channel frames whose pixels hold their frame index times ten.
pub fn numbered_gray_stack(frames: usize, height: usize, width: usize) -> FrameStack {
    Array4::from_shape_fn((frames, height, width, 1), |(i, _, _, _)| (i * 10) as u8)
}

pub fn mean_abs_diff(a: &FrameArray, b: &FrameArray) -> f64 {
    assert_eq!(a.dim(), b.dim());
    let total: f64 = a
        .iter()
        .zip(b.iter())
        .map(|(&x, &y)| (x as f64 - y as f64).abs())
        .sum();
    total / a.len() as f64
}
