use std::fmt;
use std::path::PathBuf;

/// Element type of decoded frames.
///
/// Every backend decodes to 8-bit samples; the enum exists so callers can
/// compare dtypes without string matching.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Dtype {
    Uint8,
}

impl fmt::Display for Dtype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dtype::Uint8 => write!(f, "uint8"),
        }
    }
}

/// Shape of a single frame, `(height, width, channels)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FrameShape {
    pub height: usize,
    pub width: usize,
    pub channels: usize,
}

impl FrameShape {
    pub fn new(height: usize, width: usize, channels: usize) -> Self {
        Self {
            height,
            width,
            channels,
        }
    }

    pub fn as_tuple(&self) -> (usize, usize, usize) {
        (self.height, self.width, self.channels)
    }
}

/// Shape of a whole video, `(frames, height, width, channels)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct VideoShape {
    pub frames: usize,
    pub height: usize,
    pub width: usize,
    pub channels: usize,
}

impl VideoShape {
    pub fn new(frames: usize, frame: FrameShape) -> Self {
        Self {
            frames,
            height: frame.height,
            width: frame.width,
            channels: frame.channels,
        }
    }

    pub fn frame_shape(&self) -> FrameShape {
        FrameShape::new(self.height, self.width, self.channels)
    }

    pub fn as_tuple(&self) -> (usize, usize, usize, usize) {
        (self.frames, self.height, self.width, self.channels)
    }
}

/// Container-level facts the ffmpeg decode session reports on open and the
/// encoder needs to set up a stream.
#[derive(Clone, Debug, PartialEq)]
pub struct VideoMetadata {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub total_frames: usize,
    pub codec: String,
    pub source_path: Option<PathBuf>,
}
