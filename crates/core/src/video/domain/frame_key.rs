use std::ops::{Range, RangeFrom, RangeFull, RangeTo};

use crate::shared::error::VideoError;

/// A key for [`Video::get`](crate::video::video::Video::get).
///
/// Whatever the key, the result always keeps the leading frame axis.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FrameKey {
    Index(usize),
    List(Vec<usize>),
    /// Half-open `start..stop` walked with `step`. Missing bounds default to
    /// the start/end of the video; `stop` is clamped to the frame count.
    Slice {
        start: Option<usize>,
        stop: Option<usize>,
        step: usize,
    },
}

impl FrameKey {
    pub fn slice(start: Option<usize>, stop: Option<usize>, step: usize) -> Self {
        FrameKey::Slice { start, stop, step }
    }

    /// Expands the key to explicit indices for a video with `frames` frames.
    ///
    /// Integer and list keys are passed through unchecked; the backend
    /// validates them against its own key space.
    pub fn resolve(&self, frames: usize) -> Result<Vec<usize>, VideoError> {
        match self {
            FrameKey::Index(i) => Ok(vec![*i]),
            FrameKey::List(indices) => Ok(indices.clone()),
            FrameKey::Slice { start, stop, step } => {
                if *step == 0 {
                    return Err(VideoError::InvalidArgument("slice step cannot be zero".into()));
                }
                let start = start.unwrap_or(0);
                let stop = stop.unwrap_or(frames).min(frames);
                Ok((start..stop).step_by(*step).collect())
            }
        }
    }
}

impl From<usize> for FrameKey {
    fn from(index: usize) -> Self {
        FrameKey::Index(index)
    }
}

impl From<Vec<usize>> for FrameKey {
    fn from(indices: Vec<usize>) -> Self {
        FrameKey::List(indices)
    }
}

impl From<&[usize]> for FrameKey {
    fn from(indices: &[usize]) -> Self {
        FrameKey::List(indices.to_vec())
    }
}

impl From<Range<usize>> for FrameKey {
    fn from(range: Range<usize>) -> Self {
        FrameKey::slice(Some(range.start), Some(range.end), 1)
    }
}

impl From<RangeTo<usize>> for FrameKey {
    fn from(range: RangeTo<usize>) -> Self {
        FrameKey::slice(None, Some(range.end), 1)
    }
}

impl From<RangeFrom<usize>> for FrameKey {
    fn from(range: RangeFrom<usize>) -> Self {
        FrameKey::slice(Some(range.start), None, 1)
    }
}

impl From<RangeFull> for FrameKey {
    fn from(_: RangeFull) -> Self {
        FrameKey::slice(None, None, 1)
    }
}
