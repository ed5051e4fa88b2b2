use std::collections::HashMap;

use crate::shared::error::VideoError;

/// Which key space a backend's public indexing uses.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IndexMode {
    /// Keys are `0..frames`.
    Sequential,
    /// Keys are frame numbers of the video the store was derived from.
    FrameNumber,
}

/// Ordered mapping from export-local position to original frame number,
/// fixed when a store is written.
#[derive(Clone, Debug, PartialEq)]
pub struct FrameIndexMap {
    frame_numbers: Vec<usize>,
    positions: HashMap<usize, usize>,
    index_by_original: bool,
}

impl FrameIndexMap {
    /// Fails if `frame_numbers` repeats a value; the mapping must be injective.
    pub fn new(frame_numbers: Vec<usize>, index_by_original: bool) -> Result<Self, VideoError> {
        let mut positions = HashMap::with_capacity(frame_numbers.len());
        for (position, &number) in frame_numbers.iter().enumerate() {
            if positions.insert(number, position).is_some() {
                return Err(VideoError::InvalidArgument(format!(
                    "frame number {number} appears more than once"
                )));
            }
        }
        Ok(Self {
            frame_numbers,
            positions,
            index_by_original,
        })
    }

    pub fn len(&self) -> usize {
        self.frame_numbers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frame_numbers.is_empty()
    }

    pub fn frame_numbers(&self) -> &[usize] {
        &self.frame_numbers
    }

    pub fn index_by_original(&self) -> bool {
        self.index_by_original
    }

    pub fn index_mode(&self) -> IndexMode {
        if self.index_by_original {
            IndexMode::FrameNumber
        } else {
            IndexMode::Sequential
        }
    }

    /// Position of the frame with original number `number`, if embedded.
    pub fn position_of_frame_number(&self, number: usize) -> Option<usize> {
        self.positions.get(&number).copied()
    }

    /// Resolves a public key to a stored position in this map's key space.
    pub fn position(&self, key: usize) -> Option<usize> {
        if self.index_by_original {
            self.position_of_frame_number(key)
        } else {
            (key < self.len()).then_some(key)
        }
    }

    pub fn frame_number(&self, position: usize) -> Option<usize> {
        self.frame_numbers.get(position).copied()
    }

    /// Public key of the first stored frame, `None` for an empty store.
    pub fn first_key(&self) -> Option<usize> {
        if self.index_by_original {
            self.frame_numbers.first().copied()
        } else {
            (!self.is_empty()).then_some(0)
        }
    }

    /// Largest valid public key, `None` for an empty store.
    pub fn last_frame_idx(&self) -> Option<usize> {
        if self.index_by_original {
            self.frame_numbers.iter().copied().max()
        } else {
            self.len().checked_sub(1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_by_original_uses_frame_numbers() {
        let map = FrameIndexMap::new(vec![20, 40, 15], true).unwrap();
        assert_eq!(map.position(40), Some(1));
        assert_eq!(map.position(15), Some(2));
        assert_eq!(map.position(0), None);
        assert_eq!(map.last_frame_idx(), Some(40));
        assert_eq!(map.index_mode(), IndexMode::FrameNumber);
    }

    #[test]
    fn test_index_by_position() {
        let map = FrameIndexMap::new(vec![20, 40, 15], false).unwrap();
        assert_eq!(map.position(2), Some(2));
        assert_eq!(map.position(20), None);
        assert_eq!(map.last_frame_idx(), Some(2));
        assert_eq!(map.frame_number(0), Some(20));
        assert_eq!(map.first_key(), Some(0));
    }

    #[test]
    fn test_first_key_by_original_is_first_frame_number() {
        let map = FrameIndexMap::new(vec![20, 40, 15], true).unwrap();
        assert_eq!(map.first_key(), Some(20));
    }

    #[test]
    fn test_duplicates_rejected() {
        assert!(matches!(
            FrameIndexMap::new(vec![3, 4, 3], true),
            Err(VideoError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_empty_map() {
        let map = FrameIndexMap::new(vec![], true).unwrap();
        assert!(map.is_empty());
        assert_eq!(map.last_frame_idx(), None);
        assert_eq!(map.position(0), None);
        assert_eq!(map.first_key(), None);
    }
}
