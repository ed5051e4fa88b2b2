use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::video::domain::backend_options::{BackendKind, BackendOptions, InputFormat};

/// Back-reference from a derived store to the video it was exported from.
///
/// Serialised as JSON inside the store so the source can be reopened for
/// frames that were not copied.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SourceVideoRef {
    pub filename: PathBuf,
    pub backend: BackendKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dataset: Option<String>,
    #[serde(default)]
    pub input_format: InputFormat,
    #[serde(default)]
    pub grayscale: Option<bool>,
}

impl SourceVideoRef {
    /// Options that reopen the source the way it was read during export.
    pub fn backend_options(&self) -> BackendOptions {
        BackendOptions {
            backend: Some(self.backend),
            grayscale: self.grayscale,
            dataset: self.dataset.clone(),
            input_format: self.input_format,
            ..BackendOptions::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_round_trip() {
        let source = SourceVideoRef {
            filename: PathBuf::from("/data/robot.mp4"),
            backend: BackendKind::Media,
            dataset: None,
            input_format: InputFormat::ChannelsLast,
            grayscale: Some(false),
        };
        let json = serde_json::to_string(&source).unwrap();
        assert!(json.contains("\"backend\":\"media\""));
        let parsed: SourceVideoRef = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, source);
    }

    #[test]
    fn test_backend_options_pin_backend_kind() {
        let source = SourceVideoRef {
            filename: PathBuf::from("/data/clip.h5"),
            backend: BackendKind::Hdf5,
            dataset: Some("box".into()),
            input_format: InputFormat::ChannelsFirst,
            grayscale: None,
        };
        let opts = source.backend_options();
        assert_eq!(opts.backend, Some(BackendKind::Hdf5));
        assert_eq!(opts.dataset.as_deref(), Some("box"));
        assert_eq!(opts.input_format, InputFormat::ChannelsFirst);
    }
}
