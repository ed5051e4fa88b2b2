use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::shared::constants::DEFAULT_FRAME_CACHE_CAPACITY;
use crate::shared::error::VideoError;

/// The storage kinds a [`Backend`](crate::video::backend::Backend) can wrap.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    Media,
    Hdf5,
    ImageSequence,
    #[serde(rename = "imgstore")]
    ImgStore,
    Ndarray,
    Dummy,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BackendKind::Media => "media",
            BackendKind::Hdf5 => "hdf5",
            BackendKind::ImageSequence => "image_sequence",
            BackendKind::ImgStore => "imgstore",
            BackendKind::Ndarray => "ndarray",
            BackendKind::Dummy => "dummy",
        };
        write!(f, "{name}")
    }
}

impl FromStr for BackendKind {
    type Err = VideoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "media" | "video" => Ok(BackendKind::Media),
            "hdf5" | "h5" => Ok(BackendKind::Hdf5),
            "image_sequence" | "images" => Ok(BackendKind::ImageSequence),
            "imgstore" | "img_store" => Ok(BackendKind::ImgStore),
            "ndarray" | "numpy" | "array" => Ok(BackendKind::Ndarray),
            "dummy" => Ok(BackendKind::Dummy),
            other => Err(VideoError::UnsupportedFormat(format!(
                "unknown backend kind '{other}'"
            ))),
        }
    }
}

/// Axis order of frames stored in an HDF5 dataset.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputFormat {
    /// `(frames, height, width, channels)`
    #[default]
    ChannelsLast,
    /// `(frames, channels, width, height)`
    ChannelsFirst,
}

/// Keyword configuration accepted by the factory and backend constructors.
///
/// Each backend reads the options it understands and ignores the rest, so
/// passing e.g. `dataset` to a media backend is never an error.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendOptions {
    /// Explicit backend choice; skips format sniffing.
    pub backend: Option<BackendKind>,
    /// `None` detects from the first decoded frame.
    pub grayscale: Option<bool>,
    /// Return frames in BGR instead of RGB order.
    pub bgr: bool,
    /// HDF5 dataset (or group) path.
    pub dataset: Option<String>,
    pub input_format: InputFormat,
    /// Stores derived from another video are keyed by original frame number.
    pub index_by_original: bool,
    /// Compression for embedded frames; empty means raw arrays.
    pub format: String,
    /// Let HDF5 stores decode non-embedded frames from their source video.
    pub enable_source_video: bool,
    pub frame_cache_capacity: usize,
}

const KNOWN_OPTIONS: &[&str] = &[
    "backend",
    "grayscale",
    "bgr",
    "dataset",
    "input_format",
    "index_by_original",
    "format",
    "enable_source_video",
    "frame_cache_capacity",
];

impl Default for BackendOptions {
    fn default() -> Self {
        Self {
            backend: None,
            grayscale: None,
            bgr: false,
            dataset: None,
            input_format: InputFormat::ChannelsLast,
            index_by_original: true,
            format: String::new(),
            enable_source_video: true,
            frame_cache_capacity: DEFAULT_FRAME_CACHE_CAPACITY,
        }
    }
}

impl BackendOptions {
    /// Builds options from a JSON object. Unrecognised keys are skipped.
    pub fn from_json(value: serde_json::Value) -> Result<Self, VideoError> {
        if let serde_json::Value::Object(map) = &value {
            for key in map.keys().filter(|k| !KNOWN_OPTIONS.contains(&k.as_str())) {
                log::debug!("Ignoring unrecognised backend option '{key}'");
            }
        }
        Ok(serde_json::from_value(value)?)
    }

    /// Builds options from `key=value` strings as given on a command line.
    ///
    /// Values are read as JSON when they parse (`true`, `3`, `null`) and as
    /// plain strings otherwise.
    pub fn from_pairs<I, S>(pairs: I) -> Result<Self, VideoError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut map = serde_json::Map::new();
        for pair in pairs {
            let pair = pair.as_ref();
            let (key, raw) = pair.split_once('=').ok_or_else(|| {
                VideoError::InvalidArgument(format!("expected key=value, got '{pair}'"))
            })?;
            let value = serde_json::from_str(raw)
                .unwrap_or_else(|_| serde_json::Value::String(raw.to_string()));
            map.insert(key.trim().to_string(), value);
        }
        Self::from_json(serde_json::Value::Object(map))
    }

    pub fn with_backend(mut self, backend: BackendKind) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn with_grayscale(mut self, grayscale: bool) -> Self {
        self.grayscale = Some(grayscale);
        self
    }

    pub fn with_dataset(mut self, dataset: impl Into<String>) -> Self {
        self.dataset = Some(dataset.into());
        self
    }

    pub fn with_input_format(mut self, input_format: InputFormat) -> Self {
        self.input_format = input_format;
        self
    }

    pub fn with_index_by_original(mut self, index_by_original: bool) -> Self {
        self.index_by_original = index_by_original;
        self
    }

    pub fn with_enable_source_video(mut self, enable: bool) -> Self {
        self.enable_source_video = enable;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults() {
        let opts = BackendOptions::default();
        assert_eq!(opts.grayscale, None);
        assert!(!opts.bgr);
        assert!(opts.index_by_original);
        assert!(opts.enable_source_video);
        assert_eq!(opts.format, "");
        assert_eq!(opts.frame_cache_capacity, DEFAULT_FRAME_CACHE_CAPACITY);
    }

    #[test]
    fn test_unknown_keys_are_ignored() {
        let opts = BackendOptions::from_json(json!({
            "grayscale": true,
            "another_kwarg": false,
            "fake_kwarg": [1, 2],
        }))
        .unwrap();
        assert_eq!(opts.grayscale, Some(true));
    }

    #[test]
    fn test_from_pairs_parses_json_and_strings() {
        let opts = BackendOptions::from_pairs([
            "dataset=box",
            "input_format=\"channels_first\"",
            "index_by_original=false",
            "backend=\"hdf5\"",
            "unused=1",
        ])
        .unwrap();
        assert_eq!(opts.dataset.as_deref(), Some("box"));
        assert_eq!(opts.input_format, InputFormat::ChannelsFirst);
        assert!(!opts.index_by_original);
        assert_eq!(opts.backend, Some(BackendKind::Hdf5));
    }

    #[test]
    fn test_from_pairs_accepts_bare_strings_for_enums() {
        let opts = BackendOptions::from_pairs(["input_format=channels_first"]).unwrap();
        assert_eq!(opts.input_format, InputFormat::ChannelsFirst);
    }

    #[test]
    fn test_from_pairs_rejects_missing_equals() {
        assert!(BackendOptions::from_pairs(["grayscale"]).is_err());
    }

    #[test]
    fn test_backend_kind_round_trips_through_strings() {
        for kind in [
            BackendKind::Media,
            BackendKind::Hdf5,
            BackendKind::ImageSequence,
            BackendKind::ImgStore,
            BackendKind::Ndarray,
            BackendKind::Dummy,
        ] {
            assert_eq!(kind.to_string().parse::<BackendKind>().unwrap(), kind);
        }
        assert!("quicktime".parse::<BackendKind>().is_err());
    }
}
