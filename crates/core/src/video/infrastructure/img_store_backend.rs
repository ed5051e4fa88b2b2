use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::shared::constants::IMGSTORE_METADATA_FILE;
use crate::shared::error::VideoError;
use crate::shared::frame::FrameArray;
use crate::shared::video_metadata::FrameShape;
use crate::video::domain::backend_options::{BackendKind, BackendOptions};
use crate::video::domain::channel_conversion::{ChannelConversion, GrayscaleProbe};
use crate::video::domain::frame_index_map::{FrameIndexMap, IndexMode};
use crate::video::domain::reset_params::ResetParams;
use crate::video::domain::resource_state::ResourceState;
use crate::video::domain::source_video_ref::SourceVideoRef;
use crate::video::domain::video_backend::VideoBackend;
use crate::video::infrastructure::ffmpeg_reader::FfmpegReader;
use crate::video::infrastructure::frame_cache::FrameCache;
use crate::video::infrastructure::image_codec;

/// Contents of an image store's `metadata.json`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StoreMetadata {
    /// Image format of per-frame files, or `"<codec>/<container>"` when the
    /// frames live in one motion clip.
    pub format: String,
    pub height: usize,
    pub width: usize,
    pub channels: usize,
    /// Original frame number of each stored frame, in storage order.
    pub frame_numbers: Vec<usize>,
    #[serde(default = "default_index_by_original")]
    pub index_by_original: bool,
    #[serde(default)]
    pub fps: Option<f64>,
    /// Video the frames were exported from. Recorded for provenance only.
    #[serde(default)]
    pub source: Option<SourceVideoRef>,
}

fn default_index_by_original() -> bool {
    true
}

impl StoreMetadata {
    pub fn read(directory: &Path) -> Result<Self, VideoError> {
        let path = directory.join(IMGSTORE_METADATA_FILE);
        if !path.exists() {
            return Err(VideoError::source_not_found(directory));
        }
        let file = File::open(&path)?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }

    pub fn write(&self, directory: &Path) -> Result<(), VideoError> {
        let file = File::create(directory.join(IMGSTORE_METADATA_FILE))?;
        serde_json::to_writer_pretty(file, self)?;
        Ok(())
    }

    pub fn frame_shape(&self) -> FrameShape {
        FrameShape::new(self.height, self.width, self.channels)
    }

    /// `(codec, container)` for clip stores.
    pub fn motion_format(&self) -> Option<(&str, &str)> {
        self.format.split_once('/')
    }
}

/// File holding chunk `index` of a store: a frame image, or the clip.
pub fn chunk_file_name(index: usize, extension: &str) -> String {
    format!("{index:06}.{extension}")
}

struct OpenStore {
    metadata: StoreMetadata,
    map: FrameIndexMap,
    clip: ResourceState<FfmpegReader>,
}

impl OpenStore {
    fn load(directory: &Path) -> Result<Self, VideoError> {
        let metadata = StoreMetadata::read(directory)?;
        let map = FrameIndexMap::new(metadata.frame_numbers.clone(), metadata.index_by_original)?;
        log::debug!(
            "Opened image store {} ({} frames, format '{}')",
            directory.display(),
            map.len(),
            metadata.format
        );
        Ok(Self {
            metadata,
            map,
            clip: ResourceState::Unopened,
        })
    }

    fn read_position(&mut self, directory: &Path, position: usize) -> Result<FrameArray, VideoError> {
        match self.metadata.motion_format() {
            Some((_, container)) => {
                let path = directory.join(chunk_file_name(0, container));
                self.clip
                    .get_or_open(|| FfmpegReader::open(&path))?
                    .read_frame(position)?
                    .ok_or_else(|| VideoError::Decode {
                        index: position,
                        reason: "clip ended before this frame".into(),
                    })
            }
            None => {
                let path = directory.join(chunk_file_name(position, &self.metadata.format));
                image_codec::read_image(&path)
            }
        }
    }
}

/// A directory of frames keyed by frame number, with a `metadata.json`
/// describing the layout.
///
/// Public keys are either original frame numbers or store positions, as
/// recorded when the store was written. A key outside that key space is
/// [`VideoError::FrameNotInStore`].
pub struct ImgStoreBackend {
    directory: PathBuf,
    store: ResourceState<OpenStore>,
    cache: FrameCache,
    conversion: ChannelConversion,
}

impl ImgStoreBackend {
    pub fn new(directory: impl Into<PathBuf>, options: &BackendOptions) -> Self {
        Self {
            directory: directory.into(),
            store: ResourceState::Unopened,
            cache: FrameCache::new(options.frame_cache_capacity),
            conversion: ChannelConversion::new(
                options.grayscale,
                options.bgr,
                GrayscaleProbe::StoredChannels,
            ),
        }
    }

    fn store(&mut self) -> Result<&mut OpenStore, VideoError> {
        let directory = &self.directory;
        self.store.get_or_open(|| OpenStore::load(directory))
    }

    pub fn metadata(&mut self) -> Result<&StoreMetadata, VideoError> {
        Ok(&self.store()?.metadata)
    }

    /// Original frame numbers of the stored frames, in storage order.
    pub fn frame_numbers(&mut self) -> Result<Vec<usize>, VideoError> {
        Ok(self.store()?.map.frame_numbers().to_vec())
    }

    /// The video this store was exported from, if recorded.
    pub fn source(&mut self) -> Result<Option<SourceVideoRef>, VideoError> {
        Ok(self.store()?.metadata.source.clone())
    }
}

impl VideoBackend for ImgStoreBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::ImgStore
    }

    fn filename(&self) -> Option<&Path> {
        Some(self.directory.as_path())
    }

    fn is_missing(&self) -> bool {
        !self.directory.join(IMGSTORE_METADATA_FILE).exists()
    }

    fn frames(&mut self) -> Result<usize, VideoError> {
        Ok(self.store()?.map.len())
    }

    fn frame_shape(&mut self) -> Result<FrameShape, VideoError> {
        let stored = self.store()?.metadata.frame_shape();
        let gray = self.conversion.resolve_stored(stored.channels);
        Ok(FrameShape::new(
            stored.height,
            stored.width,
            if gray { 1 } else { 3 },
        ))
    }

    fn fps(&mut self) -> Result<Option<f64>, VideoError> {
        Ok(self.store()?.metadata.fps)
    }

    fn index_mode(&mut self) -> Result<IndexMode, VideoError> {
        Ok(self.store()?.map.index_mode())
    }

    fn last_frame_idx(&mut self) -> Result<Option<usize>, VideoError> {
        Ok(self.store()?.map.last_frame_idx())
    }

    fn frame_keys(&mut self) -> Result<Vec<usize>, VideoError> {
        let map = &self.store()?.map;
        Ok(match map.index_mode() {
            IndexMode::FrameNumber => map.frame_numbers().to_vec(),
            IndexMode::Sequential => (0..map.len()).collect(),
        })
    }

    fn first_frame_key(&mut self) -> Result<Option<usize>, VideoError> {
        Ok(self.store()?.map.first_key())
    }

    fn grayscale(&self) -> Option<bool> {
        self.conversion.grayscale()
    }

    fn bgr(&self) -> bool {
        self.conversion.bgr()
    }

    fn get_frame(&mut self, key: usize) -> Result<FrameArray, VideoError> {
        let directory = self.directory.clone();
        let store = self.store()?;
        let position = store
            .map
            .position(key)
            .ok_or(VideoError::FrameNotInStore { key })?;
        let stored_channels = store.metadata.channels;

        if let Some(frame) = self.cache.get(position) {
            return Ok(frame);
        }
        let raw = match self.store.get_mut() {
            Some(store) => store.read_position(&directory, position)?,
            None => return Err(VideoError::source_not_found(&directory)),
        };
        self.conversion.resolve_stored(stored_channels);
        let frame = self.conversion.apply(raw);
        self.cache.insert(position, frame.clone());
        Ok(frame)
    }

    fn reset(&mut self, params: ResetParams) -> Result<(), VideoError> {
        params.validate()?;
        params.require_single_file("imgstore")?;

        if let Some(directory) = params.filename.clone() {
            self.directory = directory;
        }
        self.conversion.reset(&params);
        self.store.close();
        self.cache.clear();
        Ok(())
    }

    fn close(&mut self) {
        self.store.close();
    }

    fn source_ref(&self) -> Option<SourceVideoRef> {
        Some(SourceVideoRef {
            filename: self.directory.clone(),
            backend: BackendKind::ImgStore,
            dataset: None,
            input_format: Default::default(),
            grayscale: self.conversion.grayscale(),
        })
    }
}
