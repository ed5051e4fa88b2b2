use std::path::{Path, PathBuf};

use hdf5::types::{VarLenArray, VarLenUnicode};
use ndarray::{s, Axis, Ix2, Ix3};

use crate::shared::constants::{
    DEFAULT_HDF5_DATASET, HDF5_FORMAT_ATTR, HDF5_FRAME_NUMBERS_DATASET, HDF5_SOURCE_VIDEO_ATTR,
    HDF5_VIDEO_DATASET,
};
use crate::shared::error::VideoError;
use crate::shared::frame::FrameArray;
use crate::shared::video_metadata::FrameShape;
use crate::video::domain::backend_options::{BackendKind, BackendOptions, InputFormat};
use crate::video::domain::channel_conversion::{ChannelConversion, GrayscaleProbe};
use crate::video::domain::frame_index_map::{FrameIndexMap, IndexMode};
use crate::video::domain::reset_params::ResetParams;
use crate::video::domain::resource_state::ResourceState;
use crate::video::domain::source_video_ref::SourceVideoRef;
use crate::video::domain::video_backend::VideoBackend;
use crate::video::factory::{self, VideoSource};
use crate::video::infrastructure::frame_cache::FrameCache;
use crate::video::infrastructure::image_codec;
use crate::video::video::Video;

pub(crate) const HEIGHT_ATTR: &str = "height";
pub(crate) const WIDTH_ATTR: &str = "width";
pub(crate) const CHANNELS_ATTR: &str = "channels";
pub(crate) const FPS_ATTR: &str = "fps";
pub(crate) const INDEX_BY_ORIGINAL_ATTR: &str = "index_by_original";

/// How frames sit in the `video` dataset.
#[derive(Clone, Debug, PartialEq)]
enum FrameEncoding {
    /// `u8` array, 4-D or 3-D, in the configured axis order.
    Raw { ndim: usize },
    /// One variable-length image blob per frame.
    Encoded { format: String },
}

struct OpenDataset {
    // Keeps the file open for as long as the dataset is read.
    _file: hdf5::File,
    video: hdf5::Dataset,
    encoding: FrameEncoding,
    stored: FrameShape,
    frames: usize,
    /// Present for stores written by the exporter.
    map: Option<FrameIndexMap>,
    source: Option<SourceVideoRef>,
    fps: Option<f64>,
}

impl OpenDataset {
    fn open(
        path: &Path,
        name: &str,
        input_format: InputFormat,
        index_by_original: bool,
    ) -> Result<Self, VideoError> {
        if !path.exists() {
            return Err(VideoError::source_not_found(path));
        }
        let file = hdf5::File::open(path)?;

        let (video, map, source, fps) = match file.group(name) {
            Ok(group) if group.link_exists(HDF5_VIDEO_DATASET) => {
                let video = group.dataset(HDF5_VIDEO_DATASET)?;
                let frame_numbers: Vec<usize> = group
                    .dataset(HDF5_FRAME_NUMBERS_DATASET)?
                    .read_raw::<u64>()?
                    .into_iter()
                    .map(|n| n as usize)
                    .collect();
                let by_original = match read_scalar_attr::<u8>(&group, INDEX_BY_ORIGINAL_ATTR)? {
                    Some(flag) => flag != 0,
                    None => index_by_original,
                };
                let source = match read_string_attr(&group, HDF5_SOURCE_VIDEO_ATTR)? {
                    Some(json) => Some(serde_json::from_str(&json)?),
                    None => None,
                };
                let fps = read_scalar_attr::<f64>(&group, FPS_ATTR)?;
                let map = FrameIndexMap::new(frame_numbers, by_original)?;
                (video, Some(map), source, fps)
            }
            _ => (file.dataset(name)?, None, None, None),
        };

        let shape = video.shape();
        let encoding = match read_string_attr(&video, HDF5_FORMAT_ATTR)? {
            Some(format) if !format.is_empty() => FrameEncoding::Encoded { format },
            _ => FrameEncoding::Raw { ndim: shape.len() },
        };
        let frames = shape.first().copied().unwrap_or(0);

        let stored = match &encoding {
            FrameEncoding::Raw { .. } => stored_shape(&shape, input_format)?,
            FrameEncoding::Encoded { .. } => encoded_shape(&video, frames)?,
        };
        log::debug!(
            "Opened {}:{} ({} frames, {}x{}x{}, {:?})",
            path.display(),
            name,
            frames,
            stored.height,
            stored.width,
            stored.channels,
            encoding
        );

        Ok(Self {
            _file: file,
            video,
            encoding,
            stored,
            frames,
            map,
            source,
            fps,
        })
    }

    fn read_position(&self, position: usize, input_format: InputFormat) -> Result<FrameArray, VideoError> {
        let channels_first = input_format == InputFormat::ChannelsFirst;
        let frame = match &self.encoding {
            FrameEncoding::Encoded { .. } => {
                let blobs = self
                    .video
                    .read_slice_1d::<VarLenArray<u8>, _>(s![position..position + 1])?;
                let blob = blobs.get(0).ok_or_else(|| VideoError::Decode {
                    index: position,
                    reason: "missing image blob".into(),
                })?;
                return image_codec::decode(blob.as_slice());
            }
            FrameEncoding::Raw { ndim: 4 } => {
                let frame = self.video.read_slice::<u8, _, Ix3>(s![position, .., .., ..])?;
                if channels_first {
                    frame.permuted_axes([2, 1, 0])
                } else {
                    frame
                }
            }
            FrameEncoding::Raw { .. } => {
                let plane = self.video.read_slice::<u8, _, Ix2>(s![position, .., ..])?;
                let plane = if channels_first { plane.reversed_axes() } else { plane };
                plane.insert_axis(Axis(2))
            }
        };
        Ok(frame.as_standard_layout().into_owned())
    }
}

fn stored_shape(shape: &[usize], input_format: InputFormat) -> Result<FrameShape, VideoError> {
    let channels_first = input_format == InputFormat::ChannelsFirst;
    match (shape, channels_first) {
        ([_, h, w, c], false) => Ok(FrameShape::new(*h, *w, *c)),
        ([_, c, w, h], true) => Ok(FrameShape::new(*h, *w, *c)),
        ([_, h, w], false) => Ok(FrameShape::new(*h, *w, 1)),
        ([_, w, h], true) => Ok(FrameShape::new(*h, *w, 1)),
        _ => Err(VideoError::UnsupportedFormat(format!(
            "expected a 3-D or 4-D frame dataset, found shape {shape:?}"
        ))),
    }
}

fn encoded_shape(video: &hdf5::Dataset, frames: usize) -> Result<FrameShape, VideoError> {
    let attrs = (
        read_scalar_attr::<u64>(video, HEIGHT_ATTR)?,
        read_scalar_attr::<u64>(video, WIDTH_ATTR)?,
        read_scalar_attr::<u64>(video, CHANNELS_ATTR)?,
    );
    if let (Some(h), Some(w), Some(c)) = attrs {
        return Ok(FrameShape::new(h as usize, w as usize, c as usize));
    }
    if frames == 0 {
        return Err(VideoError::UnsupportedFormat(
            "empty encoded dataset without frame size attributes".into(),
        ));
    }
    let blobs = video.read_slice_1d::<VarLenArray<u8>, _>(s![0..1])?;
    let first = blobs.get(0).ok_or_else(|| VideoError::Decode {
        index: 0,
        reason: "missing image blob".into(),
    })?;
    let (h, w, c) = image_codec::decode(first.as_slice())?.dim();
    Ok(FrameShape::new(h, w, c))
}

fn has_attr(location: &hdf5::Location, name: &str) -> Result<bool, VideoError> {
    Ok(location.attr_names()?.iter().any(|n| n == name))
}

fn read_scalar_attr<T: hdf5::H5Type>(
    location: &hdf5::Location,
    name: &str,
) -> Result<Option<T>, VideoError> {
    if !has_attr(location, name)? {
        return Ok(None);
    }
    Ok(Some(location.attr(name)?.read_scalar::<T>()?))
}

fn read_string_attr(location: &hdf5::Location, name: &str) -> Result<Option<String>, VideoError> {
    Ok(read_scalar_attr::<VarLenUnicode>(location, name)?.map(|v| v.as_str().to_string()))
}

/// Frames stored in an HDF5 file.
///
/// Reads either a plain `u8` frame dataset or a group written by the
/// exporter (`video`, `frame_numbers`, optional `source_video` attribute).
/// Exported groups keyed by original frame number can decode frames that
/// were not embedded from the recorded source video, while
/// `enable_source_video` is on.
pub struct Hdf5Backend {
    filename: PathBuf,
    dataset: String,
    input_format: InputFormat,
    index_by_original: bool,
    enable_source_video: bool,
    handle: ResourceState<OpenDataset>,
    source_video: Option<Box<Video>>,
    cache: FrameCache,
    conversion: ChannelConversion,
}

impl Hdf5Backend {
    pub fn new(filename: impl Into<PathBuf>, options: &BackendOptions) -> Self {
        Self {
            filename: filename.into(),
            dataset: options
                .dataset
                .clone()
                .unwrap_or_else(|| DEFAULT_HDF5_DATASET.to_string()),
            input_format: options.input_format,
            index_by_original: options.index_by_original,
            enable_source_video: options.enable_source_video,
            handle: ResourceState::Unopened,
            source_video: None,
            cache: FrameCache::new(options.frame_cache_capacity),
            conversion: ChannelConversion::new(
                options.grayscale,
                options.bgr,
                GrayscaleProbe::StoredChannels,
            ),
        }
    }

    pub fn dataset(&self) -> &str {
        &self.dataset
    }

    pub fn input_format(&self) -> InputFormat {
        self.input_format
    }

    pub fn enable_source_video(&self) -> bool {
        self.enable_source_video
    }

    /// Turns decoding of non-embedded frames from the source video on or off.
    pub fn set_enable_source_video(&mut self, enable: bool) {
        if self.enable_source_video != enable {
            self.enable_source_video = enable;
            self.cache.clear();
        }
    }

    fn handle(&mut self) -> Result<&mut OpenDataset, VideoError> {
        let (path, name) = (&self.filename, &self.dataset);
        let (input_format, by_original) = (self.input_format, self.index_by_original);
        self.handle
            .get_or_open(|| OpenDataset::open(path, name, input_format, by_original))
    }

    /// True when the dataset records which frames it embeds.
    pub fn has_embedded_images(&mut self) -> Result<bool, VideoError> {
        Ok(self.handle()?.map.is_some())
    }

    /// True when non-embedded frames can currently be decoded from a source.
    pub fn source_video_available(&mut self) -> Result<bool, VideoError> {
        let enabled = self.enable_source_video;
        Ok(enabled && self.handle()?.source.is_some())
    }

    pub fn source_video_ref(&mut self) -> Result<Option<SourceVideoRef>, VideoError> {
        Ok(self.handle()?.source.clone())
    }

    /// Original frame numbers of the embedded frames, in storage order.
    pub fn embedded_frame_inds(&mut self) -> Result<Vec<usize>, VideoError> {
        let handle = self.handle()?;
        Ok(match &handle.map {
            Some(map) => map.frame_numbers().to_vec(),
            None => (0..handle.frames).collect(),
        })
    }

    /// Image format of embedded blobs, `""` for raw arrays.
    pub fn embedded_format(&mut self) -> Result<String, VideoError> {
        Ok(match &self.handle()?.encoding {
            FrameEncoding::Encoded { format } => format.clone(),
            FrameEncoding::Raw { .. } => String::new(),
        })
    }

    fn source_video(&mut self) -> Result<&mut Video, VideoError> {
        if self.source_video.is_none() {
            let source = self.handle()?.source.clone().ok_or_else(|| {
                VideoError::InvalidArgument("no source video recorded for this dataset".into())
            })?;
            log::debug!("Opening source video {}", source.filename.display());
            let video = factory::open(
                VideoSource::Path(source.filename.clone()),
                &source.backend_options(),
            )?;
            self.source_video = Some(Box::new(video));
        }
        self.source_video
            .as_deref_mut()
            .ok_or_else(|| VideoError::source_not_found(&self.filename))
    }

    fn read_from_source(&mut self, frame_number: usize) -> Result<FrameArray, VideoError> {
        self.source_video()
            .and_then(|video| video.get_frame(frame_number))
            .map_err(|e| {
                if !e.is_index_error() {
                    log::warn!("Source video fallback failed for frame {frame_number}: {e}");
                }
                e
            })
    }
}

/// Where a public key's frame comes from.
enum FrameOrigin {
    Embedded(usize),
    Source,
}

impl VideoBackend for Hdf5Backend {
    fn kind(&self) -> BackendKind {
        BackendKind::Hdf5
    }

    fn filename(&self) -> Option<&Path> {
        Some(self.filename.as_path())
    }

    fn is_missing(&self) -> bool {
        !self.filename.exists()
    }

    fn frames(&mut self) -> Result<usize, VideoError> {
        let handle = self.handle()?;
        Ok(handle.map.as_ref().map_or(handle.frames, FrameIndexMap::len))
    }

    fn frame_shape(&mut self) -> Result<FrameShape, VideoError> {
        let stored = self.handle()?.stored;
        let gray = self.conversion.resolve_stored(stored.channels);
        Ok(FrameShape::new(
            stored.height,
            stored.width,
            if gray { 1 } else { 3 },
        ))
    }

    fn fps(&mut self) -> Result<Option<f64>, VideoError> {
        Ok(self.handle()?.fps)
    }

    fn index_mode(&mut self) -> Result<IndexMode, VideoError> {
        Ok(self
            .handle()?
            .map
            .as_ref()
            .map_or(IndexMode::Sequential, FrameIndexMap::index_mode))
    }

    fn last_frame_idx(&mut self) -> Result<Option<usize>, VideoError> {
        let handle = self.handle()?;
        Ok(match &handle.map {
            Some(map) => map.last_frame_idx(),
            None => handle.frames.checked_sub(1),
        })
    }

    fn frame_keys(&mut self) -> Result<Vec<usize>, VideoError> {
        let handle = self.handle()?;
        Ok(match &handle.map {
            Some(map) if map.index_by_original() => map.frame_numbers().to_vec(),
            Some(map) => (0..map.len()).collect(),
            None => (0..handle.frames).collect(),
        })
    }

    fn first_frame_key(&mut self) -> Result<Option<usize>, VideoError> {
        let handle = self.handle()?;
        Ok(match &handle.map {
            Some(map) => map.first_key(),
            None => (handle.frames > 0).then_some(0),
        })
    }

    fn grayscale(&self) -> Option<bool> {
        self.conversion.grayscale()
    }

    fn bgr(&self) -> bool {
        self.conversion.bgr()
    }

    fn get_frame(&mut self, key: usize) -> Result<FrameArray, VideoError> {
        let fallback_enabled = self.enable_source_video;
        let handle = self.handle()?;
        let stored_channels = handle.stored.channels;
        let origin = match &handle.map {
            Some(map) if map.index_by_original() => match map.position(key) {
                Some(position) => FrameOrigin::Embedded(position),
                None if fallback_enabled && handle.source.is_some() => FrameOrigin::Source,
                None => return Err(VideoError::FrameNotEmbedded { frame: key }),
            },
            Some(map) => match map.position(key) {
                Some(position) => FrameOrigin::Embedded(position),
                None => {
                    return Err(VideoError::IndexOutOfRange {
                        index: key,
                        frames: map.len(),
                    })
                }
            },
            None if key < handle.frames => FrameOrigin::Embedded(key),
            None => {
                return Err(VideoError::IndexOutOfRange {
                    index: key,
                    frames: handle.frames,
                })
            }
        };

        if let Some(frame) = self.cache.get(key) {
            return Ok(frame);
        }
        let raw = match origin {
            FrameOrigin::Embedded(position) => {
                let input_format = self.input_format;
                self.handle()?.read_position(position, input_format)?
            }
            FrameOrigin::Source => self.read_from_source(key)?,
        };
        self.conversion.resolve_stored(stored_channels);
        let frame = self.conversion.apply(raw);
        self.cache.insert(key, frame.clone());
        Ok(frame)
    }

    fn reset(&mut self, params: ResetParams) -> Result<(), VideoError> {
        params.validate()?;
        params.require_single_file("hdf5")?;

        if let Some(filename) = params.filename.clone() {
            self.filename = filename;
        }
        self.conversion.reset(&params);
        self.handle.close();
        self.source_video = None;
        self.cache.clear();
        Ok(())
    }

    fn close(&mut self) {
        self.handle.close();
        if let Some(source) = self.source_video.as_deref_mut() {
            source.close();
        }
    }

    fn source_ref(&self) -> Option<SourceVideoRef> {
        Some(SourceVideoRef {
            filename: self.filename.clone(),
            backend: BackendKind::Hdf5,
            dataset: Some(self.dataset.clone()),
            input_format: self.input_format,
            grayscale: self.conversion.grayscale(),
        })
    }
}
