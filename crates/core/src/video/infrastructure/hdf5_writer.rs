use std::path::{Path, PathBuf};

use hdf5::types::{VarLenArray, VarLenUnicode};
use ndarray::Array1;

use crate::shared::constants::{
    HDF5_FORMAT_ATTR, HDF5_FRAME_NUMBERS_DATASET, HDF5_SOURCE_VIDEO_ATTR, HDF5_VIDEO_DATASET,
    STAGING_SUFFIX,
};
use crate::shared::error::VideoError;
use crate::shared::frame::{frame_shape, FrameArray};
use crate::video::backend::Backend;
use crate::video::domain::backend_options::BackendOptions;
use crate::video::domain::frame_store_writer::{FrameStoreWriter, StoreLayout};
use crate::video::infrastructure::hdf5_backend::{
    Hdf5Backend, CHANNELS_ATTR, FPS_ATTR, HEIGHT_ATTR, INDEX_BY_ORIGINAL_ATTR, WIDTH_ATTR,
};
use crate::video::infrastructure::image_codec;

struct OpenGroup {
    path: PathBuf,
    /// The file did not exist before `open`.
    created_file: bool,
    layout: StoreLayout,
    staging: String,
    frame_numbers: Vec<u64>,
    video: hdf5::Dataset,
    group: hdf5::Group,
    file: hdf5::File,
}

impl OpenGroup {
    fn encoded(&self) -> bool {
        !self.layout.format.is_empty()
    }

    fn append(&mut self, frame: &FrameArray) -> Result<(), VideoError> {
        let row = self.frame_numbers.len();
        if self.encoded() {
            let blob = image_codec::encode(frame, &self.layout.format)?;
            let data = Array1::from(vec![VarLenArray::from_slice(&blob)]);
            self.video.resize((row + 1,))?;
            self.video.write_slice(&data, row..row + 1)?;
        } else {
            let (height, width, channels) = self.layout.frame_shape.as_tuple();
            self.video.resize((row + 1, height, width, channels))?;
            self.video
                .write_slice(&frame.as_standard_layout(), (row, .., .., ..))?;
        }
        Ok(())
    }

    /// Writes the index and attributes, then moves the staging group over
    /// the destination name.
    fn finish(&self, dataset: &str) -> Result<(), VideoError> {
        let layout = &self.layout;
        let numbers = Array1::from(self.frame_numbers.clone());
        if numbers.is_empty() {
            self.group
                .new_dataset::<u64>()
                .shape(vec![0])
                .create(HDF5_FRAME_NUMBERS_DATASET)?;
        } else {
            self.group
                .new_dataset_builder()
                .with_data(&numbers)
                .create(HDF5_FRAME_NUMBERS_DATASET)?;
        }

        write_scalar_attr(&self.group, INDEX_BY_ORIGINAL_ATTR, u8::from(layout.index_by_original))?;
        if let Some(fps) = layout.fps {
            write_scalar_attr(&self.group, FPS_ATTR, fps)?;
        }
        if let Some(source) = &layout.source {
            write_string_attr(&self.group, HDF5_SOURCE_VIDEO_ATTR, &serde_json::to_string(source)?)?;
        }

        if self.file.link_exists(dataset) {
            log::debug!("Replacing existing group {dataset}");
            self.file.unlink(dataset)?;
        }
        self.file.relink(&self.staging, dataset)?;
        self.file.flush()?;
        Ok(())
    }

    /// Removes the staging group, and the file too when this export created it.
    fn discard(self) {
        let OpenGroup {
            path,
            created_file,
            staging,
            video,
            group,
            file,
            ..
        } = self;
        drop(video);
        drop(group);
        if let Err(e) = file.unlink(&staging) {
            log::warn!("Could not remove partial group {staging} from {}: {e}", path.display());
        }
        drop(file);
        if created_file {
            if let Err(e) = std::fs::remove_file(&path) {
                log::warn!("Could not remove partial file {}: {e}", path.display());
            }
        }
    }
}

/// Writes exported frames as a group inside an HDF5 file.
///
/// The group holds a `video` dataset (raw `u8` frames or one image blob per
/// frame), a `frame_numbers` dataset and the store attributes. Frames are
/// appended to a chunked dataset in a staging group as they arrive; on
/// [`close`](FrameStoreWriter::close) the staging group replaces any group of
/// the same name. Other groups in the file are kept.
pub struct Hdf5Writer {
    dataset: String,
    open: Option<OpenGroup>,
}

impl Hdf5Writer {
    pub fn new(dataset: impl Into<String>) -> Self {
        Self {
            dataset: dataset.into(),
            open: None,
        }
    }

    pub fn dataset(&self) -> &str {
        &self.dataset
    }
}

fn write_scalar_attr<T: hdf5::H5Type>(
    location: &hdf5::Location,
    name: &str,
    value: T,
) -> Result<(), VideoError> {
    location
        .new_attr::<T>()
        .shape(())
        .create(name)?
        .write_scalar(&value)?;
    Ok(())
}

fn write_string_attr(location: &hdf5::Location, name: &str, value: &str) -> Result<(), VideoError> {
    let value: VarLenUnicode = value
        .parse()
        .map_err(|e| VideoError::InvalidArgument(format!("cannot store attribute {name}: {e}")))?;
    write_scalar_attr(location, name, value)
}

fn create_video_dataset(group: &hdf5::Group, layout: &StoreLayout) -> Result<hdf5::Dataset, VideoError> {
    let (height, width, channels) = layout.frame_shape.as_tuple();
    if layout.format.is_empty() {
        return Ok(group
            .new_dataset::<u8>()
            .chunk((1, height, width, channels))
            .shape((0.., height, width, channels))
            .create(HDF5_VIDEO_DATASET)?);
    }
    let video = group
        .new_dataset::<VarLenArray<u8>>()
        .shape((0..,))
        .create(HDF5_VIDEO_DATASET)?;
    write_string_attr(&video, HDF5_FORMAT_ATTR, &layout.format)?;
    write_scalar_attr(&video, HEIGHT_ATTR, height as u64)?;
    write_scalar_attr(&video, WIDTH_ATTR, width as u64)?;
    write_scalar_attr(&video, CHANNELS_ATTR, channels as u64)?;
    Ok(video)
}

impl FrameStoreWriter for Hdf5Writer {
    fn open(&mut self, destination: &Path, layout: &StoreLayout) -> Result<(), VideoError> {
        if image_codec::is_motion_format(&layout.format) {
            return Err(VideoError::UnsupportedFormat(format!(
                "HDF5 stores embed still images, not '{}'",
                layout.format
            )));
        }
        if !layout.format.is_empty() {
            image_codec::image_format(&layout.format)?;
        }
        self.abort();

        if let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let created_file = !destination.exists();
        let file = hdf5::File::append(destination)?;
        let staging = format!("{}{STAGING_SUFFIX}", self.dataset);
        if file.link_exists(&staging) {
            file.unlink(&staging)?;
        }
        let group = file.create_group(&staging)?;
        let video = create_video_dataset(&group, layout)?;
        log::debug!(
            "Writing HDF5 group {}:{} (format '{}')",
            destination.display(),
            self.dataset,
            layout.format
        );

        self.open = Some(OpenGroup {
            path: destination.to_path_buf(),
            created_file,
            layout: layout.clone(),
            staging,
            frame_numbers: Vec::new(),
            video,
            group,
            file,
        });
        Ok(())
    }

    fn write(&mut self, frame_number: usize, frame: &FrameArray) -> Result<(), VideoError> {
        let open = self
            .open
            .as_mut()
            .ok_or_else(|| VideoError::InvalidArgument("HDF5 writer is not open".into()))?;
        if frame_shape(frame) != open.layout.frame_shape {
            return Err(VideoError::InvalidArgument(format!(
                "frame {frame_number} has shape {:?}, store expects {:?}",
                frame.dim(),
                open.layout.frame_shape.as_tuple()
            )));
        }
        open.append(frame)?;
        open.frame_numbers.push(frame_number as u64);
        Ok(())
    }

    fn close(&mut self) -> Result<Backend, VideoError> {
        let open = self
            .open
            .take()
            .ok_or_else(|| VideoError::InvalidArgument("HDF5 writer is not open".into()))?;
        if let Err(e) = open.finish(&self.dataset) {
            open.discard();
            return Err(e);
        }
        log::debug!(
            "Wrote {} frames to {}:{}",
            open.frame_numbers.len(),
            open.path.display(),
            self.dataset
        );

        let OpenGroup { path, layout, .. } = open;
        let options = BackendOptions {
            dataset: Some(self.dataset.clone()),
            index_by_original: layout.index_by_original,
            enable_source_video: layout.enable_source_video,
            format: layout.format,
            ..BackendOptions::default()
        };
        Ok(Hdf5Backend::new(path, &options).into())
    }

    fn abort(&mut self) {
        if let Some(open) = self.open.take() {
            log::debug!(
                "Discarding partial group {}:{}",
                open.path.display(),
                self.dataset
            );
            open.discard();
        }
    }
}

impl Drop for Hdf5Writer {
    fn drop(&mut self) {
        self.abort();
    }
}
