pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff", "tif", "webp"];

pub const MEDIA_EXTENSIONS: &[&str] = &[
    "mp4", "avi", "mov", "mkv", "webm", "m4v", "mpg", "mpeg", "wmv", "flv",
];

pub const HDF5_EXTENSIONS: &[&str] = &["h5", "hdf5"];

/// HDF5 file signature. May sit at offset 0 or after a user block at
/// 512, 1024, 2048, ... bytes.
pub const HDF5_MAGIC: &[u8; 8] = b"\x89HDF\r\n\x1a\n";
pub const HDF5_MAGIC_OFFSETS: &[u64] = &[0, 512, 1024, 2048];

/// Decoded frames kept per backend instance.
pub const DEFAULT_FRAME_CACHE_CAPACITY: usize = 16;

pub const DEFAULT_IMGSTORE_FORMAT: &str = "png";
pub const IMGSTORE_METADATA_FILE: &str = "metadata.json";

/// Suffix of the sibling directory or group an export writes into before it
/// replaces the destination.
pub const STAGING_SUFFIX: &str = ".partial";

/// Dataset used when an HDF5 file is opened without naming one.
pub const DEFAULT_HDF5_DATASET: &str = "video";

pub const HDF5_VIDEO_DATASET: &str = "video";
pub const HDF5_FRAME_NUMBERS_DATASET: &str = "frame_numbers";
pub const HDF5_SOURCE_VIDEO_ATTR: &str = "source_video";
pub const HDF5_FORMAT_ATTR: &str = "format";

/// Frame rate used when encoding a clip from a source without one.
pub const FALLBACK_FPS: f64 = 30.0;
