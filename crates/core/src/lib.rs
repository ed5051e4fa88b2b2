//! Frame-indexed access to videos stored as media files, HDF5 datasets,
//! still images, image stores or in-memory arrays.

pub mod pipeline;
pub mod shared;
pub mod video;
