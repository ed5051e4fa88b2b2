pub mod dummy_backend;
pub mod ffmpeg_reader;
pub mod ffmpeg_writer;
pub mod frame_cache;
pub mod hdf5_backend;
pub mod hdf5_writer;
pub mod image_codec;
pub mod image_sequence_backend;
pub mod img_store_backend;
pub mod img_store_writer;
pub mod media_backend;
pub mod ndarray_backend;
