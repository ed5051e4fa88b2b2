pub mod backend_options;
pub mod channel_conversion;
pub mod frame_index_map;
pub mod frame_key;
pub mod frame_store_writer;
pub mod reset_params;
pub mod resource_state;
pub mod source_video_ref;
pub mod video_backend;
