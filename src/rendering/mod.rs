pub mod actor;
pub mod command_queue;
pub mod device;
pub mod frame_pipeline;
pub mod lod;
pub mod player;
pub mod render_method;
pub mod viewport;
