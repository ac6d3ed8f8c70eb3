pub mod asset;
pub mod catalog;
pub mod decode_buffer;
pub mod decoder;
pub mod frame;
pub mod playback;
pub mod state;
pub mod streamer;
