pub mod authoring;
pub mod common;
pub mod fs;
pub mod http;
pub mod source;
