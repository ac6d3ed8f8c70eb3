pub mod asset;
pub mod errors;
pub mod interface;
pub mod io;
pub mod networking;
pub mod rendering;
pub mod settings;
pub mod util;
