use thiserror::Error;

#[derive(Error, Debug)]
pub enum ParserError {
    #[error("The file's magic value does not match the expectation {magic}")]
    InvalidMagicValue { magic: u32 },

    #[error("The file is violating the expected format, because: {reason}")]
    FormatError { reason: &'static str },

    #[error("Missing mandatory {magic} chunk")]
    MissingChunk { magic: &'static str },

    #[error("Unsupported container version {version}")]
    UnsupportedVersion { version: u32 },

    /// The source did not contain a single byte.
    #[error("Source contains no data")]
    EmptySource,

    #[error(transparent)]
    IOError(#[from] std::io::Error),

    #[error(transparent)]
    StringConversationError(#[from] std::ffi::IntoStringError),
}

pub mod common;
pub mod vseg;
