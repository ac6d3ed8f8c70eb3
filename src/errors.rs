use thiserror::Error;

use crate::util::handle_table::{Handle, HandleKind};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HandleError {
    #[error("No free {kind} handles left")]
    Exhausted { kind: HandleKind },
}

/// Errors caused by the caller. They are reported synchronously and never change engine state.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum UsageError {
    #[error("Invalid {kind} handle {handle}")]
    InvalidHandle { kind: HandleKind, handle: Handle },

    #[error("The interface is not initialised")]
    NotInitialised,

    #[error("Render was called before PrepareRender in this frame")]
    RenderBeforePrepare,

    #[error("WillRender was called after PrepareRender in this frame")]
    WillRenderAfterPrepare,

    #[error("PrepareRender was already called in this frame")]
    PrepareTwice,

    #[error("Actor {actor} was not announced for viewport {viewport} in this frame")]
    NotAnnounced { actor: Handle, viewport: Handle },

    #[error("Render queue drained from a thread other than the render thread")]
    WrongThread,

    #[error("Unsupported render method type {0}")]
    UnknownRenderMethodType(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(&'static str),

    #[error("Asset {0} is invalid")]
    AssetInvalid(Handle),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Handle(#[from] HandleError),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Invalid configuration value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("Cannot read configuration: {0}")]
    Unreadable(String),
}

/// Unrecoverable problems of a single asset. The numeric code is what the initialisation callback receives.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AssetError {
    #[error("Manifest unreachable: {0}")]
    ManifestUnreachable(String),

    #[error("Manifest malformed: {0}")]
    ManifestMalformed(String),

    #[error("Unsupported codec {codec} ({mime_type})")]
    UnsupportedCodec { mime_type: String, codec: String },

    #[error("No representation of adaptation set {adaptation_set} was accepted")]
    RepresentationRejected { adaptation_set: String },

    #[error("Seek target {target} can not be clamped into the asset")]
    SeekOutOfRange { target: f64 },

    #[error("Segment could not be decoded: {0}")]
    Decode(String),

    #[error("Out of memory while decoding {bytes} bytes")]
    OutOfMemory { bytes: usize },

    #[error("Segment unavailable: {0}")]
    SegmentUnavailable(String),
}

impl AssetError {
    pub fn code(&self) -> i32 {
        match self {
            AssetError::ManifestUnreachable(_) => 1,
            AssetError::ManifestMalformed(_) => 2,
            AssetError::UnsupportedCodec { .. } => 3,
            AssetError::RepresentationRejected { .. } => 4,
            AssetError::SeekOutOfRange { .. } => 5,
            AssetError::Decode(_) => 6,
            AssetError::OutOfMemory { .. } => 7,
            AssetError::SegmentUnavailable(_) => 8,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum IngestError {
    #[error("Giving up after {attempts} attempts: {reason}")]
    Transient { attempts: u32, reason: String },

    #[error("{reason}")]
    Fatal { reason: String },

    /// The requesting asset moved on (seek, delete) before the fetch finished.
    #[error("Request cancelled")]
    Cancelled,
}

#[derive(Error, Debug)]
pub enum InterfaceError {
    #[error("Cannot start the worker runtime: {0}")]
    Runtime(#[from] std::io::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
