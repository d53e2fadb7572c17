//! Error types for the mixer, the engine adapter and the director

use std::path::PathBuf;
use thiserror::Error;

use crate::director::Phase;
use crate::nodes::FilterKind;

/// Errors raised by a mixer backend or the engine adapter
#[derive(Error, Debug)]
pub enum AudioError {
    /// No audio output device available
    #[error("No audio output device found")]
    NoDevice,

    /// Failed to build or start the output stream
    #[error("Audio stream error: {0}")]
    Stream(String),

    /// A shared filter node could not be created
    #[error("Failed to initialize {kind:?} filter: {reason}")]
    FilterInit { kind: FilterKind, reason: String },

    /// An audio file could not be opened or decoded
    #[error("Failed to decode {path}: {reason}")]
    Decode { path: PathBuf, reason: String },

    /// The engine was never initialized or has been shut down
    #[error("Audio engine is not running")]
    EngineUnavailable,
}

/// Errors raised by the music director's lifecycle operations
#[derive(Error, Debug)]
pub enum DirectorError {
    #[error("Music director is not initialized")]
    NotInitialized,

    #[error("Operation not allowed in phase {0:?}")]
    InvalidPhase(Phase),

    #[error("Audio engine is not available")]
    EngineUnavailable,

    #[error("No stems loaded")]
    NoStems,

    #[error("Failed to load stem '{name}'")]
    Load {
        name: String,
        #[source]
        source: AudioError,
    },
}

/// Errors raised while loading configuration files
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file: {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Failed to serialize config for: {path}")]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Result type for audio operations
pub type AudioResult<T> = Result<T, AudioError>;
