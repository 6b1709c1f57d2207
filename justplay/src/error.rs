//! Error types for justplay
//!
//! Maps the rich decoder (symphonia) and device (cpal) error spaces onto a
//! small taxonomy the controller surfaces to callers.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the playback controller
#[derive(Error, Debug)]
pub enum Error {
    /// No output device was found when the engine was constructed
    #[error("No output device is available for playback")]
    NoDeviceAvailable,

    /// Path is empty or does not exist
    #[error("Audio file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// File exists but the decoder could not open it
    #[error("Failed to decode {}: {source}", path.display())]
    DecodeFailure {
        path: PathBuf,
        #[source]
        source: DecodeError,
    },

    /// Opening, starting, stopping or closing the output stream failed
    #[error("Audio device error: {0}")]
    Device(#[from] DeviceError),

    /// Transport operation whose preconditions are unmet
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Fault recorded by the audio thread since the last controller call
    #[error("Audio stream fault: {fault} (occurred {occurrences} time(s))")]
    StreamFault { fault: StreamFault, occurrences: u32 },

    /// Configuration file loading or parsing errors
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Convenience Result type using the justplay Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors reported by a Decoder Adapter.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unsupported format or codec: {0}")]
    Unsupported(String),

    #[error("No audio track found")]
    NoAudioTrack,

    #[error("Stream parameter missing: {0}")]
    MissingParameter(&'static str),

    #[error("Decode failed: {0}")]
    Decode(String),

    #[error("Seek failed: {0}")]
    Seek(String),
}

impl From<symphonia::core::errors::Error> for DecodeError {
    fn from(err: symphonia::core::errors::Error) -> Self {
        use symphonia::core::errors::Error as SymphoniaError;

        match err {
            SymphoniaError::IoError(e) => DecodeError::Io(e),
            SymphoniaError::Unsupported(what) => DecodeError::Unsupported(what.to_string()),
            SymphoniaError::DecodeError(what) => DecodeError::Decode(what.to_string()),
            SymphoniaError::SeekError(kind) => DecodeError::Seek(format!("{:?}", kind)),
            SymphoniaError::LimitError(what) => DecodeError::Decode(format!("limit exceeded: {}", what)),
            SymphoniaError::ResetRequired => DecodeError::Decode("decoder reset required".to_string()),
        }
    }
}

/// Errors reported by a Device Adapter.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    #[error("Failed to enumerate devices: {0}")]
    Enumerate(String),

    #[error("No output device found")]
    NoDevice,

    #[error("Unsupported stream configuration: {0}")]
    UnsupportedConfig(String),

    #[error("Failed to open stream: {0}")]
    Open(String),

    #[error("Failed to start stream: {0}")]
    Start(String),

    #[error("Failed to stop stream: {0}")]
    Stop(String),

    #[error("Stream error: {0}")]
    Stream(String),
}

impl From<cpal::DevicesError> for DeviceError {
    fn from(err: cpal::DevicesError) -> Self {
        DeviceError::Enumerate(err.to_string())
    }
}

impl From<cpal::SupportedStreamConfigsError> for DeviceError {
    fn from(err: cpal::SupportedStreamConfigsError) -> Self {
        DeviceError::UnsupportedConfig(err.to_string())
    }
}

impl From<cpal::BuildStreamError> for DeviceError {
    fn from(err: cpal::BuildStreamError) -> Self {
        DeviceError::Open(err.to_string())
    }
}

impl From<cpal::PlayStreamError> for DeviceError {
    fn from(err: cpal::PlayStreamError) -> Self {
        DeviceError::Start(err.to_string())
    }
}

impl From<cpal::PauseStreamError> for DeviceError {
    fn from(err: cpal::PauseStreamError) -> Self {
        DeviceError::Stop(err.to_string())
    }
}

impl From<cpal::StreamError> for DeviceError {
    fn from(err: cpal::StreamError) -> Self {
        DeviceError::Stream(err.to_string())
    }
}

/// Fault kinds the audio thread can record without allocating.
///
/// Stored as a single byte in [`crate::playback::SharedState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum StreamFault {
    /// The device reported an asynchronous stream error
    Device = 1,
    /// The decoder failed while producing frames
    Decode = 2,
    /// The decoder failed to reposition to a requested frame
    Seek = 3,
}

impl StreamFault {
    pub(crate) fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(StreamFault::Device),
            2 => Some(StreamFault::Decode),
            3 => Some(StreamFault::Seek),
            _ => None,
        }
    }
}

impl fmt::Display for StreamFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            StreamFault::Device => "device stream error",
            StreamFault::Decode => "decoder error",
            StreamFault::Seek => "decoder seek failed",
        };
        f.write_str(text)
    }
}
