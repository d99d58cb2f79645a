//! Error handling for the monitoring pipeline

use serde::Serialize;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Why a frame source could not be acquired.
///
/// The user-facing remedy differs per kind (grant permission vs. plug in a
/// camera vs. shrug), so this is surfaced rather than flattened into a string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceErrorKind {
    /// Access to the device was refused
    PermissionDenied,
    /// No device answered at all
    DeviceNotFound,
    /// Anything else
    Unknown,
}

impl std::fmt::Display for SourceErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SourceErrorKind::PermissionDenied => "permission denied",
            SourceErrorKind::DeviceNotFound => "device not found",
            SourceErrorKind::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Frame source could not be acquired; fatal to starting a session
    #[error("Frame source unavailable ({kind}): {message}")]
    SourceUnavailable {
        kind: SourceErrorKind,
        message: String,
    },

    /// Network/HTTP-level failure, recoverable via the retry policy
    #[error("Transport error: {0}")]
    Transport(String),

    /// Non-JSON body or missing fields; retried like a transport failure
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// Request was explicitly cancelled; expected, never surfaced
    #[error("Request cancelled")]
    Cancelled,

    /// An attempt chain used up all of its retries
    #[error("Detection attempts exhausted after {attempts} tries")]
    RetriesExhausted { attempts: u32 },

    /// No audio output device; alarm degrades, the rest keeps running
    #[error("Audio unavailable: {0}")]
    AudioUnavailable(String),

    /// Config error
    #[error("Config error: {0}")]
    Config(String),

    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Image decode/encode error
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Convenience constructor for acquisition failures
    pub fn source_unavailable(kind: SourceErrorKind, message: impl Into<String>) -> Self {
        Error::SourceUnavailable {
            kind,
            message: message.into(),
        }
    }
}
