//! Error types for the Cablevoice speech pipeline.

use std::fmt;

/// Result type alias for Cablevoice operations
pub type CableVoiceResult<T> = Result<T, CableVoiceError>;

/// Why a remote synthesis call failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SynthesisErrorKind {
    /// The service timed out or could not be reached
    Network,
    /// The service answered but rejected the text or language
    Service,
}

impl fmt::Display for SynthesisErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Network => write!(f, "network"),
            Self::Service => write!(f, "service"),
        }
    }
}

/// Why an encoded payload could not be turned into PCM
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeErrorKind {
    /// No container reader or codec is available for the payload
    UnsupportedCodec,
    /// The payload is truncated, corrupt or carries no audio frames
    Malformed,
}

impl fmt::Display for DecodeErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedCodec => write!(f, "unsupported codec"),
            Self::Malformed => write!(f, "malformed payload"),
        }
    }
}

/// Main error type for Cablevoice operations
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CableVoiceError {
    /// Invalid input error
    #[error("Invalid input: {message}")]
    InvalidInput {
        /// Error message describing the invalid input
        message: String,
    },

    /// No output device matched the configured name
    #[error("No output device matching '{pattern}'")]
    DeviceNotFound {
        /// The substring that was searched for
        pattern: String,
    },

    /// Remote speech synthesis failed
    #[error("Speech synthesis failed ({kind}): {message}")]
    SynthesisError {
        /// Network or service failure
        kind: SynthesisErrorKind,
        /// Error message describing the failure
        message: String,
    },

    /// Encoded audio could not be decoded
    #[error("Audio decoding failed ({kind}): {message}")]
    DecodeError {
        /// Missing codec or malformed payload
        kind: DecodeErrorKind,
        /// Error message describing the failure
        message: String,
    },

    /// Audio output could not be started or failed while playing
    #[error("Playback error: {message}")]
    PlaybackError {
        /// Error message describing the device issue
        message: String,
    },

    /// File I/O error
    #[error("File I/O error: {message}")]
    FileError {
        /// Error message describing the file operation failure
        message: String,
    },

    /// Configuration error
    #[error("Configuration error: {message}")]
    ConfigurationError {
        /// Error message describing the configuration issue
        message: String,
    },

    /// Thread or queue error
    #[error("Concurrency error: {message}")]
    ConcurrencyError {
        /// Error message describing the concurrency issue
        message: String,
    },
}

impl CableVoiceError {
    /// Create a new invalid input error
    #[must_use]
    pub fn invalid_input<S: Into<String>>(message: S) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create a new device not found error
    #[must_use]
    pub fn device_not_found<S: Into<String>>(pattern: S) -> Self {
        Self::DeviceNotFound {
            pattern: pattern.into(),
        }
    }

    /// Create a synthesis error caused by the network
    #[must_use]
    pub fn synthesis_network<S: Into<String>>(message: S) -> Self {
        Self::SynthesisError {
            kind: SynthesisErrorKind::Network,
            message: message.into(),
        }
    }

    /// Create a synthesis error reported by the remote service
    #[must_use]
    pub fn synthesis_service<S: Into<String>>(message: S) -> Self {
        Self::SynthesisError {
            kind: SynthesisErrorKind::Service,
            message: message.into(),
        }
    }

    /// Create a decode error for a payload no codec can handle
    #[must_use]
    pub fn unsupported_codec<S: Into<String>>(message: S) -> Self {
        Self::DecodeError {
            kind: DecodeErrorKind::UnsupportedCodec,
            message: message.into(),
        }
    }

    /// Create a decode error for a corrupt payload
    #[must_use]
    pub fn malformed_audio<S: Into<String>>(message: S) -> Self {
        Self::DecodeError {
            kind: DecodeErrorKind::Malformed,
            message: message.into(),
        }
    }

    /// Create a new playback error
    #[must_use]
    pub fn playback<S: Into<String>>(message: S) -> Self {
        Self::PlaybackError {
            message: message.into(),
        }
    }

    /// Create a new file error
    #[must_use]
    pub fn file<S: Into<String>>(message: S) -> Self {
        Self::FileError {
            message: message.into(),
        }
    }

    /// Create a new configuration error
    #[must_use]
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::ConfigurationError {
            message: message.into(),
        }
    }

    /// Create a new concurrency error
    #[must_use]
    pub fn concurrency<S: Into<String>>(message: S) -> Self {
        Self::ConcurrencyError {
            message: message.into(),
        }
    }

    /// Check if this error is due to invalid user input
    #[must_use]
    pub const fn is_user_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidInput { .. } | Self::DeviceNotFound { .. } | Self::ConfigurationError { .. }
        )
    }

    /// Get the error category for logging
    #[must_use]
    pub const fn category(&self) -> &'static str {
        match self {
            Self::InvalidInput { .. } => "input",
            Self::DeviceNotFound { .. } => "device",
            Self::SynthesisError { .. } => "synthesis",
            Self::DecodeError { .. } => "decode",
            Self::PlaybackError { .. } => "playback",
            Self::FileError { .. } => "file",
            Self::ConfigurationError { .. } => "configuration",
            Self::ConcurrencyError { .. } => "concurrency",
        }
    }

    /// Short text suitable for a status line, with a hint where one helps
    #[must_use]
    pub fn status_text(&self) -> String {
        match self {
            Self::InvalidInput { message } => message.clone(),
            Self::DeviceNotFound { .. } => "Output device not found.".to_string(),
            Self::SynthesisError {
                kind: SynthesisErrorKind::Network,
                ..
            } => "Speech generation failed (network or service unreachable?)".to_string(),
            Self::SynthesisError {
                kind: SynthesisErrorKind::Service,
                message,
            } => format!("Speech service rejected the request: {message}"),
            Self::DecodeError {
                kind: DecodeErrorKind::UnsupportedCodec,
                ..
            } => "Audio decoding failed (codec not available?)".to_string(),
            Self::DecodeError {
                kind: DecodeErrorKind::Malformed,
                ..
            } => "Audio decoding failed (damaged audio data)".to_string(),
            Self::PlaybackError { message } => format!("Audio error: {message}"),
            other => other.to_string(),
        }
    }
}

impl From<std::io::Error> for CableVoiceError {
    fn from(err: std::io::Error) -> Self {
        Self::file(err.to_string())
    }
}

impl From<toml::de::Error> for CableVoiceError {
    fn from(err: toml::de::Error) -> Self {
        Self::configuration(format!("TOML parse error: {err}"))
    }
}

impl From<reqwest::Error> for CableVoiceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() || err.is_request() || err.is_body() {
            Self::synthesis_network(err.to_string())
        } else {
            Self::synthesis_service(err.to_string())
        }
    }
}
