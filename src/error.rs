//! Error Types

use thiserror::Error;

/// Main error type
#[derive(Debug, Clone, Error)]
pub enum SpectralError {
    /// Malformed or unsupported `.spx` stream. `field` names what failed validation.
    #[error("Format error in `{field}`: {message}")]
    Format { field: String, message: String },

    /// Two tensors that cannot be combined.
    #[error("Compatibility error: {message}")]
    Compatibility { message: String },

    /// Operator argument outside its accepted range.
    #[error("Invalid parameter `{name}`: {message}")]
    Parameter { name: String, message: String },

    #[error("Audio error: {message}")]
    Audio { message: String },

    #[error("Config error: {message}")]
    Config { message: String },

    #[error("IO error: {message}")]
    Io { message: String },
}

impl SpectralError {
    pub fn format<F: Into<String>, S: Into<String>>(field: F, msg: S) -> Self {
        Self::Format { field: field.into(), message: msg.into() }
    }
    pub fn compatibility<S: Into<String>>(msg: S) -> Self { Self::Compatibility { message: msg.into() } }
    pub fn parameter<N: Into<String>, S: Into<String>>(name: N, msg: S) -> Self {
        Self::Parameter { name: name.into(), message: msg.into() }
    }
    pub fn audio<S: Into<String>>(msg: S) -> Self { Self::Audio { message: msg.into() } }
    pub fn config<S: Into<String>>(msg: S) -> Self { Self::Config { message: msg.into() } }
    pub fn io<S: Into<String>>(msg: S) -> Self { Self::Io { message: msg.into() } }
}

pub type Result<T> = std::result::Result<T, SpectralError>;

impl From<std::io::Error> for SpectralError {
    fn from(err: std::io::Error) -> Self { Self::io(err.to_string()) }
}

impl From<hound::Error> for SpectralError {
    fn from(err: hound::Error) -> Self { Self::audio(format!("WAV: {}", err)) }
}

impl From<serde_json::Error> for SpectralError {
    fn from(err: serde_json::Error) -> Self { Self::format("json", err.to_string()) }
}
