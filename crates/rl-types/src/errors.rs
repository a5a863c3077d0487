use thiserror::Error;

/// Main error type for the RiskLens client
#[derive(Error, Debug)]
pub enum RlError {
    #[error("Analysis error: {0}")]
    Analysis(#[from] AnalysisError),

    #[error("Stream error: {0}")]
    Stream(#[from] StreamError),

    #[error("Envelope error: {0}")]
    Envelope(#[from] EnvelopeError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Failures of a single `POST /analyze` call
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    #[error("Transport failure: {message}")]
    Transport { message: String },

    #[error("Backend answered with status {status}")]
    Status { status: u16 },

    #[error("Unreadable response body: {message}")]
    Body { message: String },
}

/// Failures of the telemetry subscription
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StreamError {
    #[error("Failed to connect to {url}: {message}")]
    Connect { url: String, message: String },

    #[error("Stream transport failure: {message}")]
    Transport { message: String },

    #[error("Stream closed")]
    Closed,
}

/// Reasons an inbound message is dropped instead of buffered
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EnvelopeError {
    #[error("Malformed envelope: {message}")]
    Malformed { message: String },

    #[error("Server reported an error: {message}")]
    ErrorEnvelope { message: String },

    #[error("Envelope is missing `{missing}`")]
    Incomplete { missing: &'static str },
}

/// Configuration errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Invalid backend URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Result type alias for RiskLens operations
pub type RlResult<T> = Result<T, RlError>;

/// Macro for creating internal errors
#[macro_export]
macro_rules! internal_error {
    ($($arg:tt)*) => {
        $crate::RlError::Internal(format!($($arg)*))
    };
}
