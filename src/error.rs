//! Error types for yogpod-dl
//!
//! This module provides the error taxonomy for the whole pipeline:
//! - Domain-specific error types (feed retrieval/parsing, episode downloads)
//! - Exit status mapping for the command line front end
//! - Context information (URL, HTTP status, series name, etc.)

use thiserror::Error;

/// Result type alias for yogpod-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for yogpod-dl
///
/// Lower layers return these without printing anything; the binary is the only place
/// that decides whether an error aborts the run.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "data_dir")
        key: Option<String>,
    },

    /// A series title pattern failed to compile
    #[error("invalid pattern for series '{series}': {source}")]
    InvalidPattern {
        /// Series whose pattern is broken
        series: String,
        /// Underlying regex compilation error
        #[source]
        source: regex::Error,
    },

    /// Feed retrieval or parsing error
    #[error("feed error: {0}")]
    Feed(#[from] FeedError),

    /// Episode download error
    #[error("download error: {0}")]
    Download(#[from] DownloadError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// External tool execution failed (yt-dlp)
    #[error("external tool error: {0}")]
    ExternalTool(String),

    /// Operation not supported (missing binary, etc.)
    #[error("not supported: {0}")]
    NotSupported(String),

    /// The run was interrupted by a termination signal
    #[error("interrupted ({signal})")]
    Interrupted {
        /// Name of the signal that stopped the run (e.g., "SIGINT")
        signal: String,
    },

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Feed retrieval and parsing errors
#[derive(Debug, Error)]
pub enum FeedError {
    /// The feed endpoint answered with a non-success status
    #[error("fetching {url} returned HTTP {status}")]
    Fetch {
        /// Feed URL
        url: String,
        /// HTTP status code
        status: u16,
    },

    /// The document is not a well-formed syndication document
    #[error("malformed feed: {0}")]
    Malformed(String),

    /// An enclosure length attribute is not a non-negative integer
    #[error("invalid enclosure length '{value}' for '{title}'")]
    InvalidLength {
        /// Title of the offending item
        title: String,
        /// Raw attribute value
        value: String,
    },
}

/// Episode download errors
#[derive(Debug, Error)]
pub enum DownloadError {
    /// Server answered with a 4xx/5xx status
    #[error("GET {url} returned HTTP {status}")]
    HttpStatus {
        /// Source URL
        url: String,
        /// HTTP status code
        status: u16,
    },

    /// The response body stream broke mid-transfer
    #[error("transfer of {url} failed: {reason}")]
    Stream {
        /// Source URL
        url: String,
        /// Underlying failure
        reason: String,
    },
}

/// Map errors to process exit codes
///
/// `0` is reserved for success; every error maps to a non-zero status.
pub trait ToExitCode {
    /// Process exit status for this error
    fn exit_code(&self) -> i32;

    /// Machine-readable error code, used in log records
    fn error_code(&self) -> &str;
}

/// Exit status for fatal runtime failures
pub const EXIT_FATAL: i32 = 1;
/// Exit status for configuration or usage errors
pub const EXIT_CONFIG: i32 = 2;
/// Exit status after an external interruption
pub const EXIT_INTERRUPTED: i32 = 130;

impl ToExitCode for Error {
    fn exit_code(&self) -> i32 {
        match self {
            Error::Config { .. } | Error::InvalidPattern { .. } => EXIT_CONFIG,
            Error::Interrupted { .. } => EXIT_INTERRUPTED,
            Error::Feed(_)
            | Error::Download(_)
            | Error::Io(_)
            | Error::Network(_)
            | Error::Serialization(_)
            | Error::ExternalTool(_)
            | Error::NotSupported(_)
            | Error::Other(_) => EXIT_FATAL,
        }
    }

    fn error_code(&self) -> &str {
        match self {
            Error::Config { .. } => "config_error",
            Error::InvalidPattern { .. } => "invalid_pattern",
            Error::Feed(e) => match e {
                FeedError::Fetch { .. } => "feed_fetch_failed",
                FeedError::Malformed(_) => "feed_malformed",
                FeedError::InvalidLength { .. } => "feed_invalid_length",
            },
            Error::Download(e) => match e {
                DownloadError::HttpStatus { .. } => "download_http_status",
                DownloadError::Stream { .. } => "download_stream_failed",
            },
            Error::Io(_) => "io_error",
            Error::Network(_) => "network_error",
            Error::Serialization(_) => "serialization_error",
            Error::ExternalTool(_) => "external_tool_error",
            Error::NotSupported(_) => "not_supported",
            Error::Interrupted { .. } => "interrupted",
            Error::Other(_) => "internal_error",
        }
    }
}

impl Error {
    /// Shorthand for a configuration error tied to a key
    pub fn config(message: impl Into<String>, key: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.into()),
        }
    }

    /// Whether this error came from an external interruption
    pub fn is_interrupted(&self) -> bool {
        matches!(self, Error::Interrupted { .. })
    }
}
