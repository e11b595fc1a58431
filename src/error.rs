//! Error types for depot-resolver
//!
//! This module provides the error taxonomy shared by every resolver:
//! - Transport failures (network, DNS, timeout, non-success HTTP status)
//! - Protocol failures (unexpected JSON shape or status field)
//! - Empty results (parsed fine, nothing usable)
//! - Local I/O failures (key cache, artifact file)
//! - Missing titles in a remote index
//!
//! Each variant carries enough context (URL, path, title id) to produce a
//! single descriptive message for the UI or CLI layer.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for depot-resolver operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for depot-resolver
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "sources.manifest_index")
        key: Option<String>,
    },

    /// Network, DNS, timeout or HTTP status failure talking to one URL
    #[error("transport error for {url}: {message}")]
    Transport {
        /// The URL that was requested
        url: String,
        /// What went wrong
        message: String,
    },

    /// Response had an unexpected shape or status field
    #[error("protocol error: {message}")]
    Protocol {
        /// Description of the unexpected response
        message: String,
    },

    /// Response parsed but carried no usable data
    #[error("empty result: {message}")]
    EmptyResult {
        /// Which source or document came back empty
        message: String,
    },

    /// Local file read/write failure (key cache, artifact, config)
    #[error("I/O error on {}: {source}", path.display())]
    LocalIo {
        /// The file or directory involved
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Title id absent from a remote index
    #[error("not found: {what}")]
    NotFound {
        /// What was looked up (e.g., "title 730 in manifest index")
        what: String,
    },

    /// Title id is not a non-empty run of digits
    #[error("invalid title id '{title_id}': expected digits only")]
    InvalidTitleId {
        /// The rejected id
        title_id: String,
    },

    /// Every configured key source failed; wraps the last individual failure
    #[error("all {attempted} key sources failed, last error: {last}")]
    SourcesExhausted {
        /// Number of sources that were tried
        attempted: usize,
        /// The failure reported by the last source
        #[source]
        last: Box<Error>,
    },

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Coarse failure classes used to report errors to callers
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Network/DNS/timeout
    Transport,
    /// Unexpected JSON shape or status field
    Protocol,
    /// Parsed successfully but no usable data
    EmptyResult,
    /// Cache or artifact read/write failure
    LocalIo,
    /// Title id absent from an index
    NotFound,
    /// Invalid or incomplete configuration
    Config,
    /// Caller passed an unusable argument
    InvalidInput,
}

impl Error {
    /// Build a [`Error::LocalIo`] for `path`
    pub fn local_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::LocalIo {
            path: path.into(),
            source,
        }
    }

    /// Build a [`Error::Config`] naming the offending key
    pub fn config(key: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.into()),
        }
    }

    /// Failure class of this error
    ///
    /// [`Error::SourcesExhausted`] reports the class of its last failure, so an
    /// exhausted mirror list surfaces as either a transport or an empty-result
    /// failure.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Config { .. } => ErrorKind::Config,
            Error::Transport { .. } => ErrorKind::Transport,
            Error::Protocol { .. } | Error::Serialization(_) => ErrorKind::Protocol,
            Error::EmptyResult { .. } => ErrorKind::EmptyResult,
            Error::LocalIo { .. } => ErrorKind::LocalIo,
            Error::NotFound { .. } => ErrorKind::NotFound,
            Error::InvalidTitleId { .. } => ErrorKind::InvalidInput,
            Error::SourcesExhausted { last, .. } => match last.kind() {
                ErrorKind::EmptyResult => ErrorKind::EmptyResult,
                _ => ErrorKind::Transport,
            },
        }
    }

    /// Machine-readable error code
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::Config { .. } => "config_error",
            Error::Transport { .. } => "transport_error",
            Error::Protocol { .. } => "protocol_error",
            Error::EmptyResult { .. } => "empty_result",
            Error::LocalIo { .. } => "local_io_error",
            Error::NotFound { .. } => "not_found",
            Error::InvalidTitleId { .. } => "invalid_title_id",
            Error::SourcesExhausted { .. } => "sources_exhausted",
            Error::Serialization(_) => "serialization_error",
        }
    }
}
