//! Error types for subject-mux.

use thiserror::Error;

/// Main error type for all subject-mux operations.
#[derive(Debug, Error)]
pub enum MuxError {
    /// The request carried no reply target, so there is nowhere to respond.
    #[error("No reply target on request")]
    NoReplyTarget,

    /// Nobody is waiting on the reply target.
    #[error("No responders waiting on {0}")]
    NoResponders(String),

    /// `respond` was already called for this request.
    #[error("Request already responded")]
    AlreadyResponded,

    /// Transport closed unexpectedly.
    #[error("Connection closed")]
    ConnectionClosed,

    /// Transport stayed full for longer than the send timeout.
    #[error("Send timeout")]
    SendTimeout,

    /// No reply arrived for a request on the given subject.
    #[error("Request timeout on subject {0}")]
    RequestTimeout(String),

    /// Configuration could not be parsed.
    #[error("Config error: {0}")]
    Config(#[from] serde_json::Error),
}

/// Result type alias using MuxError.
pub type Result<T> = std::result::Result<T, MuxError>;
