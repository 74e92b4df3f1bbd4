//! Error taxonomy for the upstream OBS session.

use thiserror::Error;

/// Failure establishing the control session.
#[derive(Debug, Error)]
pub enum ConnectError {
    /// OBS rejected the authentication challenge (close code 4009).
    #[error("authentication rejected by OBS")]
    Auth,
    /// The host was unreachable, the dial timed out, or the handshake broke.
    #[error("{0}")]
    Network(String),
}

/// Failure of a single request over an (expected) active session.
#[derive(Debug, Error)]
pub enum CallError {
    /// No session currently holds the upstream slot.
    #[error("no active OBS session")]
    NotConnected,
    /// OBS accepted the request frame but rejected the request.
    #[error("OBS rejected the request: {message} (code {code})")]
    Upstream { code: u16, message: String },
    /// The session closed underneath the request.
    #[error("session closed")]
    Closed,
    /// No response arrived within the request timeout.
    #[error("request timed out")]
    Timeout,
    /// The response arrived but did not have the expected shape.
    #[error("malformed response: {0}")]
    Malformed(String),
}
