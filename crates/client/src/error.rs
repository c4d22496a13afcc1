//! Error taxonomy of the client.
//!
//! Construction failures (`Validation`, `ImmutableProperty`) are raised
//! before anything is dispatched. Outcomes the protocol itself defines
//! (401, 404) are not errors; they come back as the status of a reply.

use dwn_protocol::ProtocolError;
use thiserror::Error;

/// Client error type.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed or unparseable input, detected before dispatch.
    #[error("validation failed: {0}")]
    Validation(String),

    /// An update tried to change a property fixed at creation.
    #[error("{property} is an immutable property and cannot be updated")]
    ImmutableProperty {
        /// The descriptor property that was touched.
        property: &'static str,
    },

    /// No usable signing key for the acting DID.
    #[error("authorization failed: {0}")]
    Authorization(String),

    /// The target has no such record.
    #[error("not found: {0}")]
    NotFound(String),

    /// A handle was used in a state that does not allow the operation.
    #[error("invalid operation: {0}")]
    Operation(String),

    /// The message could not be delivered or the reply was unusable.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Failures below the protocol: endpoints, connections, framing of replies.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The endpoint could not be reached.
    #[error("endpoint unreachable: {0}")]
    Unreachable(String),

    /// The request did not complete in time.
    #[error("request timed out: {0}")]
    Timeout(String),

    /// The reply could not be understood.
    #[error("malformed response: {0}")]
    Malformed(String),

    /// The endpoint answered with a JSON-RPC error.
    #[error("rpc error {code}: {message}")]
    Rpc {
        /// JSON-RPC error code.
        code: i64,
        /// Error message.
        message: String,
    },

    /// A data fetch was answered with a status other than 200, 401 or 404.
    #[error("unexpected status {code}: {detail}")]
    UnexpectedStatus {
        /// Status code.
        code: u16,
        /// Status detail.
        detail: String,
    },

    /// No node is known behind an endpoint.
    #[error("unknown endpoint: {0}")]
    UnknownEndpoint(String),

    /// The target DID could not be resolved to a node endpoint.
    #[error("cannot resolve {did}: {reason}")]
    Resolution {
        /// The DID being resolved.
        did: String,
        /// Why resolution failed.
        reason: String,
    },
}

/// Result type alias for client operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<ProtocolError> for Error {
    fn from(err: ProtocolError) -> Self {
        match err {
            ProtocolError::InvalidSignature(_) | ProtocolError::InvalidPublicKey(_) => {
                Error::Authorization(err.to_string())
            }
            _ => Error::Validation(err.to_string()),
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout(err.to_string())
        } else if err.is_decode() {
            TransportError::Malformed(err.to_string())
        } else {
            TransportError::Unreachable(err.to_string())
        }
    }
}
