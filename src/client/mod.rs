//! Client side of the tunnel.
//!
//! # Data Flow
//! ```text
//! InvocationEnvelope / SessionOpenRequest
//!     → EnvelopeCodec (path + body)
//!     → client.rs (reqwest POST, Cookie header with the caller's affinity)
//!     → response.rs (content type, status, framed value, terminator)
//!     → Value / StatefulLocator / remote Failure
//! ```
//!
//! # Design Decisions
//! - No cookie jar: the affinity token is threaded explicitly by the caller
//!   and every response hands back the token the server asked for
//! - Only session creation has a client-side deadline; it is the one call
//!   that is safe to retry

pub mod client;
pub mod response;

use thiserror::Error;

use crate::error::{Failure, ProtocolError};

pub use client::{InvocationClient, InvocationResult, OpenedSession};
pub use response::decode_response;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("invalid response type: expected {expected}, got {actual:?}")]
    InvalidResponseType {
        expected: &'static str,
        actual: Option<String>,
    },

    #[error("invalid response code {0}")]
    InvalidResponseCode(u16),

    #[error("unexpected data in response")]
    UnexpectedDataInResponse,

    #[error("no session id in response")]
    NoSessionIdInResponse,

    #[error("no affinity cookie in response")]
    NoAffinityInResponse,

    #[error("remote failure (status {status}): {failure}")]
    Remote { status: u16, failure: Failure },
}

impl ClientError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, ClientError::Protocol(ProtocolError::SessionCreateTimeout(_)))
    }

    /// The failure the server sent back, if it sent one.
    pub fn failure(&self) -> Option<&Failure> {
        match self {
            ClientError::Remote { failure, .. } => Some(failure),
            _ => None,
        }
    }
}
