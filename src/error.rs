//! Protocol error taxonomy and the wire failure descriptor.
//!
//! Every server-side failure ends up as a [`Failure`] value marshalled into an
//! exception response, so a client can always tell "the server rejected the
//! shape of my request" apart from "the handler threw".

use std::fmt;
use std::time::Duration;

use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::handler::HandlerError;
use crate::session::SessionId;

/// Client-visible classification of a failure, carried inside [`Failure`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureKind {
    MalformedTarget,
    UnresolvableType,
    UnsupportedMediaType,
    TruncatedBody,
    UnexpectedTrailingData,
    CorruptPayload,
    SessionNotFound,
    /// The server gave up on the request before it completed.
    Timeout,
    /// Raised by the invocation handler; contents are not interpreted.
    Application,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::MalformedTarget => "malformed_target",
            FailureKind::UnresolvableType => "unresolvable_type",
            FailureKind::UnsupportedMediaType => "unsupported_media_type",
            FailureKind::TruncatedBody => "truncated_body",
            FailureKind::UnexpectedTrailingData => "unexpected_trailing_data",
            FailureKind::CorruptPayload => "corrupt_payload",
            FailureKind::SessionNotFound => "session_not_found",
            FailureKind::Timeout => "timeout",
            FailureKind::Application => "application",
        }
    }

    /// True for failures caused by the shape of the request itself.
    /// These are never retried.
    pub fn is_request_shape(&self) -> bool {
        !matches!(
            self,
            FailureKind::SessionNotFound | FailureKind::Timeout | FailureKind::Application
        )
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Marshalled representation of a caught failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    pub kind: FailureKind,
    /// Type name of the failure as raised (e.g. `java.lang.IllegalStateException`).
    pub type_name: String,
    pub message: String,
}

impl Failure {
    pub fn new(kind: FailureKind, type_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            type_name: type_name.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.kind, self.type_name, self.message)
    }
}

/// Errors raised while encoding, decoding or dispatching protocol messages.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Not enough path segments, or a segment that cannot be parsed.
    #[error("malformed target: {0}")]
    MalformedTarget(String),

    /// A view or parameter type name is not in the type registry.
    #[error("unresolvable type {0}")]
    UnresolvableType(String),

    #[error("unsupported content type {}", .0.as_deref().unwrap_or("<none>"))]
    UnsupportedMediaType(Option<String>),

    #[error("body ended before all expected values were read")]
    TruncatedBody,

    #[error("unexpected data after the last expected value")]
    UnexpectedTrailingData,

    #[error("corrupt payload: {0}")]
    CorruptPayload(String),

    /// Caller-side mismatch between a method signature and its arguments.
    #[error("{actual} arguments supplied for {expected} parameter types")]
    ArgumentCount { expected: usize, actual: usize },

    #[error("no such session {0}")]
    SessionNotFound(SessionId),

    /// Client-local: the session open request did not complete in time.
    #[error("session open timed out after {0:?}")]
    SessionCreateTimeout(Duration),

    /// Server-side: reading or dispatching the request exceeded the request timeout.
    #[error("request not completed within {0:?}")]
    RequestTimeout(Duration),

    #[error("handler failed: {0}")]
    Handler(#[from] HandlerError),
}

impl ProtocolError {
    pub fn malformed(message: impl Into<String>) -> Self {
        ProtocolError::MalformedTarget(message.into())
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            ProtocolError::MalformedTarget(_) | ProtocolError::ArgumentCount { .. } => {
                FailureKind::MalformedTarget
            }
            ProtocolError::UnresolvableType(_) => FailureKind::UnresolvableType,
            ProtocolError::UnsupportedMediaType(_) => FailureKind::UnsupportedMediaType,
            ProtocolError::TruncatedBody => FailureKind::TruncatedBody,
            ProtocolError::UnexpectedTrailingData => FailureKind::UnexpectedTrailingData,
            ProtocolError::CorruptPayload(_) => FailureKind::CorruptPayload,
            ProtocolError::SessionNotFound(_) => FailureKind::SessionNotFound,
            ProtocolError::RequestTimeout(_) => FailureKind::Timeout,
            // Never sent by a server; reported as an application failure if it ever is.
            ProtocolError::SessionCreateTimeout(_) | ProtocolError::Handler(_) => {
                FailureKind::Application
            }
        }
    }

    /// HTTP status used when this error is answered by the server.
    pub fn status(&self) -> StatusCode {
        match self.kind() {
            FailureKind::SessionNotFound => StatusCode::NOT_FOUND,
            FailureKind::Timeout => StatusCode::SERVICE_UNAVAILABLE,
            FailureKind::Application => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }

    /// Convert into the descriptor marshalled into exception responses.
    pub fn to_failure(&self) -> Failure {
        match self {
            ProtocolError::Handler(err) => Failure::new(
                FailureKind::Application,
                err.type_name.clone(),
                err.message.clone(),
            ),
            other => Failure::new(other.kind(), "ProtocolError", other.to_string()),
        }
    }
}
