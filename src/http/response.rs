//! Response encoding.
//!
//! # Responsibilities
//! - Pick the response content type for an outcome
//! - Frame the body: one marshalled value, plus a zero terminator for
//!   invocation and exception responses
//! - Attach the affinity cookie when one is due
//! - Map failures to status codes
//!
//! # Design Decisions
//! - Encoding never fails: a value that cannot be marshalled turns into an
//!   exception response, so the client always gets a decodable body

use axum::body::Body;
use axum::http::header::{CONTENT_TYPE, SET_COOKIE};
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;

use crate::affinity::{AffinityToken, AffinityTracker};
use crate::error::{Failure, FailureKind, ProtocolError};
use crate::marshal::{MarshallingConfig, Value};
use crate::protocol::{ResponseKind, StatefulLocator};

/// Terminator written after the value of invocation and exception responses.
pub const TERMINATOR: u8 = 0;

/// Result of handling one request.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Success(Value),
    NewSession(StatefulLocator),
    Affinity,
    Failure { status: StatusCode, failure: Failure },
}

impl Outcome {
    pub fn from_error(err: &ProtocolError) -> Self {
        Outcome::Failure {
            status: err.status(),
            failure: err.to_failure(),
        }
    }
}

/// A fully framed response, independent of the HTTP stack.
#[derive(Debug, Clone)]
pub struct EncodedResponse {
    pub status: StatusCode,
    pub kind: ResponseKind,
    pub body: Bytes,
    pub set_cookie: Option<HeaderValue>,
}

impl EncodedResponse {
    pub fn content_type(&self) -> &'static str {
        self.kind.content_type()
    }
}

impl IntoResponse for EncodedResponse {
    fn into_response(self) -> Response {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;
        response
            .headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static(self.kind.content_type()));
        if let Some(cookie) = self.set_cookie {
            response.headers_mut().insert(SET_COOKIE, cookie);
        }
        response
    }
}

#[derive(Debug, Clone)]
pub struct ResponseEncoder {
    marshalling: MarshallingConfig,
    affinity: AffinityTracker,
}

impl ResponseEncoder {
    pub fn new(marshalling: MarshallingConfig, affinity: AffinityTracker) -> Self {
        Self {
            marshalling,
            affinity,
        }
    }

    pub fn encode(&self, outcome: Outcome, cookie: Option<AffinityToken>) -> EncodedResponse {
        let set_cookie = cookie.as_ref().and_then(|token| self.affinity.set_cookie(token));
        let framed = match outcome {
            Outcome::Success(value) => self
                .frame(ResponseKind::Invocation, &value)
                .map(|body| (StatusCode::OK, ResponseKind::Invocation, body)),
            Outcome::NewSession(locator) => self
                .frame(ResponseKind::NewSession, &Value::Locator(locator))
                .map(|body| (StatusCode::OK, ResponseKind::NewSession, body)),
            Outcome::Affinity => Ok((StatusCode::OK, ResponseKind::Affinity, Bytes::new())),
            Outcome::Failure { status, failure } => Ok((status, ResponseKind::Exception, self.frame_failure(failure))),
        };

        let (status, kind, body) = framed.unwrap_or_else(|err| {
            tracing::error!(error = %err, "Failed to marshal response value");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                ResponseKind::Exception,
                self.frame_failure(err.to_failure()),
            )
        });

        EncodedResponse {
            status,
            kind,
            body,
            set_cookie,
        }
    }

    fn frame(&self, kind: ResponseKind, value: &Value) -> Result<Bytes, ProtocolError> {
        let mut out = self.marshalling.marshaller();
        out.write_value(value)?;
        if kind.has_terminator() {
            out.write_byte(TERMINATOR);
        }
        Ok(out.finish())
    }

    fn frame_failure(&self, failure: Failure) -> Bytes {
        match self.frame(ResponseKind::Exception, &Value::Failure(failure)) {
            Ok(body) => body,
            Err(err) => {
                // Only an absurdly long failure message gets here; send a short one.
                tracing::error!(error = %err, "Failed to marshal failure");
                let fallback = Failure::new(FailureKind::Application, "ProtocolError", "failure too large to marshal");
                let mut out = self.marshalling.marshaller();
                if let Err(err) = out.write_value(&Value::Failure(fallback)) {
                    tracing::error!(error = %err, "Failed to marshal fallback failure");
                }
                out.write_byte(TERMINATOR);
                out.finish()
            }
        }
    }
}
