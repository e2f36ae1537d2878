//! Pluggable invocation handling.
//!
//! The dispatcher decodes a request into an [`Invocation`] and hands it to an
//! [`InvocationHandler`]. What the handler does with it (dispatch to a real
//! component, echo it back, fail) is outside the protocol layer.

pub mod echo;

use async_trait::async_trait;
use thiserror::Error;

use crate::affinity::AffinityToken;
use crate::marshal::Value;
use crate::protocol::InvocationEnvelope;
use crate::session::SessionGuard;

pub use echo::{CounterStateProvider, EchoHandler};

/// Failure raised by a handler. Marshalled back to the client as-is.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{type_name}: {message}")]
pub struct HandlerError {
    pub type_name: String,
    pub message: String,
}

impl HandlerError {
    pub fn new(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            message: message.into(),
        }
    }

    pub fn illegal_state(message: impl Into<String>) -> Self {
        Self::new("java.lang.IllegalStateException", message)
    }

    pub fn illegal_argument(message: impl Into<String>) -> Self {
        Self::new("java.lang.IllegalArgumentException", message)
    }
}

/// A decoded call, ready for dispatch.
#[derive(Debug)]
pub struct Invocation {
    pub envelope: InvocationEnvelope,
    /// Affinity token in effect for this request.
    pub affinity: AffinityToken,
    /// Exclusive access to the named session, for stateful targets.
    pub session: Option<SessionGuard>,
}

impl Invocation {
    pub fn method_name(&self) -> &str {
        &self.envelope.method.name
    }

    pub fn arguments(&self) -> &[Value] {
        &self.envelope.arguments
    }

    pub fn session_mut(&mut self) -> Option<&mut SessionGuard> {
        self.session.as_mut()
    }
}

/// Response-side choices a handler can make besides its return value.
#[derive(Debug, Default)]
pub struct InvocationOutput {
    affinity: Option<AffinityToken>,
}

impl InvocationOutput {
    /// Route subsequent calls from this client with `token`.
    pub fn set_session_affinity(&mut self, token: AffinityToken) {
        self.affinity = Some(token);
    }

    pub fn session_affinity(&self) -> Option<&AffinityToken> {
        self.affinity.as_ref()
    }

    pub(crate) fn take_affinity(&mut self) -> Option<AffinityToken> {
        self.affinity.take()
    }
}

#[async_trait]
pub trait InvocationHandler: Send + Sync + 'static {
    async fn handle(
        &self,
        invocation: &mut Invocation,
        output: &mut InvocationOutput,
    ) -> Result<Value, HandlerError>;
}
