//! HTTP invocation tunnel.
//!
//! Carries remote method invocations against server-side components over
//! plain HTTP: a client opens stateful sessions, invokes methods with
//! marshalled arguments and receives marshalled results or failures, while an
//! affinity cookie keeps its calls on the node that holds its sessions.

pub mod affinity;
pub mod client;
pub mod config;
pub mod error;
pub mod handler;
pub mod http;
pub mod lifecycle;
pub mod marshal;
pub mod net;
pub mod observability;
pub mod protocol;
pub mod resilience;
pub mod session;

pub use client::{ClientError, InvocationClient};
pub use config::schema::TunnelConfig;
pub use error::{Failure, FailureKind, ProtocolError};
pub use handler::{HandlerError, Invocation, InvocationHandler, InvocationOutput};
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use marshal::Value;
