//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (Axum setup, limits, timeouts, tracing)
//!     → request.rs (request ID)
//!     → dispatcher.rs (classify by content type, decode, sessions, affinity, handler)
//!     → response.rs (content type, framed body, Set-Cookie, status)
//!     → Send to client
//! ```

pub mod dispatcher;
pub mod request;
pub mod response;
pub mod server;

pub use dispatcher::{InboundRequest, RequestDispatcher};
pub use request::{request_id, X_REQUEST_ID};
pub use response::{EncodedResponse, Outcome, ResponseEncoder};
pub use server::HttpServer;
