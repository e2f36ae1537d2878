//! Invocation wire protocol, version one.
//!
//! # Data Flow
//! ```text
//! Client:
//!     InvocationEnvelope
//!         → envelope.rs (path segments + body framing)
//!         → headers.rs (content-type discriminator)
//!         → HTTP request
//!
//! Server:
//!     HTTP request
//!         → headers.rs (classify request kind)
//!         → target.rs (placeholder segments, component target)
//!         → envelope.rs (decode arguments and attachments)
//!         → InvocationEnvelope
//! ```
//!
//! # Design Decisions
//! - Transport independent: the codec sees path segments and bytes only
//! - Argument count is always the number of parameter types in the path
//! - The attachment count is always written, even when zero

pub mod envelope;
pub mod headers;
pub mod target;

pub use envelope::{DecodedRequest, EncodedRequest, EnvelopeCodec, InvocationEnvelope, SessionOpenRequest};
pub use headers::{RequestKind, ResponseKind};
pub use target::{ComponentTarget, MethodSignature, StatefulLocator, PLACEHOLDER};
