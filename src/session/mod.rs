//! Stateful session subsystem.
//!
//! # Data Flow
//! ```text
//! session-create request
//!     → registry.rs (mint id.rs SessionId, ask provider for backing state)
//!     → StatefulLocator returned to the client
//!
//! invocation naming a session
//!     → registry.rs (lookup, acquire the per-session lock)
//!     → handler runs with exclusive access to that session's state
//!     → lock released when the invocation completes
//! ```
//!
//! # Design Decisions
//! - The registry is owned by the dispatcher, never a process-wide static
//! - One lock per session entry; different sessions never contend
//! - Ids come from a random generator and are never handed out twice

pub mod id;
pub mod registry;

pub use id::SessionId;
pub use registry::{
    SessionGuard, SessionPhase, SessionRegistry, SessionState, SessionStateProvider,
    UnitStateProvider,
};
