//! Marshalling subsystem.
//!
//! # Data Flow
//! ```text
//! Value (typed in registry.rs)
//!     → stream.rs (Marshaller: version header, values, raw bytes)
//!     → packed.rs (variable-length counts)
//!     → bytes on the wire
//!
//! bytes from the wire
//!     → stream.rs (Unmarshaller: header check, values, trailing data check)
//!     → Value
//! ```
//!
//! # Design Decisions
//! - One fixed stream version per protocol version; mismatches are corrupt payloads
//! - Framework types (locators, session ids, affinities, failures) have their
//!   own `Value` variants and travel as a compact variant index, never by name
//! - Type names from the wire resolve only through the registry built at startup

pub mod packed;
pub mod registry;
pub mod stream;
pub mod value;

pub use registry::{TypeKind, TypeRegistry};
pub use stream::{MarshallingConfig, Marshaller, Unmarshaller, STREAM_VERSION};
pub use value::Value;
