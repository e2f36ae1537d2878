//! Resilience helpers.
//!
//! # Design Decisions
//! - Only session creation is retried; invocations are not idempotent
//! - Backoff is exponential, capped, with a small jitter so clients that
//!   timed out together do not retry together

pub mod backoff;

pub use backoff::backoff_delay;
