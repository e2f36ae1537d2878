//! Sticky routing.
//!
//! # Data Flow
//! ```text
//! Cookie header
//!     → tracker.rs on_request (existing token, or a fresh one for this node)
//!     → handler may pick a different token for this response
//!     → tracker.rs on_response (Set-Cookie scoped to the base path)
//! ```
//!
//! # Design Decisions
//! - Affinity names a server, not a component instance; it is independent
//!   of session ids and works for stateless calls too
//! - The token is passed explicitly through request and response types
//! - Tokens carry the node route as a `.node` suffix so a front door can
//!   route on the cookie alone

pub mod tracker;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use tracker::{AffinityTracker, EffectiveAffinity};

/// Cookie value naming the server that should see subsequent calls.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AffinityToken(String);

impl AffinityToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Fresh token routed to `node`.
    pub fn generate(node: &str) -> Self {
        Self(format!("{}.{}", uuid::Uuid::new_v4().simple(), node))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Node route suffix, if the token carries one.
    pub fn route(&self) -> Option<&str> {
        self.0
            .rsplit_once('.')
            .map(|(_, route)| route)
            .filter(|route| !route.is_empty())
    }
}

impl fmt::Display for AffinityToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Affinity recorded in locators. `None` and `Local` are well-known
/// singletons and travel as a bare variant index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Affinity {
    #[default]
    None,
    Local,
    Node(String),
    Cluster(String),
    Uri(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_token_routes_to_node() {
        let token = AffinityToken::generate("node1");
        assert_eq!(token.route(), Some("node1"));
        assert_ne!(token, AffinityToken::generate("node1"));
    }

    #[test]
    fn test_route_of_opaque_token() {
        assert_eq!(AffinityToken::new("initial-session-affinity").route(), None);
        assert_eq!(AffinityToken::new("abc.").route(), None);
    }
}
