//! Session identifiers.

use std::fmt;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ProtocolError;

/// Opaque identifier of one stateful component instance.
///
/// Travels in the request path as unpadded URL-safe base64 so it never
/// contains `/` or collides with the `-` placeholder.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(Vec<u8>);

impl SessionId {
    /// Mint a fresh random identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().as_bytes().to_vec())
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Path segment form.
    pub fn encode(&self) -> String {
        URL_SAFE_NO_PAD.encode(&self.0)
    }

    pub fn decode(segment: &str) -> Result<Self, ProtocolError> {
        if segment.is_empty() {
            return Err(ProtocolError::malformed("empty session id segment"));
        }
        URL_SAFE_NO_PAD
            .decode(segment)
            .map(Self)
            .map_err(|e| ProtocolError::malformed(format!("invalid session id {}: {}", segment, e)))
    }

    /// Read the session segment of an inbound request.
    ///
    /// Ids minted elsewhere need not be base64url; anything that does not
    /// decode is kept as its raw bytes and simply matches no session here.
    pub fn from_segment(segment: &str) -> Self {
        match URL_SAFE_NO_PAD.decode(segment) {
            Ok(bytes) if !bytes.is_empty() => Self(bytes),
            _ => Self(segment.as_bytes().to_vec()),
        }
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl fmt::Debug for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionId({})", self.encode())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_ids_differ() {
        let a = SessionId::generate();
        let b = SessionId::generate();
        assert_ne!(a, b);
        assert_eq!(a.as_bytes().len(), 16);
    }

    #[test]
    fn test_path_form() {
        let id = SessionId::generate();
        let segment = id.encode();
        assert!(!segment.contains('/'));
        assert!(!segment.contains('='));
        assert_ne!(segment, "-");
        assert_eq!(SessionId::decode(&segment).unwrap(), id);
    }

    #[test]
    fn test_invalid_segment() {
        assert!(matches!(SessionId::decode(""), Err(ProtocolError::MalformedTarget(_))));
        assert!(matches!(SessionId::decode("not*base64"), Err(ProtocolError::MalformedTarget(_))));
    }

    #[test]
    fn test_foreign_segment_kept_as_bytes() {
        let id = SessionId::generate();
        assert_eq!(SessionId::from_segment(&id.encode()), id);

        for foreign in ["abcde", "sid.1", "SFSB_ID"] {
            let parsed = SessionId::from_segment(foreign);
            assert!(!parsed.is_empty());
            assert_ne!(parsed.as_bytes().len(), 16);
        }
        assert_eq!(SessionId::from_segment("sid.1").as_bytes(), b"sid.1");
    }
}
