//! Content-type discriminators.
//!
//! The content type of every request and response names both the message
//! kind and the protocol version. Nothing is negotiated: an unknown value is
//! rejected outright.

use crate::error::ProtocolError;

pub const INVOCATION_REQUEST: &str = "application/x-invocation-request;version=1";
pub const SESSION_CREATE_REQUEST: &str = "application/x-session-create-request;version=1";
pub const AFFINITY_QUERY: &str = "application/x-affinity-query;version=1";

pub const INVOCATION_RESPONSE: &str = "application/x-invocation-response;version=1";
pub const NEW_SESSION_RESPONSE: &str = "application/x-new-session-response;version=1";
pub const AFFINITY_RESPONSE: &str = "application/x-affinity-response;version=1";
pub const EXCEPTION_RESPONSE: &str = "application/x-exception-response;version=1";

/// Lowercase and drop whitespace so `a/b; version=1` matches `a/b;version=1`.
fn normalize(content_type: &str) -> String {
    content_type
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    Invocation,
    SessionCreate,
    AffinityQuery,
}

impl RequestKind {
    pub fn from_content_type(content_type: Option<&str>) -> Result<Self, ProtocolError> {
        let unsupported = || ProtocolError::UnsupportedMediaType(content_type.map(str::to_string));
        let normalized = normalize(content_type.ok_or_else(unsupported)?);
        match normalized.as_str() {
            INVOCATION_REQUEST => Ok(RequestKind::Invocation),
            SESSION_CREATE_REQUEST => Ok(RequestKind::SessionCreate),
            AFFINITY_QUERY => Ok(RequestKind::AffinityQuery),
            _ => Err(unsupported()),
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            RequestKind::Invocation => INVOCATION_REQUEST,
            RequestKind::SessionCreate => SESSION_CREATE_REQUEST,
            RequestKind::AffinityQuery => AFFINITY_QUERY,
        }
    }

    /// Minimum number of path segments a request of this kind must carry.
    pub fn min_segments(&self) -> usize {
        match self {
            RequestKind::Invocation => 7,
            RequestKind::SessionCreate => 5,
            RequestKind::AffinityQuery => 0,
        }
    }

    /// Metric/log label.
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestKind::Invocation => "invocation",
            RequestKind::SessionCreate => "session_create",
            RequestKind::AffinityQuery => "affinity_query",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponseKind {
    Invocation,
    NewSession,
    Affinity,
    Exception,
}

impl ResponseKind {
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        match normalize(content_type).as_str() {
            INVOCATION_RESPONSE => Some(ResponseKind::Invocation),
            NEW_SESSION_RESPONSE => Some(ResponseKind::NewSession),
            AFFINITY_RESPONSE => Some(ResponseKind::Affinity),
            EXCEPTION_RESPONSE => Some(ResponseKind::Exception),
            _ => None,
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ResponseKind::Invocation => INVOCATION_RESPONSE,
            ResponseKind::NewSession => NEW_SESSION_RESPONSE,
            ResponseKind::Affinity => AFFINITY_RESPONSE,
            ResponseKind::Exception => EXCEPTION_RESPONSE,
        }
    }

    /// Whether the body ends with a zero terminator byte.
    pub fn has_terminator(&self) -> bool {
        matches!(self, ResponseKind::Invocation | ResponseKind::Exception)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_classification() {
        assert_eq!(
            RequestKind::from_content_type(Some(INVOCATION_REQUEST)).unwrap(),
            RequestKind::Invocation
        );
        assert_eq!(
            RequestKind::from_content_type(Some("Application/X-Session-Create-Request; version=1")).unwrap(),
            RequestKind::SessionCreate
        );
        assert_eq!(
            RequestKind::from_content_type(Some(AFFINITY_QUERY)).unwrap(),
            RequestKind::AffinityQuery
        );
    }

    #[test]
    fn test_unknown_content_type() {
        assert!(matches!(
            RequestKind::from_content_type(Some("application/json")),
            Err(ProtocolError::UnsupportedMediaType(Some(ct))) if ct == "application/json"
        ));
        assert!(matches!(
            RequestKind::from_content_type(None),
            Err(ProtocolError::UnsupportedMediaType(None))
        ));
        // A different protocol version is a different media type.
        assert!(RequestKind::from_content_type(Some("application/x-invocation-request;version=2")).is_err());
    }

    #[test]
    fn test_response_kinds() {
        for kind in [
            ResponseKind::Invocation,
            ResponseKind::NewSession,
            ResponseKind::Affinity,
            ResponseKind::Exception,
        ] {
            assert_eq!(ResponseKind::from_content_type(kind.content_type()), Some(kind));
        }
        assert!(ResponseKind::Exception.has_terminator());
        assert!(!ResponseKind::NewSession.has_terminator());
        assert_eq!(ResponseKind::from_content_type("text/html"), None);
    }
}
