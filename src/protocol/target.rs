//! Component targets, method signatures and locators.

use std::borrow::Cow;
use std::fmt;

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::{Deserialize, Serialize};

use crate::affinity::Affinity;
use crate::error::ProtocolError;
use crate::session::SessionId;

/// Path segment standing for an empty string.
pub const PLACEHOLDER: &str = "-";

/// Everything but RFC 3986 unreserved characters is escaped inside a segment.
const SEGMENT: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'.').remove(b'_').remove(b'~');

/// Percent-escape a name for use as one path segment.
///
/// A name equal to the placeholder is escaped too, so it cannot be read back
/// as an empty string.
pub fn escape_segment(name: &str) -> Cow<'_, str> {
    if name == PLACEHOLDER {
        return Cow::Borrowed("%2D");
    }
    utf8_percent_encode(name, SEGMENT).into()
}

/// Undo [`escape_segment`].
pub fn unescape_segment(segment: &str) -> Result<String, ProtocolError> {
    percent_decode_str(segment)
        .decode_utf8()
        .map(Cow::into_owned)
        .map_err(|e| {
            ProtocolError::malformed(format!("segment {segment:?} is not UTF-8 once unescaped: {e}"))
        })
}

/// Segment for an optional value: the placeholder when empty.
pub fn encode_segment(value: &str) -> Cow<'_, str> {
    if value.is_empty() {
        Cow::Borrowed(PLACEHOLDER)
    } else {
        escape_segment(value)
    }
}

pub fn decode_segment(segment: &str) -> Result<String, ProtocolError> {
    if segment == PLACEHOLDER {
        Ok(String::new())
    } else {
        unescape_segment(segment)
    }
}

/// Application/module/distinct-name/bean coordinates of a deployed component.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ComponentTarget {
    pub app: String,
    pub module: String,
    pub distinct: String,
    pub bean: String,
}

impl ComponentTarget {
    pub fn new(
        app: impl Into<String>,
        module: impl Into<String>,
        distinct: impl Into<String>,
        bean: impl Into<String>,
    ) -> Self {
        Self {
            app: app.into(),
            module: module.into(),
            distinct: distinct.into(),
            bean: bean.into(),
        }
    }

    /// Read the first four path segments. The caller checks the count.
    ///
    /// All four go through the placeholder rule, bean included: the encoder
    /// writes `-` for any empty coordinate, so reading the bean verbatim would
    /// turn an empty bean name into `"-"`.
    pub(crate) fn from_segments(segments: &[&str]) -> Result<Self, ProtocolError> {
        Ok(Self {
            app: decode_segment(segments[0])?,
            module: decode_segment(segments[1])?,
            distinct: decode_segment(segments[2])?,
            bean: decode_segment(segments[3])?,
        })
    }

    pub(crate) fn push_segments(&self, path: &mut String) {
        for segment in [&self.app, &self.module, &self.distinct, &self.bean] {
            path.push('/');
            path.push_str(&encode_segment(segment));
        }
    }
}

impl fmt::Display for ComponentTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}/{}", self.app, self.module, self.distinct, self.bean)
    }
}

/// Method name plus ordered parameter type names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct MethodSignature {
    pub name: String,
    pub parameter_types: Vec<String>,
}

impl MethodSignature {
    pub fn new<I, S>(name: impl Into<String>, parameter_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            parameter_types: parameter_types.into_iter().map(Into::into).collect(),
        }
    }

    pub fn arity(&self) -> usize {
        self.parameter_types.len()
    }
}

impl fmt::Display for MethodSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name, self.parameter_types.join(","))
    }
}

/// Everything a client needs to address a stateful session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatefulLocator {
    pub target: ComponentTarget,
    pub view: String,
    pub session_id: SessionId,
    /// Node affinity the session was created with.
    pub affinity: Affinity,
}
