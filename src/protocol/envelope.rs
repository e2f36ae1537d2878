//! Invocation envelope codec.
//!
//! # Request layout
//! ```text
//! invocation path:     /app/module/distinct/bean/session/view/method[/param-type]*
//! session-create path: /app/module/distinct/bean/view
//!
//! invocation body:
//!     [version]
//!     [arg 0] .. [arg n-1]                one value per parameter type
//!     [packed count]                      0 = no attachments
//!     ([string key] [value]) x (count-1)  context data
//!     [private attachments map]           only when count > 0
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use bytes::Bytes;

use crate::error::ProtocolError;
use crate::marshal::{MarshallingConfig, TypeRegistry, Unmarshaller, Value};
use crate::protocol::headers::RequestKind;
use crate::protocol::target::{
    encode_segment, escape_segment, unescape_segment, ComponentTarget, MethodSignature, PLACEHOLDER,
};
use crate::session::SessionId;

/// One decoded remote call.
#[derive(Debug, Clone, PartialEq)]
pub struct InvocationEnvelope {
    pub target: ComponentTarget,
    pub view: String,
    /// Absent for stateless components.
    pub session_id: Option<SessionId>,
    pub method: MethodSignature,
    pub arguments: Vec<Value>,
    pub context_data: BTreeMap<String, Value>,
    /// Framework-private attachments; empty when none were sent.
    pub private_attachments: Vec<(Value, Value)>,
}

impl InvocationEnvelope {
    pub fn new(
        target: ComponentTarget,
        view: impl Into<String>,
        method: MethodSignature,
        arguments: Vec<Value>,
    ) -> Self {
        Self {
            target,
            view: view.into(),
            session_id: None,
            method,
            arguments,
            context_data: BTreeMap::new(),
            private_attachments: Vec::new(),
        }
    }

    pub fn with_session(mut self, session_id: SessionId) -> Self {
        self.session_id = Some(session_id);
        self
    }

    pub fn with_context(mut self, key: impl Into<String>, value: Value) -> Self {
        self.context_data.insert(key.into(), value);
        self
    }

    pub fn with_private_attachment(mut self, key: Value, value: Value) -> Self {
        self.private_attachments.push((key, value));
        self
    }

    fn has_attachments(&self) -> bool {
        !self.context_data.is_empty() || !self.private_attachments.is_empty()
    }
}

/// Target and view of a session-create request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOpenRequest {
    pub target: ComponentTarget,
    pub view: String,
}

impl SessionOpenRequest {
    pub fn new(target: ComponentTarget, view: impl Into<String>) -> Self {
        Self {
            target,
            view: view.into(),
        }
    }
}

/// Transport-independent form of an outgoing request.
#[derive(Debug, Clone)]
pub struct EncodedRequest {
    /// Path relative to the service root, starting with `/`.
    pub path: String,
    pub kind: RequestKind,
    pub body: Bytes,
}

impl EncodedRequest {
    pub fn content_type(&self) -> &'static str {
        self.kind.content_type()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DecodedRequest {
    Invocation(InvocationEnvelope),
    SessionOpen(SessionOpenRequest),
    AffinityQuery,
}

/// Split a service-relative path into raw segments, ignoring one leading `/`
/// and any trailing ones. Segments are still percent-escaped.
pub fn split_path(path: &str) -> Vec<&str> {
    let trimmed = path.strip_prefix('/').unwrap_or(path).trim_end_matches('/');
    if trimmed.is_empty() {
        return Vec::new();
    }
    trimmed.split('/').collect()
}

#[derive(Debug, Clone)]
pub struct EnvelopeCodec {
    registry: Arc<TypeRegistry>,
    marshalling: MarshallingConfig,
}

impl EnvelopeCodec {
    pub fn new(registry: Arc<TypeRegistry>, marshalling: MarshallingConfig) -> Self {
        Self {
            registry,
            marshalling,
        }
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    pub fn marshalling(&self) -> MarshallingConfig {
        self.marshalling
    }

    pub fn encode_invocation(&self, envelope: &InvocationEnvelope) -> Result<EncodedRequest, ProtocolError> {
        let expected = envelope.method.arity();
        if envelope.arguments.len() != expected {
            return Err(ProtocolError::ArgumentCount {
                expected,
                actual: envelope.arguments.len(),
            });
        }
        self.registry.resolve_view(&envelope.view)?;
        if envelope.method.name.is_empty() {
            return Err(ProtocolError::malformed("empty method name"));
        }
        for type_name in &envelope.method.parameter_types {
            self.registry.resolve(type_name)?;
        }

        let mut path = String::with_capacity(128);
        envelope.target.push_segments(&mut path);
        path.push('/');
        match &envelope.session_id {
            Some(id) => path.push_str(&id.encode()),
            None => path.push_str(&encode_segment("")),
        }
        path.push('/');
        path.push_str(&escape_segment(&envelope.view));
        path.push('/');
        path.push_str(&escape_segment(&envelope.method.name));
        for type_name in &envelope.method.parameter_types {
            path.push('/');
            path.push_str(&escape_segment(type_name));
        }

        let mut out = self.marshalling.marshaller();
        for argument in &envelope.arguments {
            out.write_value(argument)?;
        }
        if envelope.has_attachments() {
            let count = u32::try_from(envelope.context_data.len() + 1).map_err(|_| {
                ProtocolError::CorruptPayload("too many context data entries".into())
            })?;
            out.write_packed(count);
            for (key, value) in &envelope.context_data {
                out.write_value(&Value::String(key.clone()))?;
                out.write_value(value)?;
            }
            out.write_value(&Value::Map(envelope.private_attachments.clone()))?;
        } else {
            out.write_packed(0);
        }

        Ok(EncodedRequest {
            path,
            kind: RequestKind::Invocation,
            body: out.finish(),
        })
    }

    pub fn encode_session_open(&self, request: &SessionOpenRequest) -> Result<EncodedRequest, ProtocolError> {
        self.registry.resolve_view(&request.view)?;
        let mut path = String::with_capacity(96);
        request.target.push_segments(&mut path);
        path.push('/');
        path.push_str(&escape_segment(&request.view));
        Ok(EncodedRequest {
            path,
            kind: RequestKind::SessionCreate,
            body: Bytes::new(),
        })
    }

    pub fn encode_affinity_query(&self) -> EncodedRequest {
        EncodedRequest {
            path: "/".to_string(),
            kind: RequestKind::AffinityQuery,
            body: Bytes::new(),
        }
    }

    pub fn decode(&self, kind: RequestKind, segments: &[&str], body: &[u8]) -> Result<DecodedRequest, ProtocolError> {
        match kind {
            RequestKind::Invocation => self.decode_invocation(segments, body).map(DecodedRequest::Invocation),
            RequestKind::SessionCreate => self.decode_session_open(segments).map(DecodedRequest::SessionOpen),
            RequestKind::AffinityQuery => Ok(DecodedRequest::AffinityQuery),
        }
    }

    pub fn decode_session_open(&self, segments: &[&str]) -> Result<SessionOpenRequest, ProtocolError> {
        check_segments(RequestKind::SessionCreate, segments)?;
        let target = ComponentTarget::from_segments(segments)?;
        let view = unescape_segment(segments[4])?;
        self.registry.resolve_view(&view)?;
        Ok(SessionOpenRequest { target, view })
    }

    pub fn decode_invocation(&self, segments: &[&str], body: &[u8]) -> Result<InvocationEnvelope, ProtocolError> {
        check_segments(RequestKind::Invocation, segments)?;
        let target = ComponentTarget::from_segments(segments)?;
        let session_id = match segments[4] {
            PLACEHOLDER => None,
            segment => Some(SessionId::from_segment(segment)),
        };
        let view = unescape_segment(segments[5])?;
        self.registry.resolve_view(&view)?;
        let method_name = unescape_segment(segments[6])?;

        let mut parameter_types = Vec::with_capacity(segments.len() - 7);
        let mut kinds = Vec::with_capacity(segments.len() - 7);
        for segment in &segments[7..] {
            let type_name = unescape_segment(segment)?;
            kinds.push(self.registry.resolve(&type_name)?);
            parameter_types.push(type_name);
        }

        let mut input = self.marshalling.unmarshaller(body)?;
        let mut arguments = Vec::with_capacity(kinds.len());
        for (index, kind) in kinds.iter().enumerate() {
            let value = input.read_value()?;
            if !kind.admits(&value) {
                return Err(ProtocolError::CorruptPayload(format!(
                    "argument {} is {} but parameter type is {}",
                    index,
                    value.type_label(),
                    parameter_types[index]
                )));
            }
            arguments.push(value);
        }
        let (context_data, private_attachments) = read_attachments(&mut input)?;
        input.finish()?;

        Ok(InvocationEnvelope {
            target,
            view,
            session_id,
            method: MethodSignature {
                name: method_name,
                parameter_types,
            },
            arguments,
            context_data,
            private_attachments,
        })
    }
}

fn check_segments(kind: RequestKind, segments: &[&str]) -> Result<(), ProtocolError> {
    let required = kind.min_segments();
    if segments.len() < required {
        return Err(ProtocolError::malformed(format!(
            "not enough URL segments: {} found, {} required",
            segments.len(),
            required
        )));
    }
    if segments.iter().any(|s| s.is_empty()) {
        return Err(ProtocolError::malformed("empty URL segment"));
    }
    Ok(())
}

type Attachments = (BTreeMap<String, Value>, Vec<(Value, Value)>);

fn read_attachments(input: &mut Unmarshaller<'_>) -> Result<Attachments, ProtocolError> {
    let count = input.read_packed()?;
    let mut context_data = BTreeMap::new();
    if count == 0 {
        return Ok((context_data, Vec::new()));
    }
    for _ in 0..count - 1 {
        let key = match input.read_value()? {
            Value::String(key) => key,
            other => {
                return Err(ProtocolError::CorruptPayload(format!(
                    "context data key is {}, expected string",
                    other.type_label()
                )))
            }
        };
        let value = input.read_value()?;
        context_data.insert(key, value);
    }
    let private_attachments = match input.read_value()? {
        Value::Map(entries) => entries,
        Value::Null => Vec::new(),
        other => {
            return Err(ProtocolError::CorruptPayload(format!(
                "private attachments are {}, expected map",
                other.type_label()
            )))
        }
    };
    Ok((context_data, private_attachments))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marshal::STREAM_VERSION;

    const VIEW: &str = "com.example.FooRemote";

    fn codec() -> EnvelopeCodec {
        EnvelopeCodec::new(
            Arc::new(TypeRegistry::with_views([VIEW])),
            MarshallingConfig::default(),
        )
    }

    fn decode(codec: &EnvelopeCodec, request: &EncodedRequest) -> Result<InvocationEnvelope, ProtocolError> {
        let segments = split_path(&request.path);
        codec.decode_invocation(&segments, &request.body)
    }

    #[test]
    fn test_round_trip_all_placeholder_combinations() {
        let codec = codec();
        for mask in 0..8u8 {
            let pick = |bit: u8, name: &str| if mask & bit != 0 { name.to_string() } else { String::new() };
            let target = ComponentTarget::new(pick(1, "ear"), pick(2, "app1"), pick(4, "v2"), "Foo");
            let envelope = InvocationEnvelope::new(
                target,
                VIEW,
                MethodSignature::new("doWork", ["java.lang.String", "int"]),
                vec![Value::from("hello"), Value::Int(3)],
            )
            .with_session(SessionId::generate())
            .with_context("tx", Value::Long(9));

            let encoded = codec.encode_invocation(&envelope).unwrap();
            assert_eq!(decode(&codec, &encoded).unwrap(), envelope, "mask {}", mask);
        }
    }

    #[test]
    fn test_path_layout() {
        let codec = codec();
        let envelope = InvocationEnvelope::new(
            ComponentTarget::new("", "app1", "", "Foo"),
            VIEW,
            MethodSignature::new("doWork", ["java.lang.String"]),
            vec![Value::from("hello")],
        );
        let encoded = codec.encode_invocation(&envelope).unwrap();
        assert_eq!(encoded.path, "/-/app1/-/Foo/-/com.example.FooRemote/doWork/java.lang.String");
        assert_eq!(encoded.kind, RequestKind::Invocation);
    }

    #[test]
    fn test_zero_attachments_write_single_count() {
        let codec = codec();
        let envelope = InvocationEnvelope::new(
            ComponentTarget::new("", "app1", "", "Foo"),
            VIEW,
            MethodSignature::new("ping", Vec::<String>::new()),
            vec![],
        );
        let encoded = codec.encode_invocation(&envelope).unwrap();
        assert_eq!(&encoded.body[..], &[STREAM_VERSION, 0]);

        let decoded = decode(&codec, &encoded).unwrap();
        assert!(decoded.context_data.is_empty());
        assert!(decoded.private_attachments.is_empty());
    }

    #[test]
    fn test_count_of_one_means_private_attachments_only() {
        let codec = codec();
        let envelope = InvocationEnvelope::new(
            ComponentTarget::new("", "app1", "", "Foo"),
            VIEW,
            MethodSignature::new("ping", Vec::<String>::new()),
            vec![],
        )
        .with_private_attachment(Value::from("txn"), Value::Int(1));

        let encoded = codec.encode_invocation(&envelope).unwrap();
        assert_eq!(encoded.body[1], 1);

        let decoded = decode(&codec, &encoded).unwrap();
        assert!(decoded.context_data.is_empty());
        assert_eq!(decoded.private_attachments, vec![(Value::from("txn"), Value::Int(1))]);
    }

    #[test]
    fn test_session_create_segments() {
        let codec = codec();
        let request = codec
            .decode_session_open(&["-", "app1", "-", "Foo", VIEW])
            .unwrap();
        assert_eq!(request.target, ComponentTarget::new("", "app1", "", "Foo"));
        assert_eq!(request.view, VIEW);

        // Extra segments are ignored.
        assert!(codec.decode_session_open(&["-", "app1", "-", "Foo", VIEW, "extra"]).is_ok());

        for n in 0..5 {
            let segments = ["-", "app1", "-", "Foo", VIEW];
            assert!(matches!(
                codec.decode_session_open(&segments[..n]),
                Err(ProtocolError::MalformedTarget(_))
            ));
        }
    }

    #[test]
    fn test_invocation_needs_seven_segments() {
        let codec = codec();
        let body = [STREAM_VERSION, 0];
        let err = codec
            .decode_invocation(&["-", "app1", "-", "Foo", "-", VIEW], &body)
            .unwrap_err();
        assert!(matches!(err, ProtocolError::MalformedTarget(_)));
    }

    #[test]
    fn test_unknown_types() {
        let codec = codec();
        let body = [STREAM_VERSION, 0];
        assert!(matches!(
            codec.decode_invocation(&["-", "app1", "-", "Foo", "-", "com.example.Nope", "ping"], &body),
            Err(ProtocolError::UnresolvableType(_))
        ));
        assert!(matches!(
            codec.decode_invocation(
                &["-", "app1", "-", "Foo", "-", VIEW, "doWork", "com.example.Arg"],
                &body
            ),
            Err(ProtocolError::UnresolvableType(_))
        ));
    }

    #[test]
    fn test_body_shorter_than_signature() {
        let codec = codec();
        let body = MarshallingConfig::default().serialize(&Value::from("only one")).unwrap();
        let segments = ["-", "app1", "-", "Foo", "-", VIEW, "doWork", "java.lang.String", "java.lang.String"];
        assert!(matches!(
            codec.decode_invocation(&segments, &body),
            Err(ProtocolError::TruncatedBody)
        ));
    }

    #[test]
    fn test_trailing_data() {
        let codec = codec();
        let envelope = InvocationEnvelope::new(
            ComponentTarget::new("", "app1", "", "Foo"),
            VIEW,
            MethodSignature::new("ping", Vec::<String>::new()),
            vec![],
        );
        let encoded = codec.encode_invocation(&envelope).unwrap();
        let mut body = encoded.body.to_vec();
        body.push(0x2a);
        let segments = split_path(&encoded.path);
        assert!(matches!(
            codec.decode_invocation(&segments, &body),
            Err(ProtocolError::UnexpectedTrailingData)
        ));
    }

    #[test]
    fn test_argument_type_mismatch() {
        let codec = codec();
        let envelope = InvocationEnvelope::new(
            ComponentTarget::new("", "app1", "", "Foo"),
            VIEW,
            MethodSignature::new("doWork", ["java.lang.String"]),
            vec![Value::Int(1)],
        );
        let encoded = codec.encode_invocation(&envelope).unwrap();
        assert!(matches!(decode(&codec, &encoded), Err(ProtocolError::CorruptPayload(_))));
    }

    #[test]
    fn test_encode_checks_signature() {
        let codec = codec();
        let envelope = InvocationEnvelope::new(
            ComponentTarget::new("", "app1", "", "Foo"),
            VIEW,
            MethodSignature::new("doWork", ["java.lang.String"]),
            vec![],
        );
        assert!(matches!(
            codec.encode_invocation(&envelope),
            Err(ProtocolError::ArgumentCount { expected: 1, actual: 0 })
        ));

        let unknown_view = InvocationEnvelope::new(
            ComponentTarget::new("", "app1", "", "Foo"),
            "com.example.Other",
            MethodSignature::new("ping", Vec::<String>::new()),
            vec![],
        );
        assert!(matches!(
            codec.encode_invocation(&unknown_view),
            Err(ProtocolError::UnresolvableType(_))
        ));
    }

    #[test]
    fn test_split_path() {
        assert!(split_path("/").is_empty());
        assert!(split_path("").is_empty());
        assert!(split_path("//").is_empty());
        assert_eq!(split_path("/-/app1/-/Foo/V"), vec!["-", "app1", "-", "Foo", "V"]);
        assert_eq!(split_path("/-/app1/-/Foo/V/"), vec!["-", "app1", "-", "Foo", "V"]);
        assert_eq!(split_path("/-/app1/-/Foo/V//"), vec!["-", "app1", "-", "Foo", "V"]);
        // Inner empty segments survive and are rejected when decoding.
        assert_eq!(split_path("/-//-/Foo/V"), vec!["-", "", "-", "Foo", "V"]);
    }

    #[test]
    fn test_trailing_slash_session_open() {
        let codec = codec();
        let segments = split_path("/-/app1/-/Foo/com.example.FooRemote/");
        let request = codec.decode_session_open(&segments).unwrap();
        assert_eq!(request.target, ComponentTarget::new("", "app1", "", "Foo"));
        assert_eq!(request.view, VIEW);
    }

    #[test]
    fn test_slash_and_dash_in_target_round_trip() {
        let codec = codec();
        let envelope = InvocationEnvelope::new(
            ComponentTarget::new("-", "a/b", "", "Foo"),
            VIEW,
            MethodSignature::new("doWork", ["java.lang.String"]),
            vec![Value::from("hello")],
        );
        let encoded = codec.encode_invocation(&envelope).unwrap();
        assert_eq!(
            encoded.path,
            "/%2D/a%2Fb/-/Foo/-/com.example.FooRemote/doWork/java.lang.String"
        );
        let decoded = decode(&codec, &encoded).unwrap();
        assert_eq!(decoded.target.app, "-");
        assert_eq!(decoded.target.module, "a/b");
        assert_eq!(decoded, envelope);

        let open = codec
            .encode_session_open(&SessionOpenRequest::new(ComponentTarget::new("", "my app", "", "Foo"), VIEW))
            .unwrap();
        assert_eq!(open.path, "/-/my%20app/-/Foo/com.example.FooRemote");
        let request = codec.decode_session_open(&split_path(&open.path)).unwrap();
        assert_eq!(request.target.module, "my app");
    }

    #[test]
    fn test_foreign_session_ids_are_accepted() {
        let codec = codec();
        let body = [STREAM_VERSION, 0];
        for foreign in ["abcde", "sid.1", "SFSB_ID"] {
            let envelope = codec
                .decode_invocation(&["-", "app1", "-", "Foo", foreign, VIEW, "ping"], &body)
                .unwrap();
            assert_eq!(envelope.session_id, Some(SessionId::from_segment(foreign)));
        }
    }

    #[test]
    fn test_empty_method_name_is_refused_on_encode() {
        let codec = codec();
        let envelope = InvocationEnvelope::new(
            ComponentTarget::new("", "app1", "", "Foo"),
            VIEW,
            MethodSignature::new("", Vec::<String>::new()),
            vec![],
        );
        assert!(matches!(
            codec.encode_invocation(&envelope),
            Err(ProtocolError::MalformedTarget(_))
        ));
    }
}
