//! Request dispatch.
//!
//! # Responsibilities
//! - Classify a request by content type
//! - Drive the envelope codec
//! - Consult the session registry and the affinity tracker
//! - Forward invocations to the pluggable handler
//! - Turn every outcome, including decode failures, into a framed response

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use axum::http::{HeaderMap, Method};
use futures_util::FutureExt;

use crate::affinity::{AffinityTracker, EffectiveAffinity};
use crate::error::ProtocolError;
use crate::handler::{HandlerError, Invocation, InvocationHandler, InvocationOutput};
use crate::http::response::{EncodedResponse, Outcome, ResponseEncoder};
use crate::observability::metrics;
use crate::protocol::envelope::split_path;
use crate::protocol::{EnvelopeCodec, RequestKind};
use crate::session::SessionRegistry;

/// One inbound request as seen by the dispatcher.
#[derive(Debug, Clone, Copy)]
pub struct InboundRequest<'a> {
    pub method: &'a Method,
    /// Path relative to the service root.
    pub path: &'a str,
    pub content_type: Option<&'a str>,
    pub headers: &'a HeaderMap,
    pub body: &'a [u8],
    pub request_id: &'a str,
}

pub struct RequestDispatcher {
    codec: EnvelopeCodec,
    sessions: Arc<SessionRegistry>,
    affinity: AffinityTracker,
    encoder: ResponseEncoder,
    handler: Arc<dyn InvocationHandler>,
}

impl RequestDispatcher {
    pub fn new(
        codec: EnvelopeCodec,
        sessions: Arc<SessionRegistry>,
        affinity: AffinityTracker,
        handler: Arc<dyn InvocationHandler>,
    ) -> Self {
        let encoder = ResponseEncoder::new(codec.marshalling(), affinity.clone());
        Self {
            codec,
            sessions,
            affinity,
            encoder,
            handler,
        }
    }

    pub fn sessions(&self) -> &Arc<SessionRegistry> {
        &self.sessions
    }

    /// Kind label of a request, for metrics. `None` for unknown content types.
    pub fn classify(content_type: Option<&str>) -> Option<RequestKind> {
        RequestKind::from_content_type(content_type).ok()
    }

    pub async fn dispatch(&self, request: InboundRequest<'_>) -> EncodedResponse {
        let effective = self.affinity.on_request(self.affinity.read_cookie(request.headers));

        let kind = match RequestKind::from_content_type(request.content_type) {
            Ok(kind) => kind,
            Err(err) => return self.reject(&request, err, &effective),
        };

        tracing::debug!(
            request_id = %request.request_id,
            method = %request.method,
            kind = kind.as_str(),
            path = %request.path,
            "Dispatching request"
        );

        match kind {
            RequestKind::AffinityQuery => {
                // Always echo the token in effect so a client never loses it.
                self.encoder.encode(Outcome::Affinity, Some(effective.token))
            }
            RequestKind::SessionCreate => self.open_session(&request, &effective),
            RequestKind::Invocation => self.invoke(&request, &effective).await,
        }
    }

    /// Answer a request that never reached decoding, e.g. an unreadable body.
    pub fn refuse(&self, request: InboundRequest<'_>, err: ProtocolError) -> EncodedResponse {
        let effective = self.affinity.on_request(self.affinity.read_cookie(request.headers));
        self.reject(&request, err, &effective)
    }

    fn open_session(&self, request: &InboundRequest<'_>, effective: &EffectiveAffinity) -> EncodedResponse {
        let segments = split_path(request.path);
        let open = match self.codec.decode_session_open(&segments) {
            Ok(open) => open,
            Err(err) => return self.reject(request, err, effective),
        };

        let locator = self
            .sessions
            .create(&open.target, &open.view, self.affinity.node_affinity());
        tracing::info!(
            request_id = %request.request_id,
            session_id = %locator.session_id,
            target = %open.target,
            view = %open.view,
            "Session opened"
        );
        self.encoder
            .encode(Outcome::NewSession(locator), self.affinity.on_response(effective, None))
    }

    async fn invoke(&self, request: &InboundRequest<'_>, effective: &EffectiveAffinity) -> EncodedResponse {
        let segments = split_path(request.path);
        let envelope = match self.codec.decode_invocation(&segments, request.body) {
            Ok(envelope) => envelope,
            Err(err) => return self.reject(request, err, effective),
        };

        let session = match &envelope.session_id {
            Some(id) => match self.sessions.acquire(id, &envelope.target).await {
                Ok(guard) => Some(guard),
                Err(err) => return self.reject(request, err, effective),
            },
            None => None,
        };

        let mut invocation = Invocation {
            envelope,
            affinity: effective.token.clone(),
            session,
        };
        let mut output = InvocationOutput::default();

        let result = AssertUnwindSafe(self.handler.handle(&mut invocation, &mut output))
            .catch_unwind()
            .await
            .unwrap_or_else(|_| Err(HandlerError::new("java.lang.Error", "invocation handler panicked")));

        let cookie = self.affinity.on_response(effective, output.take_affinity());
        match result {
            Ok(value) => {
                if let Some(session) = &invocation.session {
                    session.mark_active();
                }
                self.encoder.encode(Outcome::Success(value), cookie)
            }
            Err(err) => {
                tracing::error!(
                    request_id = %request.request_id,
                    method = %invocation.envelope.method,
                    target = %invocation.envelope.target,
                    error = %err,
                    "Invocation handler failed"
                );
                metrics::record_handler_failure();
                self.encoder
                    .encode(Outcome::from_error(&ProtocolError::Handler(err)), cookie)
            }
        }
    }

    fn reject(
        &self,
        request: &InboundRequest<'_>,
        err: ProtocolError,
        effective: &EffectiveAffinity,
    ) -> EncodedResponse {
        tracing::warn!(
            request_id = %request.request_id,
            path = %request.path,
            kind = err.kind().as_str(),
            error = %err,
            "Request rejected"
        );
        self.encoder
            .encode(Outcome::from_error(&err), self.affinity.on_response(effective, None))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::affinity::AffinityToken;
    use crate::error::FailureKind;
    use crate::handler::{CounterStateProvider, EchoHandler};
    use crate::marshal::{MarshallingConfig, TypeRegistry, Value};
    use crate::protocol::headers::{AFFINITY_QUERY, INVOCATION_REQUEST, SESSION_CREATE_REQUEST};
    use crate::protocol::{ComponentTarget, InvocationEnvelope, MethodSignature, ResponseKind};
    use crate::session::SessionId;
    use axum::http::header::COOKIE;
    use axum::http::{HeaderValue, StatusCode};

    const VIEW: &str = "com.example.FooRemote";

    fn dispatcher() -> RequestDispatcher {
        let codec = EnvelopeCodec::new(
            Arc::new(TypeRegistry::with_views([VIEW])),
            MarshallingConfig::default(),
        );
        RequestDispatcher::new(
            codec,
            Arc::new(SessionRegistry::new(Arc::new(CounterStateProvider))),
            AffinityTracker::new("JSESSIONID", "/wildfly-services", "node1"),
            Arc::new(EchoHandler),
        )
    }

    async fn send(
        dispatcher: &RequestDispatcher,
        content_type: Option<&str>,
        path: &str,
        headers: &HeaderMap,
        body: &[u8],
    ) -> EncodedResponse {
        dispatcher
            .dispatch(InboundRequest {
                method: &Method::POST,
                path,
                content_type,
                headers,
                body,
                request_id: "test",
            })
            .await
    }

    fn failure_kind(response: &EncodedResponse) -> FailureKind {
        let config = MarshallingConfig::default();
        let mut input = config.unmarshaller(&response.body).unwrap();
        match input.read_value().unwrap() {
            Value::Failure(failure) => failure.kind,
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unknown_content_type() {
        let dispatcher = dispatcher();
        let response = send(&dispatcher, Some("text/plain"), "/", &HeaderMap::new(), b"").await;
        assert_eq!(response.status, StatusCode::BAD_REQUEST);
        assert_eq!(response.kind, ResponseKind::Exception);
        assert_eq!(failure_kind(&response), FailureKind::UnsupportedMediaType);
    }

    #[tokio::test]
    async fn test_affinity_query_echoes_cookie() {
        let dispatcher = dispatcher();
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("JSESSIONID=abc.node9"));
        let response = send(&dispatcher, Some(AFFINITY_QUERY), "/", &headers, b"").await;
        assert_eq!(response.kind, ResponseKind::Affinity);
        assert_eq!(
            response.set_cookie.unwrap(),
            "JSESSIONID=abc.node9; Path=/wildfly-services"
        );
    }

    #[tokio::test]
    async fn test_session_then_invocation() {
        let dispatcher = dispatcher();
        let headers = HeaderMap::new();
        let opened = send(&dispatcher, Some(SESSION_CREATE_REQUEST), "/-/app1/-/Foo/com.example.FooRemote", &headers, b"").await;
        assert_eq!(opened.kind, ResponseKind::NewSession);
        let locator = match MarshallingConfig::default().deserialize(&opened.body, 1).unwrap().remove(0) {
            Value::Locator(locator) => locator,
            other => panic!("expected locator, got {other:?}"),
        };

        let envelope = InvocationEnvelope::new(
            ComponentTarget::new("", "app1", "", "Foo"),
            VIEW,
            MethodSignature::new("count", Vec::<String>::new()),
            vec![],
        )
        .with_session(locator.session_id.clone());
        let encoded = EnvelopeCodec::new(
            Arc::new(TypeRegistry::with_views([VIEW])),
            MarshallingConfig::default(),
        )
        .encode_invocation(&envelope)
        .unwrap();

        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("JSESSIONID=abc.node1"));
        let response = send(&dispatcher, Some(INVOCATION_REQUEST), &encoded.path, &headers, &encoded.body).await;
        assert_eq!(response.status, StatusCode::OK);
        assert!(response.set_cookie.is_none());
        let config = MarshallingConfig::default();
        let mut input = config.unmarshaller(&response.body).unwrap();
        assert_eq!(input.read_value().unwrap(), Value::Long(1));
    }

    #[tokio::test]
    async fn test_unknown_session() {
        let dispatcher = dispatcher();
        let path = format!("/-/app1/-/Foo/{}/{}/ping", SessionId::generate(), VIEW);
        let mut body = MarshallingConfig::default().marshaller();
        body.write_packed(0);
        let response = send(&dispatcher, Some(INVOCATION_REQUEST), &path, &HeaderMap::new(), &body.finish()).await;
        assert_eq!(response.status, StatusCode::NOT_FOUND);
        assert_eq!(failure_kind(&response), FailureKind::SessionNotFound);
        // First contact: the client still learns an affinity.
        assert!(response.set_cookie.is_some());
    }

    #[tokio::test]
    async fn test_handler_failure_is_500_with_override_cookie() {
        struct FailingHandler;

        #[async_trait::async_trait]
        impl InvocationHandler for FailingHandler {
            async fn handle(
                &self,
                _invocation: &mut Invocation,
                output: &mut InvocationOutput,
            ) -> Result<Value, HandlerError> {
                output.set_session_affinity(AffinityToken::new("moved.node2"));
                Err(HandlerError::illegal_state("nope"))
            }
        }

        let codec = EnvelopeCodec::new(
            Arc::new(TypeRegistry::with_views([VIEW])),
            MarshallingConfig::default(),
        );
        let dispatcher = RequestDispatcher::new(
            codec.clone(),
            Arc::new(SessionRegistry::new(Arc::new(CounterStateProvider))),
            AffinityTracker::new("JSESSIONID", "/wildfly-services", "node1"),
            Arc::new(FailingHandler),
        );
        let encoded = codec
            .encode_invocation(&InvocationEnvelope::new(
                ComponentTarget::new("", "app1", "", "Foo"),
                VIEW,
                MethodSignature::new("ping", Vec::<String>::new()),
                vec![],
            ))
            .unwrap();

        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("JSESSIONID=abc.node1"));
        let response = send(&dispatcher, Some(INVOCATION_REQUEST), &encoded.path, &headers, &encoded.body).await;
        assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(failure_kind(&response), FailureKind::Application);
        assert_eq!(
            response.set_cookie.unwrap(),
            "JSESSIONID=moved.node2; Path=/wildfly-services"
        );
    }

    #[tokio::test]
    async fn test_panicking_handler_still_answers() {
        struct PanickingHandler;

        #[async_trait::async_trait]
        impl InvocationHandler for PanickingHandler {
            async fn handle(
                &self,
                _invocation: &mut Invocation,
                _output: &mut InvocationOutput,
            ) -> Result<Value, HandlerError> {
                panic!("handler bug");
            }
        }

        let codec = EnvelopeCodec::new(
            Arc::new(TypeRegistry::with_views([VIEW])),
            MarshallingConfig::default(),
        );
        let dispatcher = RequestDispatcher::new(
            codec.clone(),
            Arc::new(SessionRegistry::new(Arc::new(CounterStateProvider))),
            AffinityTracker::new("JSESSIONID", "/wildfly-services", "node1"),
            Arc::new(PanickingHandler),
        );
        let encoded = codec
            .encode_invocation(&InvocationEnvelope::new(
                ComponentTarget::new("", "app1", "", "Foo"),
                VIEW,
                MethodSignature::new("ping", Vec::<String>::new()),
                vec![],
            ))
            .unwrap();
        let response = send(&dispatcher, Some(INVOCATION_REQUEST), &encoded.path, &HeaderMap::new(), &encoded.body).await;
        assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.kind, ResponseKind::Exception);
    }

    #[tokio::test]
    async fn test_malformed_invocation_path() {
        let dispatcher = dispatcher();
        let response = send(&dispatcher, Some(INVOCATION_REQUEST), "/-/app1/-/Foo", &HeaderMap::new(), b"").await;
        assert_eq!(response.status, StatusCode::BAD_REQUEST);
        assert_eq!(failure_kind(&response), FailureKind::MalformedTarget);
    }
}
