//! HTTP client for the invocation tunnel.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{CONTENT_TYPE, COOKIE};

use crate::affinity::tracker::find_set_cookie;
use crate::affinity::AffinityToken;
use crate::client::{decode_response, ClientError};
use crate::config::{ClientConfig, ProtocolConfig};
use crate::error::ProtocolError;
use crate::marshal::{MarshallingConfig, TypeRegistry, Value};
use crate::protocol::{
    ComponentTarget, EncodedRequest, EnvelopeCodec, InvocationEnvelope, ResponseKind, SessionOpenRequest,
    StatefulLocator,
};
use crate::resilience::backoff_delay;

/// A session created on the server.
#[derive(Debug, Clone)]
pub struct OpenedSession {
    pub locator: StatefulLocator,
    /// Token the server asked the client to use from now on, if any.
    pub affinity: Option<AffinityToken>,
}

/// Outcome of a successful invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct InvocationResult {
    pub value: Value,
    pub affinity: Option<AffinityToken>,
}

pub struct InvocationClient {
    http: reqwest::Client,
    service_url: String,
    cookie_name: String,
    codec: EnvelopeCodec,
    config: ClientConfig,
}

impl InvocationClient {
    /// `server_url` is scheme and authority, e.g. `http://127.0.0.1:8080`.
    pub fn new(
        server_url: &str,
        protocol: &ProtocolConfig,
        config: ClientConfig,
        registry: Arc<TypeRegistry>,
    ) -> Self {
        let codec = EnvelopeCodec::new(
            registry,
            MarshallingConfig::with_max_value_bytes(protocol.max_body_bytes as u64),
        );
        Self {
            http: reqwest::Client::new(),
            service_url: format!("{}{}", server_url.trim_end_matches('/'), protocol.service_root()),
            cookie_name: protocol.affinity_cookie.clone(),
            codec,
            config,
        }
    }

    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    pub fn codec(&self) -> &EnvelopeCodec {
        &self.codec
    }

    pub fn service_url(&self) -> &str {
        &self.service_url
    }

    /// Ask the server which affinity to use.
    pub async fn discover_affinity(&self) -> Result<AffinityToken, ClientError> {
        let request = self.codec.encode_affinity_query();
        let (_, affinity) = self.exchange(&request, ResponseKind::Affinity, None).await?;
        affinity.ok_or(ClientError::NoAffinityInResponse)
    }

    /// Open a session on `target`, giving up after the configured timeout.
    pub async fn create_session(
        &self,
        target: &ComponentTarget,
        view: &str,
        affinity: Option<&AffinityToken>,
    ) -> Result<OpenedSession, ClientError> {
        let request = self
            .codec
            .encode_session_open(&SessionOpenRequest::new(target.clone(), view))?;
        let timeout = self.config.session_open_timeout();

        let (value, affinity) = tokio::time::timeout(
            timeout,
            self.exchange(&request, ResponseKind::NewSession, affinity),
        )
        .await
        .map_err(|_| ProtocolError::SessionCreateTimeout(timeout))??;

        match value {
            Value::Locator(locator) if !locator.session_id.is_empty() => {
                Ok(OpenedSession { locator, affinity })
            }
            _ => Err(ClientError::NoSessionIdInResponse),
        }
    }

    /// [`create_session`](Self::create_session), retrying timeouts with backoff.
    pub async fn create_session_with_retry(
        &self,
        target: &ComponentTarget,
        view: &str,
        affinity: Option<&AffinityToken>,
    ) -> Result<OpenedSession, ClientError> {
        let attempts = self.config.session_open_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.create_session(target, view, affinity).await {
                Err(err) if err.is_timeout() && attempt < attempts => {
                    let delay = backoff_delay(
                        attempt,
                        Duration::from_millis(self.config.retry_base_delay_ms),
                        Duration::from_millis(self.config.retry_max_delay_ms),
                    );
                    tracing::warn!(
                        attempt,
                        attempts,
                        delay_ms = delay.as_millis() as u64,
                        target = %target,
                        "Session open timed out, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    /// Invoke a method. A remote failure comes back as [`ClientError::Remote`].
    pub async fn invoke(
        &self,
        envelope: &InvocationEnvelope,
        affinity: Option<&AffinityToken>,
    ) -> Result<InvocationResult, ClientError> {
        let request = self.codec.encode_invocation(envelope)?;
        let (value, affinity) = self.exchange(&request, ResponseKind::Invocation, affinity).await?;
        Ok(InvocationResult { value, affinity })
    }

    async fn exchange(
        &self,
        request: &EncodedRequest,
        expected: ResponseKind,
        affinity: Option<&AffinityToken>,
    ) -> Result<(Value, Option<AffinityToken>), ClientError> {
        let mut builder = self
            .http
            .post(format!("{}{}", self.service_url, request.path))
            .header(CONTENT_TYPE, request.content_type())
            .body(request.body.clone());
        if let Some(token) = affinity {
            builder = builder.header(COOKIE, format!("{}={}", self.cookie_name, token));
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let affinity = find_set_cookie(response.headers(), &self.cookie_name);
        let body = response.bytes().await?;

        tracing::debug!(
            path = %request.path,
            kind = request.kind.as_str(),
            status,
            "Tunnel response received"
        );

        let value = decode_response(
            &self.codec.marshalling(),
            expected,
            status,
            content_type.as_deref(),
            &body,
        )?;
        Ok((value, affinity))
    }
}
