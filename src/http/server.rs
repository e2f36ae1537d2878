//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the tunnel handler under the service root
//! - Wire up middleware (tracing, concurrency limit, request ID)
//! - Bound each request by the request timeout, answering with a framed failure
//! - Bind server to a plain or TLS listener
//! - Hand every request to the dispatcher
//! - Observability (metrics, correlation IDs)

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::State,
    http::{header::CONTENT_TYPE, Request},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use axum_server::tls_rustls::RustlsConfig;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::affinity::AffinityTracker;
use crate::config::TunnelConfig;
use crate::error::ProtocolError;
use crate::handler::InvocationHandler;
use crate::http::dispatcher::{InboundRequest, RequestDispatcher};
use crate::http::request::{propagate_request_id_layer, request_id, set_request_id_layer};
use crate::marshal::{MarshallingConfig, TypeRegistry};
use crate::observability::metrics;
use crate::protocol::EnvelopeCodec;
use crate::session::{SessionRegistry, SessionStateProvider};

/// How long in-flight TLS connections get to finish after shutdown.
const TLS_DRAIN_SECS: u64 = 10;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<RequestDispatcher>,
    pub service_root: Arc<str>,
    pub max_body_bytes: usize,
    pub request_timeout: Duration,
}

/// HTTP server for the invocation tunnel.
pub struct HttpServer {
    router: Router,
    config: TunnelConfig,
    sessions: Arc<SessionRegistry>,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(
        config: TunnelConfig,
        handler: Arc<dyn InvocationHandler>,
        provider: Arc<dyn SessionStateProvider>,
    ) -> Self {
        let protocol = &config.protocol;
        let codec = EnvelopeCodec::new(
            Arc::new(TypeRegistry::with_views(protocol.views.iter())),
            MarshallingConfig::with_max_value_bytes(protocol.max_body_bytes as u64),
        );
        let sessions = Arc::new(SessionRegistry::new(provider));
        let dispatcher = RequestDispatcher::new(
            codec,
            Arc::clone(&sessions),
            AffinityTracker::from_config(protocol),
            handler,
        );

        let state = AppState {
            dispatcher: Arc::new(dispatcher),
            service_root: Arc::from(protocol.service_root()),
            max_body_bytes: protocol.max_body_bytes,
            request_timeout: Duration::from_secs(config.timeouts.request_secs),
        };

        let router = Self::build_router(&config, state);
        Self {
            router,
            config,
            sessions,
        }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(config: &TunnelConfig, state: AppState) -> Router {
        let root = state.service_root.to_string();
        Router::new()
            .route(&format!("{root}/{{*rest}}"), any(tunnel_handler))
            .route(&format!("{root}/"), any(tunnel_handler))
            .route(&root, any(tunnel_handler))
            .with_state(state)
            .layer(ConcurrencyLimitLayer::new(config.listener.max_concurrent_requests))
            .layer(TraceLayer::new_for_http())
            .layer(propagate_request_id_layer())
            .layer(set_request_id_layer())
    }

    /// Run the server on `listener` until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            service_root = %self.config.protocol.service_root(),
            "HTTP server starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("HTTP server draining");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Run the server over TLS on `addr` until `shutdown` fires.
    pub async fn run_tls(
        self,
        addr: SocketAddr,
        tls: RustlsConfig,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        tracing::info!(
            address = %addr,
            service_root = %self.config.protocol.service_root(),
            "HTTPS server starting"
        );

        let handle = axum_server::Handle::new();
        let drain = handle.clone();
        tokio::spawn(async move {
            let _ = shutdown.recv().await;
            tracing::info!("HTTPS server draining");
            drain.graceful_shutdown(Some(Duration::from_secs(TLS_DRAIN_SECS)));
        });

        axum_server::bind_rustls(addr, tls)
            .handle(handle)
            .serve(self.router.into_make_service())
            .await?;

        tracing::info!("HTTPS server stopped");
        Ok(())
    }

    /// Sessions opened through this server.
    pub fn sessions(&self) -> &Arc<SessionRegistry> {
        &self.sessions
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &TunnelConfig {
        &self.config
    }
}

/// Single entry point for every protocol request.
async fn tunnel_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start = Instant::now();
    let (parts, body) = request.into_parts();

    let path = parts
        .uri
        .path()
        .strip_prefix(&*state.service_root)
        .unwrap_or_default();
    let content_type = parts.headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok());
    let kind = RequestDispatcher::classify(content_type)
        .map(|kind| kind.as_str())
        .unwrap_or("unknown");

    let request_id = request_id(&parts.headers);
    let exchange = async {
        match axum::body::to_bytes(body, state.max_body_bytes).await {
            Ok(bytes) => {
                state
                    .dispatcher
                    .dispatch(InboundRequest {
                        method: &parts.method,
                        path,
                        content_type,
                        headers: &parts.headers,
                        body: &bytes,
                        request_id,
                    })
                    .await
            }
            Err(e) => state.dispatcher.refuse(
                InboundRequest {
                    method: &parts.method,
                    path,
                    content_type,
                    headers: &parts.headers,
                    body: &[],
                    request_id,
                },
                ProtocolError::CorruptPayload(format!("unreadable request body: {e}")),
            ),
        }
    };

    // Expiry drops the exchange, releasing any session lock it held.
    let response = match tokio::time::timeout(state.request_timeout, exchange).await {
        Ok(response) => response,
        Err(_) => state.dispatcher.refuse(
            InboundRequest {
                method: &parts.method,
                path,
                content_type,
                headers: &parts.headers,
                body: &[],
                request_id,
            },
            ProtocolError::RequestTimeout(state.request_timeout),
        ),
    };

    metrics::record_request(kind, response.status.as_u16(), start);
    response.into_response()
}
