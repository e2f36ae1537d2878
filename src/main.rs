//! Invocation tunnel server.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request (POST, content type selects the kind)
//!     ──────────────▶ http::server (limits, timeout, request id, tracing)
//!                         │
//!                         ▼
//!                    http::dispatcher ──▶ protocol::envelope (decode)
//!                         │          ──▶ affinity::tracker (cookie)
//!                         │          ──▶ session::registry (create / acquire)
//!                         ▼
//!                    InvocationHandler (EchoHandler by default)
//!                         │
//!                         ▼
//!     Client Response ◀── http::response (framed value, Set-Cookie, status)
//! ```
//!
//! Usage: `tunnel-server [config.toml]`

use std::path::PathBuf;
use std::sync::Arc;

use tokio::net::TcpListener;

use invocation_tunnel::config::{load_config, TunnelConfig};
use invocation_tunnel::handler::{CounterStateProvider, EchoHandler};
use invocation_tunnel::lifecycle::{wait_for_signal, Shutdown};
use invocation_tunnel::net::load_tls_config;
use invocation_tunnel::observability::{logging, metrics};
use invocation_tunnel::HttpServer;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = match std::env::args_os().nth(1).map(PathBuf::from) {
        Some(path) => load_config(&path)?,
        None => TunnelConfig::default(),
    };

    logging::init_logging(&config.observability);
    tracing::info!("tunnel-server v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        service_root = %config.protocol.service_root(),
        node = %config.protocol.node_name,
        views = config.protocol.views.len(),
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let shutdown = Shutdown::new();
    let receiver = shutdown.subscribe();
    let tls = config.listener.tls.clone();
    let bind_address = config.listener.bind_address.clone();
    let server = HttpServer::new(config, Arc::new(EchoHandler), Arc::new(CounterStateProvider));

    let signal_shutdown = shutdown.clone();
    tokio::spawn(async move {
        wait_for_signal().await;
        signal_shutdown.trigger();
    });

    match tls {
        Some(tls) => {
            let rustls = load_tls_config(&tls).await?;
            server.run_tls(bind_address.parse()?, rustls, receiver).await?;
        }
        None => {
            let listener = TcpListener::bind(&bind_address).await?;
            server.run(listener, receiver).await?;
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
