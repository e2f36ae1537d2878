//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;

use invocation_tunnel::config::TunnelConfig;
use invocation_tunnel::handler::{CounterStateProvider, EchoHandler};
use invocation_tunnel::marshal::TypeRegistry;
use invocation_tunnel::protocol::ComponentTarget;
use invocation_tunnel::session::SessionRegistry;
use invocation_tunnel::{HttpServer, InvocationClient, InvocationHandler, Shutdown};

pub const VIEW: &str = "com.example.FooRemote";

/// A tunnel server running on an ephemeral port.
pub struct TestServer {
    pub addr: SocketAddr,
    pub config: TunnelConfig,
    pub sessions: Arc<SessionRegistry>,
    pub shutdown: Shutdown,
}

impl TestServer {
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn service_url(&self) -> String {
        format!("{}{}", self.url(), self.config.protocol.service_root())
    }

    pub fn client(&self) -> InvocationClient {
        InvocationClient::new(
            &self.url(),
            &self.config.protocol,
            self.config.client.clone(),
            Arc::new(TypeRegistry::with_views([VIEW])),
        )
        .with_http_client(raw_client())
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

pub fn test_config() -> TunnelConfig {
    let mut config = TunnelConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.protocol.views = vec![VIEW.into()];
    config
}

pub fn target() -> ComponentTarget {
    ComponentTarget::new("", "app1", "", "Foo")
}

/// Plain reqwest client without connection reuse or system proxies.
pub fn raw_client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .timeout(Duration::from_secs(10))
        .build()
        .unwrap()
}

pub async fn start_server() -> TestServer {
    start_server_with(test_config(), Arc::new(EchoHandler)).await
}

pub async fn start_server_with(config: TunnelConfig, handler: Arc<dyn InvocationHandler>) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let server = HttpServer::new(config.clone(), handler, Arc::new(CounterStateProvider));
    let sessions = Arc::clone(server.sessions());
    let receiver = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, receiver).await;
    });

    TestServer {
        addr,
        config,
        sessions,
        shutdown,
    }
}
