//! Network layer subsystem.
//!
//! Plain TCP listeners are bound by the binary and handed to
//! [`HttpServer::run`](crate::http::HttpServer::run); TLS goes through
//! `axum-server` with the rustls config built here.

pub mod tls;

pub use tls::load_tls_config;
