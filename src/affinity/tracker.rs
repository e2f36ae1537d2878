//! Affinity cookie handling.

use axum::http::header::{COOKIE, SET_COOKIE};
use axum::http::{HeaderMap, HeaderValue};

use crate::affinity::{Affinity, AffinityToken};
use crate::config::ProtocolConfig;

/// Token in effect for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectiveAffinity {
    pub token: AffinityToken,
    /// True when the client sent no cookie and the token was synthesized.
    pub fresh: bool,
}

/// Reads the affinity cookie from requests and decides what to send back.
#[derive(Debug, Clone)]
pub struct AffinityTracker {
    cookie_name: String,
    cookie_path: String,
    node_name: String,
}

impl AffinityTracker {
    pub fn new(
        cookie_name: impl Into<String>,
        cookie_path: impl Into<String>,
        node_name: impl Into<String>,
    ) -> Self {
        Self {
            cookie_name: cookie_name.into(),
            cookie_path: cookie_path.into(),
            node_name: node_name.into(),
        }
    }

    pub fn from_config(config: &ProtocolConfig) -> Self {
        Self::new(&config.affinity_cookie, &config.base_path, &config.node_name)
    }

    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    pub fn node_name(&self) -> &str {
        &self.node_name
    }

    /// Affinity recorded in locators minted by this node.
    pub fn node_affinity(&self) -> Affinity {
        Affinity::Node(self.node_name.clone())
    }

    /// Value of the affinity cookie, if the request carries one.
    pub fn read_cookie(&self, headers: &HeaderMap) -> Option<AffinityToken> {
        find_cookie(headers, &self.cookie_name)
    }

    pub fn on_request(&self, incoming: Option<AffinityToken>) -> EffectiveAffinity {
        match incoming {
            Some(token) => EffectiveAffinity { token, fresh: false },
            None => EffectiveAffinity {
                token: AffinityToken::generate(&self.node_name),
                fresh: true,
            },
        }
    }

    /// Token to set on the response: a handler override wins, otherwise a
    /// freshly synthesized token is handed out, otherwise nothing changes.
    pub fn on_response(
        &self,
        effective: &EffectiveAffinity,
        override_token: Option<AffinityToken>,
    ) -> Option<AffinityToken> {
        match override_token {
            Some(token) => Some(token),
            None if effective.fresh => Some(effective.token.clone()),
            None => None,
        }
    }

    /// `Set-Cookie` value scoped to the protocol base path.
    pub fn set_cookie(&self, token: &AffinityToken) -> Option<HeaderValue> {
        let cookie = format!("{}={}; Path={}", self.cookie_name, token, self.cookie_path);
        match HeaderValue::from_str(&cookie) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(token = %token, "Affinity token is not a valid header value");
                None
            }
        }
    }
}

/// Find a cookie in `Cookie` request headers.
pub fn find_cookie(headers: &HeaderMap, name: &str) -> Option<AffinityToken> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, value)| *key == name && !value.is_empty())
        .map(|(_, value)| AffinityToken::new(value.trim_matches('"')))
}

/// Find a cookie in `Set-Cookie` response headers.
pub fn find_set_cookie(headers: &HeaderMap, name: &str) -> Option<AffinityToken> {
    headers
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .filter_map(|value| value.split(';').next())
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| AffinityToken::new(value.trim_matches('"')))
}
