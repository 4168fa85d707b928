//! Transport-independent view of an inbound request
//!
//! Filters never see hyper types. The server lifts the handful of fields the
//! classifier needs into a [`GateRequest`] before the chain runs.

use std::net::{IpAddr, SocketAddr};

use hyper::HeaderMap;
use hyper::header::USER_AGENT;

/// Source address extraction settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIpConfig {
    /// Headers to check for the caller address, in priority order (lowercase)
    pub headers: Vec<String>,
    /// Take the first hop of a comma-separated list (true) or the last (false)
    pub use_first_ip: bool,
    /// Use the TCP peer address when no header carries one
    pub fallback_to_peer: bool,
}

impl Default for ClientIpConfig {
    fn default() -> Self {
        Self {
            headers: default_client_ip_headers(),
            use_first_ip: true,
            fallback_to_peer: false,
        }
    }
}

pub fn default_client_ip_headers() -> Vec<String> {
    vec![
        "cf-connecting-ip".to_string(),
        "x-forwarded-for".to_string(),
        "x-real-ip".to_string(),
    ]
}

/// Request metadata used for classification
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GateRequest {
    pub source_addr: Option<String>,
    pub user_agent: Option<String>,
    pub path: String,
}

impl GateRequest {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            source_addr: None,
            user_agent: None,
            path: path.into(),
        }
    }

    pub fn with_source_addr(mut self, addr: impl Into<String>) -> Self {
        self.source_addr = Some(addr.into());
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Build from hyper request parts
    pub fn from_parts(
        headers: &HeaderMap,
        path: &str,
        remote_addr: SocketAddr,
        config: &ClientIpConfig,
    ) -> Self {
        // Non-ASCII bytes still count as a declared identity
        let user_agent = headers
            .get(USER_AGENT)
            .map(|h| String::from_utf8_lossy(h.as_bytes()).into_owned());

        let source_addr = extract_client_ip(headers, config)
            .or_else(|| config.fallback_to_peer.then(|| remote_addr.ip().to_string()));

        Self {
            source_addr,
            user_agent,
            path: path.to_string(),
        }
    }

    /// Source address parsed as an IP, if present and well-formed
    ///
    /// IPv4-mapped IPv6 addresses come back as plain IPv4.
    pub fn source_ip(&self) -> Option<IpAddr> {
        let ip: IpAddr = self.source_addr.as_deref()?.trim().parse().ok()?;
        Some(ip.to_canonical())
    }
}

/// Extract the caller address from the first configured header that carries one
pub fn extract_client_ip(headers: &HeaderMap, config: &ClientIpConfig) -> Option<String> {
    for header_name in &config.headers {
        let Some(value) = headers.get(header_name.as_str()).and_then(|h| h.to_str().ok()) else {
            continue;
        };

        let hop = if config.use_first_ip {
            value.split(',').next()
        } else {
            value.split(',').last()
        };

        if let Some(ip) = hop.map(str::trim).filter(|s| !s.is_empty()) {
            return Some(ip.to_string());
        }
    }
    None
}
