//! IP-intelligence lookup client
//!
//! Asks an ip-api.com style service for the ISP that owns an address. One
//! outbound request per call; nothing is cached and nothing is retried.

use std::net::IpAddr;
use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::error::{GatekeeperError, Result};

/// Default bound on a single lookup
pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_millis(2000);

/// Default IP-intelligence endpoint
///
/// The keyless ip-api.com tier only answers plain HTTP; HTTPS gets a 403.
pub const DEFAULT_ENDPOINT: &str = "http://ip-api.com";

/// Error from a reputation lookup
#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    #[error("Lookup timed out")]
    Timeout,

    #[error("HTTP error: {0}")]
    Http(reqwest::Error),

    #[error("Unexpected status: {0}")]
    Status(u16),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for LookupError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            LookupError::Timeout
        } else if e.is_decode() {
            LookupError::InvalidResponse(e.to_string())
        } else {
            LookupError::Http(e)
        }
    }
}

/// Source of organization names for addresses
#[async_trait::async_trait]
pub trait ReputationLookup: Send + Sync {
    /// Organization/ISP owning `ip`, `None` when the service does not know
    async fn lookup_org(&self, ip: IpAddr) -> std::result::Result<Option<String>, LookupError>;

    /// Name for logging
    fn name(&self) -> &str;
}

#[derive(Debug, Deserialize)]
struct IpApiResponse {
    #[serde(default)]
    isp: Option<String>,
}

/// Lookup client settings
#[derive(Debug, Clone)]
pub struct IpApiConfig {
    pub endpoint: String,
    pub timeout: Duration,
}

impl IpApiConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            timeout: DEFAULT_LOOKUP_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for IpApiConfig {
    fn default() -> Self {
        Self::new(DEFAULT_ENDPOINT)
    }
}

/// ip-api.com JSON client
pub struct IpApiClient {
    client: Client,
    base: Url,
}

impl IpApiClient {
    pub fn new(config: IpApiConfig) -> Result<Self> {
        let base = Url::parse(&config.endpoint).map_err(|e| {
            GatekeeperError::Config(format!(
                "Invalid reputation endpoint {}: {}",
                config.endpoint, e
            ))
        })?;

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| GatekeeperError::HttpClient(e.to_string()))?;

        Ok(Self { client, base })
    }

    fn lookup_url(&self, ip: IpAddr) -> std::result::Result<Url, LookupError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| LookupError::InvalidResponse("endpoint cannot be a base".to_string()))?
            .pop_if_empty()
            .push("json")
            .push(&ip.to_string());
        url.query_pairs_mut().append_pair("fields", "isp");
        Ok(url)
    }
}

#[async_trait::async_trait]
impl ReputationLookup for IpApiClient {
    async fn lookup_org(&self, ip: IpAddr) -> std::result::Result<Option<String>, LookupError> {
        let url = self.lookup_url(ip)?;

        debug!(%ip, "Querying reputation service");

        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(LookupError::Status(status.as_u16()));
        }

        let body = response.bytes().await?;
        let parsed: IpApiResponse = serde_json::from_slice(&body)
            .map_err(|e| LookupError::InvalidResponse(e.to_string()))?;

        debug!(%ip, isp = ?parsed.isp, "Reputation lookup complete");

        Ok(parsed.isp.filter(|isp| !isp.is_empty()))
    }

    fn name(&self) -> &str {
        "ip-api"
    }
}
