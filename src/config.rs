//! Configuration management via environment variables
//!
//! Loads configuration from environment variables with .env file support.
//! Every setting has a default, so an empty environment yields a working
//! gatekeeper with the built-in blocklist and bot signatures.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::blocklist::{Blocklist, BlocklistFormat};
use crate::error::{GatekeeperError, Result};
use crate::filter::reputation::DEFAULT_FLAG_TERMS;
use crate::filter::user_agent::DEFAULT_BOT_SIGNATURES;
use crate::filter::{BotSignatures, FailAction, ReputationPolicy};
use crate::reputation::{DEFAULT_ENDPOINT, IpApiConfig};
use crate::request::{ClientIpConfig, default_client_ip_headers};

/// Upper bound accepted for REPUTATION_TIMEOUT_MS
const MAX_LOOKUP_TIMEOUT_MS: u64 = 30_000;

/// Main application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub client_ip: ClientIpConfig,
    pub user_agent: UserAgentConfig,
    pub reputation: ReputationConfig,
    pub blocklist: BlocklistConfig,
    pub content: ContentConfig,
    pub log_level: String,
}

/// Server binding configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Bot signature settings
#[derive(Debug, Clone)]
pub struct UserAgentConfig {
    pub signatures: Vec<String>,
    pub extra_signatures: Vec<String>,
}

/// Reputation lookup settings
#[derive(Debug, Clone)]
pub struct ReputationConfig {
    pub enabled: bool,
    pub endpoint: String,
    pub timeout: Duration,
    pub fail_action: FailAction,
    pub flag_terms: Vec<String>,
}

/// Blocklist source
#[derive(Debug, Clone)]
pub struct BlocklistConfig {
    pub path: Option<PathBuf>,
    pub format: BlocklistFormat,
}

/// Static page settings
#[derive(Debug, Clone)]
pub struct ContentConfig {
    pub dir: PathBuf,
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// Reads .env file if present, then parses environment variables.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();

        Ok(Self {
            server: ServerConfig::from_env()?,
            client_ip: client_ip_from_env()?,
            user_agent: UserAgentConfig::from_env()?,
            reputation: ReputationConfig::from_env()?,
            blocklist: BlocklistConfig::from_env()?,
            content: ContentConfig::from_env(),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

fn parse_bool(name: &str, default: &str) -> Result<bool> {
    env::var(name)
        .unwrap_or_else(|_| default.to_string())
        .parse::<bool>()
        .map_err(|e| GatekeeperError::Config(format!("Invalid {}: {}", name, e)))
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

impl ServerConfig {
    fn from_env() -> Result<Self> {
        let host = env::var("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());

        let port = env::var("SERVER_PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse::<u16>()
            .map_err(|e| GatekeeperError::Config(format!("Invalid SERVER_PORT: {}", e)))?;

        Ok(Self { host, port })
    }

    pub fn bind_addr(&self) -> Result<std::net::SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| GatekeeperError::Config(format!("Invalid bind address: {}", e)))
    }
}

fn client_ip_from_env() -> Result<ClientIpConfig> {
    let headers = match env::var("CLIENT_IP_HEADERS") {
        Ok(value) => parse_list(&value)
            .into_iter()
            .map(|h| h.to_lowercase())
            .collect(),
        Err(_) => default_client_ip_headers(),
    };

    let fallback_to_peer = parse_bool("CLIENT_IP_FALLBACK_TO_PEER", "false")?;

    if headers.is_empty() && !fallback_to_peer {
        return Err(GatekeeperError::Config(
            "CLIENT_IP_HEADERS is empty and CLIENT_IP_FALLBACK_TO_PEER is false".to_string(),
        ));
    }

    Ok(ClientIpConfig {
        headers,
        use_first_ip: parse_bool("CLIENT_IP_USE_FIRST", "true")?,
        fallback_to_peer,
    })
}

impl UserAgentConfig {
    fn from_env() -> Result<Self> {
        let signatures = match env::var("USER_AGENT_SIGNATURES") {
            Ok(value) => parse_list(&value),
            Err(_) => DEFAULT_BOT_SIGNATURES.iter().map(|s| s.to_string()).collect(),
        };

        let extra_signatures = env::var("USER_AGENT_EXTRA_SIGNATURES")
            .map(|extra| parse_list(&extra))
            .unwrap_or_default();

        let config = Self {
            signatures,
            extra_signatures,
        };

        if config.bot_signatures().is_empty() {
            return Err(GatekeeperError::Config(
                "USER_AGENT_SIGNATURES must contain at least one signature".to_string(),
            ));
        }

        Ok(config)
    }

    pub fn bot_signatures(&self) -> BotSignatures {
        BotSignatures::new(&self.signatures).extend(&self.extra_signatures)
    }
}

impl ReputationConfig {
    fn from_env() -> Result<Self> {
        let enabled = parse_bool("REPUTATION_ENABLED", "true")?;

        let endpoint =
            env::var("REPUTATION_ENDPOINT").unwrap_or_else(|_| DEFAULT_ENDPOINT.to_string());

        url::Url::parse(&endpoint).map_err(|e| {
            GatekeeperError::Config(format!("Invalid REPUTATION_ENDPOINT: {}", e))
        })?;

        let timeout_ms = env::var("REPUTATION_TIMEOUT_MS")
            .unwrap_or_else(|_| "2000".to_string())
            .parse::<u64>()
            .map_err(|e| GatekeeperError::Config(format!("Invalid REPUTATION_TIMEOUT_MS: {}", e)))?;

        if timeout_ms == 0 || timeout_ms > MAX_LOOKUP_TIMEOUT_MS {
            return Err(GatekeeperError::Config(format!(
                "REPUTATION_TIMEOUT_MS must be 1-{}",
                MAX_LOOKUP_TIMEOUT_MS
            )));
        }

        let fail_action_str =
            env::var("REPUTATION_FAIL_ACTION").unwrap_or_else(|_| "allow".to_string());
        let fail_action = FailAction::parse(&fail_action_str).ok_or_else(|| {
            GatekeeperError::Config(format!(
                "Invalid REPUTATION_FAIL_ACTION: {}. Expected 'allow' or 'deny'",
                fail_action_str
            ))
        })?;

        let flag_terms = match env::var("REPUTATION_FLAG_TERMS") {
            Ok(value) => parse_list(&value),
            Err(_) => DEFAULT_FLAG_TERMS.iter().map(|s| s.to_string()).collect(),
        };

        if flag_terms.is_empty() {
            return Err(GatekeeperError::Config(
                "REPUTATION_FLAG_TERMS must contain at least one term".to_string(),
            ));
        }

        Ok(Self {
            enabled,
            endpoint,
            timeout: Duration::from_millis(timeout_ms),
            fail_action,
            flag_terms,
        })
    }

    pub fn client_config(&self) -> IpApiConfig {
        IpApiConfig::new(self.endpoint.clone()).with_timeout(self.timeout)
    }

    pub fn policy(&self) -> ReputationPolicy {
        ReputationPolicy::new(self.flag_terms.clone(), self.fail_action)
    }
}

impl BlocklistConfig {
    fn from_env() -> Result<Self> {
        let path = env::var("BLOCKLIST_PATH")
            .ok()
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from);

        let format_str = env::var("BLOCKLIST_FORMAT").unwrap_or_else(|_| "plain".to_string());
        let format = match format_str.to_lowercase().as_str() {
            "plain" => BlocklistFormat::Plain,
            "json" => BlocklistFormat::Json,
            _ => {
                return Err(GatekeeperError::Config(format!(
                    "Invalid BLOCKLIST_FORMAT: {}. Expected 'plain' or 'json'",
                    format_str
                )));
            }
        };

        Ok(Self { path, format })
    }

    /// Load the configured blocklist, or the built-in one
    pub fn load(&self) -> Result<Blocklist> {
        match &self.path {
            Some(path) => Ok(Blocklist::load(path, self.format)?),
            None => Ok(Blocklist::builtin()),
        }
    }
}

impl ContentConfig {
    fn from_env() -> Self {
        let dir = env::var("CONTENT_DIR").unwrap_or_else(|_| "./public".to_string());
        Self {
            dir: PathBuf::from(dir),
        }
    }
}
