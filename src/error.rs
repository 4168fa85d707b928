//! Unified error types for the edge gatekeeper

use std::net::SocketAddr;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GatekeeperError {
    #[error("Failed to bind to {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Blocklist error: {0}")]
    Blocklist(#[from] crate::blocklist::BlocklistError),

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),
}

pub type Result<T> = std::result::Result<T, GatekeeperError>;
