//! Static source address blocklist
//!
//! Loaded once at startup, immutable afterwards. Entries are single addresses
//! or CIDR networks.

use std::collections::HashSet;
use std::net::IpAddr;
use std::path::Path;

use ipnet::IpNet;
use tracing::{info, warn};

/// Error type for blocklist loading
#[derive(Debug, thiserror::Error)]
pub enum BlocklistError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("Invalid JSON blocklist: {0}")]
    Json(#[from] serde_json::Error),
}

/// Blocklist file format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BlocklistFormat {
    /// One entry per line, `#` comments
    #[default]
    Plain,
    /// JSON array of strings
    Json,
}

/// Addresses shipped with the gatekeeper when no blocklist file is configured
pub const DEFAULT_BLOCKED_ADDRESSES: &[&str] = &[
    "89.207.18.182",
    "173.194.69.147",
    "149.3.176.145",
    "66.235.156.128",
    "173.194.69.125",
    "173.194.69.120",
    "173.194.69.102",
    "173.194.69.95",
    "173.0.88.34",
    "173.194.69.103",
    "173.194.69.104",
    "173.194.69.105",
    "63.245.217.20",
    "64.62.203.172",
    "173.194.69.113",
    "173.194.69.138",
    "173.194.69.139",
    "173.194.69.100",
    "173.194.69.101",
    "63.245.217.71",
    "188.112.175.207",
    "66.235.139.166",
    "66.235.138.2",
    "66.235.138.59",
    "66.235.139.153",
    "66.235.139.152",
    "66.235.138.44",
    "66.235.139.118",
    "66.235.138.18",
    "66.235.139.121",
    "66.235.138.19",
    "66.235.134.160",
    "66.235.133.8",
    "66.235.133.52",
    "66.235.133.33",
    "66.235.132.152",
    "66.235.133.62",
    "66.235.132.232",
    "66.235.132.118",
    "66.235.133.11",
    "66.235.132.121",
    "149.20.57.227",
    "199.48.147.36",
    "37.59.162.218",
];

#[derive(Debug, Clone, PartialEq, Eq)]
enum BlocklistEntry {
    Single(IpAddr),
    Network(IpNet),
}

impl BlocklistEntry {
    fn parse(s: &str) -> Option<Self> {
        if let Ok(ip) = s.parse::<IpAddr>() {
            return Some(Self::Single(ip.to_canonical()));
        }
        s.parse::<IpNet>().ok().map(Self::Network)
    }
}

/// Immutable set of denied source addresses
#[derive(Debug, Clone, Default)]
pub struct Blocklist {
    singles: HashSet<IpAddr>,
    networks: Vec<IpNet>,
}

impl Blocklist {
    /// Build from string entries, skipping anything that is not an IP or CIDR
    pub fn from_entries<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut list = Self::default();
        for raw in entries {
            let raw = raw.as_ref().trim();
            match BlocklistEntry::parse(raw) {
                Some(BlocklistEntry::Single(ip)) => {
                    list.singles.insert(ip);
                }
                Some(BlocklistEntry::Network(net)) => {
                    if !list.networks.contains(&net) {
                        list.networks.push(net);
                    }
                }
                None => warn!(entry = raw, "Skipping invalid blocklist entry"),
            }
        }
        list
    }

    /// The built-in list
    pub fn builtin() -> Self {
        Self::from_entries(DEFAULT_BLOCKED_ADDRESSES)
    }

    /// Load from a file
    pub fn load(path: &Path, format: BlocklistFormat) -> Result<Self, BlocklistError> {
        let content = std::fs::read_to_string(path).map_err(|e| BlocklistError::Io {
            path: path.display().to_string(),
            source: e,
        })?;

        let list = match format {
            BlocklistFormat::Plain => Self::parse_plain(&content),
            BlocklistFormat::Json => Self::parse_json(&content)?,
        };

        info!(path = %path.display(), entries = list.len(), "Blocklist loaded");
        Ok(list)
    }

    fn parse_plain(content: &str) -> Self {
        Self::from_entries(
            content
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty() && !line.starts_with('#')),
        )
    }

    fn parse_json(content: &str) -> Result<Self, BlocklistError> {
        let entries: Vec<String> = serde_json::from_str(content)?;
        Ok(Self::from_entries(entries))
    }

    /// Membership test; IPv4-mapped IPv6 addresses match their IPv4 entries
    pub fn contains(&self, ip: &IpAddr) -> bool {
        let ip = ip.to_canonical();
        self.singles.contains(&ip) || self.networks.iter().any(|net| net.contains(&ip))
    }

    pub fn len(&self) -> usize {
        self.singles.len() + self.networks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
