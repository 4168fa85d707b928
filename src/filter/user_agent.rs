//! User-Agent classifier
//!
//! Denies requests whose declared client identity contains a known
//! automation signature. Matching is a case-insensitive substring test. A
//! request with no User-Agent at all is treated as a bot.

use std::collections::BTreeSet;

use crate::filter::{DenyReason, Filter, FilterAction};
use crate::request::GateRequest;

/// Signatures used when none are configured
pub const DEFAULT_BOT_SIGNATURES: &[&str] = &[
    "googlebot",
    "bingbot",
    "facebook",
    "curl",
    "wget",
    "bot",
    "spider",
    "scraper",
    "crawler",
];

/// Immutable set of lowercase bot signatures
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotSignatures {
    patterns: BTreeSet<String>,
}

impl BotSignatures {
    /// Build from raw patterns; patterns are trimmed and lowercased, blanks dropped
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = patterns
            .into_iter()
            .map(|p| p.as_ref().trim().to_lowercase())
            .filter(|p| !p.is_empty())
            .collect();
        Self { patterns }
    }

    /// Add more patterns to the set
    pub fn extend<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.patterns.extend(Self::new(patterns).patterns);
        self
    }

    /// First signature contained in `user_agent`, if any
    pub fn find_match(&self, user_agent: &str) -> Option<&str> {
        let ua_lower = user_agent.to_lowercase();
        self.patterns
            .iter()
            .find(|pattern| ua_lower.contains(pattern.as_str()))
            .map(String::as_str)
    }

    pub fn matches(&self, user_agent: &str) -> bool {
        self.find_match(user_agent).is_some()
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

impl Default for BotSignatures {
    fn default() -> Self {
        Self::new(DEFAULT_BOT_SIGNATURES)
    }
}

/// Bot user-agent filter
pub struct UserAgentFilter {
    signatures: BotSignatures,
}

impl UserAgentFilter {
    pub fn new(signatures: BotSignatures) -> Self {
        Self { signatures }
    }
}

#[async_trait::async_trait]
impl Filter for UserAgentFilter {
    async fn filter(&self, req: &GateRequest) -> FilterAction {
        let Some(user_agent) = req.user_agent.as_deref() else {
            tracing::debug!(source = ?req.source_addr, "Missing User-Agent header");
            return FilterAction::Deny(DenyReason::BotUserAgent);
        };

        match self.signatures.find_match(user_agent) {
            Some(signature) => {
                tracing::debug!(
                    signature,
                    user_agent,
                    source = ?req.source_addr,
                    "Bot signature matched"
                );
                FilterAction::Deny(DenyReason::BotUserAgent)
            }
            None => FilterAction::Continue,
        }
    }

    fn name(&self) -> &str {
        "user-agent"
    }
}
