//! Filter chain for request classification
//!
//! Filters inspect a [`GateRequest`] and either pass it on, settle it as
//! allowed, or deny it. The chain runs them in insertion order and stops at
//! the first filter that does not pass.

pub mod blocklist;
pub mod reputation;
pub mod user_agent;

pub use blocklist::BlocklistFilter;
pub use reputation::{FailAction, ReputationFilter, ReputationPolicy};
pub use user_agent::{BotSignatures, UserAgentFilter};

use std::fmt;
use std::sync::Arc;

use crate::request::GateRequest;

/// Why a request was denied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DenyReason {
    BotUserAgent,
    ReputationFlagged,
    StaticallyBlocked,
}

impl DenyReason {
    /// Plain-text body sent with the 403
    pub fn message(&self) -> &'static str {
        match self {
            DenyReason::BotUserAgent => "Access Denied: Bot detected",
            DenyReason::ReputationFlagged => "Access Denied: VPN detected",
            DenyReason::StaticallyBlocked => "Access Denied: Blocked IP detected",
        }
    }
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DenyReason::BotUserAgent => "bot-user-agent",
            DenyReason::ReputationFlagged => "reputation-flagged",
            DenyReason::StaticallyBlocked => "statically-blocked",
        };
        f.write_str(name)
    }
}

/// Final classification of a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Allow,
    Deny(DenyReason),
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Allow => write!(f, "Allow"),
            Verdict::Deny(reason) => write!(f, "Deny({})", reason),
        }
    }
}

/// Outcome of a single filter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterAction {
    /// No opinion, run the next filter
    Continue,
    /// Settle the request as allowed, skipping remaining filters
    Allow,
    /// Deny the request
    Deny(DenyReason),
}

impl fmt::Display for FilterAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterAction::Continue => write!(f, "Continue"),
            FilterAction::Allow => write!(f, "Allow"),
            FilterAction::Deny(reason) => write!(f, "Deny({})", reason),
        }
    }
}

/// Trait for request filters
///
/// Filters are async so they can perform I/O (the reputation lookup does).
#[async_trait::async_trait]
pub trait Filter: Send + Sync {
    async fn filter(&self, req: &GateRequest) -> FilterAction;

    /// Filter name for logging
    fn name(&self) -> &str;
}

/// Chain of filters executed sequentially
///
/// First non-Continue action short-circuits the chain.
pub struct FilterChain {
    filters: Vec<Arc<dyn Filter>>,
}

impl FilterChain {
    pub fn new() -> Self {
        Self {
            filters: Vec::new(),
        }
    }

    pub fn add_filter(mut self, filter: Arc<dyn Filter>) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Classify a request
    pub async fn execute(&self, req: &GateRequest) -> Verdict {
        for filter in &self.filters {
            match filter.filter(req).await {
                FilterAction::Continue => continue,
                FilterAction::Allow => {
                    tracing::debug!(filter = filter.name(), "Filter allowed request");
                    return Verdict::Allow;
                }
                FilterAction::Deny(reason) => {
                    tracing::info!(
                        filter = filter.name(),
                        reason = %reason,
                        source = ?req.source_addr,
                        "Filter denied request"
                    );
                    return Verdict::Deny(reason);
                }
            }
        }
        Verdict::Allow
    }
}

impl Default for FilterChain {
    fn default() -> Self {
        Self::new()
    }
}
