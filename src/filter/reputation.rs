//! Reputation filter
//!
//! Looks up the organization owning the source address and denies when it
//! looks like a hosting or VPN network. Flag terms are matched
//! case-sensitively, unlike user-agent signatures.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::filter::{DenyReason, Filter, FilterAction};
use crate::reputation::ReputationLookup;
use crate::request::GateRequest;

/// Organization substrings that flag an address
pub const DEFAULT_FLAG_TERMS: &[&str] = &["VPN", "Hosting"];

/// Action to take when the lookup fails
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailAction {
    /// Treat the address as not flagged (fail-open)
    #[default]
    Allow,
    /// Deny as reputation-flagged (fail-closed)
    Deny,
}

impl FailAction {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "allow" | "open" => Some(FailAction::Allow),
            "deny" | "block" | "closed" => Some(FailAction::Deny),
            _ => None,
        }
    }
}

/// Decision rules applied to lookup answers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReputationPolicy {
    pub flag_terms: Vec<String>,
    pub fail_action: FailAction,
}

impl ReputationPolicy {
    pub fn new(flag_terms: Vec<String>, fail_action: FailAction) -> Self {
        Self {
            flag_terms,
            fail_action,
        }
    }

    /// Whether an organization name marks a hosting/VPN network
    pub fn is_flagged(&self, org: &str) -> bool {
        self.flag_terms.iter().any(|term| org.contains(term.as_str()))
    }
}

impl Default for ReputationPolicy {
    fn default() -> Self {
        Self {
            flag_terms: DEFAULT_FLAG_TERMS.iter().map(|t| t.to_string()).collect(),
            fail_action: FailAction::default(),
        }
    }
}

/// Filter backed by a [`ReputationLookup`]
pub struct ReputationFilter {
    lookup: Arc<dyn ReputationLookup>,
    policy: ReputationPolicy,
}

impl ReputationFilter {
    pub fn new(lookup: Arc<dyn ReputationLookup>, policy: ReputationPolicy) -> Self {
        Self { lookup, policy }
    }
}

#[async_trait::async_trait]
impl Filter for ReputationFilter {
    async fn filter(&self, req: &GateRequest) -> FilterAction {
        // Missing or malformed addresses are never sent to the service
        let Some(ip) = req.source_ip() else {
            debug!(source = ?req.source_addr, "No usable source address, skipping lookup");
            return FilterAction::Continue;
        };

        match self.lookup.lookup_org(ip).await {
            Ok(Some(org)) if self.policy.is_flagged(&org) => {
                debug!(%ip, org = %org, "Organization flagged");
                FilterAction::Deny(DenyReason::ReputationFlagged)
            }
            Ok(org) => {
                debug!(%ip, org = ?org, "Organization not flagged");
                FilterAction::Continue
            }
            Err(e) => {
                warn!(
                    %ip,
                    provider = self.lookup.name(),
                    error = %e,
                    fail_action = ?self.policy.fail_action,
                    "Reputation lookup failed"
                );
                match self.policy.fail_action {
                    FailAction::Allow => FilterAction::Continue,
                    FailAction::Deny => FilterAction::Deny(DenyReason::ReputationFlagged),
                }
            }
        }
    }

    fn name(&self) -> &str {
        "reputation"
    }
}
