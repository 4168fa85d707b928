//! Static blocklist filter

use std::sync::Arc;

use crate::blocklist::Blocklist;
use crate::filter::{DenyReason, Filter, FilterAction};
use crate::request::GateRequest;

pub struct BlocklistFilter {
    blocklist: Arc<Blocklist>,
}

impl BlocklistFilter {
    pub fn new(blocklist: Arc<Blocklist>) -> Self {
        Self { blocklist }
    }
}

#[async_trait::async_trait]
impl Filter for BlocklistFilter {
    async fn filter(&self, req: &GateRequest) -> FilterAction {
        match req.source_ip() {
            Some(ip) if self.blocklist.contains(&ip) => {
                FilterAction::Deny(DenyReason::StaticallyBlocked)
            }
            _ => FilterAction::Continue,
        }
    }

    fn name(&self) -> &str {
        "blocklist"
    }
}
