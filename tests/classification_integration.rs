//! Classification pipeline tests against a scripted reputation source

use std::net::IpAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use hyper::body::Bytes;

use edge_gatekeeper::blocklist::Blocklist;
use edge_gatekeeper::content::{
    ContentError, ContentStore, MemoryContentStore, Page, Resolution, StaticResponder,
};
use edge_gatekeeper::filter::{
    BlocklistFilter, BotSignatures, DenyReason, FailAction, Filter, FilterAction, FilterChain,
    ReputationFilter, ReputationPolicy, UserAgentFilter, Verdict,
};
use edge_gatekeeper::request::GateRequest;
use edge_gatekeeper::reputation::{LookupError, ReputationLookup};

/// Scripted reputation source that counts its calls
struct ScriptedLookup {
    org: Option<&'static str>,
    fail: bool,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl ScriptedLookup {
    fn org(org: &'static str) -> Arc<Self> {
        Arc::new(Self {
            org: Some(org),
            fail: false,
            delay: None,
            calls: AtomicUsize::new(0),
        })
    }

    fn timing_out() -> Arc<Self> {
        Arc::new(Self {
            org: None,
            fail: true,
            delay: Some(Duration::from_millis(20)),
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl ReputationLookup for ScriptedLookup {
    async fn lookup_org(&self, _ip: IpAddr) -> Result<Option<String>, LookupError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(LookupError::Timeout);
        }
        Ok(self.org.map(str::to_string))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Blocklist filter wrapper that records whether it ran
struct ObservedBlocklist {
    inner: BlocklistFilter,
    calls: Arc<AtomicUsize>,
}

#[async_trait::async_trait]
impl Filter for ObservedBlocklist {
    async fn filter(&self, req: &GateRequest) -> FilterAction {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.filter(req).await
    }

    fn name(&self) -> &str {
        "observed-blocklist"
    }
}

struct Pipeline {
    chain: FilterChain,
    lookup: Arc<ScriptedLookup>,
    blocklist_calls: Arc<AtomicUsize>,
}

fn pipeline(lookup: Arc<ScriptedLookup>, fail_action: FailAction) -> Pipeline {
    let blocklist_calls = Arc::new(AtomicUsize::new(0));
    let policy = ReputationPolicy {
        fail_action,
        ..ReputationPolicy::default()
    };

    let chain = FilterChain::new()
        .add_filter(Arc::new(UserAgentFilter::new(BotSignatures::default())))
        .add_filter(Arc::new(ReputationFilter::new(lookup.clone(), policy)))
        .add_filter(Arc::new(ObservedBlocklist {
            inner: BlocklistFilter::new(Arc::new(Blocklist::builtin())),
            calls: blocklist_calls.clone(),
        }));

    Pipeline {
        chain,
        lookup,
        blocklist_calls,
    }
}

fn request(user_agent: &str, addr: &str, path: &str) -> GateRequest {
    GateRequest::new(path)
        .with_user_agent(user_agent)
        .with_source_addr(addr)
}

#[tokio::test]
async fn test_bot_user_agent_denied_without_lookup() {
    let p = pipeline(ScriptedLookup::org("Comcast Cable"), FailAction::Allow);

    for ua in ["Googlebot/2.1", "curl/8.4.0", "Wget/1.21", "MyCrawler", "SPIDER-x"] {
        let verdict = p.chain.execute(&request(ua, "1.2.3.4", "/index.html")).await;
        assert_eq!(verdict, Verdict::Deny(DenyReason::BotUserAgent), "ua = {}", ua);
    }

    assert_eq!(p.lookup.calls(), 0);
    assert_eq!(p.blocklist_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_missing_user_agent_denied_without_lookup() {
    let p = pipeline(ScriptedLookup::org("Comcast Cable"), FailAction::Allow);

    let req = GateRequest::new("/index.html").with_source_addr("1.2.3.4");
    assert_eq!(
        p.chain.execute(&req).await,
        Verdict::Deny(DenyReason::BotUserAgent)
    );
    assert_eq!(p.lookup.calls(), 0);
}

#[tokio::test]
async fn test_blocklisted_address_denied_after_clean_lookup() {
    let p = pipeline(ScriptedLookup::org("Comcast Cable"), FailAction::Allow);

    let req = request("Mozilla/5.0 (normal browser)", "89.207.18.182", "/index.html");
    assert_eq!(
        p.chain.execute(&req).await,
        Verdict::Deny(DenyReason::StaticallyBlocked)
    );
    assert_eq!(p.lookup.calls(), 1);
    assert_eq!(p.blocklist_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_flagged_reputation_skips_blocklist() {
    let p = pipeline(ScriptedLookup::org("NordVPN Hosting Ltd"), FailAction::Allow);

    // blocklisted too, but the reputation check settles it first
    for addr in ["1.2.3.4", "89.207.18.182"] {
        let verdict = p.chain.execute(&request("Mozilla/5.0", addr, "/index.html")).await;
        assert_eq!(verdict, Verdict::Deny(DenyReason::ReputationFlagged));
    }

    assert_eq!(p.lookup.calls(), 2);
    assert_eq!(p.blocklist_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_lowercase_vpn_not_flagged() {
    let p = pipeline(ScriptedLookup::org("cheap vpn hosting"), FailAction::Allow);

    let verdict = p.chain.execute(&request("Mozilla/5.0", "1.2.3.4", "/")).await;
    assert_eq!(verdict, Verdict::Allow);
}

#[tokio::test]
async fn test_clean_request_allowed_and_served() {
    let p = pipeline(ScriptedLookup::org("Comcast Cable"), FailAction::Allow);

    let req = request("Mozilla/5.0", "1.2.3.4", "/signin.html");
    assert_eq!(p.chain.execute(&req).await, Verdict::Allow);
    assert_eq!(p.lookup.calls(), 1);

    let store = MemoryContentStore::new().with_page("signin.html", "<form>signin</form>");
    let responder = StaticResponder::new(Arc::new(store));

    assert_eq!(
        responder.resolve(&req.path).await,
        Resolution::Found {
            page: Page::Signin,
            body: Bytes::from_static(b"<form>signin</form>"),
        }
    );
}

struct FetchCounter {
    fetches: AtomicUsize,
}

#[async_trait::async_trait]
impl ContentStore for FetchCounter {
    async fn fetch(&self, name: &str) -> Result<Bytes, ContentError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(Bytes::from(format!("<p>{}</p>", name)))
    }
}

#[tokio::test]
async fn test_unknown_path_not_found_without_fetch() {
    let p = pipeline(ScriptedLookup::org("Comcast Cable"), FailAction::Allow);

    let req = request("Mozilla/5.0", "1.2.3.4", "/unknown.html");
    assert_eq!(p.chain.execute(&req).await, Verdict::Allow);

    let store = Arc::new(FetchCounter {
        fetches: AtomicUsize::new(0),
    });
    let responder = StaticResponder::new(store.clone());

    assert_eq!(responder.resolve(&req.path).await, Resolution::NotFound);
    assert_eq!(store.fetches.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_lookup_timeout_fail_open() {
    let p = pipeline(ScriptedLookup::timing_out(), FailAction::Allow);

    let clean = request("Mozilla/5.0", "1.2.3.4", "/index.html");
    assert_eq!(p.chain.execute(&clean).await, Verdict::Allow);

    // blocklist still applies after a failed lookup
    let blocked = request("Mozilla/5.0", "89.207.18.182", "/index.html");
    assert_eq!(
        p.chain.execute(&blocked).await,
        Verdict::Deny(DenyReason::StaticallyBlocked)
    );
}

#[tokio::test]
async fn test_lookup_timeout_fail_closed() {
    let p = pipeline(ScriptedLookup::timing_out(), FailAction::Deny);

    let req = request("Mozilla/5.0", "1.2.3.4", "/index.html");
    assert_eq!(
        p.chain.execute(&req).await,
        Verdict::Deny(DenyReason::ReputationFlagged)
    );
    assert_eq!(p.blocklist_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_missing_address_skips_lookup_and_allows() {
    let p = pipeline(ScriptedLookup::org("NordVPN Hosting Ltd"), FailAction::Deny);

    let req = GateRequest::new("/index.html").with_user_agent("Mozilla/5.0");
    assert_eq!(p.chain.execute(&req).await, Verdict::Allow);
    assert_eq!(p.lookup.calls(), 0);
    assert_eq!(p.blocklist_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_classification_is_idempotent() {
    let cases = [
        request("Googlebot/2.1", "1.2.3.4", "/"),
        request("Mozilla/5.0", "89.207.18.182", "/"),
        request("Mozilla/5.0", "1.2.3.4", "/signin.html"),
        GateRequest::new("/"),
    ];

    for org in ["Comcast Cable", "NordVPN Hosting Ltd"] {
        let p = pipeline(ScriptedLookup::org(org), FailAction::Allow);
        for req in &cases {
            let first = p.chain.execute(req).await;
            let second = p.chain.execute(req).await;
            assert_eq!(first, second);
        }
    }
}

#[tokio::test]
async fn test_one_lookup_per_request() {
    let p = pipeline(ScriptedLookup::org("Comcast Cable"), FailAction::Allow);

    for _ in 0..5 {
        p.chain
            .execute(&request("Mozilla/5.0", "1.2.3.4", "/index.html"))
            .await;
    }
    assert_eq!(p.lookup.calls(), 5);
}
