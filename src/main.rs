//! Edge Gatekeeper - Entry point

use std::sync::Arc;

use edge_gatekeeper::config::Config;
use edge_gatekeeper::content::{FsContentStore, StaticResponder};
use edge_gatekeeper::filter::{BlocklistFilter, FilterChain, ReputationFilter, UserAgentFilter};
use edge_gatekeeper::reputation::IpApiClient;
use edge_gatekeeper::server::{Gatekeeper, Server};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let config = Config::from_env()?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let signatures = config.user_agent.bot_signatures();
    let blocklist = Arc::new(config.blocklist.load()?);

    info!(
        signatures = signatures.len(),
        blocked = blocklist.len(),
        reputation = config.reputation.enabled,
        fail_action = ?config.reputation.fail_action,
        "Gatekeeper configured"
    );

    // Order matters: the reputation lookup only runs for non-bot traffic
    let mut filter_chain = FilterChain::new().add_filter(Arc::new(UserAgentFilter::new(signatures)));

    if config.reputation.enabled {
        let client = IpApiClient::new(config.reputation.client_config())?;
        filter_chain = filter_chain.add_filter(Arc::new(ReputationFilter::new(
            Arc::new(client),
            config.reputation.policy(),
        )));
    }

    let filter_chain = filter_chain.add_filter(Arc::new(BlocklistFilter::new(blocklist)));

    let responder = StaticResponder::new(Arc::new(FsContentStore::new(&config.content.dir)));
    let gatekeeper = Gatekeeper::new(filter_chain, responder, config.client_ip.clone());

    let server = Server::bind(config.server.bind_addr()?, gatekeeper).await?;
    server
        .run_until(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    Ok(())
}
