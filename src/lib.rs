//! Edge Gatekeeper - bot and abuse screening in front of a static site
//!
//! Every request runs through an ordered filter chain before a page is served:
//! - User-Agent bot signatures (case-insensitive, missing UA counts as a bot)
//! - IP reputation lookup (hosting/VPN organizations, fail-open by default)
//! - Static source address blocklist
//!
//! Allowed requests are answered from a small fixed set of HTML pages.

pub mod blocklist;
pub mod config;
pub mod content;
pub mod error;
pub mod filter;
pub mod reputation;
pub mod request;
pub mod server;
