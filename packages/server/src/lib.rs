// adpulse - API Core
//
// Keyword ad scraping with per-organization quota, rate-limited AI analysis
// and an event-driven job lifecycle.
//
// Domains live in domains/* with their seesaw effects; infrastructure traits,
// adapters and the engine type live in kernel/.

pub mod common;
pub mod config;
pub mod domains;
pub mod kernel;
pub mod server;

pub use config::*;
