// ABOUTME: Configuration surface for the relay orchestrator.
// ABOUTME: Holds the candidate peer list, discovery staleness threshold, and fetch timeout.

use std::time::Duration;

use crate::error::RelayError;

/// Default staleness threshold before discovery re-runs.
pub const DEFAULT_DISCOVERY_INTERVAL: Duration = Duration::from_secs(600);

/// Default per-candidate card fetch timeout.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(5);

/// Runtime configuration for the orchestrator.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Base URLs of candidate downstream agents.
    pub peer_urls: Vec<String>,
    /// Registry older than this triggers a lazy re-discovery.
    pub discovery_interval: Duration,
    /// Timeout applied to each agent-card fetch.
    pub fetch_timeout: Duration,
}

impl RelayConfig {
    pub fn new(peer_urls: Vec<String>) -> Self {
        Self {
            peer_urls,
            ..Default::default()
        }
    }

    /// Parse a comma-separated peer list (the `--peers` / `A2A_PEERS` format).
    ///
    /// Entries are trimmed; empty entries are dropped.
    pub fn from_peer_list(peers: &str) -> Self {
        let peer_urls = peers
            .split(',')
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect();
        Self::new(peer_urls)
    }

    /// Validate that every configured peer is a well-formed URL.
    pub fn validate(&self) -> Result<(), RelayError> {
        for peer in &self.peer_urls {
            url::Url::parse(peer).map_err(|source| RelayError::InvalidPeerUrl {
                url: peer.clone(),
                source,
            })?;
        }
        Ok(())
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            peer_urls: Vec::new(),
            discovery_interval: DEFAULT_DISCOVERY_INTERVAL,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }
}
