// ABOUTME: In-memory registry of discovered agent cards with swap-on-completion updates.
// ABOUTME: Readers take immutable snapshots; discovery publishes a fully-built replacement.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::types::AgentCard;

/// An immutable view of the registry at one point in time.
///
/// Cards keep candidate-list order, so fallback routing's first-match
/// tie-breaking is deterministic across calls against the same snapshot.
#[derive(Debug)]
pub struct RegistrySnapshot {
    cards: Vec<AgentCard>,
    refreshed_at: Option<Instant>,
}

impl RegistrySnapshot {
    fn empty() -> Self {
        Self {
            cards: Vec::new(),
            refreshed_at: None,
        }
    }

    pub fn cards(&self) -> &[AgentCard] {
        &self.cards
    }

    /// Look up a card by its advertised URL.
    pub fn get(&self, url: &str) -> Option<&AgentCard> {
        self.cards.iter().find(|c| c.url == url)
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }
}

/// Shared, read-mostly store of agent cards.
///
/// The only state shared across concurrent requests. Updates replace the
/// whole snapshot atomically; a reader holding an old `Arc` keeps a coherent
/// pre-refresh view.
pub struct CardRegistry {
    inner: RwLock<Arc<RegistrySnapshot>>,
}

impl CardRegistry {
    /// Create an empty registry. Empty and never-refreshed counts as stale.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Arc::new(RegistrySnapshot::empty())),
        }
    }

    /// Take the current snapshot.
    pub async fn snapshot(&self) -> Arc<RegistrySnapshot> {
        self.inner.read().await.clone()
    }

    /// Publish a replacement snapshot.
    ///
    /// Advances the refresh timestamp even when `cards` is empty, so a
    /// discovery run that found nothing still suppresses refresh storms.
    pub async fn publish(&self, cards: Vec<AgentCard>) {
        let snapshot = Arc::new(RegistrySnapshot {
            cards,
            refreshed_at: Some(Instant::now()),
        });
        *self.inner.write().await = snapshot;
    }

    /// Whether the last successful refresh is older than `threshold`.
    pub async fn is_stale(&self, threshold: Duration) -> bool {
        match self.inner.read().await.refreshed_at {
            Some(at) => at.elapsed() > threshold,
            None => true,
        }
    }
}

impl Default for CardRegistry {
    fn default() -> Self {
        Self::new()
    }
}
