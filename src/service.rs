// ABOUTME: Orchestrator service that ties discovery, router, and relay together.
// ABOUTME: Provides the handle() entry point that drives one request end-to-end.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::client::AgentClient;
use crate::config::RelayConfig;
use crate::discovery;
use crate::error::RelayError;
use crate::oracle::RoutingOracle;
use crate::registry::CardRegistry;
use crate::relay::{NO_ROUTE_MESSAGE, Relay};
use crate::router;
use crate::types::{AgentCard, AgentSkill, LifecycleEvent, Task};

/// The orchestrator: owns the registry and the seams to the oracle and the
/// agent transport.
///
/// Each `handle` call runs an independent relay with its own task and its own
/// agent stream; the registry is the only state shared across requests.
pub struct Orchestrator {
    config: RelayConfig,
    registry: CardRegistry,
    http: reqwest::Client,
    oracle: Arc<dyn RoutingOracle>,
    client: Arc<dyn AgentClient>,
}

impl Orchestrator {
    pub fn new(
        config: RelayConfig,
        oracle: Arc<dyn RoutingOracle>,
        client: Arc<dyn AgentClient>,
    ) -> Self {
        Self {
            config,
            registry: CardRegistry::new(),
            http: reqwest::Client::new(),
            oracle,
            client,
        }
    }

    pub fn registry(&self) -> &CardRegistry {
        &self.registry
    }

    /// Run the initial synchronous discovery before accepting requests.
    pub async fn bootstrap(&self) -> Result<(), RelayError> {
        self.config.validate()?;
        self.refresh_registry().await;
        Ok(())
    }

    /// Handle one user request, delivering lifecycle events through `tx`.
    ///
    /// Events arrive in translation order and end after exactly one terminal
    /// event. A missing user message is a caller error and aborts the request
    /// without producing canonical events.
    pub async fn handle(
        &self,
        query: &str,
        tx: mpsc::Sender<LifecycleEvent>,
    ) -> Result<(), RelayError> {
        if query.trim().is_empty() {
            return Err(RelayError::EmptyMessage);
        }

        if self.registry.is_stale(self.config.discovery_interval).await {
            self.refresh_registry().await;
        }

        let mut relay = Relay::new(Task::new(), tx);
        relay.announce_task().await?;
        log::info!(
            "[Orchestrator] Handling request as task {} (context {})",
            relay.task().id,
            relay.task().context_id
        );

        let snapshot = self.registry.snapshot().await;
        let Some(url) = router::choose(self.oracle.as_ref(), query, &snapshot).await else {
            log::info!("[Orchestrator] No suitable agent for task {}", relay.task().id);
            return relay.complete_with_message(NO_ROUTE_MESSAGE).await;
        };

        // The router only returns URLs present in the snapshot it was given.
        let Some(card) = snapshot.get(&url) else {
            return relay.complete_with_message(NO_ROUTE_MESSAGE).await;
        };

        relay.relay_stream(card, self.client.clone(), query).await
    }

    /// Canceling an in-flight relay is unsupported; say so instead of
    /// swallowing the request.
    pub async fn cancel(&self, _context_id: &str) -> Result<(), RelayError> {
        Err(RelayError::CancelUnsupported)
    }

    async fn refresh_registry(&self) {
        discovery::refresh(
            &self.registry,
            &self.http,
            &self.config.peer_urls,
            self.config.fetch_timeout,
        )
        .await;
    }
}

/// The card the orchestrator itself publishes at the well-known path.
pub fn agent_card(base_url: &str) -> AgentCard {
    AgentCard {
        url: base_url.to_string(),
        name: "Orchestrator Agent".to_string(),
        description: "Selects the best downstream agent to answer the user query.".to_string(),
        skills: vec![AgentSkill {
            id: "auto_route".to_string(),
            name: "Automatic routing".to_string(),
            description: "Figures out which helper agent is most suitable.".to_string(),
            tags: vec!["routing".to_string()],
            examples: vec![],
        }],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;
    use serde_json::{Value, json};

    use crate::types::{TaskState, UserMessage};

    struct NoneOracle;

    #[async_trait]
    impl RoutingOracle for NoneOracle {
        async fn choose(&self, _query: &str, _candidates_json: &str) -> Result<String, RelayError> {
            Ok("NONE".to_string())
        }
    }

    struct FixedOracle(String);

    #[async_trait]
    impl RoutingOracle for FixedOracle {
        async fn choose(&self, _query: &str, _candidates_json: &str) -> Result<String, RelayError> {
            Ok(self.0.clone())
        }
    }

    struct OneShotClient {
        events: Vec<Value>,
    }

    #[async_trait]
    impl AgentClient for OneShotClient {
        async fn send_message(
            &self,
            _card: &AgentCard,
            _message: &UserMessage,
            event_tx: mpsc::Sender<Value>,
        ) -> Result<(), RelayError> {
            for event in &self.events {
                if event_tx.send(event.clone()).await.is_err() {
                    return Ok(());
                }
            }
            Ok(())
        }
    }

    fn make_skill(id: &str, tags: &[&str]) -> AgentSkill {
        AgentSkill {
            id: id.to_string(),
            name: id.to_string(),
            description: String::new(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            examples: vec![],
        }
    }

    fn make_card(url: &str, name: &str, skills: Vec<AgentSkill>) -> AgentCard {
        AgentCard {
            url: url.to_string(),
            name: name.to_string(),
            description: String::new(),
            skills,
        }
    }

    fn orchestrator(oracle: Arc<dyn RoutingOracle>, client: Arc<dyn AgentClient>) -> Orchestrator {
        // No peers configured: the registry is seeded directly by each test.
        Orchestrator::new(RelayConfig::default(), oracle, client)
    }

    async fn collect(mut rx: mpsc::Receiver<LifecycleEvent>) -> Vec<LifecycleEvent> {
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn empty_query_aborts_without_canonical_events() {
        let orch = orchestrator(Arc::new(NoneOracle), Arc::new(OneShotClient { events: vec![] }));
        let (tx, mut rx) = mpsc::channel(8);

        let err = orch.handle("   ", tx).await.unwrap_err();
        assert!(matches!(err, RelayError::EmptyMessage));
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn empty_registry_yields_task_then_no_route_completion() {
        let orch = orchestrator(Arc::new(NoneOracle), Arc::new(OneShotClient { events: vec![] }));
        orch.registry().publish(vec![]).await;
        let (tx, rx) = mpsc::channel(8);

        orch.handle("what time is it", tx).await.unwrap();
        let events = collect(rx).await;

        assert_eq!(events.len(), 2);
        assert!(matches!(&events[0], LifecycleEvent::Task { state: TaskState::Submitted, .. }));
        assert!(matches!(
            &events[1],
            LifecycleEvent::Status { state: TaskState::Completed, message: Some(m), is_final: true, .. }
                if m.contains("none of my helper agents")
        ));
    }

    #[tokio::test]
    async fn routed_request_relays_the_agent_answer() {
        let client = Arc::new(OneShotClient {
            events: vec![
                json!({"is_task_complete": false, "require_user_input": false, "content": "thinking"}),
                json!({"is_task_complete": true, "require_user_input": false, "content": "It is 10:00:00 in Asia/Tokyo."}),
            ],
        });
        let orch = orchestrator(Arc::new(NoneOracle), client);
        orch.registry()
            .publish(vec![make_card(
                "http://localhost:10000",
                "Time Agent",
                vec![make_skill("tell_time", &["time", "clock"])],
            )])
            .await;
        let (tx, rx) = mpsc::channel(16);

        orch.handle("what time is it in tokyo", tx).await.unwrap();
        let events = collect(rx).await;

        // Task, Asking, thinking, artifact, completed.
        assert_eq!(events.len(), 5);
        assert!(matches!(
            &events[3],
            LifecycleEvent::Artifact { text, is_final: true, .. }
                if text == "It is 10:00:00 in Asia/Tokyo."
        ));
        assert!(matches!(
            &events[4],
            LifecycleEvent::Status { state: TaskState::Completed, is_final: true, .. }
        ));
        assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);
    }

    #[tokio::test]
    async fn hallucinated_oracle_url_falls_back_to_tag_routing() {
        let client = Arc::new(OneShotClient {
            events: vec![json!({"is_task_complete": true, "content": "done"})],
        });
        let orch = orchestrator(
            Arc::new(FixedOracle("http://localhost:9999".to_string())),
            client,
        );
        orch.registry()
            .publish(vec![make_card(
                "http://localhost:10000",
                "Time Agent",
                vec![make_skill("tell_time", &["time", "clock"])],
            )])
            .await;
        let (tx, rx) = mpsc::channel(16);

        orch.handle("what time is it in tokyo", tx).await.unwrap();
        let events = collect(rx).await;
        // Fallback routed to the real agent rather than the hallucinated URL.
        assert!(events.iter().any(|e| matches!(
            e,
            LifecycleEvent::Status { state: TaskState::Completed, is_final: true, .. }
        )));
    }

    #[tokio::test]
    async fn cancel_reports_unsupported() {
        let orch = orchestrator(Arc::new(NoneOracle), Arc::new(OneShotClient { events: vec![] }));
        let err = orch.cancel("some-context").await.unwrap_err();
        assert!(matches!(err, RelayError::CancelUnsupported));
    }

    #[tokio::test]
    async fn bootstrap_rejects_malformed_peer_urls() {
        let orch = Orchestrator::new(
            RelayConfig::from_peer_list("not a url"),
            Arc::new(NoneOracle),
            Arc::new(OneShotClient { events: vec![] }),
        );
        assert!(orch.bootstrap().await.is_err());
    }

    #[test]
    fn orchestrator_card_advertises_the_routing_skill() {
        let card = agent_card("http://localhost:10002/");
        assert_eq!(card.name, "Orchestrator Agent");
        assert_eq!(card.skills.len(), 1);
        assert_eq!(card.skills[0].id, "auto_route");
        assert_eq!(card.skills[0].tags, vec!["routing"]);
    }
}
