// ABOUTME: Agent discovery: fetches well-known agent cards from candidate URLs.
// ABOUTME: Scatter/gather refresh that tolerates partial failure and swaps the registry.

use std::time::Duration;

use futures::future::join_all;

use crate::registry::CardRegistry;
use crate::types::AgentCard;

/// Well-known path each agent serves its card from.
const CARD_PATH: &str = "/.well-known/agent-card.json";

/// Fetch a single agent card, returning `None` on any failure.
///
/// Network errors, non-2xx statuses, and malformed payloads all mean the same
/// thing to discovery: this candidate is unreachable right now.
pub async fn fetch_card(
    client: &reqwest::Client,
    base_url: &str,
    timeout: Duration,
) -> Option<AgentCard> {
    let card_url = format!("{}{}", base_url.trim_end_matches('/'), CARD_PATH);

    let result = async {
        let response = client
            .get(&card_url)
            .timeout(timeout)
            .send()
            .await?
            .error_for_status()?;
        response.json::<AgentCard>().await
    }
    .await;

    match result {
        Ok(card) => {
            log::debug!("[Discovery] Got card '{}' from {}", card.name, base_url);
            Some(card)
        }
        Err(e) => {
            log::warn!("[Discovery] Failed to get card from {}: {}", base_url, e);
            None
        }
    }
}

/// Refresh the registry from the candidate list.
///
/// All fetches are issued concurrently and the swap waits for every one to
/// settle, so refresh latency is bounded by the slowest fetch, not the sum.
/// Unreachable candidates are dropped; the refresh itself never fails, and
/// the registry's refresh timestamp advances even when nothing was reachable.
pub async fn refresh(
    registry: &CardRegistry,
    client: &reqwest::Client,
    candidate_urls: &[String],
    timeout: Duration,
) {
    let fetches = candidate_urls
        .iter()
        .map(|url| fetch_card(client, url, timeout));

    let cards: Vec<AgentCard> = join_all(fetches).await.into_iter().flatten().collect();

    log::info!(
        "[Discovery] Discovered {} of {} candidate agents",
        cards.len(),
        candidate_urls.len()
    );
    registry.publish(cards).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::net::TcpListener;

    /// Serve a fixed response body on a loopback port until dropped.
    struct CardServer {
        addr: String,
        shutdown: Option<std::sync::mpsc::Sender<()>>,
        handle: Option<std::thread::JoinHandle<()>>,
    }

    impl CardServer {
        fn serve(body: &'static str) -> Self {
            let server = tiny_http::Server::http("127.0.0.1:0").unwrap();
            let addr = format!("http://{}", server.server_addr().to_ip().unwrap());
            let (shutdown, shutdown_rx) = std::sync::mpsc::channel::<()>();

            let handle = std::thread::spawn(move || {
                loop {
                    match server.recv_timeout(Duration::from_millis(50)) {
                        Ok(Some(request)) => {
                            let response = tiny_http::Response::from_string(body);
                            let _ = request.respond(response);
                        }
                        Ok(None) => {
                            if shutdown_rx.try_recv().is_ok() {
                                break;
                            }
                        }
                        Err(_) => break,
                    }
                }
            });

            Self {
                addr,
                shutdown: Some(shutdown),
                handle: Some(handle),
            }
        }
    }

    impl Drop for CardServer {
        fn drop(&mut self) {
            if let Some(shutdown) = self.shutdown.take() {
                let _ = shutdown.send(());
            }
            if let Some(handle) = self.handle.take() {
                let _ = handle.join();
            }
        }
    }

    /// Reserve a loopback port with no listener behind it.
    fn dead_url() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        format!("http://{}", addr)
    }

    const TIME_CARD: &str = r#"{
        "url": "http://localhost:10000",
        "name": "Time Agent",
        "description": "Tells the current time",
        "skills": [{"id": "tell_time", "name": "Tell time", "tags": ["time", "clock"]}]
    }"#;

    #[tokio::test(flavor = "multi_thread")]
    async fn fetch_card_parses_a_well_known_card() {
        let server = CardServer::serve(TIME_CARD);
        let client = reqwest::Client::new();

        let card = fetch_card(&client, &server.addr, Duration::from_secs(5)).await;
        let card = card.expect("card should be fetched");
        assert_eq!(card.name, "Time Agent");
        assert_eq!(card.skills[0].id, "tell_time");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn fetch_card_returns_none_for_unreachable_agent() {
        let client = reqwest::Client::new();
        let card = fetch_card(&client, &dead_url(), Duration::from_secs(1)).await;
        assert!(card.is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn fetch_card_returns_none_for_malformed_payload() {
        let server = CardServer::serve("this is not json");
        let client = reqwest::Client::new();

        let card = fetch_card(&client, &server.addr, Duration::from_secs(5)).await;
        assert!(card.is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn refresh_keeps_reachable_cards_and_advances_the_timestamp() {
        let server = CardServer::serve(TIME_CARD);
        let registry = CardRegistry::new();
        let client = reqwest::Client::new();

        let candidates = vec![server.addr.clone(), dead_url()];
        refresh(&registry, &client, &candidates, Duration::from_secs(1)).await;

        let snapshot = registry.snapshot().await;
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.cards()[0].name, "Time Agent");
        // A partially failed refresh still counts as a refresh.
        assert!(!registry.is_stale(Duration::from_secs(600)).await);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn refresh_with_no_reachable_agents_still_advances_the_timestamp() {
        let registry = CardRegistry::new();
        let client = reqwest::Client::new();

        refresh(&registry, &client, &[dead_url()], Duration::from_secs(1)).await;

        assert!(registry.snapshot().await.is_empty());
        assert!(!registry.is_stale(Duration::from_secs(600)).await);
    }
}
