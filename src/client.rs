// ABOUTME: AgentClient trait and the HTTP/SSE transport adapter behind it.
// ABOUTME: Streams raw agent-native JSON events back to the relay through a channel.

use async_trait::async_trait;
use futures::StreamExt;
use tokio::sync::mpsc;

use crate::error::RelayError;
use crate::types::{AgentCard, UserMessage};

/// Streaming call boundary to a downstream agent.
///
/// The relay only depends on this trait; the wire shape of the events is a
/// transport concern. Implementations send each agent-native event as a raw
/// JSON value and return once the stream closes. A closed receiver means the
/// relay stopped consuming; implementations must treat that as a graceful
/// stop, not an error.
#[async_trait]
pub trait AgentClient: Send + Sync {
    async fn send_message(
        &self,
        card: &AgentCard,
        message: &UserMessage,
        event_tx: mpsc::Sender<serde_json::Value>,
    ) -> Result<(), RelayError>;
}

/// HTTP adapter that posts the message to the agent and consumes an SSE body.
pub struct HttpAgentClient {
    client: reqwest::Client,
}

impl HttpAgentClient {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    /// Drain an SSE response, forwarding each `data:` payload as a JSON value.
    async fn stream_events(
        response: reqwest::Response,
        event_tx: &mpsc::Sender<serde_json::Value>,
    ) -> Result<(), RelayError> {
        let mut stream = response.bytes_stream();
        let mut buffer = String::new();

        while let Some(chunk_result) = stream.next().await {
            let chunk =
                chunk_result.map_err(|e| RelayError::Transport(format!("stream read: {}", e)))?;
            buffer.push_str(&String::from_utf8_lossy(&chunk));

            while let Some(newline_pos) = buffer.find('\n') {
                let line = buffer[..newline_pos].trim().to_string();
                buffer = buffer[newline_pos + 1..].to_string();

                if line.is_empty() || line.starts_with(':') {
                    continue;
                }

                let Some(data) = line.strip_prefix("data: ") else {
                    continue;
                };
                if data == "[DONE]" {
                    return Ok(());
                }

                let event: serde_json::Value = match serde_json::from_str(data) {
                    Ok(v) => v,
                    Err(e) => {
                        log::debug!("[AgentClient] Skipping unparsable event: {}", e);
                        continue;
                    }
                };

                if event_tx.send(event).await.is_err() {
                    // Receiver hung up: the relay saw a terminal event.
                    return Ok(());
                }
            }
        }

        Ok(())
    }
}

impl Default for HttpAgentClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AgentClient for HttpAgentClient {
    async fn send_message(
        &self,
        card: &AgentCard,
        message: &UserMessage,
        event_tx: mpsc::Sender<serde_json::Value>,
    ) -> Result<(), RelayError> {
        log::info!("[AgentClient] Sending message to {}", card.url);

        let response = self
            .client
            .post(&card.url)
            .header("Accept", "text/event-stream")
            .json(&serde_json::json!({ "message": message }))
            .send()
            .await
            .map_err(|e| RelayError::Transport(format!("request to {}: {}", card.url, e)))?;

        if !response.status().is_success() {
            return Err(RelayError::Transport(format!(
                "{} returned HTTP {}",
                card.url,
                response.status()
            )));
        }

        Self::stream_events(response, &event_tx).await
    }
}
