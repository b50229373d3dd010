// ABOUTME: Reasoning oracle seam used for primary routing decisions.
// ABOUTME: Defines the RoutingOracle trait and an OpenAI-style chat-completions adapter.

use async_trait::async_trait;

use crate::error::RelayError;

/// System prompt instructing the model how to pick an agent.
const SYSTEM_PROMPT: &str = "You are an orchestrator deciding which helper agent should answer the \
user. You will get:\n\
  - a JSON list of agents (url, name, skills)\n\
  - the user question\n\n\
Reply with ONLY the chosen agent's URL, or the single word NONE.";

/// The external decision function consulted for primary routing.
///
/// Implementations give no guarantees on determinism or latency beyond their
/// own timeouts, and the reply is untrusted free text; the router extracts a
/// URL by pattern match, never by structured parsing.
#[async_trait]
pub trait RoutingOracle: Send + Sync {
    /// Pick an agent for `query` given the serialized candidate list.
    async fn choose(&self, query: &str, candidates_json: &str) -> Result<String, RelayError>;
}

/// Oracle adapter backed by an OpenAI-style chat-completions endpoint.
pub struct ChatModelOracle {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

impl ChatModelOracle {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            model: model.into(),
        }
    }

    fn build_request_body(&self, query: &str, candidates_json: &str) -> serde_json::Value {
        serde_json::json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {
                    "role": "user",
                    "content": format!(
                        "Agents list:\n{}\n\nUser question:\n{}\n\nChosen URL:",
                        candidates_json, query
                    )
                }
            ],
            "stream": false
        })
    }
}

#[async_trait]
impl RoutingOracle for ChatModelOracle {
    async fn choose(&self, query: &str, candidates_json: &str) -> Result<String, RelayError> {
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        let body = self.build_request_body(query, candidates_json);

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| RelayError::Oracle(format!("request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(RelayError::Oracle(format!(
                "endpoint returned HTTP {}",
                response.status()
            )));
        }

        let parsed: serde_json::Value = response
            .json()
            .await
            .map_err(|e| RelayError::Oracle(format!("malformed response: {}", e)))?;

        let reply = parsed
            .pointer("/choices/0/message/content")
            .and_then(|v| v.as_str())
            .ok_or_else(|| RelayError::Oracle("response carried no content".to_string()))?;

        Ok(reply.to_string())
    }
}
