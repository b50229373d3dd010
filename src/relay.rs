// ABOUTME: Protocol-translation state machine relaying one agent stream to the caller.
// ABOUTME: Classifies agent-native events into lifecycle events with a single-terminal guard.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::mpsc;

use crate::client::AgentClient;
use crate::error::RelayError;
use crate::types::{AgentCard, LifecycleEvent, Task, TaskState, UserMessage};

/// Message attached to the completed status when routing found no agent.
pub const NO_ROUTE_MESSAGE: &str = "I'm sorry, none of my helper agents can answer that.";

/// Buffer for agent-native events between transport and relay.
const AGENT_EVENT_BUFFER: usize = 64;

// =============================================================================
// Agent Event Classification
// =============================================================================

/// Nested status object carried by a status-update envelope.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusPayload {
    pub state: TaskState,
    pub message: Option<String>,
}

/// The downstream event shapes the relay understands.
///
/// Classification is discriminator-based so a new agent event shape is a new
/// variant plus a new arm, not an edit to existing branches.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentEventKind {
    /// Envelope carrying a produced artifact (terminal).
    Artifact(Value),
    /// Envelope carrying a nested status object (progress).
    Status(StatusPayload),
    /// Inline progress object with completion flags.
    Progress {
        is_task_complete: bool,
        require_user_input: bool,
        content: String,
    },
}

/// Classify a raw agent-native event, or `None` for unrecognized shapes.
pub fn classify(event: &Value) -> Option<AgentEventKind> {
    // Artifact envelope: `artifact` object, or first element of `artifacts`.
    if let Some(artifact) = event.get("artifact") {
        return Some(AgentEventKind::Artifact(artifact.clone()));
    }
    if let Some(artifact) = event
        .get("artifacts")
        .and_then(|a| a.as_array())
        .and_then(|a| a.first())
    {
        return Some(AgentEventKind::Artifact(artifact.clone()));
    }

    // Status-update envelope: nested `status` object with a `state`.
    if let Some(status) = event.get("status") {
        if let Some(state) = status.get("state").and_then(|s| s.as_str()) {
            return Some(AgentEventKind::Status(StatusPayload {
                state: parse_state(state),
                message: status.get("message").and_then(first_text),
            }));
        }
    }

    // Inline progress object: completion flags with content.
    let is_task_complete = event.get("is_task_complete").and_then(|v| v.as_bool());
    let content = event.get("content").and_then(|v| v.as_str());
    if is_task_complete.is_some() || content.is_some() {
        return Some(AgentEventKind::Progress {
            is_task_complete: is_task_complete.unwrap_or(false),
            require_user_input: event
                .get("require_user_input")
                .and_then(|v| v.as_bool())
                .unwrap_or(false),
            content: content.unwrap_or_default().to_string(),
        });
    }

    None
}

/// Map a downstream state string onto the canonical lifecycle.
///
/// Accepts both hyphenated and snake_case spellings; anything unknown is
/// treated as progress.
fn parse_state(state: &str) -> TaskState {
    match state {
        "submitted" => TaskState::Submitted,
        "working" => TaskState::Working,
        "input-required" | "input_required" => TaskState::InputRequired,
        "completed" => TaskState::Completed,
        "failed" | "error" => TaskState::Failed,
        _ => TaskState::Working,
    }
}

/// Depth-first search for the first non-empty `parts[].text` leaf.
pub fn first_text(node: &Value) -> Option<String> {
    match node {
        Value::Object(map) => {
            if map.get("kind").and_then(|k| k.as_str()) == Some("text") {
                if let Some(text) = map.get("text").and_then(|t| t.as_str()) {
                    if !text.is_empty() {
                        return Some(text.to_string());
                    }
                }
            }
            map.values().find_map(first_text)
        }
        Value::Array(items) => items.iter().find_map(first_text),
        _ => None,
    }
}

// =============================================================================
// Relay State Machine
// =============================================================================

/// Drives one routing attempt end-to-end for a single task.
///
/// Owns the task and the caller-facing channel. Every emission goes through
/// the guarded emit functions, which makes the at-most-one-terminal invariant
/// mechanical: once a final status has been sent, later emissions are dropped
/// and the agent stream is no longer consumed.
pub struct Relay {
    task: Task,
    tx: mpsc::Sender<LifecycleEvent>,
    terminal_sent: bool,
}

impl Relay {
    pub fn new(task: Task, tx: mpsc::Sender<LifecycleEvent>) -> Self {
        Self {
            task,
            tx,
            terminal_sent: false,
        }
    }

    pub fn task(&self) -> &Task {
        &self.task
    }

    /// Announce task creation (the `submitted` notification).
    pub async fn announce_task(&self) -> Result<(), RelayError> {
        self.tx
            .send(LifecycleEvent::Task {
                id: self.task.id.clone(),
                context_id: self.task.context_id.clone(),
                state: TaskState::Submitted,
            })
            .await
            .map_err(|_| RelayError::ChannelClosed)
    }

    /// Finish the attempt with a completed status and an explanatory message.
    ///
    /// Used for the no-route outcome, which is a normal completion, not a
    /// failure.
    pub async fn complete_with_message(&mut self, message: &str) -> Result<(), RelayError> {
        self.emit_status(TaskState::Completed, Some(message.to_string()), true)
            .await
    }

    /// Open the agent stream and translate it until a terminal event.
    pub async fn relay_stream(
        &mut self,
        card: &AgentCard,
        client: Arc<dyn AgentClient>,
        query: &str,
    ) -> Result<(), RelayError> {
        self.emit_status(
            TaskState::Working,
            Some(format!("Asking {}...", card.name)),
            false,
        )
        .await?;

        let (agent_tx, mut agent_rx) = mpsc::channel::<Value>(AGENT_EVENT_BUFFER);
        let message = UserMessage::text(query);
        let stream_card = card.clone();
        let stream_handle =
            tokio::spawn(async move { client.send_message(&stream_card, &message, agent_tx).await });

        while let Some(raw) = agent_rx.recv().await {
            match classify(&raw) {
                Some(AgentEventKind::Artifact(artifact)) => {
                    let answer = first_text(&artifact).unwrap_or_default();
                    self.emit_artifact(answer.clone(), true).await?;
                    self.emit_status(TaskState::Completed, Some(answer), true)
                        .await?;
                    break;
                }
                Some(AgentEventKind::Status(status)) => {
                    self.emit_status(status.state, status.message, false).await?;
                }
                Some(AgentEventKind::Progress {
                    is_task_complete: true,
                    content,
                    ..
                }) => {
                    self.emit_artifact(content.clone(), true).await?;
                    self.emit_status(TaskState::Completed, Some(content), true)
                        .await?;
                    break;
                }
                Some(AgentEventKind::Progress {
                    require_user_input: true,
                    content,
                    ..
                }) => {
                    // Terminal for this attempt; the relay does not auto-resume.
                    self.emit_status(TaskState::InputRequired, Some(content), true)
                        .await?;
                    break;
                }
                Some(AgentEventKind::Progress { content, .. }) => {
                    self.emit_status(TaskState::Working, Some(content), false)
                        .await?;
                }
                None => {
                    log::debug!("[Relay] Skipping unrecognized agent event: {}", raw);
                }
            }
        }

        if self.terminal_sent {
            // Stop consuming without awaiting stream closure; the transport
            // winds down once its next send fails.
            drop(agent_rx);
            return Ok(());
        }

        // The stream ended without a terminal event. Surface it as an explicit
        // failed terminal rather than truncating the caller's sequence.
        match stream_handle.await {
            Ok(Ok(())) => {
                log::warn!(
                    "[Relay] Agent stream for task {} closed without a final result",
                    self.task.id
                );
                self.emit_status(
                    TaskState::Failed,
                    Some("The agent stream ended without a final result.".to_string()),
                    true,
                )
                .await
            }
            Ok(Err(e)) => {
                log::warn!("[Relay] Agent stream for task {} failed: {}", self.task.id, e);
                self.emit_status(TaskState::Failed, Some(format!("Agent call failed: {}", e)), true)
                    .await
            }
            Err(e) => {
                log::error!("[Relay] Agent stream task panicked: {}", e);
                self.emit_status(
                    TaskState::Failed,
                    Some("Internal error while contacting the agent.".to_string()),
                    true,
                )
                .await
            }
        }
    }

    /// Guarded status emission. Sets the terminal latch on final statuses.
    async fn emit_status(
        &mut self,
        state: TaskState,
        message: Option<String>,
        is_final: bool,
    ) -> Result<(), RelayError> {
        if self.terminal_sent {
            log::debug!("[Relay] Dropping status after terminal event for task {}", self.task.id);
            return Ok(());
        }

        self.task.state = state;
        if is_final {
            self.terminal_sent = true;
        }

        self.tx
            .send(LifecycleEvent::Status {
                task_id: self.task.id.clone(),
                context_id: self.task.context_id.clone(),
                state,
                message,
                is_final,
            })
            .await
            .map_err(|_| RelayError::ChannelClosed)
    }

    /// Guarded artifact emission. The final flag marks the last chunk; the
    /// lifecycle terminal is always a status.
    async fn emit_artifact(&mut self, text: String, is_final: bool) -> Result<(), RelayError> {
        if self.terminal_sent {
            log::debug!(
                "[Relay] Dropping artifact after terminal event for task {}",
                self.task.id
            );
            return Ok(());
        }

        self.tx
            .send(LifecycleEvent::Artifact {
                task_id: self.task.id.clone(),
                context_id: self.task.context_id.clone(),
                text,
                is_final,
            })
            .await
            .map_err(|_| RelayError::ChannelClosed)
    }
}
