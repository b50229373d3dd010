// ABOUTME: Core types for the relay: agent descriptors, tasks, and lifecycle events.
// ABOUTME: Defines the data structures that flow between discovery, router, and relay.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A capability unit advertised inside an agent card.
///
/// `id` and `tags` drive the router's fallback matching; `examples` are only
/// shown to the routing oracle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSkill {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub examples: Vec<String>,
}

/// Descriptor a downstream agent publishes at `/.well-known/agent-card.json`.
///
/// Immutable once fetched; the registry replaces cards wholesale on each
/// discovery cycle. `url` is the unique key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentCard {
    pub url: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub skills: Vec<AgentSkill>,
}

/// Lifecycle states a relayed task can be in.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Submitted,
    Working,
    InputRequired,
    Completed,
    Failed,
}

/// One unit of work tracking a single user request.
///
/// `context_id` is stable across every event produced for the request and is
/// the correlation key callers use to assemble a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub context_id: String,
    pub state: TaskState,
}

impl Task {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            context_id: Uuid::new_v4().to_string(),
            state: TaskState::Submitted,
        }
    }
}

impl Default for Task {
    fn default() -> Self {
        Self::new()
    }
}

/// Canonical events delivered to the caller.
///
/// This is the only vocabulary the caller sees; every downstream agent event
/// shape is translated into one of these variants by the relay.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LifecycleEvent {
    /// Task creation notification, sent once at the start of a request.
    Task {
        id: String,
        context_id: String,
        state: TaskState,
    },
    /// Progress or terminal status update.
    Status {
        task_id: String,
        context_id: String,
        state: TaskState,
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
        #[serde(rename = "final")]
        is_final: bool,
    },
    /// Produced text payload from the chosen agent.
    Artifact {
        task_id: String,
        context_id: String,
        text: String,
        #[serde(rename = "final")]
        is_final: bool,
    },
}

impl LifecycleEvent {
    /// Whether this event ends the task lifecycle for the caller.
    pub fn is_terminal(&self) -> bool {
        match self {
            LifecycleEvent::Task { .. } => false,
            LifecycleEvent::Status { is_final, .. } => *is_final,
            LifecycleEvent::Artifact { .. } => false,
        }
    }
}

/// A single part of a user message. Only text parts are produced today.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessagePart {
    pub kind: String,
    pub text: String,
}

/// The message forwarded to the chosen downstream agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserMessage {
    pub role: String,
    pub parts: Vec<MessagePart>,
    #[serde(rename = "messageId")]
    pub message_id: String,
}

impl UserMessage {
    /// Build a text message with a fresh opaque message id.
    pub fn text(query: &str) -> Self {
        Self {
            role: "user".to_string(),
            parts: vec![MessagePart {
                kind: "text".to_string(),
                text: query.to_string(),
            }],
            message_id: Uuid::new_v4().simple().to_string(),
        }
    }
}
