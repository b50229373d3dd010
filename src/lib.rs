// ABOUTME: Core library for the agent-relay orchestrator.
// ABOUTME: Discovers downstream agents, routes each query to one, and relays its stream.

pub mod client;
pub mod config;
pub mod discovery;
pub mod error;
pub mod oracle;
pub mod registry;
pub mod relay;
pub mod router;
pub mod service;
pub mod types;

pub use client::{AgentClient, HttpAgentClient};
pub use config::RelayConfig;
pub use error::RelayError;
pub use oracle::{ChatModelOracle, RoutingOracle};
pub use registry::{CardRegistry, RegistrySnapshot};
pub use relay::Relay;
pub use service::{Orchestrator, agent_card};
pub use types::{AgentCard, AgentSkill, LifecycleEvent, Task, TaskState, UserMessage};
