// ABOUTME: Error types for the relay orchestrator.
// ABOUTME: Defines RelayError covering configuration, oracle, and transport failures.

use thiserror::Error;

/// Errors surfaced by the relay's public API.
///
/// Per-agent discovery failures and malformed oracle replies are recovered
/// locally and never appear here; routing "no suitable agent" is a normal
/// completed outcome, not an error.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("no user message provided")]
    EmptyMessage,

    #[error("cancel is not supported")]
    CancelUnsupported,

    #[error("invalid peer url '{url}': {source}")]
    InvalidPeerUrl {
        url: String,
        source: url::ParseError,
    },

    #[error("oracle request failed: {0}")]
    Oracle(String),

    #[error("agent transport error: {0}")]
    Transport(String),

    #[error("event channel closed by receiver")]
    ChannelClosed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_render_readable_messages() {
        assert_eq!(RelayError::EmptyMessage.to_string(), "no user message provided");
        assert_eq!(
            RelayError::CancelUnsupported.to_string(),
            "cancel is not supported"
        );
        assert!(
            RelayError::Transport("connection reset".to_string())
                .to_string()
                .contains("connection reset")
        );
    }

    #[test]
    fn invalid_peer_url_includes_the_offending_url() {
        let err = RelayError::InvalidPeerUrl {
            url: "not a url".to_string(),
            source: url::Url::parse("not a url").unwrap_err(),
        };
        assert!(err.to_string().contains("not a url"));
    }
}
