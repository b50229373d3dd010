// ABOUTME: Two-stage agent selection: reasoning oracle first, tag matching second.
// ABOUTME: Oracle replies are untrusted text; URLs are extracted by pattern match.

use regex::Regex;

use crate::oracle::RoutingOracle;
use crate::registry::RegistrySnapshot;

/// Sentinel the oracle uses for "no suitable agent".
const NONE_SENTINEL: &str = "NONE";

/// URL-shaped token inside free text.
const URL_PATTERN: &str = r#"https?://[^\s"'<>]+"#;

/// Choose a downstream agent for `query`, or `None` when no agent fits.
///
/// Stage 1 asks the oracle and validates its pick against the snapshot; a
/// malformed reply, an oracle failure, or a hallucinated URL falls through to
/// Stage 2, deterministic skill-id/tag substring matching in snapshot order.
/// `None` is a valid routing outcome, not an error.
pub async fn choose(
    oracle: &dyn RoutingOracle,
    query: &str,
    snapshot: &RegistrySnapshot,
) -> Option<String> {
    if snapshot.is_empty() {
        return None;
    }

    match consult_oracle(oracle, query, snapshot).await {
        Some(url) if snapshot.get(&url).is_some() => {
            log::info!("[Router] Oracle routing decision: {}", url);
            return Some(url);
        }
        Some(url) => {
            log::warn!(
                "[Router] Oracle chose {} which is not in the registry, falling back",
                url
            );
        }
        None => {
            log::debug!("[Router] Oracle yielded no usable decision, falling back");
        }
    }

    fallback_by_tags(query, snapshot)
}

/// Stage 1: ask the oracle and extract a URL from its free-text reply.
async fn consult_oracle(
    oracle: &dyn RoutingOracle,
    query: &str,
    snapshot: &RegistrySnapshot,
) -> Option<String> {
    let candidates = candidates_json(snapshot);
    match oracle.choose(query, &candidates).await {
        Ok(reply) => extract_url(&reply),
        Err(e) => {
            log::warn!("[Router] Oracle request failed: {}", e);
            None
        }
    }
}

/// Serialize the candidate list the way the oracle expects it.
pub fn candidates_json(snapshot: &RegistrySnapshot) -> String {
    let candidates: Vec<serde_json::Value> = snapshot
        .cards()
        .iter()
        .map(|card| {
            serde_json::json!({
                "url": card.url,
                "name": card.name,
                "description": card.description,
                "skills": card.skills.iter().map(|s| {
                    serde_json::json!({
                        "id": s.id,
                        "name": s.name,
                        "description": s.description,
                        "tags": s.tags,
                        "examples": s.examples,
                    })
                }).collect::<Vec<_>>(),
            })
        })
        .collect();

    serde_json::to_string_pretty(&candidates).unwrap_or_else(|_| "[]".to_string())
}

/// Extract the first URL-shaped token from an untrusted oracle reply.
///
/// A reply that is the bare sentinel, or carries no URL-shaped token at all,
/// yields `None`.
pub fn extract_url(reply: &str) -> Option<String> {
    if reply.trim() == NONE_SENTINEL {
        return None;
    }

    let re = Regex::new(URL_PATTERN).ok()?;
    re.find(reply).map(|m| m.as_str().to_string())
}

/// Stage 2: deterministic fallback matching on skill ids and tags.
///
/// First card in snapshot order with a skill whose id or any tag appears as a
/// case-insensitive substring of the query wins. No ranking or scoring.
pub fn fallback_by_tags(query: &str, snapshot: &RegistrySnapshot) -> Option<String> {
    let q = query.to_lowercase();

    for card in snapshot.cards() {
        for skill in &card.skills {
            if !skill.id.is_empty() && q.contains(&skill.id.to_lowercase()) {
                return Some(card.url.clone());
            }
            if skill.tags.iter().any(|tag| q.contains(&tag.to_lowercase())) {
                return Some(card.url.clone());
            }
        }
    }
    None
}
