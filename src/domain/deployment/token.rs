//! Long-lived per-tool deploy tokens.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use uuid::Uuid;

/// A per-tool secret that lets a tool's own jobs trigger deployments without
/// the gateway header. At most one exists per tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployToken {
    pub token: Uuid,
    pub creation_date: DateTime<Utc>,
}

impl DeployToken {
    /// Mint a fresh token.
    pub fn new() -> Self {
        Self {
            token: Uuid::new_v4(),
            creation_date: Utc::now(),
        }
    }

    /// True once the token has outlived the configured lifetime.
    pub fn is_expired(&self, lifetime: chrono::Duration) -> bool {
        self.creation_date + lifetime < Utc::now()
    }

    /// Constant-time comparison against a candidate string.
    pub fn matches(&self, candidate: &str) -> bool {
        let own = self.token.to_string();
        own.as_bytes().ct_eq(candidate.as_bytes()).into()
    }
}

impl Default for DeployToken {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_token_is_not_expired() {
        let token = DeployToken::new();
        assert!(!token.is_expired(chrono::Duration::days(365)));
    }

    #[test]
    fn old_token_is_expired() {
        let token = DeployToken {
            token: Uuid::new_v4(),
            creation_date: Utc::now() - chrono::Duration::days(400),
        };
        assert!(token.is_expired(chrono::Duration::days(365)));
    }

    #[test]
    fn matches_exact_string_only() {
        let token = DeployToken::new();
        let value = token.token.to_string();
        assert!(token.matches(&value));
        assert!(!token.matches(&format!("{value}extra")));
        assert!(!token.matches("definitely-not-a-uuid"));
    }

    #[test]
    fn two_tokens_differ() {
        assert_ne!(DeployToken::new().token, DeployToken::new().token);
    }
}
