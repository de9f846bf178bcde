//! Deploy token handlers.

use std::sync::Arc;

use crate::domain::deployment::DeployToken;
use crate::ports::{Storage, StorageError};

use super::error::HandlerError;

/// Handlers for the per-tool deploy token.
pub struct TokenHandlers {
    storage: Arc<dyn Storage>,
}

impl TokenHandlers {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Mint a token; conflicts when one already exists.
    pub async fn create(&self, tool: &str) -> Result<DeployToken, HandlerError> {
        tracing::info!(tool, "Creating deploy token");
        match self.storage.get_deploy_token(tool).await {
            Ok(_) => Err(HandlerError::Conflict(format!(
                "Deploy token already exists. Use PUT /tool/{tool}/deployment/token to \
                 refresh it."
            ))),
            Err(StorageError::NotFound(_)) => self.mint(tool).await,
            Err(error) => Err(error.into()),
        }
    }

    pub async fn get(&self, tool: &str) -> Result<DeployToken, HandlerError> {
        tracing::info!(tool, "Retrieving deploy token");
        Ok(self.storage.get_deploy_token(tool).await?)
    }

    /// Replace an existing token with a fresh one; 404 when none exists yet.
    pub async fn refresh(&self, tool: &str) -> Result<DeployToken, HandlerError> {
        tracing::info!(tool, "Refreshing deploy token");
        self.storage.get_deploy_token(tool).await?;
        self.mint(tool).await
    }

    pub async fn delete(&self, tool: &str) -> Result<DeployToken, HandlerError> {
        tracing::info!(tool, "Deleting deploy token");
        Ok(self.storage.delete_deploy_token(tool).await?)
    }

    async fn mint(&self, tool: &str) -> Result<DeployToken, HandlerError> {
        let token = DeployToken::new();
        self.storage.set_deploy_token(tool, token.clone()).await?;
        tracing::info!(tool, "Deploy token created");
        Ok(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::storage::InMemoryStorage;

    fn handlers() -> TokenHandlers {
        let storage = Arc::new(InMemoryStorage::new(chrono::Duration::hours(1), 25));
        TokenHandlers::new(storage)
    }

    #[tokio::test]
    async fn create_then_get_round_trips() {
        let handlers = handlers();
        let created = handlers.create("some-tool").await.unwrap();
        let loaded = handlers.get("some-tool").await.unwrap();
        assert_eq!(created, loaded);
    }

    #[tokio::test]
    async fn second_create_conflicts() {
        let handlers = handlers();
        handlers.create("some-tool").await.unwrap();
        match handlers.create("some-tool").await {
            Err(HandlerError::Conflict(message)) => {
                assert!(message.contains("already exists"));
            }
            other => panic!("expected Conflict, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn refresh_mints_a_distinct_token() {
        let handlers = handlers();
        let first = handlers.create("some-tool").await.unwrap();
        let second = handlers.refresh("some-tool").await.unwrap();
        assert_ne!(first.token, second.token);

        let loaded = handlers.get("some-tool").await.unwrap();
        assert_eq!(loaded, second);
    }

    #[tokio::test]
    async fn refresh_without_token_is_not_found() {
        let handlers = handlers();
        assert!(matches!(
            handlers.refresh("some-tool").await,
            Err(HandlerError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn delete_returns_the_deleted_token() {
        let handlers = handlers();
        let created = handlers.create("some-tool").await.unwrap();
        let deleted = handlers.delete("some-tool").await.unwrap();
        assert_eq!(created, deleted);
        assert!(matches!(
            handlers.get("some-tool").await,
            Err(HandlerError::NotFound(_))
        ));
    }
}
