use std::sync::Arc;

use crate::domain::{PlayerId, RepoUpdateError, player::PlayerRepository};

#[async_trait::async_trait]
pub trait DeactivatePlayerWorkflow {
    /// Soft delete. Stats are kept but drop out of default leaderboard and
    /// search results.
    async fn deactivate_player(&self, player_id: PlayerId) -> Result<(), DeactivatePlayerError>;
    async fn reactivate_player(&self, player_id: PlayerId) -> Result<(), DeactivatePlayerError>;
}

#[derive(Debug, thiserror::Error)]
pub enum DeactivatePlayerError {
    #[error("player {0} not found")]
    NotFound(PlayerId),
    #[error("internal error")]
    Internal,
}

pub struct DeactivatePlayerWorkflowImpl<P: PlayerRepository> {
    player_repository: Arc<P>,
}

impl<P> DeactivatePlayerWorkflowImpl<P>
where
    P: PlayerRepository + Send + Sync + 'static,
{
    pub fn new(player_repository: Arc<P>) -> Self {
        Self { player_repository }
    }

    async fn set_active(
        &self,
        player_id: PlayerId,
        active: bool,
    ) -> Result<(), DeactivatePlayerError> {
        match self.player_repository.set_active(player_id, active).await {
            Ok(()) => {
                log::info!(
                    "{} player {}",
                    if active { "Reactivated" } else { "Deactivated" },
                    player_id
                );
                Ok(())
            }
            Err(RepoUpdateError::NotFound) => Err(DeactivatePlayerError::NotFound(player_id)),
            Err(RepoUpdateError::StorageError(e)) => {
                log::error!("Failed to update player {}: {}", player_id, e);
                Err(DeactivatePlayerError::Internal)
            }
        }
    }
}

#[async_trait::async_trait]
impl<P> DeactivatePlayerWorkflow for DeactivatePlayerWorkflowImpl<P>
where
    P: PlayerRepository + Send + Sync + 'static,
{
    async fn deactivate_player(&self, player_id: PlayerId) -> Result<(), DeactivatePlayerError> {
        self.set_active(player_id, false).await
    }

    async fn reactivate_player(&self, player_id: PlayerId) -> Result<(), DeactivatePlayerError> {
        self.set_active(player_id, true).await
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use crate::{
        domain::{player::Player, stats::StatsRepository},
        storage::memory::InMemoryStore,
    };

    use super::*;

    #[tokio::test]
    async fn test_deactivate_keeps_stats() {
        let store = InMemoryStore::new();
        let player = Player::registered("alice".to_string(), None, "h".to_string(), Utc::now());
        let id = player.player_id;
        store.create_player(player).await.unwrap();

        let wf = DeactivatePlayerWorkflowImpl::new(Arc::new(store.clone()));
        wf.deactivate_player(id).await.unwrap();
        assert!(!store.get_player(id).await.unwrap().is_active);
        assert!(store.get_player_stats(id).await.is_ok());

        wf.reactivate_player(id).await.unwrap();
        assert!(store.get_player(id).await.unwrap().is_active);

        assert!(matches!(
            wf.deactivate_player(PlayerId::new()).await,
            Err(DeactivatePlayerError::NotFound(_))
        ));
    }
}
