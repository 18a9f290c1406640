use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::domain::{PlayerId, RepoRetrieveError, RepoUpdateError, player::PlayerRepository};

#[async_trait::async_trait]
pub trait RecordLoginUseCase {
    async fn record_login(&self, player_id: PlayerId) -> Result<DateTime<Utc>, RecordLoginError>;
}

#[derive(Debug, thiserror::Error)]
pub enum RecordLoginError {
    #[error("player {0} not found")]
    NotFound(PlayerId),
    #[error("player {0} is deactivated")]
    Inactive(PlayerId),
    #[error("internal error")]
    Internal,
}

pub struct RecordLoginUseCaseImpl<P: PlayerRepository> {
    player_repository: Arc<P>,
}

impl<P: PlayerRepository> RecordLoginUseCaseImpl<P> {
    pub fn new(player_repository: Arc<P>) -> Self {
        Self { player_repository }
    }
}

#[async_trait::async_trait]
impl<P: PlayerRepository + Send + Sync + 'static> RecordLoginUseCase for RecordLoginUseCaseImpl<P> {
    async fn record_login(&self, player_id: PlayerId) -> Result<DateTime<Utc>, RecordLoginError> {
        match self.player_repository.get_player(player_id).await {
            Ok(player) if !player.is_active => return Err(RecordLoginError::Inactive(player_id)),
            Ok(_) => {}
            Err(RepoRetrieveError::NotFound) => {
                return Err(RecordLoginError::NotFound(player_id));
            }
            Err(e) => {
                log::error!("Failed to load player {}: {}", player_id, e);
                return Err(RecordLoginError::Internal);
            }
        }

        let now = Utc::now();
        match self.player_repository.record_login(player_id, now).await {
            Ok(()) => Ok(now),
            Err(RepoUpdateError::NotFound) => Err(RecordLoginError::NotFound(player_id)),
            Err(RepoUpdateError::StorageError(e)) => {
                log::error!("Failed to record login for {}: {}", player_id, e);
                Err(RecordLoginError::Internal)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{domain::player::Player, storage::memory::InMemoryStore};

    use super::*;

    #[tokio::test]
    async fn test_record_login() {
        let store = InMemoryStore::new();
        let player = Player::registered("alice".to_string(), None, "h".to_string(), Utc::now());
        let id = player.player_id;
        store.create_player(player).await.unwrap();

        let uc = RecordLoginUseCaseImpl::new(Arc::new(store.clone()));
        let at = uc.record_login(id).await.unwrap();
        assert_eq!(store.get_player(id).await.unwrap().last_login, Some(at));

        store.set_active(id, false).await.unwrap();
        assert!(matches!(
            uc.record_login(id).await,
            Err(RecordLoginError::Inactive(_))
        ));
        assert!(matches!(
            uc.record_login(PlayerId::new()).await,
            Err(RecordLoginError::NotFound(_))
        ));
    }
}
