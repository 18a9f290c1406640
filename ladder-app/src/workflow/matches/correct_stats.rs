use std::{sync::Arc, time::Duration};

use chrono::Utc;

use crate::{
    config::EngineConfig,
    domain::{
        PlayerId,
        stats::{
            CommitError, LeaseError, PlayerStats, StatsCommit, StatsCorrection, StatsLease,
            StatsRepository,
        },
        validation::PlayerValidator,
    },
};

#[async_trait::async_trait]
pub trait CorrectStatsUseCase {
    async fn correct_stats(
        &self,
        player_id: PlayerId,
        correction: StatsCorrection,
    ) -> Result<PlayerStats, CorrectStatsError>;
}

#[derive(Debug, thiserror::Error)]
pub enum CorrectStatsError {
    #[error("player {0} not found")]
    PlayerNotFound(PlayerId),
    #[error("a correction needs a reason")]
    MissingReason,
    #[error("{0}")]
    InvalidRating(#[from] crate::domain::validation::ValidationError),
    #[error("timed out waiting for the player lock")]
    LockTimeout,
    #[error("stats kept changing after {attempts} attempts")]
    UpdateConflict { attempts: u32 },
    #[error("storage error: {0}")]
    Storage(String),
}

pub struct CorrectStatsUseCaseImpl<S: StatsRepository> {
    stats_repository: Arc<S>,
    validator: Arc<PlayerValidator>,
    config: EngineConfig,
}

impl<S: StatsRepository> CorrectStatsUseCaseImpl<S> {
    pub fn new(
        stats_repository: Arc<S>,
        validator: Arc<PlayerValidator>,
        config: EngineConfig,
    ) -> Self {
        Self {
            stats_repository,
            validator,
            config,
        }
    }
}

#[async_trait::async_trait]
impl<S: StatsRepository + Send + Sync + 'static> CorrectStatsUseCase
    for CorrectStatsUseCaseImpl<S>
{
    async fn correct_stats(
        &self,
        player_id: PlayerId,
        correction: StatsCorrection,
    ) -> Result<PlayerStats, CorrectStatsError> {
        if correction.reason.trim().is_empty() {
            return Err(CorrectStatsError::MissingReason);
        }
        if let Some(rating) = correction.rating {
            self.validator.validate_rating(rating)?;
        }

        let attempts = self.config.max_retries + 1;
        for attempt in 1..=attempts {
            let lease = match self
                .stats_repository
                .acquire_lease(&[player_id], self.config.lease_timeout)
                .await
            {
                Ok(lease) => lease,
                Err(LeaseError::NotFound(_)) => {
                    return Err(CorrectStatsError::PlayerNotFound(player_id));
                }
                Err(LeaseError::Timeout) if attempt < attempts => continue,
                Err(LeaseError::Timeout) => return Err(CorrectStatsError::LockTimeout),
                Err(LeaseError::StorageError(e)) => {
                    log::error!("Failed to lease stats for player {}: {}", player_id, e);
                    return Err(CorrectStatsError::Storage(e));
                }
            };

            let Some(current) = lease.snapshot().first().cloned() else {
                return Err(CorrectStatsError::PlayerNotFound(player_id));
            };
            let corrected = current.apply_correction(&correction, Utc::now());
            let commit = StatsCommit {
                match_id: None,
                records: vec![corrected.clone()],
            };
            match self.stats_repository.commit(lease, commit).await {
                Ok(()) => {
                    log::warn!(
                        "Corrected stats for player {}: rating {} -> {} ({})",
                        player_id,
                        current.rating,
                        corrected.rating,
                        correction.reason
                    );
                    return Ok(PlayerStats {
                        version: corrected.version + 1,
                        ..corrected
                    });
                }
                Err(CommitError::Conflict(_)) => {
                    tokio::time::sleep(Duration::from_millis(5 * attempt as u64)).await;
                }
                Err(e) => {
                    log::error!("Failed to commit correction for player {}: {}", player_id, e);
                    return Err(CorrectStatsError::Storage(e.to_string()));
                }
            }
        }
        Err(CorrectStatsError::UpdateConflict { attempts })
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        domain::{
            player::{Player, PlayerRepository},
            validation::ValidationConfig,
        },
        storage::memory::InMemoryStore,
    };

    use super::*;

    fn use_case(store: &InMemoryStore) -> CorrectStatsUseCaseImpl<InMemoryStore> {
        CorrectStatsUseCaseImpl::new(
            Arc::new(store.clone()),
            Arc::new(PlayerValidator::new(ValidationConfig::default())),
            EngineConfig::default(),
        )
    }

    async fn register(store: &InMemoryStore) -> PlayerId {
        let player = Player::registered("alice".to_string(), None, "h".to_string(), Utc::now());
        let id = player.player_id;
        store.create_player(player).await.unwrap();
        id
    }

    #[tokio::test]
    async fn test_correction_overrides_rating() {
        let store = InMemoryStore::new();
        let id = register(&store).await;
        let stats = use_case(&store)
            .correct_stats(
                id,
                StatsCorrection {
                    rating: Some(1500),
                    reset_current_streak: true,
                    reason: "migration".to_string(),
                },
            )
            .await
            .unwrap();
        assert_eq!(stats.rating, 1500);
        assert_eq!(stats.highest_rating, 1500);
        assert_eq!(store.get_player_stats(id).await.unwrap(), stats);
    }

    #[tokio::test]
    async fn test_out_of_range_rating_is_rejected() {
        let store = InMemoryStore::new();
        let id = register(&store).await;
        let result = use_case(&store)
            .correct_stats(
                id,
                StatsCorrection {
                    rating: Some(-1),
                    reset_current_streak: false,
                    reason: "typo".to_string(),
                },
            )
            .await;
        assert!(matches!(result, Err(CorrectStatsError::InvalidRating(_))));
        assert_eq!(store.get_player_stats(id).await.unwrap().rating, 1000);
    }

    #[tokio::test]
    async fn test_reason_is_required() {
        let store = InMemoryStore::new();
        let id = register(&store).await;
        let result = use_case(&store)
            .correct_stats(id, StatsCorrection::default())
            .await;
        assert!(matches!(result, Err(CorrectStatsError::MissingReason)));
    }

    #[tokio::test]
    async fn test_unknown_player() {
        let store = InMemoryStore::new();
        let result = use_case(&store)
            .correct_stats(
                PlayerId::new(),
                StatsCorrection {
                    reason: "cleanup".to_string(),
                    ..StatsCorrection::default()
                },
            )
            .await;
        assert!(matches!(result, Err(CorrectStatsError::PlayerNotFound(_))));
    }
}
