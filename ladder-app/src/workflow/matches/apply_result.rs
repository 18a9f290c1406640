use std::{collections::HashMap, sync::Arc, time::Duration};

use chrono::Utc;

use crate::{
    config::EngineConfig,
    domain::{
        MatchId, PlayerId, RepoRetrieveError,
        match_result::{MatchResult, MatchResultError},
        player::PlayerRepository,
        rating::RatingService,
        stats::{
            CommitError, LeaseError, MatchOutcome, PlayerStats, StatsCommit, StatsLease,
            StatsRepository,
        },
    },
};

#[async_trait::async_trait]
pub trait ApplyMatchResultUseCase {
    async fn apply_match_result(
        &self,
        result: MatchResult,
    ) -> Result<MatchApplication, ApplyMatchError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParticipantUpdate {
    pub player_id: PlayerId,
    pub outcome: MatchOutcome,
    pub previous_rating: i32,
    pub new_rating: i32,
    pub stats: PlayerStats,
}

impl ParticipantUpdate {
    pub fn rating_change(&self) -> i32 {
        self.new_rating - self.previous_rating
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchApplication {
    pub match_id: MatchId,
    pub updates: Vec<ParticipantUpdate>,
}

#[derive(Debug, thiserror::Error)]
pub enum ApplyMatchError {
    #[error("invalid match result: {0}")]
    InvalidMatch(#[from] MatchResultError),
    #[error("player {0} not found")]
    PlayerNotFound(PlayerId),
    #[error("player {0} is inactive")]
    PlayerInactive(PlayerId),
    #[error("match {0} was already applied")]
    DuplicateMatch(MatchId),
    #[error("timed out waiting for player locks, retry after {retry_after:?}")]
    LockTimeout { retry_after: Duration },
    #[error("stats kept changing underneath the update after {attempts} attempts")]
    UpdateConflict { attempts: u32 },
    #[error("storage error: {0}")]
    Storage(String),
}

enum Retryable {
    Conflict,
    LockTimeout,
}

enum AttemptError {
    Retry(Retryable),
    Fail(ApplyMatchError),
}

pub struct ApplyMatchResultUseCaseImpl<P: PlayerRepository, S: StatsRepository, R: RatingService>
{
    player_repository: Arc<P>,
    stats_repository: Arc<S>,
    rating_service: Arc<R>,
    config: EngineConfig,
}

impl<P: PlayerRepository, S: StatsRepository, R: RatingService>
    ApplyMatchResultUseCaseImpl<P, S, R>
{
    pub fn new(
        player_repository: Arc<P>,
        stats_repository: Arc<S>,
        rating_service: Arc<R>,
        config: EngineConfig,
    ) -> Self {
        Self {
            player_repository,
            stats_repository,
            rating_service,
            config,
        }
    }
}

impl<
    P: PlayerRepository + Send + Sync + 'static,
    S: StatsRepository + Send + Sync + 'static,
    R: RatingService + Send + Sync + 'static,
> ApplyMatchResultUseCaseImpl<P, S, R>
{
    async fn check_participants(&self, result: &MatchResult) -> Result<(), ApplyMatchError> {
        for participant in &result.participants {
            match self
                .player_repository
                .get_player(participant.player_id)
                .await
            {
                Ok(player) if !player.is_active => {
                    return Err(ApplyMatchError::PlayerInactive(participant.player_id));
                }
                Ok(_) => {}
                Err(RepoRetrieveError::NotFound) => {
                    return Err(ApplyMatchError::PlayerNotFound(participant.player_id));
                }
                Err(RepoRetrieveError::StorageError(e)) => {
                    log::error!("Failed to load player {}: {}", participant.player_id, e);
                    return Err(ApplyMatchError::Storage(e));
                }
            }
        }
        Ok(())
    }

    async fn attempt(&self, result: &MatchResult) -> Result<MatchApplication, AttemptError> {
        let lease = match self
            .stats_repository
            .acquire_lease(&result.player_ids(), self.config.lease_timeout)
            .await
        {
            Ok(lease) => lease,
            Err(LeaseError::Timeout) => return Err(AttemptError::Retry(Retryable::LockTimeout)),
            Err(LeaseError::NotFound(id)) => {
                return Err(AttemptError::Fail(ApplyMatchError::PlayerNotFound(id)));
            }
            Err(LeaseError::StorageError(e)) => {
                log::error!("Failed to lease stats for match {}: {}", result.match_id, e);
                return Err(AttemptError::Fail(ApplyMatchError::Storage(e)));
            }
        };

        // a player may have been deactivated while we waited for the lease
        self.check_participants(result)
            .await
            .map_err(AttemptError::Fail)?;

        // snapshot comes back in lease order, participants are in report order
        let before = {
            let snapshot: HashMap<PlayerId, &PlayerStats> = lease
                .snapshot()
                .iter()
                .map(|stats| (stats.player_id, stats))
                .collect();
            let mut before = Vec::with_capacity(result.participants.len());
            for participant in &result.participants {
                let Some(stats) = snapshot.get(&participant.player_id) else {
                    return Err(AttemptError::Fail(ApplyMatchError::PlayerNotFound(
                        participant.player_id,
                    )));
                };
                before.push((*stats).clone());
            }
            before
        };

        let ratings: Vec<(i32, MatchOutcome)> = before
            .iter()
            .zip(&result.participants)
            .map(|(stats, participant)| (stats.rating, participant.outcome))
            .collect();
        let deltas = self.rating_service.calculate_deltas(&ratings);

        let now = Utc::now();
        let mut updates = Vec::with_capacity(before.len());
        for ((stats, participant), delta) in before.iter().zip(&result.participants).zip(deltas) {
            let next = stats.record_match(
                participant.outcome,
                stats.rating as i64 + delta,
                &participant.contribution(),
                now,
            );
            updates.push(ParticipantUpdate {
                player_id: participant.player_id,
                outcome: participant.outcome,
                previous_rating: stats.rating,
                new_rating: next.rating,
                stats: next,
            });
        }

        let commit = StatsCommit {
            match_id: Some(result.match_id),
            records: updates.iter().map(|u| u.stats.clone()).collect(),
        };
        match self.stats_repository.commit(lease, commit).await {
            Ok(()) => {}
            Err(CommitError::Conflict(player_id)) => {
                log::warn!(
                    "Stats for player {} changed while applying match {}",
                    player_id,
                    result.match_id
                );
                return Err(AttemptError::Retry(Retryable::Conflict));
            }
            Err(CommitError::DuplicateMatch(match_id)) => {
                return Err(AttemptError::Fail(ApplyMatchError::DuplicateMatch(match_id)));
            }
            Err(e @ (CommitError::NotLeased(_) | CommitError::StorageError(_))) => {
                log::error!("Failed to commit match {}: {}", result.match_id, e);
                return Err(AttemptError::Fail(ApplyMatchError::Storage(e.to_string())));
            }
        }

        for update in &mut updates {
            update.stats.version += 1;
        }
        Ok(MatchApplication {
            match_id: result.match_id,
            updates,
        })
    }
}

#[async_trait::async_trait]
impl<
    P: PlayerRepository + Send + Sync + 'static,
    S: StatsRepository + Send + Sync + 'static,
    R: RatingService + Send + Sync + 'static,
> ApplyMatchResultUseCase for ApplyMatchResultUseCaseImpl<P, S, R>
{
    async fn apply_match_result(
        &self,
        result: MatchResult,
    ) -> Result<MatchApplication, ApplyMatchError> {
        result.validate()?;

        match self.stats_repository.is_match_applied(result.match_id).await {
            Ok(true) => return Err(ApplyMatchError::DuplicateMatch(result.match_id)),
            Ok(false) => {}
            Err(e) => {
                log::error!("Failed to check ledger for match {}: {}", result.match_id, e);
                return Err(ApplyMatchError::Storage(e.to_string()));
            }
        }

        self.check_participants(&result).await?;

        let attempts = self.config.max_retries + 1;
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.attempt(&result).await {
                Ok(application) => {
                    log::info!(
                        "Applied match {} for {} players",
                        result.match_id,
                        application.updates.len()
                    );
                    return Ok(application);
                }
                Err(AttemptError::Fail(e)) => return Err(e),
                Err(AttemptError::Retry(reason)) if attempt >= attempts => {
                    return Err(match reason {
                        Retryable::Conflict => ApplyMatchError::UpdateConflict { attempts },
                        Retryable::LockTimeout => ApplyMatchError::LockTimeout {
                            retry_after: self.config.lease_timeout,
                        },
                    });
                }
                Err(AttemptError::Retry(_)) => {
                    log::debug!(
                        "Retrying match {} (attempt {} of {})",
                        result.match_id,
                        attempt + 1,
                        attempts
                    );
                    tokio::time::sleep(Duration::from_millis(5 * attempt as u64)).await;
                }
            }
        }
    }
}
