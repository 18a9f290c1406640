use std::sync::Arc;

use crate::{
    domain::{
        PlayerId, RepoRetrieveError,
        player::{PlayerRepository, PlayerWithStats},
        stats::StatsRepository,
    },
    workflow::player::PlayerStatsView,
};

#[async_trait::async_trait]
pub trait GetPlayerStatsUseCase {
    async fn get_stats(&self, player_id: PlayerId) -> Result<PlayerStatsView, GetStatsError>;
}

#[derive(Debug, thiserror::Error)]
pub enum GetStatsError {
    #[error("player {0} not found")]
    NotFound(PlayerId),
    #[error("internal error")]
    Internal,
}

pub struct GetPlayerStatsUseCaseImpl<P: PlayerRepository, S: StatsRepository> {
    player_repo: Arc<P>,
    stats_repo: Arc<S>,
}

impl<P: PlayerRepository, S: StatsRepository> GetPlayerStatsUseCaseImpl<P, S> {
    pub fn new(player_repo: Arc<P>, stats_repo: Arc<S>) -> Self {
        Self {
            player_repo,
            stats_repo,
        }
    }
}

fn map_retrieve(player_id: PlayerId, err: RepoRetrieveError) -> GetStatsError {
    match err {
        RepoRetrieveError::NotFound => GetStatsError::NotFound(player_id),
        RepoRetrieveError::StorageError(e) => {
            log::error!("Failed to retrieve player stats: {}", e);
            GetStatsError::Internal
        }
    }
}

#[async_trait::async_trait]
impl<P: PlayerRepository + Send + Sync + 'static, S: StatsRepository + Send + Sync + 'static>
    GetPlayerStatsUseCase for GetPlayerStatsUseCaseImpl<P, S>
{
    async fn get_stats(&self, player_id: PlayerId) -> Result<PlayerStatsView, GetStatsError> {
        let player = self
            .player_repo
            .get_player(player_id)
            .await
            .map_err(|e| map_retrieve(player_id, e))?;
        let stats = self
            .stats_repo
            .get_player_stats(player_id)
            .await
            .map_err(|e| map_retrieve(player_id, e))?;
        Ok(PlayerStatsView::from(PlayerWithStats { player, stats }))
    }
}
