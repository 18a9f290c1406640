use std::sync::Arc;

use crate::domain::{
    player::PlayerWithStats,
    search::{PlayerSearchFilters, QueryConfig, SearchError},
    stats::StatsRepository,
};

#[async_trait::async_trait]
pub trait SearchPlayersUseCase {
    async fn search_players(
        &self,
        filters: PlayerSearchFilters,
    ) -> Result<Vec<PlayerWithStats>, SearchPlayersError>;
}

#[derive(Debug, thiserror::Error)]
pub enum SearchPlayersError {
    #[error("{0}")]
    InvalidQuery(#[from] SearchError),
    #[error("internal error")]
    Internal,
}

pub struct SearchPlayersUseCaseImpl<S: StatsRepository> {
    stats_repo: Arc<S>,
    config: QueryConfig,
}

impl<S: StatsRepository> SearchPlayersUseCaseImpl<S> {
    pub fn new(stats_repo: Arc<S>, config: QueryConfig) -> Self {
        Self { stats_repo, config }
    }
}

#[async_trait::async_trait]
impl<S: StatsRepository + Send + Sync + 'static> SearchPlayersUseCase
    for SearchPlayersUseCaseImpl<S>
{
    async fn search_players(
        &self,
        filters: PlayerSearchFilters,
    ) -> Result<Vec<PlayerWithStats>, SearchPlayersError> {
        let query = filters.into_query(&self.config)?;
        match self.stats_repo.query_players(query).await {
            Ok(page) => Ok(page.items),
            Err(e) => {
                log::error!("Failed to search players: {}", e);
                Err(SearchPlayersError::Internal)
            }
        }
    }
}
