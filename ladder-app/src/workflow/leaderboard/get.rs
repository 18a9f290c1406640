use std::sync::Arc;

use crate::domain::{
    Pagination,
    leaderboard::{LeaderboardFilters, LeaderboardPage, LeaderboardQuery, rank_page},
    search::QueryConfig,
    stats::StatsRepository,
};

#[async_trait::async_trait]
pub trait GetLeaderboardUseCase {
    /// `limit` falls back to the configured default and is clamped into
    /// `1..=max_limit`.
    async fn get_leaderboard(
        &self,
        filters: LeaderboardFilters,
        limit: Option<usize>,
        offset: Option<usize>,
    ) -> Result<LeaderboardPage, GetLeaderboardError>;
}

#[derive(Debug, thiserror::Error)]
pub enum GetLeaderboardError {
    #[error("internal error")]
    Internal,
}

pub struct GetLeaderboardUseCaseImpl<S: StatsRepository> {
    stats_repository: Arc<S>,
    config: QueryConfig,
}

impl<S: StatsRepository> GetLeaderboardUseCaseImpl<S> {
    pub fn new(stats_repository: Arc<S>, config: QueryConfig) -> Self {
        Self {
            stats_repository,
            config,
        }
    }
}

#[async_trait::async_trait]
impl<S: StatsRepository + Send + Sync + 'static> GetLeaderboardUseCase
    for GetLeaderboardUseCaseImpl<S>
{
    async fn get_leaderboard(
        &self,
        filters: LeaderboardFilters,
        limit: Option<usize>,
        offset: Option<usize>,
    ) -> Result<LeaderboardPage, GetLeaderboardError> {
        let limit = limit
            .unwrap_or(self.config.default_leaderboard_limit)
            .clamp(1, self.config.max_limit.max(1));
        let pagination = Pagination {
            offset: offset.unwrap_or(0),
            limit,
        };

        let page = match self
            .stats_repository
            .query_leaderboard(LeaderboardQuery {
                filters,
                pagination,
            })
            .await
        {
            Ok(page) => page,
            Err(e) => {
                log::error!("Failed to query leaderboard: {}", e);
                return Err(GetLeaderboardError::Internal);
            }
        };

        Ok(LeaderboardPage {
            total_count: page.total_count,
            entries: rank_page(pagination.offset, page.items),
        })
    }
}
