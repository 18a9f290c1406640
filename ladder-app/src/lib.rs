use std::sync::Arc;

use crate::{
    config::AppConfig,
    domain::{
        player::PlayerRepository, rating::EloRatingService, stats::StatsRepository,
        validation::PlayerValidator,
    },
    ports::password::PasswordHasher,
    workflow::{
        account::{
            deactivate::{DeactivatePlayerWorkflow, DeactivatePlayerWorkflowImpl},
            record_login::{RecordLoginUseCase, RecordLoginUseCaseImpl},
            register::{RegisterPlayerUseCase, RegisterPlayerUseCaseImpl},
        },
        leaderboard::get::{GetLeaderboardUseCase, GetLeaderboardUseCaseImpl},
        matches::{
            apply_result::{ApplyMatchResultUseCase, ApplyMatchResultUseCaseImpl},
            correct_stats::{CorrectStatsUseCase, CorrectStatsUseCaseImpl},
        },
        player::{
            get_stats::{GetPlayerStatsUseCase, GetPlayerStatsUseCaseImpl},
            search::{SearchPlayersUseCase, SearchPlayersUseCaseImpl},
        },
    },
};

pub mod config;
pub mod domain;
pub mod ports;
pub mod storage;
pub mod workflow;

pub struct Application {
    pub match_apply_result_use_case: Arc<dyn ApplyMatchResultUseCase + Send + Sync + 'static>,
    pub match_correct_stats_use_case: Box<dyn CorrectStatsUseCase + Send + Sync + 'static>,

    pub leaderboard_get_use_case: Box<dyn GetLeaderboardUseCase + Send + Sync + 'static>,

    pub player_search_use_case: Box<dyn SearchPlayersUseCase + Send + Sync + 'static>,
    pub player_get_stats_use_case: Box<dyn GetPlayerStatsUseCase + Send + Sync + 'static>,

    pub account_register_use_case: Box<dyn RegisterPlayerUseCase + Send + Sync + 'static>,
    pub account_record_login_use_case: Box<dyn RecordLoginUseCase + Send + Sync + 'static>,
    pub account_deactivate_workflow: Box<dyn DeactivatePlayerWorkflow + Send + Sync + 'static>,
}

pub fn build_application<
    PR: PlayerRepository + Send + Sync + 'static,
    SR: StatsRepository + Send + Sync + 'static,
    H: PasswordHasher + Send + Sync + 'static,
>(
    player_repository: Arc<PR>,
    stats_repository: Arc<SR>,
    password_hasher: Arc<H>,
    config: AppConfig,
) -> Application {
    let rating_service = Arc::new(EloRatingService::new(config.engine.k_factor));
    let validator = Arc::new(PlayerValidator::new(config.validation.clone()));

    Application {
        match_apply_result_use_case: Arc::new(ApplyMatchResultUseCaseImpl::new(
            player_repository.clone(),
            stats_repository.clone(),
            rating_service.clone(),
            config.engine,
        )),
        match_correct_stats_use_case: Box::new(CorrectStatsUseCaseImpl::new(
            stats_repository.clone(),
            validator.clone(),
            config.engine,
        )),

        leaderboard_get_use_case: Box::new(GetLeaderboardUseCaseImpl::new(
            stats_repository.clone(),
            config.query,
        )),

        player_search_use_case: Box::new(SearchPlayersUseCaseImpl::new(
            stats_repository.clone(),
            config.query,
        )),
        player_get_stats_use_case: Box::new(GetPlayerStatsUseCaseImpl::new(
            player_repository.clone(),
            stats_repository.clone(),
        )),

        account_register_use_case: Box::new(RegisterPlayerUseCaseImpl::new(
            player_repository.clone(),
            password_hasher.clone(),
            validator.clone(),
        )),
        account_record_login_use_case: Box::new(RecordLoginUseCaseImpl::new(
            player_repository.clone(),
        )),
        account_deactivate_workflow: Box::new(DeactivatePlayerWorkflowImpl::new(
            player_repository.clone(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        domain::{
            MatchId,
            leaderboard::LeaderboardFilters,
            match_result::{MatchParticipant, MatchResult},
            stats::MatchOutcome,
        },
        ports::password::PasswordHashError,
        storage::memory::InMemoryStore,
        workflow::account::register::RegisterPlayerRequest,
    };

    use super::*;

    struct PlainHasher;

    impl PasswordHasher for PlainHasher {
        fn hash_password(&self, password: &str) -> Result<String, PasswordHashError> {
            Ok(format!("plain:{}", password))
        }
    }

    #[tokio::test]
    async fn test_register_play_and_rank() {
        let store = Arc::new(InMemoryStore::new());
        let app = build_application(
            store.clone(),
            store.clone(),
            Arc::new(PlainHasher),
            AppConfig::default(),
        );

        let mut ids = Vec::new();
        for name in ["north", "south"] {
            let player = app
                .account_register_use_case
                .register_player(RegisterPlayerRequest {
                    username: name.to_string(),
                    email: None,
                    password: "Hunter2Hunter2".to_string(),
                })
                .await
                .unwrap();
            ids.push(player.player_id);
        }

        let participant = |player_id, outcome| MatchParticipant {
            player_id,
            outcome,
            damage_dealt: 10,
            damage_taken: 5,
            duration_seconds: 60,
            class_played: None,
        };
        app.match_apply_result_use_case
            .apply_match_result(MatchResult {
                match_id: MatchId::new(),
                participants: vec![
                    participant(ids[1], MatchOutcome::Win),
                    participant(ids[0], MatchOutcome::Loss),
                ],
            })
            .await
            .unwrap();

        let board = app
            .leaderboard_get_use_case
            .get_leaderboard(LeaderboardFilters::default(), None, None)
            .await
            .unwrap();
        assert_eq!(board.total_count, 2);
        assert_eq!(board.entries[0].player_id, ids[1]);
        assert_eq!(board.entries[0].display_name.as_deref(), Some("south"));
        assert_eq!(board.entries[1].rank, 2);

        let view = app.player_get_stats_use_case.get_stats(ids[0]).await.unwrap();
        assert_eq!(view.stats.losses, 1);
        assert_eq!(view.stats.current_streak, -1);
    }
}
