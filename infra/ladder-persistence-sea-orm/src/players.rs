use std::sync::Arc;

use chrono::{DateTime, Utc};
use ladder_app::domain::{
    PlayerId, RepoRetrieveError, RepoUpdateError,
    player::{CreatePlayerError, Player, PlayerIdentity, PlayerRepository},
    stats::PlayerStats,
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, IntoActiveModel,
    QueryFilter, Set, SqlErr, TransactionError, TransactionTrait,
};

use crate::{
    create_db_pool,
    entity::{player, player_stats},
    stats::StatsRepositoryImpl,
};

pub struct PlayerRepositoryImpl {
    db: DatabaseConnection,
    player_cache: Arc<moka::future::Cache<PlayerId, Player>>,
}

impl PlayerRepositoryImpl {
    pub async fn new() -> Result<Self, DbErr> {
        let db = create_db_pool().await?;
        let player_cache = Arc::new(
            moka::future::Cache::builder()
                .max_capacity(10_000)
                .time_to_live(std::time::Duration::from_secs(60 * 60))
                .build(),
        );
        Ok(Self { db, player_cache })
    }

    pub(crate) fn model_to_player(model: player::Model) -> Player {
        let identity = if model.is_anonymous {
            PlayerIdentity::Anonymous {
                display_name: model.display_name,
            }
        } else {
            PlayerIdentity::Registered {
                username: model.username.unwrap_or_default(),
                email: model.email,
                password_hash: model.password_hash.unwrap_or_default(),
            }
        };
        Player {
            player_id: PlayerId(model.id),
            identity,
            created_at: model.created_at,
            last_login: model.last_login,
            is_active: model.is_active,
        }
    }

    fn player_to_model(player: &Player) -> player::ActiveModel {
        let (username, email, password_hash) = match &player.identity {
            PlayerIdentity::Registered {
                username,
                email,
                password_hash,
            } => (
                Some(username.clone()),
                email.clone(),
                Some(password_hash.clone()),
            ),
            PlayerIdentity::Anonymous { .. } => (None, None, None),
        };
        player::ActiveModel {
            id: Set(player.player_id.0),
            username_normalized: Set(username.as_deref().map(str::to_lowercase)),
            username: Set(username),
            display_name: Set(player.display_name().map(str::to_string)),
            email_normalized: Set(email.as_deref().map(str::to_lowercase)),
            email: Set(email),
            password_hash: Set(password_hash),
            is_anonymous: Set(player.is_anonymous()),
            is_active: Set(player.is_active),
            created_at: Set(player.created_at),
            last_login: Set(player.last_login),
        }
    }

    fn map_insert_error(e: DbErr) -> CreatePlayerError {
        match e.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(message)) => {
                if message.contains("username") {
                    CreatePlayerError::UsernameTaken
                } else if message.contains("email") {
                    CreatePlayerError::EmailTaken
                } else {
                    CreatePlayerError::PlayerAlreadyExists
                }
            }
            _ => CreatePlayerError::StorageError(e.to_string()),
        }
    }

    async fn find_model(&self, player_id: PlayerId) -> Result<player::Model, RepoUpdateError> {
        player::Entity::find_by_id(player_id.0)
            .one(&self.db)
            .await
            .map_err(|e| RepoUpdateError::StorageError(e.to_string()))?
            .ok_or(RepoUpdateError::NotFound)
    }
}

#[async_trait::async_trait]
impl PlayerRepository for PlayerRepositoryImpl {
    async fn create_player(&self, player: Player) -> Result<(), CreatePlayerError> {
        let player_model = Self::player_to_model(&player);
        let stats_model = StatsRepositoryImpl::stats_to_model(
            &PlayerStats::new(player.player_id, player.created_at),
            0,
        );
        let username = player.username().map(str::to_lowercase);
        let email = player.email().map(str::to_lowercase);

        let res = self
            .db
            .transaction::<_, (), CreatePlayerError>(move |c| {
                Box::pin(async move {
                    if let Some(username) = username {
                        let taken = player::Entity::find()
                            .filter(player::Column::UsernameNormalized.eq(username))
                            .one(c)
                            .await
                            .map_err(|e| CreatePlayerError::StorageError(e.to_string()))?;
                        if taken.is_some() {
                            return Err(CreatePlayerError::UsernameTaken);
                        }
                    }
                    if let Some(email) = email {
                        let taken = player::Entity::find()
                            .filter(player::Column::EmailNormalized.eq(email))
                            .one(c)
                            .await
                            .map_err(|e| CreatePlayerError::StorageError(e.to_string()))?;
                        if taken.is_some() {
                            return Err(CreatePlayerError::EmailTaken);
                        }
                    }
                    player_model
                        .insert(c)
                        .await
                        .map_err(Self::map_insert_error)?;
                    stats_model
                        .insert(c)
                        .await
                        .map_err(|e| CreatePlayerError::StorageError(e.to_string()))?;
                    Ok(())
                })
            })
            .await;

        match res {
            Ok(()) => {
                self.player_cache.invalidate(&player.player_id).await;
                Ok(())
            }
            Err(TransactionError::Transaction(e)) => Err(e),
            Err(TransactionError::Connection(e)) => {
                Err(CreatePlayerError::StorageError(e.to_string()))
            }
        }
    }

    async fn get_player(&self, player_id: PlayerId) -> Result<Player, RepoRetrieveError> {
        if let Some(player) = self.player_cache.get(&player_id).await {
            return Ok(player);
        }

        let model = player::Entity::find_by_id(player_id.0)
            .one(&self.db)
            .await
            .map_err(|e| RepoRetrieveError::StorageError(e.to_string()))?
            .ok_or(RepoRetrieveError::NotFound)?;

        let player = Self::model_to_player(model);
        self.player_cache.insert(player_id, player.clone()).await;
        Ok(player)
    }

    async fn find_by_username(&self, username: &str) -> Result<Player, RepoRetrieveError> {
        let model = player::Entity::find()
            .filter(player::Column::UsernameNormalized.eq(username.to_lowercase()))
            .one(&self.db)
            .await
            .map_err(|e| RepoRetrieveError::StorageError(e.to_string()))?
            .ok_or(RepoRetrieveError::NotFound)?;
        Ok(Self::model_to_player(model))
    }

    async fn record_login(
        &self,
        player_id: PlayerId,
        at: DateTime<Utc>,
    ) -> Result<(), RepoUpdateError> {
        let mut model = self.find_model(player_id).await?.into_active_model();
        model.last_login = Set(Some(at));
        model
            .update(&self.db)
            .await
            .map_err(|e| RepoUpdateError::StorageError(e.to_string()))?;
        self.player_cache.invalidate(&player_id).await;
        Ok(())
    }

    async fn set_active(&self, player_id: PlayerId, active: bool) -> Result<(), RepoUpdateError> {
        let mut model = self.find_model(player_id).await?.into_active_model();
        model.is_active = Set(active);
        model
            .update(&self.db)
            .await
            .map_err(|e| RepoUpdateError::StorageError(e.to_string()))?;
        self.player_cache.invalidate(&player_id).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_round_trip_keeps_identity() {
        let now = Utc::now();
        for player in [
            Player::registered(
                "Player_1".to_string(),
                Some("P1@Example.com".to_string()),
                "hash".to_string(),
                now,
            ),
            Player::anonymous(Some("wanderer".to_string()), now),
        ] {
            let active = PlayerRepositoryImpl::player_to_model(&player);
            let model = player::Model {
                id: player.player_id.0,
                username: active.username.clone().unwrap(),
                username_normalized: active.username_normalized.clone().unwrap(),
                display_name: active.display_name.clone().unwrap(),
                email: active.email.clone().unwrap(),
                email_normalized: active.email_normalized.clone().unwrap(),
                password_hash: active.password_hash.clone().unwrap(),
                is_anonymous: active.is_anonymous.clone().unwrap(),
                is_active: true,
                created_at: now,
                last_login: None,
            };
            if !player.is_anonymous() {
                assert_eq!(model.username_normalized.as_deref(), Some("player_1"));
                assert_eq!(model.email_normalized.as_deref(), Some("p1@example.com"));
            } else {
                assert_eq!(model.username_normalized, None);
            }
            assert_eq!(PlayerRepositoryImpl::model_to_player(model), player);
        }
    }
}
