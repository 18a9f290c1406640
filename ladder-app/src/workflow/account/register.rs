use std::sync::Arc;

use chrono::Utc;

use crate::{
    domain::{
        player::{CreatePlayerError, Player, PlayerRepository},
        validation::{PlayerValidator, ValidationError},
    },
    ports::password::PasswordHasher,
};

const MAX_DISPLAY_NAME_LENGTH: usize = 50;

#[derive(Debug, Clone)]
pub struct RegisterPlayerRequest {
    pub username: String,
    pub email: Option<String>,
    pub password: String,
}

#[async_trait::async_trait]
pub trait RegisterPlayerUseCase {
    async fn register_player(&self, request: RegisterPlayerRequest)
    -> Result<Player, RegisterError>;
    async fn register_anonymous_player(
        &self,
        display_name: Option<String>,
    ) -> Result<Player, RegisterError>;
}

#[derive(Debug, thiserror::Error)]
pub enum RegisterError {
    #[error("{0}")]
    Validation(#[from] ValidationError),
    #[error("username is already taken")]
    UsernameTaken,
    #[error("email is already registered")]
    EmailTaken,
    #[error("internal error")]
    Internal,
}

pub struct RegisterPlayerUseCaseImpl<P: PlayerRepository, H: PasswordHasher> {
    player_repository: Arc<P>,
    password_hasher: Arc<H>,
    validator: Arc<PlayerValidator>,
}

impl<P: PlayerRepository, H: PasswordHasher> RegisterPlayerUseCaseImpl<P, H> {
    pub fn new(
        player_repository: Arc<P>,
        password_hasher: Arc<H>,
        validator: Arc<PlayerValidator>,
    ) -> Self {
        Self {
            player_repository,
            password_hasher,
            validator,
        }
    }
}

impl<P: PlayerRepository + Send + Sync + 'static, H: PasswordHasher + Send + Sync + 'static>
    RegisterPlayerUseCaseImpl<P, H>
{
    async fn store(&self, player: Player) -> Result<Player, RegisterError> {
        match self.player_repository.create_player(player.clone()).await {
            Ok(()) => {
                log::info!(
                    "Registered {} player {}",
                    if player.is_anonymous() {
                        "anonymous"
                    } else {
                        "new"
                    },
                    player.player_id
                );
                Ok(player)
            }
            Err(CreatePlayerError::UsernameTaken) => Err(RegisterError::UsernameTaken),
            Err(CreatePlayerError::EmailTaken) => Err(RegisterError::EmailTaken),
            Err(e) => {
                log::error!("Failed to create player: {}", e);
                Err(RegisterError::Internal)
            }
        }
    }
}

#[async_trait::async_trait]
impl<P: PlayerRepository + Send + Sync + 'static, H: PasswordHasher + Send + Sync + 'static>
    RegisterPlayerUseCase for RegisterPlayerUseCaseImpl<P, H>
{
    async fn register_player(
        &self,
        request: RegisterPlayerRequest,
    ) -> Result<Player, RegisterError> {
        let username = request.username.trim().to_string();
        self.validator.validate_username(&username)?;
        let email = match request.email.map(|e| e.trim().to_string()) {
            Some(e) if e.is_empty() => None,
            Some(e) => {
                self.validator.validate_email(&e)?;
                Some(e)
            }
            None => None,
        };
        self.validator.validate_password(&request.password)?;

        let password_hash = match self.password_hasher.hash_password(&request.password) {
            Ok(hash) => hash,
            Err(e) => {
                log::error!("Failed to hash password for {}: {}", username, e);
                return Err(RegisterError::Internal);
            }
        };

        self.store(Player::registered(username, email, password_hash, Utc::now()))
            .await
    }

    async fn register_anonymous_player(
        &self,
        display_name: Option<String>,
    ) -> Result<Player, RegisterError> {
        let display_name = display_name
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty());
        if let Some(name) = &display_name {
            if name.chars().count() > MAX_DISPLAY_NAME_LENGTH {
                return Err(ValidationError::Format {
                    field: "display_name",
                    reason: format!("must be at most {} characters", MAX_DISPLAY_NAME_LENGTH),
                }
                .into());
            }
        }
        self.store(Player::anonymous(display_name, Utc::now())).await
    }
}
