use chrono::{DateTime, Utc};

use crate::domain::{PlayerId, RepoRetrieveError, RepoUpdateError, stats::PlayerStats};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerIdentity {
    /// Guest without credentials. May carry a self-chosen display name.
    Anonymous { display_name: Option<String> },
    Registered {
        username: String,
        email: Option<String>,
        password_hash: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    pub player_id: PlayerId,
    pub identity: PlayerIdentity,
    pub created_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
    pub is_active: bool,
}

impl Player {
    pub fn registered(
        username: String,
        email: Option<String>,
        password_hash: String,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            player_id: PlayerId::new(),
            identity: PlayerIdentity::Registered {
                username,
                email,
                password_hash,
            },
            created_at: now,
            last_login: None,
            is_active: true,
        }
    }

    pub fn anonymous(display_name: Option<String>, now: DateTime<Utc>) -> Self {
        Self {
            player_id: PlayerId::new(),
            identity: PlayerIdentity::Anonymous { display_name },
            created_at: now,
            last_login: None,
            is_active: true,
        }
    }

    pub fn is_anonymous(&self) -> bool {
        matches!(self.identity, PlayerIdentity::Anonymous { .. })
    }

    pub fn username(&self) -> Option<&str> {
        match &self.identity {
            PlayerIdentity::Registered { username, .. } => Some(username),
            PlayerIdentity::Anonymous { .. } => None,
        }
    }

    pub fn email(&self) -> Option<&str> {
        match &self.identity {
            PlayerIdentity::Registered { email, .. } => email.as_deref(),
            PlayerIdentity::Anonymous { .. } => None,
        }
    }

    /// Username for registered players, the display name for guests.
    pub fn display_name(&self) -> Option<&str> {
        match &self.identity {
            PlayerIdentity::Registered { username, .. } => Some(username),
            PlayerIdentity::Anonymous { display_name } => display_name.as_deref(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlayerWithStats {
    pub player: Player,
    pub stats: PlayerStats,
}

#[async_trait::async_trait]
pub trait PlayerRepository {
    /// Stores the player together with a fresh stats record.
    async fn create_player(&self, player: Player) -> Result<(), CreatePlayerError>;
    async fn get_player(&self, player_id: PlayerId) -> Result<Player, RepoRetrieveError>;
    /// Case-insensitive lookup among registered players.
    async fn find_by_username(&self, username: &str) -> Result<Player, RepoRetrieveError>;
    async fn record_login(
        &self,
        player_id: PlayerId,
        at: DateTime<Utc>,
    ) -> Result<(), RepoUpdateError>;
    async fn set_active(&self, player_id: PlayerId, active: bool) -> Result<(), RepoUpdateError>;
}

#[derive(Debug)]
pub enum CreatePlayerError {
    PlayerAlreadyExists,
    UsernameTaken,
    EmailTaken,
    StorageError(String),
}

impl std::fmt::Display for CreatePlayerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CreatePlayerError::PlayerAlreadyExists => write!(f, "Player already exists"),
            CreatePlayerError::UsernameTaken => write!(f, "Username is taken"),
            CreatePlayerError::EmailTaken => write!(f, "Email is taken"),
            CreatePlayerError::StorageError(e) => write!(f, "Storage error: {}", e),
        }
    }
}
