use async_lock::OnceCell;
use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};

pub use ladder_persistence_sea_orm_entities as entity;

pub mod password;
pub mod players;
pub mod stats;

static DB_POOL: OnceCell<DatabaseConnection> = OnceCell::new();

fn env_var(name: &str) -> Result<String, DbErr> {
    std::env::var(name).map_err(|_| DbErr::Custom(format!("{} must be set", name)))
}

fn database_url() -> Result<String, DbErr> {
    let mariadb_database = env_var("MARIADB_DATABASE")?;
    let mariadb_user = env_var("MARIADB_USER")?;
    let mariadb_password = env_var("MARIADB_PASSWORD")?;
    let mariadb_host = env_var("MARIADB_HOST")?;
    let mariadb_port = env_var("MARIADB_PORT")?;
    Ok(format!(
        "mysql://{}:{}@{}:{}/{}",
        mariadb_user, mariadb_password, mariadb_host, mariadb_port, mariadb_database
    ))
}

/// Shared connection pool, configured from the `MARIADB_*` variables.
/// `MARIADB_MAX_CONNECTIONS` defaults to 5.
pub async fn create_db_pool() -> Result<DatabaseConnection, DbErr> {
    DB_POOL
        .get_or_try_init(|| async move {
            let db_url = database_url()?;
            let max_connections = std::env::var("MARIADB_MAX_CONNECTIONS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5);

            let mut opt = ConnectOptions::new(&db_url);
            opt.max_connections(max_connections).sqlx_logging(false);

            let db = Database::connect(opt).await?;
            log::info!("Connected to database with {} connections", max_connections);
            Ok(db)
        })
        .await
        .cloned()
}

/// Escapes `\`, `%` and `_` so user text matches literally in a LIKE pattern
/// using `\` as escape character.
pub(crate) fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("plain"), "plain");
        assert_eq!(escape_like("dark_knight"), "dark\\_knight");
        assert_eq!(escape_like("50%\\"), "50\\%\\\\");
    }
}
