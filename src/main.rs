use std::sync::Arc;

use ladder_app::{
    Application, build_application, config::AppConfig, storage::memory::InMemoryStore,
};
use ladder_persistence_sea_orm::{
    password::BcryptPasswordHasher, players::PlayerRepositoryImpl, stats::StatsRepositoryImpl,
};
use log::{error, info, warn};
use tokio::io::BufReader;

mod ingest;
mod logs;

const DEFAULT_INGEST_CONCURRENCY: usize = 16;

/// Without a database the in-memory store is used. It starts empty and is lost
/// on exit.
async fn connect_application(config: AppConfig, use_database: bool) -> Option<Application> {
    let password_hasher = Arc::new(BcryptPasswordHasher::default());
    if !use_database {
        let store = InMemoryStore::new();
        return Some(build_application(
            Arc::new(store.clone()),
            Arc::new(store),
            password_hasher,
            config,
        ));
    }

    let player_repository = match PlayerRepositoryImpl::new().await {
        Ok(repo) => Arc::new(repo),
        Err(e) => {
            error!("Failed to set up player repository: {}", e);
            return None;
        }
    };
    let stats_repository = match StatsRepositoryImpl::new().await {
        Ok(repo) => Arc::new(repo),
        Err(e) => {
            error!("Failed to set up stats repository: {}", e);
            return None;
        }
    };
    Some(build_application(
        player_repository,
        stats_repository,
        password_hasher,
        config,
    ))
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    logs::init_logger();

    let config = AppConfig::from_env();
    let concurrency = std::env::var("INGEST_CONCURRENCY")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_INGEST_CONCURRENCY);

    let use_database = std::env::var("MARIADB_HOST").is_ok();
    if !use_database {
        warn!("MARIADB_HOST is not set, using the in-memory store");
    }
    let app = match connect_application(config, use_database).await {
        Some(app) => app,
        None => std::process::exit(1),
    };

    info!(
        "Reading match results from stdin with concurrency {}",
        concurrency
    );
    let report = ingest::ingest(
        BufReader::new(tokio::io::stdin()),
        app.match_apply_result_use_case.as_ref(),
        concurrency,
    )
    .await;

    info!(
        "Ingestion finished: {} applied, {} duplicates, {} rejected, {} failed",
        report.applied(),
        report.duplicates(),
        report.rejected(),
        report.failed()
    );
    if report.failed() > 0 {
        std::process::exit(2);
    }
}
