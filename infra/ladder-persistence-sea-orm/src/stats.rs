use std::{borrow::Borrow, collections::BTreeMap, sync::Arc, time::Duration};

use chrono::Utc;
use ladder_app::domain::{
    MatchId, PaginatedResponse, PlayerId, RepoError, RepoRetrieveError, SortOrder,
    leaderboard::LeaderboardQuery,
    player::PlayerWithStats,
    search::{PlayerQuery, PlayerSortBy, UsernameFilter},
    stats::{
        CommitError, LeaseError, PlayerClass, PlayerStats, StatsCommit, StatsLease,
        StatsRepository, lease_order,
    },
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction, DbErr, EntityTrait,
    NotSet, Order, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, RuntimeErr, SelectTwo,
    Set, SqlErr, TransactionTrait,
    sea_query::LikeExpr,
    sqlx::{self, mysql::MySqlDatabaseError},
};

use crate::{
    create_db_pool, escape_like,
    entity::{applied_match, player, player_stats},
    players::PlayerRepositoryImpl,
};

/// Row locks on a set of stats rows, held by an open transaction. Dropping
/// the lease rolls the transaction back and releases the locks.
pub struct SeaOrmLease {
    txn: DatabaseTransaction,
    player_ids: Vec<PlayerId>,
    snapshot: Vec<PlayerStats>,
}

impl StatsLease for SeaOrmLease {
    fn player_ids(&self) -> &[PlayerId] {
        &self.player_ids
    }

    fn snapshot(&self) -> &[PlayerStats] {
        &self.snapshot
    }
}

type PlayerStatsSelect = SelectTwo<player_stats::Entity, player::Entity>;

pub struct StatsRepositoryImpl {
    db: DatabaseConnection,
    stats_cache: Arc<moka::sync::Cache<PlayerId, PlayerStats>>,
}

fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn to_u64(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

/// MySQL `ER_LOCK_WAIT_TIMEOUT`.
const LOCK_WAIT_TIMEOUT: u16 = 1205;

fn mysql_error_number(e: &DbErr) -> Option<u16> {
    let (DbErr::Query(RuntimeErr::SqlxError(err)) | DbErr::Exec(RuntimeErr::SqlxError(err))) = e
    else {
        return None;
    };
    let err: &sqlx::Error = err.borrow();
    match err {
        sqlx::Error::Database(db_err) => db_err
            .try_downcast_ref::<MySqlDatabaseError>()
            .map(|mysql| mysql.number()),
        _ => None,
    }
}

fn lease_storage_error(e: DbErr) -> LeaseError {
    // InnoDB gives up on its own lock wait before our deadline in some setups
    if mysql_error_number(&e) == Some(LOCK_WAIT_TIMEOUT) {
        LeaseError::Timeout
    } else {
        LeaseError::StorageError(e.to_string())
    }
}

impl StatsRepositoryImpl {
    pub async fn new() -> Result<Self, DbErr> {
        let db = create_db_pool().await?;
        let stats_cache = Arc::new(
            moka::sync::Cache::builder()
                .max_capacity(10_000)
                .time_to_live(Duration::from_secs(60 * 60 * 12))
                .build(),
        );
        Ok(Self { db, stats_cache })
    }

    fn model_to_stats(model: player_stats::Model) -> PlayerStats {
        let class_play_counts: BTreeMap<PlayerClass, u32> =
            serde_json::from_value::<BTreeMap<String, u32>>(model.class_play_counts)
                .unwrap_or_default()
                .into_iter()
                .filter_map(|(name, count)| PlayerClass::from_name(&name).map(|c| (c, count)))
                .collect();
        PlayerStats {
            player_id: PlayerId(model.player_id),
            rating: model.rating,
            highest_rating: model.highest_rating,
            matches_played: model.matches_played,
            wins: model.wins,
            losses: model.losses,
            draws: model.draws,
            win_streak: model.win_streak,
            current_streak: model.current_streak,
            favorite_class: model
                .favorite_class
                .as_deref()
                .and_then(PlayerClass::from_name),
            class_play_counts,
            total_damage_dealt: to_u64(model.total_damage_dealt),
            total_damage_taken: to_u64(model.total_damage_taken),
            total_playtime_seconds: to_u64(model.total_playtime_seconds),
            updated_at: model.updated_at,
            version: model.version,
        }
    }

    pub(crate) fn stats_to_model(stats: &PlayerStats, version: i64) -> player_stats::ActiveModel {
        let counts: BTreeMap<&'static str, u32> = stats
            .class_play_counts
            .iter()
            .map(|(class, count)| (class.as_str(), *count))
            .collect();
        player_stats::ActiveModel {
            player_id: Set(stats.player_id.0),
            rating: Set(stats.rating),
            highest_rating: Set(stats.highest_rating),
            matches_played: Set(stats.matches_played),
            wins: Set(stats.wins),
            losses: Set(stats.losses),
            draws: Set(stats.draws),
            win_streak: Set(stats.win_streak),
            current_streak: Set(stats.current_streak),
            favorite_class: Set(stats.favorite_class.map(|c| c.as_str().to_string())),
            class_play_counts: Set(
                serde_json::to_value(&counts).unwrap_or_else(|_| serde_json::json!({}))
            ),
            total_damage_dealt: Set(to_i64(stats.total_damage_dealt)),
            total_damage_taken: Set(to_i64(stats.total_damage_taken)),
            total_playtime_seconds: Set(to_i64(stats.total_playtime_seconds)),
            updated_at: Set(stats.updated_at),
            version: Set(version),
        }
    }

    fn joined(
        rows: Vec<(player_stats::Model, Option<player::Model>)>,
    ) -> Vec<PlayerWithStats> {
        rows.into_iter()
            .filter_map(|(stats, player)| {
                player.map(|player| PlayerWithStats {
                    player: PlayerRepositoryImpl::model_to_player(player),
                    stats: Self::model_to_stats(stats),
                })
            })
            .collect()
    }

    fn visibility_filters(
        query: PlayerStatsSelect,
        include_inactive: bool,
        include_anonymous: bool,
        min_matches_played: Option<u32>,
        favorite_class: Option<PlayerClass>,
    ) -> PlayerStatsSelect {
        let mut query = query;
        if !include_inactive {
            query = query.filter(player::Column::IsActive.eq(true));
        }
        if !include_anonymous {
            query = query.filter(player::Column::IsAnonymous.eq(false));
        }
        if let Some(min) = min_matches_played {
            query = query.filter(player_stats::Column::MatchesPlayed.gte(min));
        }
        if let Some(class) = favorite_class {
            query = query.filter(player_stats::Column::FavoriteClass.eq(class.as_str()));
        }
        query
    }

    async fn fetch_page(
        &self,
        query: PlayerStatsSelect,
        offset: usize,
        limit: usize,
    ) -> Result<PaginatedResponse<PlayerWithStats>, RepoError> {
        let total_count = query
            .clone()
            .count(&self.db)
            .await
            .map_err(|e| RepoError::StorageError(e.to_string()))?;

        let rows = query
            .offset(offset as u64)
            .limit(limit as u64)
            .all(&self.db)
            .await
            .map_err(|e| RepoError::StorageError(e.to_string()))?;

        Ok(PaginatedResponse {
            total_count: total_count as usize,
            items: Self::joined(rows),
        })
    }
}

#[async_trait::async_trait]
impl StatsRepository for StatsRepositoryImpl {
    type Lease = SeaOrmLease;

    async fn get_player_stats(
        &self,
        player_id: PlayerId,
    ) -> Result<PlayerStats, RepoRetrieveError> {
        if let Some(cached_stats) = self.stats_cache.get(&player_id) {
            return Ok(cached_stats);
        }

        let model = player_stats::Entity::find_by_id(player_id.0)
            .one(&self.db)
            .await
            .map_err(|e| RepoRetrieveError::StorageError(e.to_string()))?
            .ok_or(RepoRetrieveError::NotFound)?;

        let player_stats = Self::model_to_stats(model);
        self.stats_cache.insert(player_id, player_stats.clone());
        Ok(player_stats)
    }

    async fn acquire_lease(
        &self,
        player_ids: &[PlayerId],
        timeout: Duration,
    ) -> Result<SeaOrmLease, LeaseError> {
        let ordered = lease_order(player_ids);
        let acquire = async {
            let txn = self.db.begin().await.map_err(lease_storage_error)?;
            // rows are locked in primary key order, which matches lease_order
            let models = player_stats::Entity::find()
                .filter(player_stats::Column::PlayerId.is_in(ordered.iter().map(|id| id.0)))
                .order_by_asc(player_stats::Column::PlayerId)
                .lock_exclusive()
                .all(&txn)
                .await
                .map_err(lease_storage_error)?;
            Ok::<_, LeaseError>((txn, models))
        };

        let (txn, models) = match tokio::time::timeout(timeout, acquire).await {
            Ok(result) => result?,
            Err(_) => {
                log::debug!("Lease on {} stats rows timed out", ordered.len());
                return Err(LeaseError::Timeout);
            }
        };

        let snapshot: Vec<PlayerStats> = models.into_iter().map(Self::model_to_stats).collect();
        if let Some(missing) = ordered
            .iter()
            .find(|id| !snapshot.iter().any(|s| s.player_id == **id))
        {
            return Err(LeaseError::NotFound(*missing));
        }

        Ok(SeaOrmLease {
            txn,
            player_ids: ordered,
            snapshot,
        })
    }

    async fn commit(&self, lease: SeaOrmLease, commit: StatsCommit) -> Result<(), CommitError> {
        let SeaOrmLease { txn, snapshot, .. } = lease;

        for record in &commit.records {
            let Some(leased) = snapshot.iter().find(|s| s.player_id == record.player_id) else {
                return Err(CommitError::NotLeased(record.player_id));
            };
            let mut model = Self::stats_to_model(record, leased.version + 1);
            model.player_id = NotSet;
            let res = player_stats::Entity::update_many()
                .set(model)
                .filter(player_stats::Column::PlayerId.eq(record.player_id.0))
                .filter(player_stats::Column::Version.eq(leased.version))
                .exec(&txn)
                .await
                .map_err(|e| CommitError::StorageError(e.to_string()))?;
            if res.rows_affected == 0 {
                return Err(CommitError::Conflict(record.player_id));
            }
        }

        if let Some(match_id) = commit.match_id {
            let entry = applied_match::ActiveModel {
                match_id: Set(match_id.0),
                participant_count: Set(commit.records.len() as u32),
                applied_at: Set(Utc::now()),
            };
            entry.insert(&txn).await.map_err(|e| match e.sql_err() {
                Some(SqlErr::UniqueConstraintViolation(_)) => CommitError::DuplicateMatch(match_id),
                _ => CommitError::StorageError(e.to_string()),
            })?;
        }

        txn.commit()
            .await
            .map_err(|e| CommitError::StorageError(e.to_string()))?;

        for record in &commit.records {
            self.stats_cache.invalidate(&record.player_id);
        }
        Ok(())
    }

    async fn is_match_applied(&self, match_id: MatchId) -> Result<bool, RepoError> {
        let entry = applied_match::Entity::find_by_id(match_id.0)
            .one(&self.db)
            .await
            .map_err(|e| RepoError::StorageError(e.to_string()))?;
        Ok(entry.is_some())
    }

    async fn query_leaderboard(
        &self,
        query: LeaderboardQuery,
    ) -> Result<PaginatedResponse<PlayerWithStats>, RepoError> {
        let filters = query.filters;
        let db_query = Self::visibility_filters(
            player_stats::Entity::find().find_also_related(player::Entity),
            filters.include_inactive,
            filters.include_anonymous,
            filters.min_matches_played,
            filters.favorite_class,
        )
        .order_by(player_stats::Column::Rating, Order::Desc)
        .order_by(player_stats::Column::HighestRating, Order::Desc)
        .order_by(player_stats::Column::Wins, Order::Desc)
        .order_by(player_stats::Column::MatchesPlayed, Order::Asc)
        .order_by(player_stats::Column::PlayerId, Order::Asc);

        self.fetch_page(db_query, query.pagination.offset, query.pagination.limit)
            .await
    }

    async fn query_players(
        &self,
        query: PlayerQuery,
    ) -> Result<PaginatedResponse<PlayerWithStats>, RepoError> {
        let mut db_query = Self::visibility_filters(
            player_stats::Entity::find().find_also_related(player::Entity),
            query.include_inactive,
            query.include_anonymous,
            query.min_matches_played,
            query.favorite_class,
        );

        if let Some(filter) = &query.username {
            let pattern = match filter {
                UsernameFilter::Prefix(needle) => format!("{}%", escape_like(needle)),
                UsernameFilter::Contains(needle) => format!("%{}%", escape_like(needle)),
            };
            db_query = db_query.filter(
                player::Column::UsernameNormalized.like(LikeExpr::new(pattern).escape('\\')),
            );
        }
        if let Some(min) = query.min_rating {
            db_query = db_query.filter(player_stats::Column::Rating.gte(min));
        }
        if let Some(max) = query.max_rating {
            db_query = db_query.filter(player_stats::Column::Rating.lte(max));
        }

        let (order, sort_by) = query.sort;
        let order = match order {
            SortOrder::Ascending => Order::Asc,
            SortOrder::Descending => Order::Desc,
        };
        db_query = match sort_by {
            PlayerSortBy::Rating => db_query.order_by(player_stats::Column::Rating, order),
            PlayerSortBy::Username => {
                db_query.order_by(player::Column::UsernameNormalized, order)
            }
            PlayerSortBy::MatchesPlayed => {
                db_query.order_by(player_stats::Column::MatchesPlayed, order)
            }
            PlayerSortBy::CreatedAt => db_query.order_by(player::Column::CreatedAt, order),
        }
        .order_by(player_stats::Column::PlayerId, Order::Asc);

        self.fetch_page(db_query, query.pagination.offset, query.pagination.limit)
            .await
    }
}
