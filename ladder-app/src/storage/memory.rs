use std::{
    collections::HashMap,
    sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard},
    time::Duration,
};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::domain::{
    MatchId, PaginatedResponse, PlayerId, RepoError, RepoRetrieveError, RepoUpdateError,
    leaderboard::{LeaderboardQuery, leaderboard_ordering},
    player::{CreatePlayerError, Player, PlayerRepository, PlayerWithStats},
    search::PlayerQuery,
    stats::{
        CommitError, LeaseError, PlayerStats, StatsCommit, StatsLease, StatsRepository,
        lease_order,
    },
};

#[derive(Default)]
struct MemoryState {
    players: HashMap<PlayerId, Player>,
    stats: HashMap<PlayerId, PlayerStats>,
    applied_matches: HashMap<MatchId, DateTime<Utc>>,
}

/// Process local store. Per-player leases are tokio mutexes; record data sits
/// behind one lock so a commit becomes visible to readers all at once.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<RwLock<MemoryState>>,
    locks: Arc<DashMap<PlayerId, Arc<Mutex<()>>>>,
}

pub struct InMemoryLease {
    player_ids: Vec<PlayerId>,
    snapshot: Vec<PlayerStats>,
    _guards: Vec<OwnedMutexGuard<()>>,
}

impl StatsLease for InMemoryLease {
    fn player_ids(&self) -> &[PlayerId] {
        &self.player_ids
    }

    fn snapshot(&self) -> &[PlayerStats] {
        &self.snapshot
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, MemoryState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, MemoryState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_for(&self, player_id: PlayerId) -> Arc<Mutex<()>> {
        self.locks
            .entry(player_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Overwrites a stats record without taking a lease, bumping its version.
    /// Used for imports and fixtures; any lease holding the old version will
    /// fail to commit.
    pub fn put_stats(&self, stats: PlayerStats) -> Result<(), RepoUpdateError> {
        let mut state = self.write();
        let Some(existing) = state.stats.get_mut(&stats.player_id) else {
            return Err(RepoUpdateError::NotFound);
        };
        let version = existing.version + 1;
        *existing = PlayerStats { version, ..stats };
        Ok(())
    }

    fn joined(state: &MemoryState) -> Vec<PlayerWithStats> {
        state
            .stats
            .values()
            .filter_map(|stats| {
                state.players.get(&stats.player_id).map(|player| PlayerWithStats {
                    player: player.clone(),
                    stats: stats.clone(),
                })
            })
            .collect()
    }

    fn page(
        items: Vec<PlayerWithStats>,
        offset: usize,
        limit: usize,
    ) -> PaginatedResponse<PlayerWithStats> {
        let total_count = items.len();
        PaginatedResponse {
            total_count,
            items: items.into_iter().skip(offset).take(limit).collect(),
        }
    }
}

#[async_trait::async_trait]
impl PlayerRepository for InMemoryStore {
    async fn create_player(&self, player: Player) -> Result<(), CreatePlayerError> {
        let mut state = self.write();
        if state.players.contains_key(&player.player_id) {
            return Err(CreatePlayerError::PlayerAlreadyExists);
        }
        if let Some(username) = player.username() {
            let lower = username.to_lowercase();
            if state
                .players
                .values()
                .filter_map(|p| p.username())
                .any(|u| u.to_lowercase() == lower)
            {
                return Err(CreatePlayerError::UsernameTaken);
            }
        }
        if let Some(email) = player.email() {
            let lower = email.to_lowercase();
            if state
                .players
                .values()
                .filter_map(|p| p.email())
                .any(|e| e.to_lowercase() == lower)
            {
                return Err(CreatePlayerError::EmailTaken);
            }
        }
        let stats = PlayerStats::new(player.player_id, player.created_at);
        state.stats.insert(player.player_id, stats);
        state.players.insert(player.player_id, player);
        Ok(())
    }

    async fn get_player(&self, player_id: PlayerId) -> Result<Player, RepoRetrieveError> {
        self.read()
            .players
            .get(&player_id)
            .cloned()
            .ok_or(RepoRetrieveError::NotFound)
    }

    async fn find_by_username(&self, username: &str) -> Result<Player, RepoRetrieveError> {
        let lower = username.to_lowercase();
        self.read()
            .players
            .values()
            .find(|p| p.username().is_some_and(|u| u.to_lowercase() == lower))
            .cloned()
            .ok_or(RepoRetrieveError::NotFound)
    }

    async fn record_login(
        &self,
        player_id: PlayerId,
        at: DateTime<Utc>,
    ) -> Result<(), RepoUpdateError> {
        let mut state = self.write();
        let player = state
            .players
            .get_mut(&player_id)
            .ok_or(RepoUpdateError::NotFound)?;
        player.last_login = Some(at);
        Ok(())
    }

    async fn set_active(&self, player_id: PlayerId, active: bool) -> Result<(), RepoUpdateError> {
        let mut state = self.write();
        let player = state
            .players
            .get_mut(&player_id)
            .ok_or(RepoUpdateError::NotFound)?;
        player.is_active = active;
        Ok(())
    }
}

#[async_trait::async_trait]
impl StatsRepository for InMemoryStore {
    type Lease = InMemoryLease;

    async fn get_player_stats(
        &self,
        player_id: PlayerId,
    ) -> Result<PlayerStats, RepoRetrieveError> {
        self.read()
            .stats
            .get(&player_id)
            .cloned()
            .ok_or(RepoRetrieveError::NotFound)
    }

    async fn acquire_lease(
        &self,
        player_ids: &[PlayerId],
        timeout: Duration,
    ) -> Result<InMemoryLease, LeaseError> {
        let ordered = lease_order(player_ids);
        {
            let state = self.read();
            if let Some(missing) = ordered.iter().find(|id| !state.stats.contains_key(id)) {
                return Err(LeaseError::NotFound(*missing));
            }
        }

        let deadline = tokio::time::Instant::now() + timeout;
        let mut guards = Vec::with_capacity(ordered.len());
        for player_id in &ordered {
            let lock = self.lock_for(*player_id);
            match tokio::time::timeout_at(deadline, lock.lock_owned()).await {
                Ok(guard) => guards.push(guard),
                Err(_) => {
                    log::debug!("Lease on player {} timed out", player_id);
                    return Err(LeaseError::Timeout);
                }
            }
        }

        let state = self.read();
        let mut snapshot = Vec::with_capacity(ordered.len());
        for player_id in &ordered {
            let stats = state
                .stats
                .get(player_id)
                .cloned()
                .ok_or(LeaseError::NotFound(*player_id))?;
            snapshot.push(stats);
        }
        drop(state);

        Ok(InMemoryLease {
            player_ids: ordered,
            snapshot,
            _guards: guards,
        })
    }

    async fn commit(&self, lease: InMemoryLease, commit: StatsCommit) -> Result<(), CommitError> {
        let mut state = self.write();
        for record in &commit.records {
            let Some(leased) = lease
                .snapshot
                .iter()
                .find(|s| s.player_id == record.player_id)
            else {
                return Err(CommitError::NotLeased(record.player_id));
            };
            let current = state
                .stats
                .get(&record.player_id)
                .ok_or_else(|| {
                    CommitError::StorageError(format!(
                        "stats for player {} disappeared",
                        record.player_id
                    ))
                })?;
            if current.version != leased.version {
                return Err(CommitError::Conflict(record.player_id));
            }
        }
        if let Some(match_id) = commit.match_id {
            if state.applied_matches.contains_key(&match_id) {
                return Err(CommitError::DuplicateMatch(match_id));
            }
            state.applied_matches.insert(match_id, Utc::now());
        }
        for record in commit.records {
            let version = record.version + 1;
            state
                .stats
                .insert(record.player_id, PlayerStats { version, ..record });
        }
        drop(state);
        drop(lease);
        Ok(())
    }

    async fn is_match_applied(&self, match_id: MatchId) -> Result<bool, RepoError> {
        Ok(self.read().applied_matches.contains_key(&match_id))
    }

    async fn query_leaderboard(
        &self,
        query: LeaderboardQuery,
    ) -> Result<PaginatedResponse<PlayerWithStats>, RepoError> {
        let mut items: Vec<PlayerWithStats> = Self::joined(&self.read())
            .into_iter()
            .filter(|entry| query.filters.matches(entry))
            .collect();
        items.sort_by(|a, b| leaderboard_ordering(&a.stats, &b.stats));
        Ok(Self::page(
            items,
            query.pagination.offset,
            query.pagination.limit,
        ))
    }

    async fn query_players(
        &self,
        query: PlayerQuery,
    ) -> Result<PaginatedResponse<PlayerWithStats>, RepoError> {
        let mut items: Vec<PlayerWithStats> = Self::joined(&self.read())
            .into_iter()
            .filter(|entry| query.matches(entry))
            .collect();
        items.sort_by(|a, b| query.ordering(a, b));
        Ok(Self::page(
            items,
            query.pagination.offset,
            query.pagination.limit,
        ))
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::stats::MatchContribution;
    use crate::domain::stats::MatchOutcome;

    use super::*;

    async fn store_with_players(n: usize) -> (InMemoryStore, Vec<PlayerId>) {
        let store = InMemoryStore::new();
        let mut ids = Vec::new();
        for i in 0..n {
            let player = Player::registered(
                format!("player{}", i),
                None,
                "hash".to_string(),
                Utc::now(),
            );
            ids.push(player.player_id);
            store.create_player(player).await.unwrap();
        }
        (store, ids)
    }

    #[tokio::test]
    async fn test_create_player_creates_default_stats() {
        let (store, ids) = store_with_players(1).await;
        let stats = store.get_player_stats(ids[0]).await.unwrap();
        assert_eq!(stats.rating, 1000);
        assert_eq!(stats.matches_played, 0);
    }

    #[tokio::test]
    async fn test_usernames_and_emails_are_unique() {
        let store = InMemoryStore::new();
        let now = Utc::now();
        store
            .create_player(Player::registered(
                "Alice".to_string(),
                Some("alice@example.com".to_string()),
                "h".to_string(),
                now,
            ))
            .await
            .unwrap();
        assert!(matches!(
            store
                .create_player(Player::registered("alice".to_string(), None, "h".to_string(), now))
                .await,
            Err(CreatePlayerError::UsernameTaken)
        ));
        assert!(matches!(
            store
                .create_player(Player::registered(
                    "bob".to_string(),
                    Some("ALICE@example.com".to_string()),
                    "h".to_string(),
                    now
                ))
                .await,
            Err(CreatePlayerError::EmailTaken)
        ));
        // guests do not reserve names
        store
            .create_player(Player::anonymous(Some("alice".to_string()), now))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_lease_blocks_overlapping_and_times_out() {
        let (store, ids) = store_with_players(3).await;
        let held = store
            .acquire_lease(&[ids[0], ids[1]], Duration::from_secs(1))
            .await
            .unwrap();

        let blocked = store
            .acquire_lease(&[ids[1], ids[2]], Duration::from_millis(50))
            .await;
        assert!(matches!(blocked, Err(LeaseError::Timeout)));

        // disjoint set is not affected
        let other = store
            .acquire_lease(&[ids[2]], Duration::from_millis(50))
            .await;
        assert!(other.is_ok());
        drop(other);

        drop(held);
        let after = store
            .acquire_lease(&[ids[1], ids[2]], Duration::from_millis(50))
            .await;
        assert!(after.is_ok());
    }

    #[tokio::test]
    async fn test_lease_on_missing_player_fails() {
        let (store, ids) = store_with_players(1).await;
        let missing = PlayerId::new();
        let result = store
            .acquire_lease(&[ids[0], missing], Duration::from_millis(50))
            .await;
        assert!(matches!(result, Err(LeaseError::NotFound(id)) if id == missing));
    }

    #[tokio::test]
    async fn test_commit_rejects_stale_snapshot() {
        let (store, ids) = store_with_players(1).await;
        let lease = store
            .acquire_lease(&ids, Duration::from_secs(1))
            .await
            .unwrap();
        let mut corrected = lease.snapshot()[0].clone();
        corrected.rating = 1500;
        store.put_stats(corrected).unwrap();

        let updated = lease.snapshot()[0].record_match(
            MatchOutcome::Win,
            1016,
            &MatchContribution::default(),
            Utc::now(),
        );
        let result = store
            .commit(
                lease,
                StatsCommit {
                    match_id: Some(MatchId::new()),
                    records: vec![updated],
                },
            )
            .await;
        assert!(matches!(result, Err(CommitError::Conflict(_))));
        assert_eq!(store.get_player_stats(ids[0]).await.unwrap().rating, 1500);
    }

    #[tokio::test]
    async fn test_commit_rejects_replayed_match_and_writes_nothing() {
        let (store, ids) = store_with_players(2).await;
        let match_id = MatchId::new();
        for attempt in 0..2 {
            let lease = store
                .acquire_lease(&ids, Duration::from_secs(1))
                .await
                .unwrap();
            let records = lease
                .snapshot()
                .iter()
                .map(|s| {
                    s.record_match(
                        MatchOutcome::Draw,
                        s.rating as i64,
                        &MatchContribution::default(),
                        Utc::now(),
                    )
                })
                .collect();
            let result = store
                .commit(
                    lease,
                    StatsCommit {
                        match_id: Some(match_id),
                        records,
                    },
                )
                .await;
            if attempt == 0 {
                assert!(result.is_ok());
            } else {
                assert!(matches!(result, Err(CommitError::DuplicateMatch(id)) if id == match_id));
            }
        }
        assert!(store.is_match_applied(match_id).await.unwrap());
        for id in ids {
            assert_eq!(store.get_player_stats(id).await.unwrap().matches_played, 1);
        }
    }

    #[tokio::test]
    async fn test_commit_outside_lease_is_rejected() {
        let (store, ids) = store_with_players(2).await;
        let lease = store
            .acquire_lease(&ids[..1], Duration::from_secs(1))
            .await
            .unwrap();
        let stranger = store.get_player_stats(ids[1]).await.unwrap();
        let result = store
            .commit(
                lease,
                StatsCommit {
                    match_id: None,
                    records: vec![stranger],
                },
            )
            .await;
        assert!(matches!(result, Err(CommitError::NotLeased(id)) if id == ids[1]));
    }
}
