use std::{collections::BTreeMap, time::Duration};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{
    MatchId, PaginatedResponse, PlayerId, RepoError, RepoRetrieveError,
    leaderboard::LeaderboardQuery, player::PlayerWithStats, search::PlayerQuery,
};

pub const MIN_RATING: i32 = 0;
pub const MAX_RATING: i32 = 5000;
pub const INITIAL_RATING: i32 = 1000;

pub fn clamp_rating(rating: i64) -> i32 {
    rating.clamp(MIN_RATING as i64, MAX_RATING as i64) as i32
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerClass {
    Warrior,
    Mage,
    Archer,
    Rogue,
    Healer,
}

impl PlayerClass {
    pub const ALL: [PlayerClass; 5] = [
        PlayerClass::Warrior,
        PlayerClass::Mage,
        PlayerClass::Archer,
        PlayerClass::Rogue,
        PlayerClass::Healer,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PlayerClass::Warrior => "warrior",
            PlayerClass::Mage => "mage",
            PlayerClass::Archer => "archer",
            PlayerClass::Rogue => "rogue",
            PlayerClass::Healer => "healer",
        }
    }

    pub fn from_name(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == s)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchOutcome {
    Win,
    Loss,
    Draw,
}

impl MatchOutcome {
    pub fn score(&self) -> f64 {
        match self {
            MatchOutcome::Win => 1.0,
            MatchOutcome::Loss => 0.0,
            MatchOutcome::Draw => 0.5,
        }
    }
}

/// What a single participant contributed to one match.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct MatchContribution {
    pub damage_dealt: u64,
    pub damage_taken: u64,
    pub duration_seconds: u64,
    pub class_played: Option<PlayerClass>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlayerStats {
    pub player_id: PlayerId,
    pub rating: i32,
    pub highest_rating: i32,
    pub matches_played: u32,
    pub wins: u32,
    pub losses: u32,
    pub draws: u32,
    pub win_streak: u32,
    pub current_streak: i32,
    pub favorite_class: Option<PlayerClass>,
    pub class_play_counts: BTreeMap<PlayerClass, u32>,
    pub total_damage_dealt: u64,
    pub total_damage_taken: u64,
    pub total_playtime_seconds: u64,
    pub updated_at: DateTime<Utc>,
    /// Bumped by the store on every commit.
    pub version: i64,
}

impl PlayerStats {
    pub fn new(player_id: PlayerId, now: DateTime<Utc>) -> Self {
        Self {
            player_id,
            rating: INITIAL_RATING,
            highest_rating: INITIAL_RATING,
            matches_played: 0,
            wins: 0,
            losses: 0,
            draws: 0,
            win_streak: 0,
            current_streak: 0,
            favorite_class: None,
            class_play_counts: BTreeMap::new(),
            total_damage_dealt: 0,
            total_damage_taken: 0,
            total_playtime_seconds: 0,
            updated_at: now,
            version: 0,
        }
    }

    pub fn win_rate(&self) -> f64 {
        if self.matches_played == 0 {
            0.0
        } else {
            self.wins as f64 / self.matches_played as f64
        }
    }

    /// Applies one finished match on top of this record. `new_rating` is
    /// clamped into the rating bounds.
    pub fn record_match(
        &self,
        outcome: MatchOutcome,
        new_rating: i64,
        contribution: &MatchContribution,
        now: DateTime<Utc>,
    ) -> PlayerStats {
        let mut next = self.clone();
        next.rating = clamp_rating(new_rating);
        next.highest_rating = next.highest_rating.max(next.rating);

        next.matches_played += 1;
        match outcome {
            MatchOutcome::Win => {
                next.wins += 1;
                next.current_streak = if next.current_streak >= 0 {
                    next.current_streak.saturating_add(1)
                } else {
                    1
                };
            }
            MatchOutcome::Loss => {
                next.losses += 1;
                next.current_streak = if next.current_streak <= 0 {
                    next.current_streak.saturating_sub(1)
                } else {
                    -1
                };
            }
            MatchOutcome::Draw => {
                next.draws += 1;
                next.current_streak = 0;
            }
        }
        if next.current_streak > 0 {
            next.win_streak = next.win_streak.max(next.current_streak as u32);
        }

        next.total_damage_dealt = next
            .total_damage_dealt
            .saturating_add(contribution.damage_dealt);
        next.total_damage_taken = next
            .total_damage_taken
            .saturating_add(contribution.damage_taken);
        next.total_playtime_seconds = next
            .total_playtime_seconds
            .saturating_add(contribution.duration_seconds);

        if let Some(class) = contribution.class_played {
            *next.class_play_counts.entry(class).or_insert(0) += 1;
            next.favorite_class = favorite_class(&next.class_play_counts, self.favorite_class);
        }

        next.updated_at = now;
        next
    }

    /// Administrative override. Keeps `highest_rating >= rating`.
    pub fn apply_correction(
        &self,
        correction: &StatsCorrection,
        now: DateTime<Utc>,
    ) -> PlayerStats {
        let mut next = self.clone();
        if let Some(rating) = correction.rating {
            next.rating = clamp_rating(rating);
            next.highest_rating = next.highest_rating.max(next.rating);
        }
        if correction.reset_current_streak {
            next.current_streak = 0;
        }
        next.updated_at = now;
        next
    }
}

/// Most played class. A tie keeps `previous` if it is among the leaders,
/// otherwise the first leader in declaration order wins.
pub fn favorite_class(
    counts: &BTreeMap<PlayerClass, u32>,
    previous: Option<PlayerClass>,
) -> Option<PlayerClass> {
    let max = counts.values().copied().max().filter(|&m| m > 0)?;
    if let Some(prev) = previous {
        if counts.get(&prev) == Some(&max) {
            return Some(prev);
        }
    }
    counts
        .iter()
        .find(|(_, count)| **count == max)
        .map(|(class, _)| *class)
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StatsCorrection {
    pub rating: Option<i64>,
    pub reset_current_streak: bool,
    pub reason: String,
}

/// Exclusive hold on a set of stats records, released when dropped.
pub trait StatsLease: Send {
    fn player_ids(&self) -> &[PlayerId];
    /// Records as they were when the lease was granted, in the same order as
    /// [`StatsLease::player_ids`].
    fn snapshot(&self) -> &[PlayerStats];
}

#[derive(Debug)]
pub struct StatsCommit {
    pub match_id: Option<MatchId>,
    pub records: Vec<PlayerStats>,
}

#[derive(Debug)]
pub enum LeaseError {
    NotFound(PlayerId),
    Timeout,
    StorageError(String),
}

impl std::fmt::Display for LeaseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LeaseError::NotFound(id) => write!(f, "Stats for player {} not found", id),
            LeaseError::Timeout => write!(f, "Timed out waiting for lease"),
            LeaseError::StorageError(e) => write!(f, "Storage error: {}", e),
        }
    }
}

#[derive(Debug)]
pub enum CommitError {
    /// A record changed since the lease snapshot was taken.
    Conflict(PlayerId),
    DuplicateMatch(MatchId),
    NotLeased(PlayerId),
    StorageError(String),
}

impl std::fmt::Display for CommitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommitError::Conflict(id) => write!(f, "Stats for player {} were modified", id),
            CommitError::DuplicateMatch(id) => write!(f, "Match {} was already applied", id),
            CommitError::NotLeased(id) => write!(f, "Player {} is not covered by the lease", id),
            CommitError::StorageError(e) => write!(f, "Storage error: {}", e),
        }
    }
}

/// Sorted, deduplicated lease order. Every store acquires in this order.
pub fn lease_order(player_ids: &[PlayerId]) -> Vec<PlayerId> {
    let mut ids = player_ids.to_vec();
    ids.sort();
    ids.dedup();
    ids
}

#[async_trait::async_trait]
pub trait StatsRepository {
    type Lease: StatsLease + 'static;

    async fn get_player_stats(&self, player_id: PlayerId)
    -> Result<PlayerStats, RepoRetrieveError>;

    /// Blocks until every record in `player_ids` is held or `timeout` passes.
    async fn acquire_lease(
        &self,
        player_ids: &[PlayerId],
        timeout: Duration,
    ) -> Result<Self::Lease, LeaseError>;

    /// Writes all records and the ledger entry atomically, consuming the lease.
    async fn commit(&self, lease: Self::Lease, commit: StatsCommit) -> Result<(), CommitError>;

    async fn is_match_applied(&self, match_id: MatchId) -> Result<bool, RepoError>;

    async fn query_leaderboard(
        &self,
        query: LeaderboardQuery,
    ) -> Result<PaginatedResponse<PlayerWithStats>, RepoError>;

    async fn query_players(
        &self,
        query: PlayerQuery,
    ) -> Result<PaginatedResponse<PlayerWithStats>, RepoError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh() -> PlayerStats {
        PlayerStats::new(PlayerId::new(), Utc::now())
    }

    fn no_contribution() -> MatchContribution {
        MatchContribution::default()
    }

    #[test]
    fn test_counters_increment_once_per_match() {
        let now = Utc::now();
        let stats = fresh();
        for outcome in [MatchOutcome::Win, MatchOutcome::Loss, MatchOutcome::Draw] {
            let next = stats.record_match(outcome, 1000, &no_contribution(), now);
            assert_eq!(next.matches_played, stats.matches_played + 1);
            let bumped = [
                next.wins - stats.wins,
                next.losses - stats.losses,
                next.draws - stats.draws,
            ];
            assert_eq!(bumped.iter().sum::<u32>(), 1);
            assert_eq!(next.matches_played, next.wins + next.losses + next.draws);
        }
    }

    #[test]
    fn test_streak_transitions() {
        let now = Utc::now();
        let c = no_contribution();
        let s = fresh()
            .record_match(MatchOutcome::Win, 1010, &c, now)
            .record_match(MatchOutcome::Win, 1020, &c, now);
        assert_eq!(s.current_streak, 2);
        assert_eq!(s.win_streak, 2);

        let s = s.record_match(MatchOutcome::Loss, 1010, &c, now);
        assert_eq!(s.current_streak, -1);
        let s = s.record_match(MatchOutcome::Loss, 1000, &c, now);
        assert_eq!(s.current_streak, -2);
        assert_eq!(s.win_streak, 2);

        let s = s.record_match(MatchOutcome::Win, 1010, &c, now);
        assert_eq!(s.current_streak, 1);

        let s = s.record_match(MatchOutcome::Draw, 1010, &c, now);
        assert_eq!(s.current_streak, 0);
        assert_eq!(s.win_streak, 2);
    }

    #[test]
    fn test_rating_is_clamped_and_highest_tracks_peak() {
        let now = Utc::now();
        let c = no_contribution();
        let s = fresh().record_match(MatchOutcome::Win, 7000, &c, now);
        assert_eq!(s.rating, MAX_RATING);
        assert_eq!(s.highest_rating, MAX_RATING);

        let s = s.record_match(MatchOutcome::Loss, -50, &c, now);
        assert_eq!(s.rating, MIN_RATING);
        assert_eq!(s.highest_rating, MAX_RATING);
        assert!(s.highest_rating >= s.rating);
    }

    #[test]
    fn test_totals_accumulate() {
        let now = Utc::now();
        let c = MatchContribution {
            damage_dealt: 120,
            damage_taken: 80,
            duration_seconds: 600,
            class_played: None,
        };
        let s = fresh()
            .record_match(MatchOutcome::Win, 1016, &c, now)
            .record_match(MatchOutcome::Loss, 1000, &c, now);
        assert_eq!(s.total_damage_dealt, 240);
        assert_eq!(s.total_damage_taken, 160);
        assert_eq!(s.total_playtime_seconds, 1200);
    }

    #[test]
    fn test_favorite_class_follows_play_counts() {
        let now = Utc::now();
        let played = |class| MatchContribution {
            class_played: Some(class),
            ..MatchContribution::default()
        };
        let s = fresh().record_match(MatchOutcome::Win, 1000, &played(PlayerClass::Rogue), now);
        assert_eq!(s.favorite_class, Some(PlayerClass::Rogue));

        // tie keeps the current favourite
        let s = s.record_match(MatchOutcome::Win, 1000, &played(PlayerClass::Warrior), now);
        assert_eq!(s.favorite_class, Some(PlayerClass::Rogue));

        let s = s.record_match(MatchOutcome::Win, 1000, &played(PlayerClass::Warrior), now);
        assert_eq!(s.favorite_class, Some(PlayerClass::Warrior));

        // a match without a class leaves it alone
        let s = s.record_match(MatchOutcome::Win, 1000, &no_contribution(), now);
        assert_eq!(s.favorite_class, Some(PlayerClass::Warrior));
    }

    #[test]
    fn test_correction_keeps_highest_rating() {
        let now = Utc::now();
        let s = fresh().record_match(MatchOutcome::Win, 1200, &no_contribution(), now);
        let lowered = s.apply_correction(
            &StatsCorrection {
                rating: Some(900),
                reset_current_streak: true,
                reason: "smurf".to_string(),
            },
            now,
        );
        assert_eq!(lowered.rating, 900);
        assert_eq!(lowered.highest_rating, 1200);
        assert_eq!(lowered.current_streak, 0);
        assert_eq!(lowered.win_streak, 1);

        let raised = s.apply_correction(
            &StatsCorrection {
                rating: Some(9000),
                ..StatsCorrection::default()
            },
            now,
        );
        assert_eq!(raised.rating, MAX_RATING);
        assert_eq!(raised.highest_rating, MAX_RATING);
    }

    #[test]
    fn test_lease_order_is_sorted_and_unique() {
        let a = PlayerId::new();
        let b = PlayerId::new();
        let ordered = lease_order(&[b, a, b]);
        assert_eq!(ordered.len(), 2);
        assert!(ordered[0] < ordered[1]);
    }
}
