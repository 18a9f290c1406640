use std::cmp::Ordering;

use crate::domain::{
    Pagination, PlayerId,
    player::PlayerWithStats,
    stats::{PlayerClass, PlayerStats},
};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LeaderboardFilters {
    pub include_inactive: bool,
    pub include_anonymous: bool,
    pub min_matches_played: Option<u32>,
    pub favorite_class: Option<PlayerClass>,
}

impl LeaderboardFilters {
    pub fn matches(&self, entry: &PlayerWithStats) -> bool {
        if !self.include_inactive && !entry.player.is_active {
            return false;
        }
        if !self.include_anonymous && entry.player.is_anonymous() {
            return false;
        }
        if let Some(min) = self.min_matches_played {
            if entry.stats.matches_played < min {
                return false;
            }
        }
        if let Some(class) = self.favorite_class {
            if entry.stats.favorite_class != Some(class) {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaderboardQuery {
    pub filters: LeaderboardFilters,
    pub pagination: Pagination,
}

/// Total order used for ranking: rating desc, highest rating desc, wins desc,
/// matches played asc, player id asc. Stores must reproduce it exactly.
pub fn leaderboard_ordering(a: &PlayerStats, b: &PlayerStats) -> Ordering {
    b.rating
        .cmp(&a.rating)
        .then_with(|| b.highest_rating.cmp(&a.highest_rating))
        .then_with(|| b.wins.cmp(&a.wins))
        .then_with(|| a.matches_played.cmp(&b.matches_played))
        .then_with(|| a.player_id.cmp(&b.player_id))
}

#[derive(Debug, Clone, PartialEq)]
pub struct LeaderboardEntry {
    pub rank: usize,
    pub player_id: PlayerId,
    pub display_name: Option<String>,
    pub is_anonymous: bool,
    pub win_rate: f64,
    pub stats: PlayerStats,
}

impl LeaderboardEntry {
    pub fn new(rank: usize, entry: PlayerWithStats) -> Self {
        Self {
            rank,
            player_id: entry.player.player_id,
            display_name: entry.player.display_name().map(str::to_string),
            is_anonymous: entry.player.is_anonymous(),
            win_rate: entry.stats.win_rate(),
            stats: entry.stats,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LeaderboardPage {
    pub total_count: usize,
    pub entries: Vec<LeaderboardEntry>,
}

/// Ranks a page that starts at `offset` of the global ordering.
pub fn rank_page(offset: usize, items: Vec<PlayerWithStats>) -> Vec<LeaderboardEntry> {
    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| LeaderboardEntry::new(offset + index + 1, item))
        .collect()
}
