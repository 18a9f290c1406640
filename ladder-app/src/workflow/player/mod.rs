use crate::domain::{PlayerId, player::PlayerWithStats, stats::PlayerStats};

pub mod get_stats;
pub mod search;

#[derive(Clone, Debug, PartialEq)]
pub struct PlayerStatsView {
    pub player_id: PlayerId,
    pub display_name: Option<String>,
    pub is_anonymous: bool,
    pub is_active: bool,
    pub win_rate: f64,
    pub stats: PlayerStats,
}

impl From<PlayerWithStats> for PlayerStatsView {
    fn from(entry: PlayerWithStats) -> Self {
        Self {
            player_id: entry.player.player_id,
            display_name: entry.player.display_name().map(str::to_string),
            is_anonymous: entry.player.is_anonymous(),
            is_active: entry.player.is_active,
            win_rate: entry.stats.win_rate(),
            stats: entry.stats,
        }
    }
}
