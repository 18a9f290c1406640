pub mod applied_match;
pub mod player;
pub mod player_stats;
