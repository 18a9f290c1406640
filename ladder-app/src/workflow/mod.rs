pub mod account;
pub mod leaderboard;
pub mod matches;
pub mod player;
