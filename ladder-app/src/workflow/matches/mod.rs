pub mod apply_result;
pub mod correct_stats;
