use crate::domain::stats::MatchOutcome;

pub trait RatingService {
    /// Rating changes for each participant, in input order. Inputs are the
    /// pre-match ratings.
    fn calculate_deltas(&self, participants: &[(i32, MatchOutcome)]) -> Vec<i64>;
}

/// Elo with a fixed K-factor. Free-for-all matches are scored pairwise:
/// every participant plays a virtual game against each other participant and
/// the summed adjustment is averaged over the number of opponents.
pub struct EloRatingService {
    k_factor: f64,
}

impl EloRatingService {
    pub const DEFAULT_K_FACTOR: f64 = 32.0;

    pub fn new(k_factor: f64) -> Self {
        Self { k_factor }
    }

    pub fn expected_score(rating: i32, opponent_rating: i32) -> f64 {
        1.0 / (1.0 + 10f64.powf((opponent_rating - rating) as f64 / 400.0))
    }

    fn pairwise_score(outcome: MatchOutcome, opponent_outcome: MatchOutcome) -> f64 {
        match (outcome, opponent_outcome) {
            (MatchOutcome::Win, MatchOutcome::Loss) => 1.0,
            (MatchOutcome::Loss, MatchOutcome::Win) => 0.0,
            _ => 0.5,
        }
    }
}

impl Default for EloRatingService {
    fn default() -> Self {
        Self::new(Self::DEFAULT_K_FACTOR)
    }
}

impl RatingService for EloRatingService {
    fn calculate_deltas(&self, participants: &[(i32, MatchOutcome)]) -> Vec<i64> {
        let n = participants.len();
        if n < 2 {
            return vec![0; n];
        }
        let mut adjustments = vec![0.0f64; n];
        for i in 0..n {
            for j in (i + 1)..n {
                let (rating_i, outcome_i) = participants[i];
                let (rating_j, outcome_j) = participants[j];
                let term = Self::pairwise_score(outcome_i, outcome_j)
                    - Self::expected_score(rating_i, rating_j);
                // j's term is exactly the negation, keeping each pair zero-sum
                adjustments[i] += term;
                adjustments[j] -= term;
            }
        }
        let opponents = (n - 1) as f64;
        adjustments
            .into_iter()
            .map(|a| (self.k_factor * a / opponents).round() as i64)
            .collect()
    }
}
