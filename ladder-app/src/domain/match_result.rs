use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::domain::{
    MatchId, PlayerId,
    stats::{MatchContribution, MatchOutcome, PlayerClass},
};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchParticipant {
    pub player_id: PlayerId,
    pub outcome: MatchOutcome,
    #[serde(default)]
    pub damage_dealt: u64,
    #[serde(default)]
    pub damage_taken: u64,
    #[serde(default)]
    pub duration_seconds: u64,
    #[serde(default)]
    pub class_played: Option<PlayerClass>,
}

impl MatchParticipant {
    pub fn contribution(&self) -> MatchContribution {
        MatchContribution {
            damage_dealt: self.damage_dealt,
            damage_taken: self.damage_taken,
            duration_seconds: self.duration_seconds,
            class_played: self.class_played,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchResult {
    pub match_id: MatchId,
    pub participants: Vec<MatchParticipant>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MatchResultError {
    #[error("a match needs at least two participants, got {0}")]
    TooFewParticipants(usize),
    #[error("player {0} appears more than once")]
    DuplicateParticipant(PlayerId),
    #[error("a match cannot end with every participant winning")]
    NoLoser,
    #[error("a match cannot end with every participant losing")]
    NoWinner,
    #[error("draws cannot be mixed with decisive outcomes")]
    MixedDraw,
}

impl MatchResult {
    /// Checks the outcome set. A result is either a full draw, or has at
    /// least one winner and one loser and no draws.
    pub fn validate(&self) -> Result<(), MatchResultError> {
        if self.participants.len() < 2 {
            return Err(MatchResultError::TooFewParticipants(self.participants.len()));
        }
        let mut seen = HashSet::new();
        for participant in &self.participants {
            if !seen.insert(participant.player_id) {
                return Err(MatchResultError::DuplicateParticipant(participant.player_id));
            }
        }

        let count = |outcome: MatchOutcome| {
            self.participants
                .iter()
                .filter(|p| p.outcome == outcome)
                .count()
        };
        let (wins, losses, draws) = (
            count(MatchOutcome::Win),
            count(MatchOutcome::Loss),
            count(MatchOutcome::Draw),
        );
        if draws == self.participants.len() {
            return Ok(());
        }
        if draws > 0 {
            return Err(MatchResultError::MixedDraw);
        }
        if losses == 0 {
            return Err(MatchResultError::NoLoser);
        }
        if wins == 0 {
            return Err(MatchResultError::NoWinner);
        }
        Ok(())
    }

    pub fn player_ids(&self) -> Vec<PlayerId> {
        self.participants.iter().map(|p| p.player_id).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn participant(outcome: MatchOutcome) -> MatchParticipant {
        MatchParticipant {
            player_id: PlayerId::new(),
            outcome,
            damage_dealt: 0,
            damage_taken: 0,
            duration_seconds: 0,
            class_played: None,
        }
    }

    fn result(outcomes: &[MatchOutcome]) -> MatchResult {
        MatchResult {
            match_id: MatchId::new(),
            participants: outcomes.iter().map(|o| participant(*o)).collect(),
        }
    }

    #[test]
    fn test_valid_outcome_sets() {
        use MatchOutcome::*;
        assert!(result(&[Win, Loss]).validate().is_ok());
        assert!(result(&[Draw, Draw]).validate().is_ok());
        assert!(result(&[Win, Loss, Loss, Loss]).validate().is_ok());
        assert!(result(&[Win, Win, Loss, Loss]).validate().is_ok());
        assert!(result(&[Draw, Draw, Draw]).validate().is_ok());
    }

    #[test]
    fn test_invalid_outcome_sets() {
        use MatchOutcome::*;
        assert_eq!(
            result(&[Win]).validate(),
            Err(MatchResultError::TooFewParticipants(1))
        );
        assert_eq!(result(&[Win, Win]).validate(), Err(MatchResultError::NoLoser));
        assert_eq!(
            result(&[Loss, Loss]).validate(),
            Err(MatchResultError::NoWinner)
        );
        assert_eq!(
            result(&[Win, Draw]).validate(),
            Err(MatchResultError::MixedDraw)
        );
        assert_eq!(
            result(&[Win, Loss, Draw]).validate(),
            Err(MatchResultError::MixedDraw)
        );
    }

    #[test]
    fn test_duplicate_participant_is_rejected() {
        let mut r = result(&[MatchOutcome::Win, MatchOutcome::Loss]);
        r.participants[1].player_id = r.participants[0].player_id;
        assert_eq!(
            r.validate(),
            Err(MatchResultError::DuplicateParticipant(
                r.participants[0].player_id
            ))
        );
    }

    #[test]
    fn test_deserializes_with_optional_fields() {
        let id = PlayerId::new();
        let other = PlayerId::new();
        let json = format!(
            r#"{{"match_id":"{}","participants":[
                {{"player_id":"{}","outcome":"win","damage_dealt":40,"class_played":"mage"}},
                {{"player_id":"{}","outcome":"loss"}}
            ]}}"#,
            MatchId::new(),
            id,
            other
        );
        let parsed: MatchResult = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.participants[0].damage_dealt, 40);
        assert_eq!(
            parsed.participants[0].class_played,
            Some(PlayerClass::Mage)
        );
        assert_eq!(parsed.participants[1].outcome, MatchOutcome::Loss);
        assert_eq!(parsed.participants[1].duration_seconds, 0);
    }
}
