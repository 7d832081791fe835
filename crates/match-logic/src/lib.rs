//! Match Logic for the Prisoner's Dilemma experiment
//!
//! Core game logic shared by the experiment server:
//! - Deterministic scenario generation from a subject id
//! - Bot strategies and the payoff matrix
//! - The per-match turn state machine

mod error;
mod game;
mod random;
mod scenario;
mod sequencer;
mod strategy;

pub use error::LogicError;
pub use game::{Match, RoundGains, Stage};
pub use random::{SeededRng, RUNTIME_STREAM, SCENARIO_STREAM};
pub use scenario::{
    generate, generate_scenario, Color, Scenario, ScenarioConfig, FEMALE_NAMES, MALE_NAMES,
    MAX_LOADING_SECS, MIRROR, OPPONENTS,
};
pub use sequencer::{MatchSequencer, MatchView, PendingMove, RoundResult, SearchOutcome, TurnPhase};
pub use strategy::{decide, decide_by_id, Move, Strategy};

/// Payoff matrix for the Prisoner's Dilemma
/// Returns (score_a, score_b)
pub fn payoff(a: Move, b: Move) -> (u8, u8) {
    match (a, b) {
        (Move::Cooperate, Move::Cooperate) => (3, 3),
        (Move::Cooperate, Move::Defect) => (0, 5),
        (Move::Defect, Move::Cooperate) => (5, 0),
        (Move::Defect, Move::Defect) => (1, 1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_payoff_matrix() {
        assert_eq!(payoff(Move::Cooperate, Move::Cooperate), (3, 3));
        assert_eq!(payoff(Move::Cooperate, Move::Defect), (0, 5));
        assert_eq!(payoff(Move::Defect, Move::Cooperate), (5, 0));
        assert_eq!(payoff(Move::Defect, Move::Defect), (1, 1));
    }

    proptest! {
        #[test]
        fn prop_payoff_is_symmetric(a in any::<bool>(), b in any::<bool>()) {
            let (a, b) = (Move::from(a), Move::from(b));
            let (x, y) = payoff(a, b);
            prop_assert_eq!((y, x), payoff(b, a));
        }
    }
}
