//! Strategy definitions and execution

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::LogicError;
use crate::random::SeededRng;

/// A move in the Prisoner's Dilemma
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Move {
    Cooperate,
    Defect,
}

impl Move {
    /// Wire representation: `true` means cooperate
    pub fn is_cooperate(self) -> bool {
        self == Move::Cooperate
    }
}

impl From<bool> for Move {
    fn from(cooperate: bool) -> Self {
        if cooperate {
            Move::Cooperate
        } else {
            Move::Defect
        }
    }
}

impl From<Move> for bool {
    fn from(value: Move) -> Self {
        value.is_cooperate()
    }
}

/// Bot strategy, keyed by its canonical experiment id
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Copy opponent's last move. Start with cooperate.
    #[serde(rename = "tft")]
    TitForTat,
    /// Cooperate until opponent defects once, then always defect.
    #[serde(rename = "grim")]
    GrimTrigger,
    /// Win-stay, lose-switch.
    Pavlov,
    /// Tit-for-Tat but start with defect.
    #[serde(rename = "susp_tft")]
    SuspiciousTitForTat,
    /// Cooperate only while the opponent mostly cooperated.
    #[serde(rename = "hard_majo")]
    HardMajority,
    /// Alternate, starting with defect.
    #[serde(rename = "per_dc")]
    PeriodicDefectCooperate,
    /// Always cooperate, never defect.
    #[serde(rename = "all_c")]
    AlwaysCooperate,
    /// Always defect, never cooperate.
    #[serde(rename = "all_d")]
    AlwaysDefect,
    /// Random choice each round.
    Random,
}

impl Strategy {
    /// Canonical order of the strategy pool
    pub const ALL: [Strategy; 9] = [
        Strategy::TitForTat,
        Strategy::GrimTrigger,
        Strategy::Pavlov,
        Strategy::SuspiciousTitForTat,
        Strategy::HardMajority,
        Strategy::PeriodicDefectCooperate,
        Strategy::AlwaysCooperate,
        Strategy::AlwaysDefect,
        Strategy::Random,
    ];

    /// Experiment id, as written to the audit log
    pub fn id(self) -> &'static str {
        match self {
            Strategy::TitForTat => "tft",
            Strategy::GrimTrigger => "grim",
            Strategy::Pavlov => "pavlov",
            Strategy::SuspiciousTitForTat => "susp_tft",
            Strategy::HardMajority => "hard_majo",
            Strategy::PeriodicDefectCooperate => "per_dc",
            Strategy::AlwaysCooperate => "all_c",
            Strategy::AlwaysDefect => "all_d",
            Strategy::Random => "random",
        }
    }

    /// Get a human-readable description of a strategy
    pub fn describe(self) -> &'static str {
        match self {
            Strategy::TitForTat => "Copies opponent's last move. Starts by cooperating.",
            Strategy::GrimTrigger => "Cooperates until betrayed, then always defects.",
            Strategy::Pavlov => "Cooperates when both players made the same move last round.",
            Strategy::SuspiciousTitForTat => "Like Tit-for-Tat, but starts with defect.",
            Strategy::HardMajority => "Cooperates only if the opponent cooperated more often than not.",
            Strategy::PeriodicDefectCooperate => "Alternates defect and cooperate, starting with defect.",
            Strategy::AlwaysCooperate => "Never defects. Always cooperates.",
            Strategy::AlwaysDefect => "Never cooperates. Always defects.",
            Strategy::Random => "Randomly cooperates or defects each round.",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Strategy {
    type Err = LogicError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Strategy::ALL
            .into_iter()
            .find(|strategy| strategy.id() == s)
            .ok_or_else(|| LogicError::UnknownStrategy(s.to_string()))
    }
}

/// Execute a strategy for one round
///
/// # Arguments
/// * `strategy` - The strategy to execute
/// * `my_history` - Our past moves
/// * `opponent_history` - Opponent's past moves
/// * `rng` - Random number generator, only drawn from by `Random`
pub fn decide(
    strategy: Strategy,
    my_history: &[Move],
    opponent_history: &[Move],
    rng: &mut SeededRng,
) -> Move {
    match strategy {
        Strategy::AlwaysCooperate => Move::Cooperate,
        Strategy::AlwaysDefect => Move::Defect,
        Strategy::PeriodicDefectCooperate => Move::from(my_history.len() % 2 == 1),
        Strategy::TitForTat => opponent_history.last().copied().unwrap_or(Move::Cooperate),
        Strategy::GrimTrigger => execute_grim_trigger(opponent_history),
        Strategy::Pavlov => execute_pavlov(my_history, opponent_history),
        Strategy::SuspiciousTitForTat => opponent_history.last().copied().unwrap_or(Move::Defect),
        Strategy::HardMajority => execute_hard_majority(opponent_history),
        Strategy::Random => Move::from(rng.next_bool()),
    }
}

/// Execute a strategy given by its experiment id
pub fn decide_by_id(
    id: &str,
    my_history: &[Move],
    opponent_history: &[Move],
    rng: &mut SeededRng,
) -> Result<Move, LogicError> {
    let strategy = id.parse::<Strategy>()?;
    Ok(decide(strategy, my_history, opponent_history, rng))
}

/// Grim Trigger: Cooperate until opponent defects, then always defect
fn execute_grim_trigger(opponent_history: &[Move]) -> Move {
    if opponent_history.contains(&Move::Defect) {
        Move::Defect
    } else {
        Move::Cooperate
    }
}

/// Pavlov: cooperate after agreement, defect after disagreement
///
/// Same outcome as repeating a move that scored 3+ and switching otherwise.
fn execute_pavlov(my_history: &[Move], opponent_history: &[Move]) -> Move {
    match (my_history.last(), opponent_history.last()) {
        (Some(mine), Some(theirs)) => Move::from(mine == theirs),
        _ => Move::Cooperate,
    }
}

/// Hard Go By Majority: an empty or tied history defects
fn execute_hard_majority(opponent_history: &[Move]) -> Move {
    let cooperations = opponent_history
        .iter()
        .filter(|m| **m == Move::Cooperate)
        .count();
    let defections = opponent_history.len() - cooperations;

    Move::from(cooperations > defections)
}

#[cfg(test)]
mod tests {
    use super::*;
    use Move::{Cooperate as C, Defect as D};

    fn make_rng() -> SeededRng {
        SeededRng::new(42, 0)
    }

    #[test]
    fn test_ids_round_trip_through_from_str() {
        for strategy in Strategy::ALL {
            assert_eq!(strategy.id().parse::<Strategy>().unwrap(), strategy);
        }
    }

    #[test]
    fn test_serde_uses_experiment_ids() {
        let json = serde_json::to_string(&Strategy::HardMajority).unwrap();
        assert_eq!(json, "\"hard_majo\"");
        let parsed: Strategy = serde_json::from_str("\"per_dc\"").unwrap();
        assert_eq!(parsed, Strategy::PeriodicDefectCooperate);
    }

    #[test]
    fn test_unknown_strategy() {
        let err = "tit_for_two_tats".parse::<Strategy>().unwrap_err();
        assert_eq!(err, LogicError::UnknownStrategy("tit_for_two_tats".to_string()));

        let mut rng = make_rng();
        assert!(decide_by_id("gradual", &[], &[], &mut rng).is_err());
        assert_eq!(decide_by_id("all_d", &[], &[], &mut rng), Ok(D));
    }

    #[test]
    fn test_tit_for_tat() {
        let mut rng = make_rng();
        assert_eq!(decide(Strategy::TitForTat, &[], &[], &mut rng), C);
        assert_eq!(decide(Strategy::TitForTat, &[C], &[C], &mut rng), C);
        assert_eq!(decide(Strategy::TitForTat, &[C], &[D], &mut rng), D);
        assert_eq!(decide(Strategy::TitForTat, &[D, D], &[D, C], &mut rng), C);
    }

    #[test]
    fn test_always_defect_and_cooperate() {
        let mut rng = make_rng();
        for len in 0..10 {
            let history = vec![C; len];
            assert_eq!(decide(Strategy::AlwaysDefect, &history, &history, &mut rng), D);
            assert_eq!(decide(Strategy::AlwaysCooperate, &history, &history, &mut rng), C);
        }
    }

    #[test]
    fn test_periodic_starts_with_defect() {
        let mut rng = make_rng();
        let mut mine = Vec::new();
        for _ in 0..6 {
            let m = decide(Strategy::PeriodicDefectCooperate, &mine, &[], &mut rng);
            mine.push(m);
        }
        assert_eq!(mine, vec![D, C, D, C, D, C]);
    }

    #[test]
    fn test_grim_trigger() {
        let mut rng = make_rng();

        // Cooperate while opponent cooperates
        assert_eq!(decide(Strategy::GrimTrigger, &[], &[], &mut rng), C);
        assert_eq!(decide(Strategy::GrimTrigger, &[C, C], &[C, C], &mut rng), C);

        // Defect forever after opponent defects, even if they came back
        assert_eq!(decide(Strategy::GrimTrigger, &[C, C], &[D, C], &mut rng), D);
        assert_eq!(decide(Strategy::GrimTrigger, &[C, D, D], &[D, C, C], &mut rng), D);
    }

    #[test]
    fn test_pavlov() {
        let mut rng = make_rng();

        assert_eq!(decide(Strategy::Pavlov, &[], &[], &mut rng), C);
        assert_eq!(decide(Strategy::Pavlov, &[C], &[C], &mut rng), C);
        assert_eq!(decide(Strategy::Pavlov, &[D], &[D], &mut rng), C);
        assert_eq!(decide(Strategy::Pavlov, &[C], &[D], &mut rng), D);
        assert_eq!(decide(Strategy::Pavlov, &[D], &[C], &mut rng), D);
    }

    #[test]
    fn test_pavlov_matches_win_stay_lose_shift() {
        let mut rng = make_rng();
        for mine in [C, D] {
            for theirs in [C, D] {
                let (my_score, _) = crate::payoff(mine, theirs);
                let expected = if my_score >= 3 {
                    mine
                } else if mine == C {
                    D
                } else {
                    C
                };
                assert_eq!(decide(Strategy::Pavlov, &[mine], &[theirs], &mut rng), expected);
            }
        }
    }

    #[test]
    fn test_suspicious_tft_starts_defect() {
        let mut rng = make_rng();
        assert_eq!(decide(Strategy::SuspiciousTitForTat, &[], &[], &mut rng), D);
        assert_eq!(decide(Strategy::SuspiciousTitForTat, &[D], &[C], &mut rng), C);
        assert_eq!(decide(Strategy::SuspiciousTitForTat, &[C], &[D], &mut rng), D);
    }

    #[test]
    fn test_hard_majority() {
        let mut rng = make_rng();

        // No history and ties defect
        assert_eq!(decide(Strategy::HardMajority, &[], &[], &mut rng), D);
        assert_eq!(decide(Strategy::HardMajority, &[D, D], &[C, D], &mut rng), D);

        assert_eq!(decide(Strategy::HardMajority, &[D, C, C], &[C, C, D], &mut rng), C);
        assert_eq!(decide(Strategy::HardMajority, &[D, D, D], &[D, C, D], &mut rng), D);
    }

    #[test]
    fn test_random_is_seeded() {
        let mut a = make_rng();
        let mut b = make_rng();
        let run_a: Vec<_> = (0..32).map(|_| decide(Strategy::Random, &[], &[], &mut a)).collect();
        let run_b: Vec<_> = (0..32).map(|_| decide(Strategy::Random, &[], &[], &mut b)).collect();

        assert_eq!(run_a, run_b);
        assert!(run_a.contains(&C) && run_a.contains(&D));
    }

    #[test]
    fn test_move_bool_conversions() {
        assert_eq!(Move::from(true), C);
        assert_eq!(Move::from(false), D);
        assert!(bool::from(C));
        assert!(!D.is_cooperate());
    }
}
