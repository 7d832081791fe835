//! A single bot opponent and its round-by-round state

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::payoff;
use crate::random::SeededRng;
use crate::strategy::{decide, Move, Strategy};

/// Scene the match is played in
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Temple,
    Jail,
    Lab,
    Home,
    Forest,
    Station,
    Beach,
    Junkyard,
    Tron,
}

impl Stage {
    pub const ALL: [Stage; 9] = [
        Stage::Temple,
        Stage::Jail,
        Stage::Lab,
        Stage::Home,
        Stage::Forest,
        Stage::Station,
        Stage::Beach,
        Stage::Junkyard,
        Stage::Tron,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Temple => "temple",
            Stage::Jail => "jail",
            Stage::Lab => "lab",
            Stage::Home => "home",
            Stage::Forest => "forest",
            Stage::Station => "station",
            Stage::Beach => "beach",
            Stage::Junkyard => "junkyard",
            Stage::Tron => "tron",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Points and remaining rounds after one scored round
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RoundGains {
    pub rounds_left: u32,
    pub gain_bot: u32,
    pub gain_subject: u32,
}

/// One bot opponent instance
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Match {
    pub name: String,
    pub avatar: String,
    pub is_female: bool,
    pub stage: Stage,
    pub strategy: Strategy,
    pub rounds_remaining: u32,
    /// Bot "loading" delay before the match environment is revealed
    pub loading_secs: f64,
    pub history_subject: Vec<Move>,
    pub history_bot: Vec<Move>,
}

impl Match {
    pub fn new(
        name: String,
        avatar: String,
        is_female: bool,
        stage: Stage,
        strategy: Strategy,
        rounds: u32,
        loading_secs: f64,
    ) -> Self {
        Self {
            name,
            avatar,
            is_female,
            stage,
            strategy,
            rounds_remaining: rounds,
            loading_secs,
            history_subject: Vec::with_capacity(rounds as usize),
            history_bot: Vec::with_capacity(rounds as usize),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.rounds_remaining == 0
    }

    /// Rounds already scored in this match
    pub fn rounds_played(&self) -> usize {
        self.history_bot.len()
    }

    /// The bot's next move from its own point of view
    pub fn bot_move(&self, rng: &mut SeededRng) -> Move {
        decide(self.strategy, &self.history_bot, &self.history_subject, rng)
    }

    /// Score a round and append both moves to the histories
    pub fn play(&mut self, bot_move: Move, subject_move: Move) -> RoundGains {
        let (gain_bot, gain_subject) = payoff(bot_move, subject_move);
        self.rounds_remaining = self.rounds_remaining.saturating_sub(1);
        self.history_bot.push(bot_move);
        self.history_subject.push(subject_move);

        RoundGains {
            rounds_left: self.rounds_remaining,
            gain_bot: gain_bot as u32,
            gain_subject: gain_subject as u32,
        }
    }
}
