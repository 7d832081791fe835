//! Turn state machine over a subject's ordered matches
//!
//! The subject and the bot submit their moves independently and in any
//! order. A round is scored exactly once, by `resolve_round`, after both
//! moves are in; scoring clears both pending moves in the same step.

use serde::{Deserialize, Serialize};

use crate::error::LogicError;
use crate::game::{Match, Stage};
use crate::random::{SeededRng, RUNTIME_STREAM};
use crate::scenario::{Color, Scenario};
use crate::strategy::{Move, Strategy};

/// A move slot that is either empty or holds a committed move
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PendingMove {
    #[default]
    NotSubmitted,
    Submitted(Move),
}

impl PendingMove {
    pub fn is_submitted(self) -> bool {
        matches!(self, PendingMove::Submitted(_))
    }
}

/// Result of advancing to the next match
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SearchOutcome {
    Match(usize),
    /// No matches left, the experiment is over
    Complete,
}

/// Where the sequencer stands between two messages
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TurnPhase {
    /// No match selected yet
    Idle,
    /// Match selected, nothing played or pending
    Searching,
    /// At least one round to go in the current match
    AwaitingMoves,
    /// Current match has no rounds left
    MatchOver,
    /// Ran past the last match
    Complete,
}

/// Snapshot returned after a scored round
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundResult {
    pub rounds_left: u32,
    pub gain_bot: u32,
    pub gain_subject: u32,
    /// Bot's running score in the current match
    pub score_bot: u32,
    /// Subject's running score in the current match
    pub score_subject: u32,
    pub move_bot: Move,
    pub move_subject: Move,
}

/// The current match as the subject sees it
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MatchView {
    pub index: usize,
    pub name: String,
    pub avatar: String,
    pub is_female: bool,
    pub stage: Stage,
    pub strategy: Strategy,
    pub loading_secs: f64,
    pub color: Color,
    pub score_subject: u32,
    pub score_bot: u32,
}

#[derive(Clone, Debug)]
pub struct MatchSequencer {
    matches: Vec<Match>,
    color: Color,
    current: Option<usize>,
    first_match: usize,
    score_subject_current: u32,
    score_subject_total: u32,
    score_bot_current: u32,
    score_bot_total: u32,
    pending_subject: PendingMove,
    pending_bot: PendingMove,
    rng: SeededRng,
}

impl MatchSequencer {
    /// Create a sequencer whose runtime randomness is derived from `seed`
    pub fn new(scenario: Scenario, seed: u64) -> Self {
        Self {
            matches: scenario.matches,
            color: scenario.color,
            current: None,
            first_match: 0,
            score_subject_current: 0,
            score_subject_total: 0,
            score_bot_current: 0,
            score_bot_total: 0,
            pending_subject: PendingMove::NotSubmitted,
            pending_bot: PendingMove::NotSubmitted,
            rng: SeededRng::new(seed, RUNTIME_STREAM),
        }
    }

    /// Start the first search at `index` instead of 0
    pub fn with_first_match(mut self, index: usize) -> Self {
        self.first_match = index;
        self
    }

    /// Advance to the next match, resetting per-match state
    pub fn search(&mut self) -> SearchOutcome {
        self.pending_subject = PendingMove::NotSubmitted;
        self.pending_bot = PendingMove::NotSubmitted;
        self.score_subject_current = 0;
        self.score_bot_current = 0;

        let next = self
            .current
            .map_or(self.first_match, |index| index.saturating_add(1))
            .min(self.matches.len());
        self.current = Some(next);

        if next < self.matches.len() {
            SearchOutcome::Match(next)
        } else {
            SearchOutcome::Complete
        }
    }

    /// Record the subject's move; returns whether the bot already moved
    pub fn submit_subject_move(&mut self, subject_move: Move) -> Result<bool, LogicError> {
        if !self.is_active() {
            return Err(LogicError::NoActiveMatch);
        }
        self.pending_subject = PendingMove::Submitted(subject_move);
        Ok(self.pending_bot.is_submitted())
    }

    /// Let the bot decide; returns its move and whether the subject already moved
    pub fn submit_bot_move(&mut self) -> Result<(Move, bool), LogicError> {
        let index = self.active_index().ok_or(LogicError::NoActiveMatch)?;
        let bot_move = self.matches[index].bot_move(&mut self.rng);
        self.pending_bot = PendingMove::Submitted(bot_move);
        Ok((bot_move, self.pending_subject.is_submitted()))
    }

    /// Score the round once both moves are in
    pub fn resolve_round(&mut self) -> Result<RoundResult, LogicError> {
        let (PendingMove::Submitted(move_bot), PendingMove::Submitted(move_subject)) =
            (self.pending_bot, self.pending_subject)
        else {
            return Err(LogicError::IncompleteRound);
        };
        let index = self.active_index().ok_or(LogicError::NoActiveMatch)?;

        let gains = self.matches[index].play(move_bot, move_subject);
        self.pending_bot = PendingMove::NotSubmitted;
        self.pending_subject = PendingMove::NotSubmitted;

        self.score_bot_current += gains.gain_bot;
        self.score_bot_total += gains.gain_bot;
        self.score_subject_current += gains.gain_subject;
        self.score_subject_total += gains.gain_subject;

        Ok(RoundResult {
            rounds_left: gains.rounds_left,
            gain_bot: gains.gain_bot,
            gain_subject: gains.gain_subject,
            score_bot: self.score_bot_current,
            score_subject: self.score_subject_current,
            move_bot,
            move_subject,
        })
    }

    /// A match is selected, in bounds, and still has rounds to play
    pub fn is_active(&self) -> bool {
        self.active_index().is_some()
    }

    fn active_index(&self) -> Option<usize> {
        self.current
            .filter(|index| self.matches.get(*index).is_some_and(|m| !m.is_finished()))
    }

    pub fn phase(&self) -> TurnPhase {
        let Some(index) = self.current else {
            return TurnPhase::Idle;
        };
        let Some(current) = self.matches.get(index) else {
            return TurnPhase::Complete;
        };
        if current.is_finished() {
            TurnPhase::MatchOver
        } else if current.rounds_played() == 0
            && !self.pending_bot.is_submitted()
            && !self.pending_subject.is_submitted()
        {
            TurnPhase::Searching
        } else {
            TurnPhase::AwaitingMoves
        }
    }

    /// Ran past the last match
    pub fn is_complete(&self) -> bool {
        self.current.is_some_and(|index| index >= self.matches.len())
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current
    }

    pub fn current_match(&self) -> Option<&Match> {
        self.current.and_then(|index| self.matches.get(index))
    }

    /// Environment of the selected match with the running scores
    pub fn snapshot(&self) -> Option<MatchView> {
        let index = self.current?;
        let current = self.matches.get(index)?;
        Some(MatchView {
            index,
            name: current.name.clone(),
            avatar: current.avatar.clone(),
            is_female: current.is_female,
            stage: current.stage,
            strategy: current.strategy,
            loading_secs: current.loading_secs,
            color: self.color,
            score_subject: self.score_subject_current,
            score_bot: self.score_bot_current,
        })
    }

    pub fn matches(&self) -> &[Match] {
        &self.matches
    }

    pub fn color(&self) -> Color {
        self.color
    }

    pub fn pending_subject(&self) -> PendingMove {
        self.pending_subject
    }

    pub fn pending_bot(&self) -> PendingMove {
        self.pending_bot
    }

    pub fn score_subject_current(&self) -> u32 {
        self.score_subject_current
    }

    pub fn score_subject_total(&self) -> u32 {
        self.score_subject_total
    }

    pub fn score_bot_current(&self) -> u32 {
        self.score_bot_current
    }

    pub fn score_bot_total(&self) -> u32 {
        self.score_bot_total
    }

    /// Draw a bot "thinking" delay in seconds: `base + U[0, jitter)`
    pub fn thinking_delay_secs(&mut self, base: f64, jitter: f64) -> f64 {
        base + self.rng.next_unit() * jitter
    }
}
