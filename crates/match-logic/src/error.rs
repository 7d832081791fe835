//! Errors raised by the match logic

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LogicError {
    /// Strategy id is not one of the canonical nine.
    #[error("unknown strategy \"{0}\"")]
    UnknownStrategy(String),

    /// Both the subject and the bot have to move before a round is scored.
    #[error("both subject and bot have to make a move before scoring")]
    IncompleteRound,

    /// No match is selected, it is out of bounds, or it has no rounds left.
    #[error("no active match")]
    NoActiveMatch,
}
