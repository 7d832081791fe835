//! Deferred bot actions
//!
//! Every action carries the index of the match it was scheduled for. When
//! it fires for a different or finished match it does nothing.

use std::time::Duration;

use match_logic::{LogicError, MatchSequencer, Move};
use tracing::{debug, info};

use super::Context;
use crate::config::Timings;
use crate::error::ServerError;
use crate::protocol::{EnvironmentMessage, GameMessage, RoundMessage};
use crate::state::Session;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Deferred {
    /// Show the match once the bot has "loaded"
    RevealMatch { index: usize },
    /// Bot commits its move for the current round
    BotMove { index: usize },
    /// Tell the subject the match is over
    EndMatch { index: usize },
}

impl Deferred {
    pub fn index(self) -> usize {
        match self {
            Deferred::RevealMatch { index }
            | Deferred::BotMove { index }
            | Deferred::EndMatch { index } => index,
        }
    }
}

/// Whose move completed a round
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Closer {
    Subject,
    Bot,
}

impl Closer {
    fn audit_key(self) -> &'static str {
        match self {
            Closer::Subject => "play_subject",
            Closer::Bot => "play_bot",
        }
    }
}

pub fn thinking_delay(sequencer: &mut MatchSequencer, timings: &Timings) -> Duration {
    let secs = sequencer.thinking_delay_secs(
        timings.think_base.as_secs_f64(),
        timings.think_jitter.as_secs_f64(),
    );
    Duration::from_secs_f64(secs.max(0.0))
}

/// Run a due action against the session
pub fn fire(ctx: &mut Context, session: &mut Session, action: Deferred) -> Result<(), ServerError> {
    let subject = session.subject_id;
    let Some(sequencer) = session.sequencer.as_mut() else {
        debug!(subject, ?action, "dropping deferred action without a game");
        return Ok(());
    };
    if !session.ready || sequencer.current_index() != Some(action.index()) {
        debug!(subject, ?action, current = ?sequencer.current_index(), "dropping stale deferred action");
        return Ok(());
    }

    match action {
        Deferred::RevealMatch { .. } => {
            let Some(view) = sequencer.snapshot() else {
                return Ok(());
            };
            let wait = ctx.settings.timings.match_start_wait.as_secs_f64();
            if let Some(conn) = session.game_conn {
                ctx.send_game(conn, &GameMessage::Environment(EnvironmentMessage::new(&view, wait)));
            }
            info!(subject, match_index = view.index, opponent = %view.name, "match revealed");
        }
        Deferred::BotMove { index } => {
            if !sequencer.is_active() {
                debug!(subject, match_index = index, "dropping bot move for finished match");
                return Ok(());
            }
            let (bot_move, subject_ready) = sequencer.submit_bot_move()?;
            if subject_ready {
                score_round(ctx, session, Closer::Bot, bot_move)?;
            } else {
                ctx.audit
                    .game(subject, Closer::Bot.audit_key(), &bot_move.is_cooperate().to_string());
                if let Some(conn) = session.game_conn {
                    ctx.send_game(conn, &GameMessage::bot_moved());
                }
            }
        }
        Deferred::EndMatch { index } => {
            if let Some(conn) = session.game_conn {
                ctx.send_game(conn, &GameMessage::end());
            }
            info!(subject, match_index = index, "match ended");
        }
    }
    Ok(())
}

/// Score a round whose last move came from `closer`, then queue what follows
pub fn score_round(
    ctx: &mut Context,
    session: &mut Session,
    closer: Closer,
    closing_move: Move,
) -> Result<(), ServerError> {
    let subject = session.subject_id;
    let sequencer = session.sequencer.as_mut().ok_or(LogicError::NoActiveMatch)?;
    let index = sequencer.current_index().ok_or(LogicError::NoActiveMatch)?;
    let result = sequencer.resolve_round()?;

    let message = RoundMessage::from(&result);
    ctx.audit
        .game(subject, closer.audit_key(), &closing_move.is_cooperate().to_string());
    for (key, value) in message.audit_fields() {
        ctx.audit.game(subject, key, &value);
    }
    if let Some(conn) = session.game_conn {
        ctx.send_game(conn, &GameMessage::Round(message));
    }

    let timings = ctx.settings.timings;
    if result.rounds_left > 0 {
        let delay = thinking_delay(sequencer, &timings);
        session
            .scheduler
            .schedule(ctx.now, delay, Deferred::BotMove { index });
    } else {
        session
            .scheduler
            .schedule(ctx.now, timings.end_delay, Deferred::EndMatch { index });
    }
    debug!(
        subject,
        match_index = index,
        rounds_left = result.rounds_left,
        score_subject = result.score_subject,
        score_bot = result.score_bot,
        "round scored"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use match_logic::{generate_scenario, ScenarioConfig};

    #[test]
    fn test_deferred_index() {
        assert_eq!(Deferred::RevealMatch { index: 3 }.index(), 3);
        assert_eq!(Deferred::BotMove { index: 0 }.index(), 0);
        assert_eq!(Deferred::EndMatch { index: 9 }.index(), 9);
    }

    #[test]
    fn test_thinking_delay_bounds() {
        let scenario = generate_scenario(&ScenarioConfig::default(), 11, "old", false);
        let mut sequencer = MatchSequencer::new(scenario, 11);
        let timings = Timings::default();
        for _ in 0..100 {
            let delay = thinking_delay(&mut sequencer, &timings);
            assert!(delay >= timings.think_base);
            assert!(delay < timings.think_base + timings.think_jitter);
        }
    }

    #[test]
    fn test_closer_audit_keys() {
        assert_eq!(Closer::Subject.audit_key(), "play_subject");
        assert_eq!(Closer::Bot.audit_key(), "play_bot");
    }
}
