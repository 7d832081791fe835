//! "game" messages: connect, search, play and disconnect

use std::time::Duration;

use match_logic::{generate_scenario, LogicError, MatchSequencer, Move, SearchOutcome};
use serde_json::{Map, Value};
use tracing::{info, warn};

use super::bot::{self, Closer, Deferred};
use super::Context;
use crate::error::ServerError;
use crate::protocol::{parse_keys, truthy, EnvironmentMessage, GameKey, GameMessage};
use crate::state::Session;

pub fn handle(
    ctx: &mut Context,
    slot: &mut Option<Session>,
    data: &Map<String, Value>,
) -> Result<(), ServerError> {
    let session = slot.as_mut().ok_or(ServerError::ProtocolGate)?;
    let keys = parse_keys(data, GameKey::parse)?;
    if ctx.conn.is_some() {
        session.game_conn = ctx.conn;
    }

    if keys.iter().any(|(key, _)| *key == GameKey::Connect) {
        connect(ctx, session)?;
    }
    if !session.ready {
        warn!(subject = session.subject_id, conn = ?ctx.conn, "ignoring game message before connect");
        return Ok(());
    }

    for (key, value) in keys {
        match key {
            GameKey::Connect => {}
            GameKey::ClientType => ctx.identify(value),
            GameKey::Search => search(ctx, session)?,
            GameKey::Play => play(ctx, session, Move::from(truthy(value)))?,
            GameKey::Disconnect => disconnect(ctx, session, value),
        }
    }
    Ok(())
}

/// Start the game on first connect, resend the current state afterwards
fn connect(ctx: &mut Context, session: &mut Session) -> Result<(), ServerError> {
    let subject = session.subject_id;
    let (avatar, is_female) = session.profile.complete()?;

    if session.ready {
        ctx.audit.game(subject, "reconnected", "");
        resend_state(ctx, session);
        info!(subject, conn = ?ctx.conn, "subject reconnected");
        return Ok(());
    }
    if session.game_over {
        return Err(ServerError::DuplicateMatchStart);
    }

    let scenario = generate_scenario(&ctx.settings.scenario, subject, avatar, is_female);
    session.sequencer =
        Some(MatchSequencer::new(scenario, subject).with_first_match(ctx.settings.first_match));
    session.ready = true;
    session.game_over = false;

    ctx.audit.game(subject, "connected", "");
    ctx.reply(&GameMessage::connected());
    info!(subject, conn = ?ctx.conn, "subject started playing");
    Ok(())
}

fn resend_state(ctx: &Context, session: &Session) {
    let Some(sequencer) = session.sequencer.as_ref() else {
        ctx.reply(&GameMessage::connected());
        return;
    };
    if sequencer.is_complete() {
        ctx.reply(&GameMessage::exit());
        return;
    }
    match sequencer.snapshot() {
        Some(view) => {
            let wait = ctx.settings.timings.match_start_wait.as_secs_f64();
            let message = EnvironmentMessage::new(&view, wait);
            ctx.reply(&GameMessage::Environment(message));
        }
        None => ctx.reply(&GameMessage::connected()),
    }
}

fn search(ctx: &mut Context, session: &mut Session) -> Result<(), ServerError> {
    let subject = session.subject_id;
    let sequencer = session.sequencer.as_mut().ok_or(LogicError::NoActiveMatch)?;

    let index = match sequencer.search() {
        SearchOutcome::Match(index) => index,
        SearchOutcome::Complete => {
            session.game_over = true;
            let total = sequencer.score_subject_total();
            ctx.audit.game(subject, "score_subject_all", &total.to_string());
            ctx.broadcast_exit();
            info!(subject, score = total, "subject finished playing");
            return Ok(());
        }
    };

    let view = sequencer.snapshot().ok_or(LogicError::NoActiveMatch)?;
    let timings = ctx.settings.timings;
    let environment = EnvironmentMessage::new(&view, timings.match_start_wait.as_secs_f64());
    ctx.audit.game(subject, "search", &index.to_string());
    for (key, value) in environment.audit_fields() {
        ctx.audit.game(subject, key, &value);
    }
    ctx.audit.game(subject, "strategy", view.strategy.id());

    let loading = Duration::from_secs_f64(view.loading_secs.max(0.0));
    let thinking = bot::thinking_delay(sequencer, &timings);
    session
        .scheduler
        .schedule(ctx.now, loading, Deferred::RevealMatch { index });
    session.scheduler.schedule(
        ctx.now,
        loading + timings.match_start_wait + thinking,
        Deferred::BotMove { index },
    );
    info!(subject, match_index = index, strategy = %view.strategy, "match found");
    Ok(())
}

fn play(ctx: &mut Context, session: &mut Session, subject_move: Move) -> Result<(), ServerError> {
    let subject = session.subject_id;
    let sequencer = session.sequencer.as_mut().ok_or(LogicError::NoActiveMatch)?;

    if !sequencer.is_active() {
        // Stray move after the match ended or before the first search
        ctx.reply(&GameMessage::end());
        return Ok(());
    }
    if sequencer.submit_subject_move(subject_move)? {
        bot::score_round(ctx, session, Closer::Subject, subject_move)
    } else {
        ctx.audit
            .game(subject, "play_subject", &subject_move.is_cooperate().to_string());
        Ok(())
    }
}

fn disconnect(ctx: &mut Context, session: &mut Session, value: &Value) {
    session.ready = false;
    session.game_over = true;
    ctx.audit.game(session.subject_id, "disconnect", &truthy(value).to_string());
    info!(subject = session.subject_id, conn = ?ctx.conn, "subject disconnected");
}
