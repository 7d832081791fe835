//! Session dispatcher
//!
//! Owns every piece of mutable state: the connection registry, the subject
//! session and the audit log. Transport tasks feed it socket events and the
//! tic loop calls `tick`; nothing else touches the state.

use std::net::SocketAddr;
use std::time::Instant;

use chrono::Local;
use match_logic::ScenarioConfig;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::audit::AuditLog;
use crate::config::{Config, Timings};
use crate::error::ServerError;
use crate::instructions::{self, bot, Context};
use crate::protocol::{self, Channel};
use crate::state::{ConnId, Connection, Registry, Session};

/// Game parameters the handlers need
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Settings {
    pub timings: Timings,
    pub scenario: ScenarioConfig,
    pub first_match: usize,
}

impl From<&Config> for Settings {
    fn from(config: &Config) -> Self {
        Self {
            timings: config.timings(),
            scenario: config.scenario_config(),
            first_match: config.first_match,
        }
    }
}

/// Event forwarded by a transport task
#[derive(Debug)]
pub enum ServerEvent {
    Opened {
        conn: ConnId,
        addr: SocketAddr,
        tx: mpsc::UnboundedSender<String>,
    },
    Text {
        conn: ConnId,
        text: String,
    },
    Closed {
        conn: ConnId,
    },
}

pub struct Dispatcher {
    registry: Registry,
    session: Option<Session>,
    audit: AuditLog,
    settings: Settings,
}

impl Dispatcher {
    pub fn new(settings: Settings, audit: AuditLog) -> Self {
        Self {
            registry: Registry::default(),
            session: None,
            audit,
            settings,
        }
    }

    pub fn handle_event(&mut self, event: ServerEvent, now: Instant) {
        match event {
            ServerEvent::Opened { conn, addr, tx } => self.on_open(conn, addr, tx),
            ServerEvent::Text { conn, text } => self.handle_text(conn, &text, now),
            ServerEvent::Closed { conn } => self.on_close(conn),
        }
    }

    pub fn on_open(&mut self, conn: ConnId, addr: SocketAddr, tx: mpsc::UnboundedSender<String>) {
        self.registry.insert(conn, Connection::new(addr, tx));
        info!(conn, %addr, "incoming connection");
    }

    pub fn on_close(&mut self, conn: ConnId) {
        if let Some(session) = self.session.as_mut() {
            if session.game_conn == Some(conn) {
                session.game_conn = None;
            }
        }
        let Some(connection) = self.registry.remove(conn) else {
            debug!(conn, "close for unknown connection");
            return;
        };
        let now = Local::now();
        info!(
            conn,
            client = %connection.label(),
            open_secs = connection.open_for(now).num_seconds(),
            idle_secs = connection.idle_for(now).num_seconds(),
            "connection closed"
        );
    }

    /// Process one inbound text frame
    pub fn handle_text(&mut self, conn: ConnId, text: &str, now: Instant) {
        self.registry.touch(conn);
        let result = protocol::parse_envelope(text).and_then(|inbound| {
            let mut ctx = Context {
                conn: Some(conn),
                now,
                registry: &mut self.registry,
                audit: &mut self.audit,
                settings: &self.settings,
            };
            match inbound.channel {
                Channel::Info => instructions::info::handle(&mut ctx, &mut self.session, &inbound.data),
                Channel::Game => instructions::game::handle(&mut ctx, &mut self.session, &inbound.data),
            }
        });
        if let Err(err) = result {
            self.report(conn, &err);
        }
    }

    /// Fire every deferred action that is due
    pub fn tick(&mut self, now: Instant) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let due = session.scheduler.pop_due(now);
        for action in due {
            let mut ctx = Context {
                conn: None,
                now,
                registry: &mut self.registry,
                audit: &mut self.audit,
                settings: &self.settings,
            };
            if let Err(err) = bot::fire(&mut ctx, session, action) {
                error!(subject = session.subject_id, ?action, %err, "deferred action failed");
            }
        }
    }

    fn report(&self, conn: ConnId, err: &ServerError) {
        let subject = self.session.as_ref().map(|session| session.subject_id);
        if err.is_severe() {
            error!(conn, ?subject, %err, "message rejected");
        } else {
            warn!(conn, ?subject, %err, "message rejected");
        }
        if let Some(message) = err.client_message() {
            match protocol::encode_error(&message) {
                Ok(frame) => {
                    self.registry.send(conn, frame);
                }
                Err(encode_err) => error!(conn, %encode_err, "failed to encode error message"),
            }
        }
    }

    /// Earliest pending deferred action
    pub fn next_due(&self) -> Option<Instant> {
        self.session
            .as_ref()
            .and_then(|session| session.scheduler.next_due())
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}
