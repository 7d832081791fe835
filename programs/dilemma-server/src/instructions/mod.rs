//! Message handlers
//!
//! `info` and `game` handle the two inbound envelope types, `bot` runs the
//! deferred actions fired by the scheduler.

pub mod bot;
pub mod game;
pub mod info;

use std::time::Instant;

use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::audit::AuditLog;
use crate::dispatcher::Settings;
use crate::protocol::{self, Channel, GameMessage, OutChannel};
use crate::state::{ConnId, Registry};

/// Everything a handler may touch besides the session itself
pub struct Context<'a> {
    /// Connection the message came from, `None` for deferred actions
    pub conn: Option<ConnId>,
    pub now: Instant,
    pub registry: &'a mut Registry,
    pub audit: &'a mut AuditLog,
    pub settings: &'a Settings,
}

impl Context<'_> {
    pub fn send_game(&self, conn: ConnId, message: &GameMessage) {
        self.send(conn, OutChannel::Game, message);
    }

    /// Game message back to the originating connection
    pub fn reply(&self, message: &GameMessage) {
        if let Some(conn) = self.conn {
            self.send_game(conn, message);
        }
    }

    /// Exit signal to every identified client and to the originating connection
    pub fn broadcast_exit(&self) {
        let mut targets: Vec<(ConnId, Channel)> = self.registry.identified().collect();
        if let Some(origin) = self.conn {
            if !targets.iter().any(|(id, _)| *id == origin) {
                targets.push((origin, Channel::Game));
            }
        }
        targets.sort_by_key(|(id, _)| *id);

        let message = GameMessage::exit();
        for (id, channel) in targets {
            self.send(id, channel.into(), &message);
        }
    }

    /// Handle the `type` key shared by both envelope types
    pub fn identify(&mut self, value: &Value) {
        let Some(conn) = self.conn else {
            return;
        };
        match serde_json::from_value::<Channel>(value.clone()) {
            Ok(kind) => {
                self.registry.identify(conn, kind);
                info!(conn, client = %self.registry.label(conn), "client identified");
            }
            Err(_) => warn!(conn, %value, "ignoring unknown client type"),
        }
    }

    fn send(&self, conn: ConnId, channel: OutChannel, message: &GameMessage) {
        match protocol::encode(channel, message) {
            Ok(frame) => self.deliver(conn, frame),
            Err(err) => error!(%err, conn, "failed to encode game message"),
        }
    }

    fn deliver(&self, conn: ConnId, frame: String) {
        if !self.registry.send(conn, frame) {
            debug!(conn, "dropping frame for closed connection");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;

    use tokio::sync::mpsc;

    use crate::state::Connection;

    fn open(registry: &mut Registry, id: ConnId) -> mpsc::UnboundedReceiver<String> {
        let (tx, rx) = mpsc::unbounded_channel();
        registry.insert(id, Connection::new(SocketAddr::from(([127, 0, 0, 1], 4000)), tx));
        rx
    }

    #[test]
    fn test_deferred_context_only_reaches_identified_clients() {
        let mut registry = Registry::default();
        let mut viewer = open(&mut registry, 1);
        let mut stranger = open(&mut registry, 2);
        registry.identify(1, Channel::Info);
        let mut audit = AuditLog::new(None, None);
        let settings = Settings::default();

        let mut ctx = Context {
            conn: None,
            now: Instant::now(),
            registry: &mut registry,
            audit: &mut audit,
            settings: &settings,
        };
        ctx.reply(&GameMessage::end());
        ctx.identify(&Value::from("game"));
        ctx.broadcast_exit();

        let frame: Value = serde_json::from_str(&viewer.try_recv().unwrap()).unwrap();
        assert_eq!(frame["type"], "info");
        assert!(viewer.try_recv().is_err());
        assert!(stranger.try_recv().is_err());
        assert_eq!(registry.identified().count(), 1);
    }

    #[test]
    fn test_reply_and_exit_include_origin() {
        let mut registry = Registry::default();
        let mut origin = open(&mut registry, 3);
        let mut audit = AuditLog::new(None, None);
        let settings = Settings::default();

        let ctx = Context {
            conn: Some(3),
            now: Instant::now(),
            registry: &mut registry,
            audit: &mut audit,
            settings: &settings,
        };
        ctx.reply(&GameMessage::connected());
        ctx.broadcast_exit();

        let first: Value = serde_json::from_str(&origin.try_recv().unwrap()).unwrap();
        let second: Value = serde_json::from_str(&origin.try_recv().unwrap()).unwrap();
        assert_eq!(first["type"], "game");
        assert_eq!(second["type"], "game");
        assert_ne!(first, second);
    }
}
