//! Session and connection state

use std::collections::HashMap;
use std::net::SocketAddr;

use chrono::{DateTime, Local};
use match_logic::MatchSequencer;
use tokio::sync::mpsc;

use crate::error::ServerError;
use crate::instructions::bot::Deferred;
use crate::protocol::Channel;
use crate::scheduler::Scheduler;

/// Identifier handed out by the transport for each accepted socket
pub type ConnId = u64;

/// One open socket
#[derive(Debug)]
pub struct Connection {
    /// Remote address of the peer
    pub addr: SocketAddr,
    /// Client kind announced with the `type` key
    pub kind: Option<Channel>,
    /// When the socket was accepted
    pub connected_at: DateTime<Local>,
    /// When the last message arrived
    pub last_seen: DateTime<Local>,
    /// Outbound frames, drained by the socket's writer task
    pub tx: mpsc::UnboundedSender<String>,
}

impl Connection {
    pub fn new(addr: SocketAddr, tx: mpsc::UnboundedSender<String>) -> Self {
        let now = Local::now();
        Self {
            addr,
            kind: None,
            connected_at: now,
            last_seen: now,
            tx,
        }
    }

    /// How long the socket has been open at `now`
    pub fn open_for(&self, now: DateTime<Local>) -> chrono::Duration {
        now.signed_duration_since(self.connected_at)
    }

    /// How long since the last message at `now`
    pub fn idle_for(&self, now: DateTime<Local>) -> chrono::Duration {
        now.signed_duration_since(self.last_seen)
    }

    /// Address plus client kind, for log lines
    pub fn label(&self) -> String {
        match self.kind {
            Some(kind) => format!("{} ({})", self.addr, kind.as_str()),
            None => self.addr.to_string(),
        }
    }
}

/// Every open socket, keyed by connection id
#[derive(Debug, Default)]
pub struct Registry {
    connections: HashMap<ConnId, Connection>,
}

impl Registry {
    pub fn insert(&mut self, id: ConnId, connection: Connection) {
        self.connections.entry(id).or_insert(connection);
    }

    pub fn remove(&mut self, id: ConnId) -> Option<Connection> {
        self.connections.remove(&id)
    }

    pub fn get(&self, id: ConnId) -> Option<&Connection> {
        self.connections.get(&id)
    }

    /// Record that a message just arrived
    pub fn touch(&mut self, id: ConnId) {
        if let Some(connection) = self.connections.get_mut(&id) {
            connection.last_seen = Local::now();
        }
    }

    pub fn identify(&mut self, id: ConnId, kind: Channel) {
        if let Some(connection) = self.connections.get_mut(&id) {
            connection.kind = Some(kind);
        }
    }

    pub fn label(&self, id: ConnId) -> String {
        self.connections
            .get(&id)
            .map_or_else(|| format!("#{id}"), Connection::label)
    }

    /// Queue a frame; returns false when the socket is gone
    pub fn send(&self, id: ConnId, frame: String) -> bool {
        self.connections
            .get(&id)
            .is_some_and(|connection| connection.tx.send(frame).is_ok())
    }

    /// Connections that announced a client kind
    pub fn identified(&self) -> impl Iterator<Item = (ConnId, Channel)> + '_ {
        self.connections
            .iter()
            .filter_map(|(id, connection)| connection.kind.map(|kind| (*id, kind)))
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

/// Subject profile, filled in by "info" messages
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Profile {
    pub name: Option<String>,
    pub avatar: Option<String>,
    pub is_female: Option<bool>,
}

impl Profile {
    /// Avatar and gender once every field is set
    pub fn complete(&self) -> Result<(&str, bool), ServerError> {
        if self.name.is_none() {
            return Err(ServerError::ProfileIncomplete("name"));
        }
        let avatar = self
            .avatar
            .as_deref()
            .ok_or(ServerError::ProfileIncomplete("avatar"))?;
        let is_female = self
            .is_female
            .ok_or(ServerError::ProfileIncomplete("gender"))?;
        Ok((avatar, is_female))
    }
}

/// The one subject this process is running
pub struct Session {
    /// Subject id, also the scenario seed
    pub subject_id: u64,
    pub profile: Profile,
    /// Set by the first valid "connect", cleared by "disconnect"
    pub ready: bool,
    /// Set after the last match or a "disconnect"
    pub game_over: bool,
    /// Last connection that sent a "game" message, target of deferred sends
    pub game_conn: Option<ConnId>,
    pub scheduler: Scheduler<Deferred>,
    /// Created with the scenario on the first valid "connect"
    pub sequencer: Option<MatchSequencer>,
}

impl Session {
    pub fn new(subject_id: u64) -> Self {
        Self {
            subject_id,
            profile: Profile::default(),
            ready: false,
            game_over: false,
            game_conn: None,
            scheduler: Scheduler::new(),
            sequencer: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr() -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], 4000))
    }

    #[test]
    fn test_profile_completion() {
        let mut profile = Profile::default();
        assert!(matches!(profile.complete(), Err(ServerError::ProfileIncomplete("name"))));

        profile.name = Some("Anna".into());
        profile.avatar = Some("king".into());
        assert!(matches!(profile.complete(), Err(ServerError::ProfileIncomplete("gender"))));

        profile.is_female = Some(false);
        assert_eq!(profile.complete().unwrap(), ("king", false));
    }

    #[test]
    fn test_registry_send_and_identify() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut registry = Registry::default();
        registry.insert(1, Connection::new(addr(), tx));

        assert_eq!(registry.identified().count(), 0);
        registry.identify(1, Channel::Game);
        assert_eq!(registry.identified().collect::<Vec<_>>(), vec![(1, Channel::Game)]);
        assert_eq!(registry.label(1), "127.0.0.1:4000 (game)");

        assert!(registry.send(1, "hello".into()));
        assert_eq!(rx.try_recv().unwrap(), "hello");
        assert!(!registry.send(2, "nobody".into()));

        assert!(registry.get(1).is_some_and(|c| c.kind == Some(Channel::Game)));
        registry.remove(1);
        assert!(registry.is_empty());
        assert!(!registry.send(1, "gone".into()));
    }

    #[test]
    fn test_connection_lifetime() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut connection = Connection::new(addr(), tx);
        let later = connection.connected_at + chrono::Duration::seconds(90);
        connection.last_seen = connection.connected_at + chrono::Duration::seconds(60);

        assert_eq!(connection.open_for(later).num_seconds(), 90);
        assert_eq!(connection.idle_for(later).num_seconds(), 30);
    }
}
