//! Dilemma Server - iterated Prisoner's Dilemma experiments over WebSocket
//!
//! One subject at a time plays a fixed sequence of matches against scripted
//! bots. The game rules live in `match_logic`; this crate wires them to the
//! wire protocol, paces the bot with deferred actions and writes the audit
//! trail researchers analyse afterwards.

pub mod audit;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod instructions;
pub mod preview;
pub mod protocol;
pub mod scheduler;
pub mod server;
pub mod state;

pub use config::{Command, Config, Timings};
pub use dispatcher::{Dispatcher, ServerEvent, Settings};
pub use error::ServerError;
