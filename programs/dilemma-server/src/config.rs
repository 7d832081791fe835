//! Command line configuration

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use chrono::Local;
use clap::{Parser, Subcommand};
use match_logic::{ScenarioConfig, OPPONENTS};

use crate::error::ServerError;

/// Upper bound for every `*_ms` timing flag (one hour)
pub const MAX_DELAY_MS: u64 = 60 * 60 * 1000;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "dilemma-server",
    version,
    about = "Runs iterated Prisoner's Dilemma experiments against scripted bots"
)]
pub struct Config {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Address to listen on
    #[arg(long, default_value = "0.0.0.0")]
    pub ip: IpAddr,

    #[arg(long, default_value_t = 42069)]
    pub port: u16,

    /// Default tracing filter, overridden by RUST_LOG
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Existing directory the audit logs are written to
    #[arg(long, default_value = "experiments")]
    pub log_folder: PathBuf,

    /// Info log file name, empty to disable [default: <date>_info.csv]
    #[arg(long)]
    pub log_info: Option<String>,

    /// Game log file name, empty to disable [default: <date>_game.csv]
    #[arg(long)]
    pub log_game: Option<String>,

    /// Scheduler poll interval
    #[arg(long, default_value_t = 10)]
    pub poll_ms: u64,

    /// Pause between revealing a match and the bot's first move
    #[arg(long, default_value_t = 2500)]
    pub match_start_wait_ms: u64,

    /// Minimum bot thinking time
    #[arg(long, default_value_t = 1500)]
    pub think_base_ms: u64,

    /// Random extra thinking time, drawn uniformly below this
    #[arg(long, default_value_t = 4000)]
    pub think_jitter_ms: u64,

    /// Delay between the last round and the end-of-match signal
    #[arg(long, default_value_t = 2000)]
    pub end_delay_ms: u64,

    /// Rounds per match
    #[arg(long, default_value_t = 5)]
    pub rounds: u32,

    /// Match copied for the rematch
    #[arg(long, default_value_t = 2)]
    pub duplicate_from: usize,

    /// The rematch copy is inserted right after this match
    #[arg(long, default_value_t = 4)]
    pub duplicate_to: usize,

    /// Index the first search lands on
    #[arg(long, default_value_t = 0)]
    pub first_match: usize,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Print the scenario a subject would get and exit
    Scenario {
        /// Subject id used as seed
        #[arg(long)]
        seed: u64,
        #[arg(long)]
        avatar: String,
        #[arg(long)]
        female: bool,
    },
}

/// Delays driving the bot's pacing
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Timings {
    pub poll: Duration,
    pub match_start_wait: Duration,
    pub think_base: Duration,
    pub think_jitter: Duration,
    pub end_delay: Duration,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            poll: Duration::from_millis(10),
            match_start_wait: Duration::from_millis(2500),
            think_base: Duration::from_millis(1500),
            think_jitter: Duration::from_millis(4000),
            end_delay: Duration::from_millis(2000),
        }
    }
}

impl Config {
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.ip, self.port)
    }

    pub fn timings(&self) -> Timings {
        Timings {
            poll: Duration::from_millis(self.poll_ms),
            match_start_wait: Duration::from_millis(self.match_start_wait_ms),
            think_base: Duration::from_millis(self.think_base_ms),
            think_jitter: Duration::from_millis(self.think_jitter_ms),
            end_delay: Duration::from_millis(self.end_delay_ms),
        }
    }

    pub fn scenario_config(&self) -> ScenarioConfig {
        ScenarioConfig {
            duplicate_from: self.duplicate_from,
            duplicate_to: self.duplicate_to,
            rounds_per_match: self.rounds,
        }
    }

    pub fn info_log_path(&self) -> Option<PathBuf> {
        self.log_path(self.log_info.as_deref(), "info")
    }

    pub fn game_log_path(&self) -> Option<PathBuf> {
        self.log_path(self.log_game.as_deref(), "game")
    }

    fn log_path(&self, name: Option<&str>, kind: &str) -> Option<PathBuf> {
        let name = match name {
            Some("") => return None,
            Some(name) => name.to_string(),
            None => format!("{}_{kind}.csv", Local::now().format("%Y-%m-%d")),
        };
        Some(self.log_folder.join(name))
    }

    pub fn validate(&self) -> Result<(), ServerError> {
        let logging = self.info_log_path().is_some() || self.game_log_path().is_some();
        if logging && !self.log_folder.is_dir() {
            return Err(ServerError::Config(format!(
                "log folder {} does not exist",
                self.log_folder.display()
            )));
        }
        if self.poll_ms == 0 {
            return Err(ServerError::Config("poll_ms must be positive".into()));
        }
        for (name, value) in [
            ("poll_ms", self.poll_ms),
            ("match_start_wait_ms", self.match_start_wait_ms),
            ("think_base_ms", self.think_base_ms),
            ("think_jitter_ms", self.think_jitter_ms),
            ("end_delay_ms", self.end_delay_ms),
        ] {
            if value > MAX_DELAY_MS {
                return Err(ServerError::Config(format!(
                    "{name} must be at most {MAX_DELAY_MS}, got {value}"
                )));
            }
        }
        if self.rounds == 0 {
            return Err(ServerError::Config("rounds must be positive".into()));
        }
        for (name, index) in [
            ("duplicate_from", self.duplicate_from),
            ("duplicate_to", self.duplicate_to),
        ] {
            if index >= OPPONENTS.len() {
                return Err(ServerError::Config(format!(
                    "{name} must be below {}, got {index}",
                    OPPONENTS.len()
                )));
            }
        }
        // One more than the base list once the rematch is inserted
        if self.first_match > OPPONENTS.len() {
            return Err(ServerError::Config(format!(
                "first_match must be at most {}, got {}",
                OPPONENTS.len(),
                self.first_match
            )));
        }
        Ok(())
    }
}
