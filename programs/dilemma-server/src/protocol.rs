//! Wire protocol
//!
//! Every frame in both directions is `{"type": ..., "data": {...}}`. Inbound
//! `data` objects are walked key by key in the order the client wrote them.

use match_logic::{Color, MatchView, RoundResult, Stage};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ServerError;

/// Envelope type of an inbound message
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Info,
    Game,
}

impl Channel {
    pub fn as_str(self) -> &'static str {
        match self {
            Channel::Info => "info",
            Channel::Game => "game",
        }
    }
}

/// Envelope type of an outbound message
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutChannel {
    Info,
    Game,
    Error,
}

impl From<Channel> for OutChannel {
    fn from(channel: Channel) -> Self {
        match channel {
            Channel::Info => OutChannel::Info,
            Channel::Game => OutChannel::Game,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawEnvelope {
    #[serde(rename = "type")]
    channel: Channel,
    data: Map<String, Value>,
}

/// A validated inbound message
#[derive(Clone, Debug, PartialEq)]
pub struct Inbound {
    pub channel: Channel,
    pub data: Map<String, Value>,
}

/// Parse a text frame, rejecting anything that is not a well-formed envelope
pub fn parse_envelope(text: &str) -> Result<Inbound, ServerError> {
    let raw: RawEnvelope =
        serde_json::from_str(text).map_err(|e| ServerError::MalformedEnvelope(e.to_string()))?;
    Ok(Inbound {
        channel: raw.channel,
        data: raw.data,
    })
}

/// Keys understood in an "info" message
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InfoKey {
    Sid,
    Terminate,
    ClientType,
    Name,
    Avatar,
    Gender,
    Form(String),
}

impl InfoKey {
    pub fn parse(key: &str) -> Result<Self, ServerError> {
        match key {
            "sid" => Ok(InfoKey::Sid),
            "terminate" => Ok(InfoKey::Terminate),
            "type" => Ok(InfoKey::ClientType),
            "name" | "nick" => Ok(InfoKey::Name),
            "avatar" => Ok(InfoKey::Avatar),
            "gender" => Ok(InfoKey::Gender),
            form if form.starts_with("form_") => Ok(InfoKey::Form(form.to_string())),
            other => Err(ServerError::UnknownKey {
                kind: "info",
                key: other.to_string(),
            }),
        }
    }
}

/// Keys understood in a "game" message
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GameKey {
    Connect,
    Search,
    Play,
    Disconnect,
    ClientType,
}

impl GameKey {
    pub fn parse(key: &str) -> Result<Self, ServerError> {
        match key {
            "connect" => Ok(GameKey::Connect),
            "search" => Ok(GameKey::Search),
            "play" => Ok(GameKey::Play),
            "disconnect" => Ok(GameKey::Disconnect),
            "type" => Ok(GameKey::ClientType),
            other => Err(ServerError::UnknownKey {
                kind: "game",
                key: other.to_string(),
            }),
        }
    }
}

/// Parse every key up front so an unknown one drops the whole message
pub fn parse_keys<K>(
    data: &Map<String, Value>,
    parse: impl Fn(&str) -> Result<K, ServerError>,
) -> Result<Vec<(K, &Value)>, ServerError> {
    data.iter()
        .map(|(key, value)| Ok((parse(key)?, value)))
        .collect()
}

/// Loose truthiness for flags sent by different clients
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !matches!(s.trim().to_ascii_lowercase().as_str(), "" | "0" | "false"),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

/// Subject ids arrive as numbers or numeric strings and must be positive
pub fn parse_subject_id(value: &Value) -> Result<u64, ServerError> {
    let parsed = match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    };
    match parsed {
        Some(sid) if sid > 0 => Ok(sid),
        _ => Err(ServerError::InvalidSubjectId(value.to_string())),
    }
}

/// Plain text form of a value, strings without their JSON quotes
pub fn plain_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Match environment sent when a match starts or on reconnect
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentMessage {
    pub name: String,
    pub avatar: String,
    pub gender: bool,
    pub stage: Stage,
    pub loading_delay: f64,
    pub wait: f64,
    pub color: Color,
    pub match_index: usize,
    pub score_subject: u32,
    pub score_bot: u32,
}

impl EnvironmentMessage {
    pub fn new(view: &MatchView, wait_secs: f64) -> Self {
        Self {
            name: view.name.clone(),
            avatar: view.avatar.clone(),
            gender: view.is_female,
            stage: view.stage,
            loading_delay: view.loading_secs,
            wait: wait_secs,
            color: view.color,
            match_index: view.index,
            score_subject: view.score_subject,
            score_bot: view.score_bot,
        }
    }

    pub fn audit_fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("name", self.name.clone()),
            ("avatar", self.avatar.clone()),
            ("gender", self.gender.to_string()),
            ("stage", self.stage.to_string()),
            ("loading", self.loading_delay.to_string()),
            ("wait", self.wait.to_string()),
            ("color", self.color.as_str().to_string()),
            ("score_subject", self.score_subject.to_string()),
            ("score_bot", self.score_bot.to_string()),
        ]
    }
}

/// Outcome of one scored round
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundMessage {
    pub rounds_left: u32,
    pub gain_bot: u32,
    pub gain_subject: u32,
    pub score_bot: u32,
    pub score_subject: u32,
    pub move_bot: bool,
    pub move_subject: bool,
}

impl From<&RoundResult> for RoundMessage {
    fn from(result: &RoundResult) -> Self {
        Self {
            rounds_left: result.rounds_left,
            gain_bot: result.gain_bot,
            gain_subject: result.gain_subject,
            score_bot: result.score_bot,
            score_subject: result.score_subject,
            move_bot: result.move_bot.is_cooperate(),
            move_subject: result.move_subject.is_cooperate(),
        }
    }
}

impl RoundMessage {
    /// Score fields; moves are audited by whoever submitted them
    pub fn audit_fields(&self) -> Vec<(&'static str, String)> {
        vec![
            ("rounds_left", self.rounds_left.to_string()),
            ("gain_bot", self.gain_bot.to_string()),
            ("gain_subject", self.gain_subject.to_string()),
            ("score_bot", self.score_bot.to_string()),
            ("score_subject", self.score_subject.to_string()),
        ]
    }
}

/// Payload of a server → client "game" envelope
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum GameMessage {
    Environment(EnvironmentMessage),
    Round(RoundMessage),
    Connected {
        connected: bool,
    },
    /// Bot has committed its move and waits for the subject
    BotMoved {
        #[serde(rename = "move")]
        moved: bool,
    },
    End {
        end: bool,
    },
    /// Whole experiment is over
    Exit {
        search: i64,
        exit: bool,
    },
}

impl GameMessage {
    pub fn connected() -> Self {
        GameMessage::Connected { connected: true }
    }

    pub fn bot_moved() -> Self {
        GameMessage::BotMoved { moved: true }
    }

    pub fn end() -> Self {
        GameMessage::End { end: true }
    }

    pub fn exit() -> Self {
        GameMessage::Exit {
            search: -1,
            exit: true,
        }
    }
}

#[derive(Serialize)]
struct OutboundEnvelope<'a, T: Serialize> {
    #[serde(rename = "type")]
    channel: OutChannel,
    data: &'a T,
}

#[derive(Serialize)]
struct ErrorData<'a> {
    message: &'a str,
}

/// Serialize an outbound envelope
pub fn encode<T: Serialize>(channel: OutChannel, data: &T) -> Result<String, serde_json::Error> {
    serde_json::to_string(&OutboundEnvelope { channel, data })
}

/// Serialize an `error` envelope
pub fn encode_error(message: &str) -> Result<String, serde_json::Error> {
    encode(OutChannel::Error, &ErrorData { message })
}
