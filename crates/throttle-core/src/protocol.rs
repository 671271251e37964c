use chrono::Utc;
use serde::de;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub const DEFAULT_MAX_FRAME_BYTES: usize = 64 * 1024;
pub const MOVE_PATH: &str = "/move";
pub const READY_STATUS: &str = "ready";

/// Value of the envelope `type` field. Tags this client does not know are kept
/// verbatim in `Other` so the session can ignore them without failing decode.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MessageType {
    Ping,
    Pong,
    Init,
    Move,
    Stop,
    Ack,
    ChangePoint,
    Other(String),
}

impl MessageType {
    pub fn as_str(&self) -> &str {
        match self {
            MessageType::Ping => "ping",
            MessageType::Pong => "pong",
            MessageType::Init => "init",
            MessageType::Move => "move",
            MessageType::Stop => "stop",
            MessageType::Ack => "ack",
            MessageType::ChangePoint => "change-point",
            MessageType::Other(tag) => tag,
        }
    }
}

impl From<&str> for MessageType {
    fn from(tag: &str) -> Self {
        match tag {
            "ping" => MessageType::Ping,
            "pong" => MessageType::Pong,
            "init" => MessageType::Init,
            "move" => MessageType::Move,
            "stop" => MessageType::Stop,
            "ack" => MessageType::Ack,
            "change-point" => MessageType::ChangePoint,
            other => MessageType::Other(other.to_string()),
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for MessageType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for MessageType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let tag = String::deserialize(deserializer)?;
        Ok(MessageType::from(tag.as_str()))
    }
}

/// Outbound message kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandType {
    Ping,
    Init,
    Move,
    Stop,
    ChangePoint,
}

impl From<CommandType> for MessageType {
    fn from(kind: CommandType) -> Self {
        match kind {
            CommandType::Ping => MessageType::Ping,
            CommandType::Init => MessageType::Init,
            CommandType::Move => MessageType::Move,
            CommandType::Stop => MessageType::Stop,
            CommandType::ChangePoint => MessageType::ChangePoint,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Left,
    Right,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Left => "left",
            Direction::Right => "right",
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            Direction::Left => Direction::Right,
            Direction::Right => Direction::Left,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.trim().to_lowercase().as_str() {
            "left" => Ok(Direction::Left),
            "right" => Ok(Direction::Right),
            other => Err(format!("Unknown direction: {other}")),
        }
    }
}

/// Setting of the track point driven by `change-point`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Route {
    #[default]
    Through,
    Diverging,
}

impl Route {
    pub fn as_str(self) -> &'static str {
        match self {
            Route::Through => "through",
            Route::Diverging => "diverging",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Route::Through => Route::Diverging,
            Route::Diverging => Route::Through,
        }
    }

    pub fn command_text(self) -> &'static str {
        match self {
            Route::Through => "point-through",
            Route::Diverging => "point-diverging",
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Route {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let normalized = input.trim().to_lowercase();
        match normalized.trim_start_matches("point-") {
            "through" => Ok(Route::Through),
            "diverging" | "diverge" => Ok(Route::Diverging),
            _ => Err(format!("Unknown route: {normalized}")),
        }
    }
}

/// A command ready to be framed, with its text already fixed by the variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Ping,
    Init,
    Move(Direction),
    Stop,
    ChangePoint(Route),
}

impl Command {
    pub fn command_type(&self) -> CommandType {
        match self {
            Command::Ping => CommandType::Ping,
            Command::Init => CommandType::Init,
            Command::Move(_) => CommandType::Move,
            Command::Stop => CommandType::Stop,
            Command::ChangePoint(_) => CommandType::ChangePoint,
        }
    }

    pub fn text(&self) -> &'static str {
        match self {
            Command::Move(direction) => direction.as_str(),
            Command::ChangePoint(route) => route.command_text(),
            Command::Ping | Command::Init | Command::Stop => "",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = MessageType::from(self.command_type());
        if self.text().is_empty() {
            f.write_str(kind.as_str())
        } else {
            write!(f, "{kind}:{}", self.text())
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: MessageType,
    #[serde(default)]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "deserialize_date")]
    pub date: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub velocity: Option<f64>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_route"
    )]
    pub route: Option<Route>,
    #[serde(default, flatten)]
    pub extra: HashMap<String, Value>,
}

impl Envelope {
    pub fn new(kind: impl Into<MessageType>, text: impl Into<String>, date: i64) -> Self {
        Self {
            kind: kind.into(),
            text: text.into(),
            id: None,
            date,
            maximum: None,
            velocity: None,
            route: None,
            extra: HashMap::new(),
        }
    }
}

/// An inbound envelope classified by what the session should do with it.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    Pong,
    Init {
        text: String,
        maximum: Option<f64>,
    },
    Ack {
        text: String,
        velocity: Option<f64>,
        route: Option<Route>,
    },
    Unrecognized(MessageType),
}

impl From<Envelope> for Response {
    fn from(envelope: Envelope) -> Self {
        match envelope.kind {
            MessageType::Pong => Response::Pong,
            MessageType::Init => Response::Init {
                text: envelope.text,
                maximum: envelope.maximum,
            },
            MessageType::Ack => Response::Ack {
                text: envelope.text,
                velocity: envelope.velocity,
                route: envelope.route,
            },
            other => Response::Unrecognized(other),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("frame exceeds max size: {size} > {max}")]
    OversizedFrame { size: usize, max: usize },
    #[error("frame is not valid json: {0}")]
    Syntax(String),
    #[error("frame is not a json object")]
    NotAnObject,
    #[error("frame has no type field")]
    MissingType,
    #[error("frame fields are malformed: {0}")]
    Malformed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    #[error("frame exceeds max size: {size} > {max}")]
    OversizedFrame { size: usize, max: usize },
    #[error("frame encode failed: {0}")]
    Encode(String),
}

pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Frames an outbound record stamped with the current time.
pub fn encode(kind: CommandType, text: &str) -> Result<String, EncodeError> {
    encode_at(kind, text, now_millis())
}

pub fn encode_at(kind: CommandType, text: &str, date: i64) -> Result<String, EncodeError> {
    encode_envelope(&Envelope::new(kind, text, date))
}

pub fn encode_command(command: Command) -> Result<String, EncodeError> {
    encode(command.command_type(), command.text())
}

pub fn encode_envelope(envelope: &Envelope) -> Result<String, EncodeError> {
    encode_envelope_with_limit(envelope, DEFAULT_MAX_FRAME_BYTES)
}

pub fn encode_envelope_with_limit(
    envelope: &Envelope,
    max_frame_bytes: usize,
) -> Result<String, EncodeError> {
    let encoded =
        serde_json::to_string(envelope).map_err(|err| EncodeError::Encode(err.to_string()))?;
    if encoded.len() > max_frame_bytes {
        return Err(EncodeError::OversizedFrame {
            size: encoded.len(),
            max: max_frame_bytes,
        });
    }
    Ok(encoded)
}

pub fn decode(frame: &str) -> Result<Envelope, DecodeError> {
    decode_with_limit(frame, DEFAULT_MAX_FRAME_BYTES)
}

pub fn decode_with_limit(frame: &str, max_frame_bytes: usize) -> Result<Envelope, DecodeError> {
    let raw = frame.trim_end_matches(&['\n', '\r'][..]);
    if raw.len() > max_frame_bytes {
        return Err(DecodeError::OversizedFrame {
            size: raw.len(),
            max: max_frame_bytes,
        });
    }
    let value: Value =
        serde_json::from_str(raw).map_err(|err| DecodeError::Syntax(err.to_string()))?;
    let object = value.as_object().ok_or(DecodeError::NotAnObject)?;
    if !object.contains_key("type") {
        return Err(DecodeError::MissingType);
    }
    serde_json::from_value(value).map_err(|err| DecodeError::Malformed(err.to_string()))
}

/// Accepts epoch milliseconds as an integer, or a float (truncated); null reads as 0.
fn deserialize_date<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let val = Value::deserialize(deserializer)?;
    match val {
        Value::Null => Ok(0),
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .ok_or_else(|| de::Error::custom("date out of range")),
        _ => Err(de::Error::custom("expected number for date")),
    }
}

fn deserialize_route<'de, D>(deserializer: D) -> Result<Option<Route>, D::Error>
where
    D: Deserializer<'de>,
{
    let val = Option::<Value>::deserialize(deserializer)?;
    Ok(val
        .as_ref()
        .and_then(Value::as_str)
        .and_then(|s| s.parse::<Route>().ok()))
}
