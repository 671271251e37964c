use crate::protocol::{decode, encode_command, Command, Envelope};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Connecting,
    Open,
    Closed,
    Errored,
}

impl ConnectionState {
    pub fn as_str(self) -> &'static str {
        match self {
            ConnectionState::Connecting => "connecting",
            ConnectionState::Open => "open",
            ConnectionState::Closed => "closed",
            ConnectionState::Errored => "errored",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, ConnectionState::Closed | ConnectionState::Errored)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Messages sent as soon as the socket opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Handshake {
    PingOnly,
    #[default]
    PingInit,
}

impl Handshake {
    pub fn commands(self) -> &'static [Command] {
        match self {
            Handshake::PingOnly => &[Command::Ping],
            Handshake::PingInit => &[Command::Ping, Command::Init],
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Handshake::PingOnly => "ping",
            Handshake::PingInit => "ping-init",
        }
    }
}

impl FromStr for Handshake {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.trim().to_lowercase().as_str() {
            "ping" | "ping-only" => Ok(Handshake::PingOnly),
            "ping-init" | "ping+init" | "full" => Ok(Handshake::PingInit),
            other => Err(format!("Unknown handshake: {other}")),
        }
    }
}

/// What the socket task reports back to the session loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Opened,
    Frame(String),
    Errored(String),
    Closed,
}

/// Lifecycle of the single duplex connection. Owns no socket: it decides what
/// may be written and which inbound frames reach the session.
#[derive(Debug, Default)]
pub struct Connection {
    state: ConnectionState,
    handshake: Handshake,
    last_error: Option<String>,
    dropped_commands: u64,
    dropped_frames: u64,
}

impl Connection {
    pub fn new(handshake: Handshake) -> Self {
        Self {
            handshake,
            ..Self::default()
        }
    }

    /// Moves to Open and returns the handshake frames to write.
    pub fn on_open(&mut self) -> Vec<String> {
        if self.state != ConnectionState::Connecting {
            warn!(event = "unexpected_open", state = %self.state);
            return Vec::new();
        }
        self.state = ConnectionState::Open;
        info!(event = "connection_open", handshake = self.handshake.as_str());
        self.handshake
            .commands()
            .iter()
            .filter_map(|command| self.send(*command))
            .collect()
    }

    pub fn on_error(&mut self, detail: &str) {
        if self.state.is_terminal() {
            debug!(event = "late_transport_error", state = %self.state, error = detail);
            return;
        }
        warn!(event = "transport_error", state = %self.state, error = detail);
        self.state = ConnectionState::Errored;
        self.last_error = Some(detail.to_string());
    }

    pub fn on_close(&mut self) {
        if self.state.is_terminal() {
            return;
        }
        info!(event = "connection_closed", state = %self.state);
        self.state = ConnectionState::Closed;
    }

    /// Decodes an inbound frame. Malformed frames and frames outside the Open
    /// state are logged and dropped.
    pub fn on_frame(&mut self, frame: &str) -> Option<Envelope> {
        if self.state != ConnectionState::Open {
            self.dropped_frames += 1;
            debug!(event = "frame_dropped", state = %self.state);
            return None;
        }
        match decode(frame) {
            Ok(envelope) => Some(envelope),
            Err(err) => {
                self.dropped_frames += 1;
                warn!(event = "decode_error", error = %err);
                None
            }
        }
    }

    /// Frames a command when Open; otherwise drops it.
    pub fn send(&mut self, command: Command) -> Option<String> {
        if self.state != ConnectionState::Open {
            self.dropped_commands += 1;
            warn!(event = "command_dropped", command = %command, state = %self.state);
            return None;
        }
        match encode_command(command) {
            Ok(frame) => {
                debug!(event = "command_sent", command = %command);
                Some(frame)
            }
            Err(err) => {
                self.dropped_commands += 1;
                warn!(event = "encode_error", command = %command, error = %err);
                None
            }
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn handshake(&self) -> Handshake {
        self.handshake
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn dropped_commands(&self) -> u64 {
        self.dropped_commands
    }

    pub fn dropped_frames(&self) -> u64 {
        self.dropped_frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{Direction, MessageType};

    fn kinds(frames: &[String]) -> Vec<MessageType> {
        frames
            .iter()
            .map(|frame| decode(frame).expect("decode").kind)
            .collect()
    }

    #[test]
    fn open_sends_handshake_per_mode() {
        let mut full = Connection::new(Handshake::PingInit);
        assert_eq!(
            kinds(&full.on_open()),
            vec![MessageType::Ping, MessageType::Init]
        );
        assert_eq!(full.state(), ConnectionState::Open);

        let mut legacy = Connection::new(Handshake::PingOnly);
        assert_eq!(kinds(&legacy.on_open()), vec![MessageType::Ping]);
    }

    #[test]
    fn commands_are_dropped_unless_open() {
        let mut connection = Connection::new(Handshake::PingInit);
        assert_eq!(connection.send(Command::Move(Direction::Left)), None);
        connection.on_open();
        assert!(connection.send(Command::Move(Direction::Left)).is_some());
        connection.on_close();
        assert_eq!(connection.send(Command::Stop), None);
        assert_eq!(connection.dropped_commands(), 2);
    }

    #[test]
    fn error_is_terminal() {
        let mut connection = Connection::new(Handshake::PingInit);
        connection.on_error("connection refused");
        assert_eq!(connection.state(), ConnectionState::Errored);
        assert_eq!(connection.last_error(), Some("connection refused"));

        assert!(connection.on_open().is_empty());
        connection.on_close();
        assert_eq!(connection.state(), ConnectionState::Errored);
    }

    #[test]
    fn malformed_frames_are_dropped_and_counted() {
        let mut connection = Connection::new(Handshake::PingInit);
        assert!(connection.on_frame(r#"{"type":"pong"}"#).is_none());
        connection.on_open();
        assert!(connection.on_frame("{broken").is_none());
        assert!(connection.on_frame(r#"{"text":"no type"}"#).is_none());
        let pong = connection.on_frame(r#"{"type":"pong"}"#).expect("pong");
        assert_eq!(pong.kind, MessageType::Pong);
        assert_eq!(connection.dropped_frames(), 3);
    }

    #[test]
    fn handshake_parses_from_flag_values() {
        assert_eq!("ping".parse::<Handshake>(), Ok(Handshake::PingOnly));
        assert_eq!("Ping-Init".parse::<Handshake>(), Ok(Handshake::PingInit));
        assert!("hello".parse::<Handshake>().is_err());
    }
}
