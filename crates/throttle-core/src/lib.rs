pub mod connection;
pub mod dispatch;
pub mod gauge;
pub mod protocol;
pub mod session;
pub mod status_log;

pub use connection::{Connection, ConnectionState, Handshake, TransportEvent};
pub use dispatch::{CommandDispatcher, ControlState, InputEvent, Key, PointerSource};
pub use gauge::{GaugeBackend, GaugeConfig, GaugeController};
pub use protocol::{
    Command, CommandType, DecodeError, Direction, EncodeError, Envelope, MessageType, Response,
    Route,
};
pub use session::{Session, SessionConfig};
pub use status_log::StatusLog;
