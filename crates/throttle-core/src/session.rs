use crate::connection::{Connection, Handshake, TransportEvent};
use crate::dispatch::{CommandDispatcher, InputEvent};
use crate::gauge::{GaugeBackend, GaugeController, DEFAULT_MAXIMUM};
use crate::protocol::{Command, Response, Route, READY_STATUS};
use crate::status_log::StatusLog;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionConfig {
    pub handshake: Handshake,
    pub default_maximum: f64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            handshake: Handshake::default(),
            default_maximum: DEFAULT_MAXIMUM,
        }
    }
}

/// Everything the cab mutates, owned in one place and driven by one loop.
///
/// Transport events and input events are fed in the order they arrive; each
/// call returns the frames to write to the socket, in order.
#[derive(Debug)]
pub struct Session<B> {
    connection: Connection,
    dispatcher: CommandDispatcher,
    status: StatusLog,
    gauge: GaugeController<B>,
    route: Option<Route>,
}

impl<B: GaugeBackend> Session<B> {
    pub fn new(config: SessionConfig, backend: B) -> Self {
        Self {
            connection: Connection::new(config.handshake),
            dispatcher: CommandDispatcher::new(),
            status: StatusLog::default(),
            gauge: GaugeController::new(backend, config.default_maximum),
            route: None,
        }
    }

    /// Controls are idled on every connection change so a press that was
    /// never delivered cannot swallow the next one.
    pub fn handle_transport(&mut self, event: TransportEvent) -> Vec<String> {
        match event {
            TransportEvent::Opened => {
                self.dispatcher.reset();
                self.connection.on_open()
            }
            TransportEvent::Frame(frame) => {
                if let Some(envelope) = self.connection.on_frame(&frame) {
                    self.apply(Response::from(envelope));
                }
                Vec::new()
            }
            TransportEvent::Errored(detail) => {
                self.dispatcher.reset();
                self.connection.on_error(&detail);
                Vec::new()
            }
            TransportEvent::Closed => {
                self.dispatcher.reset();
                self.connection.on_close();
                Vec::new()
            }
        }
    }

    pub fn handle_input(&mut self, event: InputEvent) -> Option<String> {
        let command = self.dispatcher.handle(event)?;
        self.connection.send(command)
    }

    pub fn send(&mut self, command: Command) -> Option<String> {
        self.connection.send(command)
    }

    pub fn apply(&mut self, response: Response) {
        match response {
            Response::Pong => self.status.push(READY_STATUS),
            Response::Init { text, maximum } => {
                match maximum {
                    Some(maximum) => {
                        if !self.gauge.on_init(maximum) {
                            warn!(event = "init_maximum_rejected", maximum);
                        }
                    }
                    None => warn!(event = "init_without_maximum"),
                }
                self.status.push(text);
            }
            Response::Ack {
                text,
                velocity,
                route,
            } => {
                if let Some(velocity) = velocity {
                    if !self.gauge.on_ack(velocity) {
                        warn!(event = "ack_velocity_rejected");
                    }
                }
                if route.is_some() {
                    self.route = route;
                }
                self.status.push(text);
            }
            Response::Unrecognized(kind) => {
                debug!(event = "unrecognized_message", kind = %kind);
            }
        }
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    pub fn dispatcher(&self) -> &CommandDispatcher {
        &self.dispatcher
    }

    pub fn status_log(&self) -> &StatusLog {
        &self.status
    }

    pub fn gauge(&self) -> &GaugeController<B> {
        &self.gauge
    }

    pub fn gauge_mut(&mut self) -> &mut GaugeController<B> {
        &mut self.gauge
    }

    /// Last route the controller confirmed, if any.
    pub fn route(&self) -> Option<Route> {
        self.route
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gauge::GaugeConfig;
    use crate::protocol::MessageType;

    struct NoopGauge;

    impl GaugeBackend for NoopGauge {
        fn configure(&mut self, _config: &GaugeConfig) {}
        fn set_value(&mut self, _value: f64) {}
    }

    fn open_session() -> Session<NoopGauge> {
        let mut session = Session::new(SessionConfig::default(), NoopGauge);
        session.handle_transport(TransportEvent::Opened);
        session
    }

    #[test]
    fn unrecognized_and_echoed_types_leave_state_alone() {
        let mut session = open_session();
        session.apply(Response::Unrecognized(MessageType::Other("telemetry".into())));
        session.handle_transport(TransportEvent::Frame(
            r#"{"type":"move","text":"left"}"#.to_string(),
        ));
        assert!(session.status_log().is_empty());
        assert_eq!(session.gauge().value(), 0.0);
    }

    #[test]
    fn init_without_maximum_only_logs_text() {
        let mut session = open_session();
        session.apply(Response::Init {
            text: "initialised".to_string(),
            maximum: None,
        });
        assert_eq!(session.gauge().config().max_value, DEFAULT_MAXIMUM);
        assert_eq!(session.status_log().latest(), Some("initialised"));
    }

    #[test]
    fn point_ack_updates_route_without_touching_gauge() {
        let mut session = open_session();
        session.apply(Response::Ack {
            text: "commanded: accelerate forward".to_string(),
            velocity: Some(3.0),
            route: None,
        });
        session.apply(Response::Ack {
            text: "commanded: point diverging".to_string(),
            velocity: None,
            route: Some(Route::Diverging),
        });
        assert_eq!(session.route(), Some(Route::Diverging));
        assert_eq!(session.gauge().value(), 3.0);
        assert_eq!(
            session.status_log().entries().collect::<Vec<_>>(),
            vec!["commanded: point diverging", "commanded: accelerate forward"]
        );
    }

    #[test]
    fn press_before_open_does_not_block_move_after_open() {
        use crate::dispatch::Key;
        use crate::protocol::{decode, Direction};

        let mut session = Session::new(SessionConfig::default(), NoopGauge);
        assert_eq!(session.handle_input(InputEvent::KeyDown(Key::Left)), None);
        assert_eq!(session.connection().dropped_commands(), 1);

        session.handle_transport(TransportEvent::Opened);
        assert!(!session.dispatcher().state(Direction::Left).is_active());

        let frame = session
            .handle_input(InputEvent::KeyDown(Key::Left))
            .expect("move frame");
        let envelope = decode(&frame).expect("decode");
        assert_eq!(envelope.kind, MessageType::Move);
        assert_eq!(envelope.text, Direction::Left.as_str());
    }

    #[test]
    fn close_idles_held_controls() {
        use crate::dispatch::Key;
        use crate::protocol::Direction;

        let mut session = open_session();
        assert!(session.handle_input(InputEvent::KeyDown(Key::Right)).is_some());
        session.handle_transport(TransportEvent::Closed);
        assert!(!session.dispatcher().state(Direction::Right).is_active());
        assert_eq!(session.handle_input(InputEvent::KeyUp(Key::Right)), None);
    }
}
