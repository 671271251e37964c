use crossterm::event::Event;
use throttle_core::{
    Command, ConnectionState, Direction, InputEvent, PointerSource, Session, SessionConfig,
    TransportEvent,
};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::input::{self, ControlAreas, KeyAction};
use crate::ui::TerminalGauge;
use crate::Config;

pub struct App {
    pub url: String,
    pub session: Session<TerminalGauge>,
    pub controls: ControlAreas,
    pub show_help: bool,
    pub key_release_reported: bool,
    outbound_tx: mpsc::Sender<String>,
    pointer_held: Option<Direction>,
    quit: bool,
}

impl App {
    pub fn new(config: Config, outbound_tx: mpsc::Sender<String>) -> Self {
        let session = Session::new(
            SessionConfig {
                handshake: config.handshake,
                default_maximum: config.default_maximum,
            },
            TerminalGauge::default(),
        );
        Self {
            url: config.url.to_string(),
            session,
            controls: ControlAreas::default(),
            show_help: false,
            key_release_reported: false,
            outbound_tx,
            pointer_held: None,
            quit: false,
        }
    }

    pub fn apply_transport(&mut self, event: TransportEvent) {
        for frame in self.session.handle_transport(event) {
            self.write(frame);
        }
    }

    pub fn handle_event(&mut self, event: Event) {
        match event {
            Event::Key(key) => match input::map_key(key) {
                KeyAction::Input(event) => self.input(event),
                KeyAction::ToggleHelp => self.show_help = !self.show_help,
                KeyAction::Quit => self.request_quit(),
                KeyAction::Ignore => {}
            },
            Event::Mouse(mouse) => {
                if let Some(event) = input::map_mouse(mouse, &self.controls, self.pointer_held) {
                    self.input(event);
                }
            }
            Event::FocusLost => {
                if let Some(control) = self.pointer_held {
                    self.input(InputEvent::Release {
                        control,
                        source: PointerSource::Mouse,
                    });
                }
            }
            _ => {}
        }
    }

    pub fn input(&mut self, event: InputEvent) {
        match event {
            InputEvent::Press {
                control,
                source: PointerSource::Mouse,
            } => self.pointer_held = Some(control),
            InputEvent::Release {
                source: PointerSource::Mouse,
                ..
            } => self.pointer_held = None,
            _ => {}
        }
        if let Some(frame) = self.session.handle_input(event) {
            self.write(frame);
        }
    }

    /// Leaves the loop, stopping the locomotive first if the link is up.
    pub fn request_quit(&mut self) {
        if self.session.connection().state() == ConnectionState::Open {
            if let Some(frame) = self.session.send(Command::Stop) {
                self.write(frame);
            }
        }
        info!(event = "quit_requested");
        self.quit = true;
    }

    pub fn on_tick(&mut self) {
        self.session.gauge_mut().backend_mut().step();
    }

    pub fn should_quit(&self) -> bool {
        self.quit
    }

    pub fn pointer_held(&self) -> Option<Direction> {
        self.pointer_held
    }

    fn write(&mut self, frame: String) {
        if let Err(err) = self.outbound_tx.try_send(frame) {
            warn!(event = "outbound_dropped", error = %err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::{KeyModifiers, MouseButton, MouseEvent, MouseEventKind};
    use ratatui::layout::Rect;
    use throttle_core::protocol::decode;
    use throttle_core::{Handshake, MessageType};

    fn app() -> (App, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(16);
        let config = Config {
            url: url::Url::parse("ws://127.0.0.1:8080/move").expect("url"),
            handshake: Handshake::PingInit,
            default_maximum: 100.0,
            log_dir: String::new(),
            log_stdout: false,
        };
        (App::new(config, tx), rx)
    }

    fn drain(rx: &mut mpsc::Receiver<String>) -> Vec<(MessageType, String)> {
        let mut out = Vec::new();
        while let Ok(frame) = rx.try_recv() {
            let envelope = decode(&frame).expect("decode");
            out.push((envelope.kind, envelope.text));
        }
        out
    }

    fn click(kind: MouseEventKind, column: u16, row: u16) -> Event {
        Event::Mouse(MouseEvent {
            kind,
            column,
            row,
            modifiers: KeyModifiers::NONE,
        })
    }

    #[test]
    fn open_writes_handshake() {
        let (mut app, mut rx) = app();
        app.apply_transport(TransportEvent::Opened);
        let sent: Vec<MessageType> = drain(&mut rx).into_iter().map(|(kind, _)| kind).collect();
        assert_eq!(sent, vec![MessageType::Ping, MessageType::Init]);
    }

    #[test]
    fn mouse_hold_on_left_button_moves_then_stops() {
        let (mut app, mut rx) = app();
        app.apply_transport(TransportEvent::Opened);
        drain(&mut rx);
        app.controls.left = Some(Rect::new(2, 4, 12, 3));

        app.handle_event(click(MouseEventKind::Down(MouseButton::Left), 5, 5));
        assert_eq!(app.pointer_held(), Some(Direction::Left));
        app.handle_event(click(MouseEventKind::Up(MouseButton::Left), 40, 1));
        assert_eq!(app.pointer_held(), None);

        assert_eq!(
            drain(&mut rx),
            vec![
                (MessageType::Move, "left".to_string()),
                (MessageType::Stop, String::new())
            ]
        );
    }

    #[test]
    fn losing_focus_releases_held_pointer() {
        let (mut app, mut rx) = app();
        app.apply_transport(TransportEvent::Opened);
        drain(&mut rx);
        app.controls.right = Some(Rect::new(20, 4, 12, 3));

        app.handle_event(click(MouseEventKind::Down(MouseButton::Left), 21, 4));
        app.handle_event(Event::FocusLost);
        let kinds: Vec<MessageType> = drain(&mut rx).into_iter().map(|(kind, _)| kind).collect();
        assert_eq!(kinds, vec![MessageType::Move, MessageType::Stop]);
    }

    #[test]
    fn quit_sends_stop_when_open() {
        let (mut app, mut rx) = app();
        app.apply_transport(TransportEvent::Opened);
        drain(&mut rx);
        app.request_quit();
        assert!(app.should_quit());
        assert_eq!(drain(&mut rx), vec![(MessageType::Stop, String::new())]);
    }

    #[test]
    fn quit_before_open_sends_nothing() {
        let (mut app, mut rx) = app();
        app.request_quit();
        assert!(app.should_quit());
        assert!(drain(&mut rx).is_empty());
    }
}
