use crate::protocol::{Command, Direction, Route};
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ControlState {
    #[default]
    Idle,
    Active,
}

impl ControlState {
    pub fn is_active(self) -> bool {
        self == ControlState::Active
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerSource {
    Mouse,
    Touch,
}

impl PointerSource {
    pub fn as_str(self) -> &'static str {
        match self {
            PointerSource::Mouse => "mouse",
            PointerSource::Touch => "touch",
        }
    }
}

/// Logical keys; the physical key map belongs to the input collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Left,
    Right,
    Down,
    Stop,
    Point,
}

impl Key {
    fn direction(self) -> Option<Direction> {
        match self {
            Key::Left => Some(Direction::Left),
            Key::Right => Some(Direction::Right),
            Key::Down | Key::Stop | Key::Point => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputEvent {
    Press {
        control: Direction,
        source: PointerSource,
    },
    Release {
        control: Direction,
        source: PointerSource,
    },
    KeyDown(Key),
    KeyRepeat(Key),
    KeyUp(Key),
}

/// Translates input events into commands with hold-to-move semantics.
///
/// A control becomes Active on press and returns to Idle on release or on the
/// stop/down key. Pressing a control that is already Active sends nothing, so a
/// touch start followed by the emulated mouse press yields a single `move`.
/// Pressing one direction idles the other; its `move` supersedes the old one.
#[derive(Debug, Default)]
pub struct CommandDispatcher {
    left: ControlState,
    right: ControlState,
    point: Route,
}

impl CommandDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle(&mut self, event: InputEvent) -> Option<Command> {
        match event {
            InputEvent::Press { control, source } => {
                trace!(control = %control, source = source.as_str(), "press");
                self.press(control)
            }
            InputEvent::Release { control, source } => {
                trace!(control = %control, source = source.as_str(), "release");
                self.release(control)
            }
            InputEvent::KeyDown(key) => match key {
                Key::Left | Key::Right => key.direction().and_then(|dir| self.press(dir)),
                Key::Down | Key::Stop => {
                    self.left = ControlState::Idle;
                    self.right = ControlState::Idle;
                    Some(Command::Stop)
                }
                Key::Point => {
                    self.point = self.point.toggled();
                    Some(Command::ChangePoint(self.point))
                }
            },
            InputEvent::KeyRepeat(_) => None,
            InputEvent::KeyUp(key) => key.direction().and_then(|dir| self.release(dir)),
        }
    }

    pub fn state(&self, control: Direction) -> ControlState {
        match control {
            Direction::Left => self.left,
            Direction::Right => self.right,
        }
    }

    pub fn requested_route(&self) -> Route {
        self.point
    }

    /// Idles both controls without producing a command. The requested route
    /// is kept.
    pub fn reset(&mut self) {
        if self.left.is_active() || self.right.is_active() {
            trace!("controls reset");
        }
        self.left = ControlState::Idle;
        self.right = ControlState::Idle;
    }

    fn state_mut(&mut self, control: Direction) -> &mut ControlState {
        match control {
            Direction::Left => &mut self.left,
            Direction::Right => &mut self.right,
        }
    }

    fn press(&mut self, control: Direction) -> Option<Command> {
        if self.state(control).is_active() {
            return None;
        }
        *self.state_mut(control.opposite()) = ControlState::Idle;
        *self.state_mut(control) = ControlState::Active;
        Some(Command::Move(control))
    }

    fn release(&mut self, control: Direction) -> Option<Command> {
        if !self.state(control).is_active() {
            return None;
        }
        *self.state_mut(control) = ControlState::Idle;
        Some(Command::Stop)
    }
}
