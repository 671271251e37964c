use crossterm::event::{
    KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
};
use ratatui::layout::Rect;
use throttle_core::{Direction, InputEvent, Key, PointerSource};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Input(InputEvent),
    ToggleHelp,
    Quit,
    Ignore,
}

/// Screen regions of the on-screen direction buttons, refreshed on every draw.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ControlAreas {
    pub left: Option<Rect>,
    pub right: Option<Rect>,
}

impl ControlAreas {
    pub fn hit(&self, column: u16, row: u16) -> Option<Direction> {
        if self.left.is_some_and(|area| contains(area, column, row)) {
            return Some(Direction::Left);
        }
        if self.right.is_some_and(|area| contains(area, column, row)) {
            return Some(Direction::Right);
        }
        None
    }
}

pub fn map_key(key: KeyEvent) -> KeyAction {
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        return KeyAction::Quit;
    }

    let logical = match key.code {
        KeyCode::Left | KeyCode::Char('a') | KeyCode::Char('h') => Key::Left,
        KeyCode::Right | KeyCode::Char('d') | KeyCode::Char('l') => Key::Right,
        KeyCode::Down | KeyCode::Char('s') | KeyCode::Char('j') => Key::Down,
        KeyCode::Char(' ') => Key::Stop,
        KeyCode::Char('p') => Key::Point,
        KeyCode::Char('q') | KeyCode::Esc if key.kind == KeyEventKind::Press => {
            return KeyAction::Quit;
        }
        KeyCode::Char('?') if key.kind == KeyEventKind::Press => return KeyAction::ToggleHelp,
        _ => return KeyAction::Ignore,
    };

    KeyAction::Input(match key.kind {
        KeyEventKind::Press => InputEvent::KeyDown(logical),
        KeyEventKind::Repeat => InputEvent::KeyRepeat(logical),
        KeyEventKind::Release => InputEvent::KeyUp(logical),
    })
}

/// Maps a mouse event to a press or release of a direction button.
///
/// `held` is the button the left mouse button went down on, if any. Releasing
/// anywhere on screen releases that button.
pub fn map_mouse(
    mouse: MouseEvent,
    areas: &ControlAreas,
    held: Option<Direction>,
) -> Option<InputEvent> {
    match mouse.kind {
        MouseEventKind::Down(MouseButton::Left) => {
            areas
                .hit(mouse.column, mouse.row)
                .map(|control| InputEvent::Press {
                    control,
                    source: PointerSource::Mouse,
                })
        }
        MouseEventKind::Up(MouseButton::Left) => held.map(|control| InputEvent::Release {
            control,
            source: PointerSource::Mouse,
        }),
        _ => None,
    }
}

fn contains(area: Rect, column: u16, row: u16) -> bool {
    column >= area.x
        && column < area.x.saturating_add(area.width)
        && row >= area.y
        && row < area.y.saturating_add(area.height)
}
