use ratatui::style::{Color, Modifier, Style};
use throttle_core::ConnectionState;

pub const HEADER_STYLE: Style = Style::new()
    .fg(Color::Rgb(142, 192, 124))
    .add_modifier(Modifier::BOLD);
pub const BUTTON_IDLE_STYLE: Style = Style::new().fg(Color::Rgb(189, 174, 147));
pub const BUTTON_ACTIVE_STYLE: Style = Style::new()
    .bg(Color::Rgb(131, 165, 152))
    .fg(Color::Black)
    .add_modifier(Modifier::BOLD);
pub const GAUGE_STYLE: Style = Style::new().fg(Color::Rgb(69, 133, 136));
pub const GAUGE_DANGER_STYLE: Style = Style::new()
    .fg(Color::Rgb(251, 73, 52))
    .add_modifier(Modifier::BOLD);
pub const RULER_STYLE: Style = Style::new().fg(Color::Rgb(168, 153, 132));
pub const DIM_STYLE: Style = Style::new().fg(Color::DarkGray);

pub mod icons {
    pub const LEFT: &str = "<<";
    pub const RIGHT: &str = ">>";
    pub const TICK: char = '|';
    pub const LATEST: &str = ">";
}

pub fn connection_color(state: ConnectionState) -> Color {
    match state {
        ConnectionState::Connecting => Color::Yellow,
        ConnectionState::Open => Color::Green,
        ConnectionState::Closed => Color::DarkGray,
        ConnectionState::Errored => Color::Red,
    }
}

pub fn status_row_style(index: usize) -> Style {
    if index == 0 {
        Style::new()
            .fg(Color::Rgb(250, 189, 47))
            .add_modifier(Modifier::BOLD)
    } else {
        let bg = if index % 2 == 0 {
            Color::Rgb(18, 20, 26)
        } else {
            Color::Rgb(24, 27, 34)
        };
        Style::new().bg(bg)
    }
}
