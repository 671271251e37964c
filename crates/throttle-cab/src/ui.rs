use crate::app::App;
use crate::theme::{self, icons};
use ratatui::{
    layout::{Alignment, Constraint, Direction as LayoutDirection, Layout, Rect},
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, List, ListItem, Paragraph},
    Frame,
};
use throttle_core::{Direction, GaugeBackend, GaugeConfig};

const EASE_FACTOR: f64 = 0.35;
const SNAP_EPSILON: f64 = 0.05;

/// Gauge collaborator for the terminal. Keeps the latest target and eases the
/// displayed value toward it on every animation tick.
#[derive(Debug, Default)]
pub struct TerminalGauge {
    config: Option<GaugeConfig>,
    target: f64,
    shown: f64,
}

impl GaugeBackend for TerminalGauge {
    fn configure(&mut self, config: &GaugeConfig) {
        self.config = Some(config.clone());
    }

    fn set_value(&mut self, value: f64) {
        self.target = value;
    }
}

impl TerminalGauge {
    pub fn step(&mut self) {
        let delta = self.target - self.shown;
        if delta.abs() <= SNAP_EPSILON {
            self.shown = self.target;
        } else {
            self.shown += delta * EASE_FACTOR;
        }
    }

    pub fn shown(&self) -> f64 {
        self.shown
    }

    pub fn ratio(&self) -> f64 {
        let Some(config) = &self.config else {
            return 0.0;
        };
        let span = config.max_value - config.min_value;
        if span <= 0.0 {
            return 0.0;
        }
        let ratio = (self.shown - config.min_value) / span;
        if ratio.is_finite() {
            ratio.clamp(0.0, 1.0)
        } else {
            0.0
        }
    }
}

pub fn render(f: &mut Frame, app: &mut App) {
    let area = f.size();
    let rows = Layout::default()
        .direction(LayoutDirection::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(5),
            Constraint::Length(3),
            Constraint::Min(4),
            Constraint::Length(1),
        ])
        .split(area);

    render_header(f, app, rows[0]);
    render_gauge(f, app, rows[1]);
    render_controls(f, app, rows[2]);
    if app.show_help {
        render_help(f, rows[3]);
    } else {
        render_status(f, app, rows[3]);
    }
    render_footer(f, app, rows[4]);
}

fn render_header(f: &mut Frame, app: &App, area: Rect) {
    let connection = app.session.connection();
    let state = connection.state();
    let mut spans = vec![
        Span::styled("throttle-cab ", theme::HEADER_STYLE),
        Span::raw(app.url.as_str()),
        Span::raw("  "),
        Span::styled(
            format!("[{state}]"),
            Style::new().fg(theme::connection_color(state)),
        ),
    ];
    if let Some(error) = connection.last_error() {
        spans.push(Span::styled(format!(" {error}"), theme::DIM_STYLE));
    }
    let dropped = connection.dropped_commands() + connection.dropped_frames();
    if dropped > 0 {
        spans.push(Span::styled(format!("  dropped {dropped}"), theme::DIM_STYLE));
    }
    let block = Block::default().borders(Borders::ALL);
    f.render_widget(Paragraph::new(Line::from(spans)).block(block), area);
}

fn render_gauge(f: &mut Frame, app: &App, area: Rect) {
    let controller = app.session.gauge();
    let config = controller.config();
    let backend = controller.backend();
    let block = Block::default().borders(Borders::ALL).title("Speed");
    let inner = block.inner(area);
    f.render_widget(block, area);

    let parts = Layout::default()
        .direction(LayoutDirection::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .split(inner);

    let style = if config.in_danger_zone(backend.shown()) {
        theme::GAUGE_DANGER_STYLE
    } else {
        theme::GAUGE_STYLE
    };
    let gauge = Gauge::default()
        .gauge_style(style)
        .ratio(backend.ratio())
        .label(format!("{:.0} / {:.0}", backend.shown(), config.max_value))
        .use_unicode(true);
    f.render_widget(gauge, parts[0]);

    let (marks, labels) = tick_ruler(config, parts[1].width);
    f.render_widget(Paragraph::new(marks).style(theme::RULER_STYLE), parts[1]);
    f.render_widget(Paragraph::new(labels).style(theme::RULER_STYLE), parts[2]);
}

fn render_controls(f: &mut Frame, app: &mut App, area: Rect) {
    let columns = Layout::default()
        .direction(LayoutDirection::Horizontal)
        .constraints([
            Constraint::Percentage(35),
            Constraint::Percentage(30),
            Constraint::Percentage(35),
        ])
        .split(area);

    app.controls.left = Some(columns[0]);
    app.controls.right = Some(columns[2]);

    render_button(f, app, Direction::Left, columns[0]);
    render_point(f, app, columns[1]);
    render_button(f, app, Direction::Right, columns[2]);
}

fn render_button(f: &mut Frame, app: &App, control: Direction, area: Rect) {
    let active = app.session.dispatcher().state(control).is_active()
        || app.pointer_held() == Some(control);
    let style = if active {
        theme::BUTTON_ACTIVE_STYLE
    } else {
        theme::BUTTON_IDLE_STYLE
    };
    let label = match control {
        Direction::Left => format!("{} LEFT", icons::LEFT),
        Direction::Right => format!("RIGHT {}", icons::RIGHT),
    };
    let button = Paragraph::new(label)
        .alignment(Alignment::Center)
        .style(style)
        .block(Block::default().borders(Borders::ALL));
    f.render_widget(button, area);
}

fn render_point(f: &mut Frame, app: &App, area: Rect) {
    let confirmed = app
        .session
        .route()
        .map(|route| route.as_str())
        .unwrap_or("?");
    let text = format!(
        "point {} ({})",
        app.session.dispatcher().requested_route().as_str(),
        confirmed
    );
    let point = Paragraph::new(text)
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL).title("p"));
    f.render_widget(point, area);
}

fn render_status(f: &mut Frame, app: &App, area: Rect) {
    let items: Vec<ListItem> = app
        .session
        .status_log()
        .entries()
        .enumerate()
        .map(|(index, text)| {
            let marker = if index == 0 { icons::LATEST } else { " " };
            ListItem::new(format!("{marker} {text}")).style(theme::status_row_style(index))
        })
        .collect();
    let list = List::new(items).block(Block::default().borders(Borders::ALL).title("Status"));
    f.render_widget(list, area);
}

fn render_help(f: &mut Frame, area: Rect) {
    let lines = vec![
        Line::from("Left / a / h     hold to accelerate forward"),
        Line::from("Right / d / l    hold to accelerate in reverse"),
        Line::from("Down / s / j     stop"),
        Line::from("Space            stop"),
        Line::from("p                toggle point"),
        Line::from("mouse            hold the LEFT / RIGHT buttons"),
        Line::from("q / Esc / Ctrl-C stop and quit"),
    ];
    let help = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Help"));
    f.render_widget(help, area);
}

fn render_footer(f: &mut Frame, app: &App, area: Rect) {
    let mut text = String::from("? help  q quit");
    if !app.key_release_reported {
        text.push_str("  (key release not reported: use Space or Down to stop)");
    }
    f.render_widget(Paragraph::new(text).style(theme::DIM_STYLE), area);
}

/// Builds the tick marks line and the labels line for a ruler `width` cells
/// wide. Labels that would collide with the previous one are skipped.
pub fn tick_ruler(config: &GaugeConfig, width: u16) -> (String, String) {
    let width = usize::from(width);
    if width == 0 {
        return (String::new(), String::new());
    }
    let span = config.max_value - config.min_value;
    let mut marks = vec![' '; width];
    let mut labels = vec![' '; width];
    let mut next_free = 0usize;

    for tick in &config.major_ticks {
        let fraction = if span > 0.0 {
            ((tick - config.min_value) / span).clamp(0.0, 1.0)
        } else {
            0.0
        };
        let column = (fraction * (width - 1) as f64).round() as usize;
        marks[column] = icons::TICK;

        let label = format_tick(*tick);
        if label.len() > width {
            continue;
        }
        let start = column.min(width - label.len());
        if start < next_free {
            continue;
        }
        for (offset, ch) in label.chars().enumerate() {
            labels[start + offset] = ch;
        }
        next_free = start + label.len() + 1;
    }

    (marks.into_iter().collect(), labels.into_iter().collect())
}

fn format_tick(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{value:.0}")
    } else {
        format!("{value:.1}")
    }
}
