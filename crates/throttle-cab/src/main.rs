mod app;
mod input;
mod socket;
mod theme;
mod ui;

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::{
    event::{
        DisableFocusChange, DisableMouseCapture, EnableFocusChange, EnableMouseCapture,
        EventStream, KeyboardEnhancementFlags, PopKeyboardEnhancementFlags,
        PushKeyboardEnhancementFlags,
    },
    execute,
    terminal::{
        disable_raw_mode, enable_raw_mode, supports_keyboard_enhancement, EnterAlternateScreen,
        LeaveAlternateScreen,
    },
};
use futures_util::StreamExt;
use ratatui::{backend::CrosstermBackend, Terminal};
use std::{
    env,
    fs::OpenOptions,
    io::{self, Write},
    path::PathBuf,
    sync::{Arc, Mutex},
    time::Duration,
};
use throttle_core::{protocol::MOVE_PATH, Handshake, TransportEvent};
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::{fmt::writer::BoxMakeWriter, EnvFilter};
use url::Url;

use crate::app::App;

const DEFAULT_HOST: &str = "127.0.0.1:8080";
const DEFAULT_LOG_DIR: &str = ".throttle/logs";
const TRANSPORT_QUEUE_CAPACITY: usize = 256;
const OUTBOUND_QUEUE_CAPACITY: usize = 64;
const RENDER_TICK_MS: u64 = 50;
const SHUTDOWN_GRACE_MS: u64 = 1000;

#[derive(Parser, Debug)]
#[command(name = "throttle-cab", about = "Drive a locomotive controller from the terminal")]
struct Args {
    /// Full websocket url, e.g. ws://192.168.4.1/move
    #[arg(long, default_value = "")]
    url: String,
    /// Controller host[:port]; the url becomes ws://<host>/move
    #[arg(long, default_value = "")]
    host: String,
    /// Handshake sent on open: "ping" or "ping-init"
    #[arg(long, default_value = "")]
    handshake: String,
    /// Gauge maximum used until the controller reports one
    #[arg(long, default_value_t = throttle_core::gauge::DEFAULT_MAXIMUM)]
    default_max: f64,
    #[arg(long, default_value = "")]
    log_dir: String,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub url: Url,
    pub handshake: Handshake,
    pub default_maximum: f64,
    pub log_dir: String,
    pub log_stdout: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = load_config(Args::parse())?;
    let _log_guard = init_logging(&config);
    info!(
        event = "cab_start",
        url = %config.url,
        handshake = config.handshake.as_str()
    );

    let (transport_tx, mut transport_rx) =
        mpsc::channel::<TransportEvent>(TRANSPORT_QUEUE_CAPACITY);
    let (outbound_tx, outbound_rx) = mpsc::channel::<String>(OUTBOUND_QUEUE_CAPACITY);
    let socket_url = config.url.clone();
    let socket_task = tokio::spawn(async move {
        socket::socket_loop(socket_url, transport_tx, outbound_rx).await;
    });

    let mut app = App::new(config, outbound_tx);
    let mut terminal = setup_terminal()?;
    app.key_release_reported = enable_key_release_reporting();
    if !app.key_release_reported {
        warn!(event = "key_release_unsupported");
    }

    let result = run_app(&mut terminal, &mut app, &mut transport_rx).await;
    restore_terminal(&mut terminal, app.key_release_reported)?;

    drop(app);
    drop(transport_rx);
    if tokio::time::timeout(Duration::from_millis(SHUTDOWN_GRACE_MS), socket_task)
        .await
        .is_err()
    {
        warn!(event = "socket_shutdown_timeout");
    }

    if let Err(err) = result {
        eprintln!("throttle-cab: {err}");
    }
    info!(event = "cab_exit");
    Ok(())
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    transport_rx: &mut mpsc::Receiver<TransportEvent>,
) -> Result<()> {
    let mut events = EventStream::new();
    let mut ticker = tokio::time::interval(Duration::from_millis(RENDER_TICK_MS));

    loop {
        terminal.draw(|frame| ui::render(frame, app))?;
        tokio::select! {
            Some(event) = transport_rx.recv() => {
                app.apply_transport(event);
            }
            maybe_event = events.next() => {
                match maybe_event {
                    Some(Ok(event)) => app.handle_event(event),
                    Some(Err(err)) => warn!(event = "input_error", error = %err),
                    None => break,
                }
            }
            _ = ticker.tick() => {
                app.on_tick();
            }
        }

        if app.should_quit() {
            break;
        }
    }

    Ok(())
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<io::Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(
        stdout,
        EnterAlternateScreen,
        EnableMouseCapture,
        EnableFocusChange
    )?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;
    Ok(terminal)
}

/// Asks the terminal to report key releases so held arrow keys can resolve to
/// `stop`. Returns whether the terminal agreed.
fn enable_key_release_reporting() -> bool {
    if !matches!(supports_keyboard_enhancement(), Ok(true)) {
        return false;
    }
    execute!(
        io::stdout(),
        PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::REPORT_EVENT_TYPES)
    )
    .is_ok()
}

fn restore_terminal(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    key_release_reported: bool,
) -> Result<()> {
    if key_release_reported {
        execute!(terminal.backend_mut(), PopKeyboardEnhancementFlags)?;
    }
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture,
        DisableFocusChange
    )?;
    terminal.show_cursor()?;
    Ok(())
}

fn load_config(args: Args) -> Result<Config> {
    let url = resolve_url(&args.url, &args.host)?;
    let handshake = resolve_handshake(&args.handshake)?;
    let default_maximum = args.default_max.abs();
    if !default_maximum.is_finite() || default_maximum == 0.0 {
        anyhow::bail!("--default-max must be a non-zero number");
    }
    Ok(Config {
        url,
        handshake,
        default_maximum,
        log_dir: resolve_log_dir(&args.log_dir),
        log_stdout: resolve_log_stdout(),
    })
}

fn resolve_url(flag_url: &str, flag_host: &str) -> Result<Url> {
    build_url(
        first_non_empty(flag_url, "THROTTLE_URL"),
        first_non_empty(flag_host, "THROTTLE_HOST"),
    )
}

/// A full url wins over a host; with neither the default host is used.
fn build_url(url: Option<String>, host: Option<String>) -> Result<Url> {
    if let Some(raw) = url {
        return Url::parse(&raw).with_context(|| format!("invalid controller url '{raw}'"));
    }
    let host = host.unwrap_or_else(|| DEFAULT_HOST.to_string());
    let raw = format!("ws://{host}{MOVE_PATH}");
    Url::parse(&raw).with_context(|| format!("invalid controller host '{host}'"))
}

fn resolve_handshake(flag: &str) -> Result<Handshake> {
    match first_non_empty(flag, "THROTTLE_HANDSHAKE") {
        Some(value) => value.parse::<Handshake>().map_err(anyhow::Error::msg),
        None => Ok(Handshake::default()),
    }
}

fn resolve_log_dir(flag: &str) -> String {
    first_non_empty(flag, "THROTTLE_LOG_DIR").unwrap_or_else(|| DEFAULT_LOG_DIR.to_string())
}

fn resolve_log_stdout() -> bool {
    env::var("THROTTLE_LOG_STDOUT")
        .ok()
        .and_then(|value| parse_bool_flag(&value))
        .unwrap_or(false)
}

fn first_non_empty(flag: &str, env_key: &str) -> Option<String> {
    if !flag.trim().is_empty() {
        return Some(flag.trim().to_string());
    }
    env::var(env_key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_bool_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

struct LogGuard {
    file: Option<Arc<Mutex<std::fs::File>>>,
}

struct MultiWriter {
    stdout_enabled: bool,
    file: Option<Arc<Mutex<std::fs::File>>>,
}

fn init_logging(config: &Config) -> Option<LogGuard> {
    let level = env::var("THROTTLE_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let guard = match open_log_file(&config.log_dir) {
        Ok(guard) => guard,
        Err(err) => {
            eprintln!("log_file_error: {err}");
            LogGuard { file: None }
        }
    };
    let file = guard.file.clone();
    let stdout_enabled = config.log_stdout;
    let make_writer = BoxMakeWriter::new(move || MultiWriter {
        stdout_enabled,
        file: file.clone(),
    });
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_writer(make_writer)
        .finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        return None;
    }
    Some(guard)
}

fn open_log_file(log_dir: &str) -> io::Result<LogGuard> {
    if log_dir.trim().is_empty() {
        return Ok(LogGuard { file: None });
    }
    let dir = PathBuf::from(log_dir);
    std::fs::create_dir_all(&dir)?;
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join("throttle-cab.log"))?;
    Ok(LogGuard {
        file: Some(Arc::new(Mutex::new(file))),
    })
}

impl Write for MultiWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.stdout_enabled {
            let _ = io::stdout().write_all(buf);
        }
        if let Some(file) = &self.file {
            if let Ok(mut file) = file.lock() {
                let _ = file.write_all(buf);
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if self.stdout_enabled {
            let _ = io::stdout().flush();
        }
        if let Some(file) = &self.file {
            if let Ok(mut file) = file.lock() {
                let _ = file.flush();
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn some(value: &str) -> Option<String> {
        Some(value.to_string())
    }

    #[test]
    fn host_builds_move_url() {
        let url = build_url(None, some("192.168.4.1")).expect("url");
        assert_eq!(url.as_str(), "ws://192.168.4.1/move");
    }

    #[test]
    fn missing_host_falls_back_to_default() {
        let url = build_url(None, None).expect("url");
        assert_eq!(url.as_str(), format!("ws://{DEFAULT_HOST}{MOVE_PATH}"));
    }

    #[test]
    fn url_wins_over_host() {
        let url = build_url(some("ws://train.local:9000/move"), some("10.0.0.1")).expect("url");
        assert_eq!(url.host_str(), Some("train.local"));
        assert_eq!(url.port(), Some(9000));
    }

    #[test]
    fn url_flag_beats_environment() {
        let url = resolve_url("ws://train.local:9000/move", "").expect("url");
        assert_eq!(url.host_str(), Some("train.local"));
    }

    #[test]
    fn bad_url_is_reported() {
        assert!(build_url(some("not a url"), None).is_err());
    }

    #[test]
    fn handshake_flag_parses() {
        assert_eq!(resolve_handshake("ping").expect("ping"), Handshake::PingOnly);
        assert!(resolve_handshake("bogus").is_err());
    }

    #[test]
    fn bool_flags_accept_common_spellings() {
        assert_eq!(parse_bool_flag("YES"), Some(true));
        assert_eq!(parse_bool_flag(" off "), Some(false));
        assert_eq!(parse_bool_flag("maybe"), None);
    }
}
