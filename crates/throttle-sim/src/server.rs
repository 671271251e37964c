use crate::locomotive::{Heading, Locomotive};
use axum::{
    extract::{ws::Message, ws::WebSocket, Path, State, WebSocketUpgrade},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Router,
};
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};
use throttle_core::protocol::{decode, encode_envelope, now_millis, MOVE_PATH};
use throttle_core::{Envelope, MessageType, Route};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info, warn};

#[derive(Clone, Debug)]
pub struct SimConfig {
    pub engine: String,
    pub max_speed: Option<f64>,
    pub debug: bool,
    pub write_timeout: Duration,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            engine: "lourie".to_string(),
            max_speed: None,
            debug: false,
            write_timeout: Duration::from_secs(5),
        }
    }
}

/// One simulated locomotive shared by every connection.
pub struct SimState {
    config: SimConfig,
    locomotive: AsyncMutex<Locomotive>,
    next_conn: AtomicU64,
}

impl SimState {
    pub fn new(config: SimConfig) -> Self {
        let locomotive = Locomotive::new(&config.engine, config.max_speed);
        Self {
            config,
            locomotive: AsyncMutex::new(locomotive),
            next_conn: AtomicU64::new(1),
        }
    }

    pub async fn snapshot(&self) -> Locomotive {
        self.locomotive.lock().await.clone()
    }

    pub async fn stop(&self) {
        self.locomotive.lock().await.stop();
    }

    async fn reply(&self, frame: &str) -> Option<String> {
        let mut locomotive = self.locomotive.lock().await;
        reply_for(&mut locomotive, frame, now_millis())
    }

    async fn handle_socket(self: Arc<Self>, socket: WebSocket) {
        let conn_id = self.next_conn.fetch_add(1, Ordering::Relaxed);
        let (mut ws_sender, mut ws_receiver) = socket.split();
        info!(event = "client_connected", conn_id);

        while let Some(result) = ws_receiver.next().await {
            let msg = match result {
                Ok(value) => value,
                Err(err) => {
                    warn!(event = "read_error", conn_id, error = %err);
                    break;
                }
            };
            let text = match msg {
                Message::Text(text) => text,
                Message::Binary(bytes) => {
                    warn!(event = "binary_ignored", conn_id, size = bytes.len());
                    continue;
                }
                Message::Close(_) => {
                    info!(event = "client_close", conn_id);
                    break;
                }
                Message::Ping(_) | Message::Pong(_) => continue,
            };
            if self.config.debug {
                debug!(event = "message_received", conn_id, raw = %text);
            }
            let Some(reply) = self.reply(&text).await else {
                continue;
            };
            let send = ws_sender.send(Message::Text(reply));
            match tokio::time::timeout(self.config.write_timeout, send).await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    warn!(event = "write_error", conn_id, error = %err);
                    break;
                }
                Err(_) => {
                    warn!(event = "write_timeout", conn_id);
                    break;
                }
            }
        }

        info!(event = "client_disconnected", conn_id);
    }
}

pub fn router(state: Arc<SimState>) -> Router {
    Router::new()
        .route(MOVE_PATH, get(ws_handler))
        .route("/move/:dir", get(move_handler))
        .route("/point/diverge/:diverging", get(point_handler))
        .route("/stop", get(stop_handler))
        .route("/health", get(|| async { "ok" }))
        .with_state(state)
}

/// Computes the reply to one inbound frame, mutating the locomotive as the
/// command requires. Malformed frames get no reply; unknown types are echoed.
pub fn reply_for(locomotive: &mut Locomotive, frame: &str, date: i64) -> Option<String> {
    let message = match decode(frame) {
        Ok(value) => value,
        Err(err) => {
            warn!(event = "message_invalid", error = %err);
            return None;
        }
    };

    let reply = match message.kind {
        MessageType::Ping => Envelope::new(MessageType::Pong, "", date),
        MessageType::Init => Envelope {
            maximum: Some(locomotive.max_speed()),
            ..Envelope::new(
                MessageType::Init,
                format!("initialised with engine={}", locomotive.id()),
                date,
            )
        },
        MessageType::Stop => {
            locomotive.stop();
            info!(event = "stop");
            motion_ack(locomotive, "commanded: stop".to_string(), date)
        }
        MessageType::Move => match Heading::from_text(&message.text) {
            Some(heading) => {
                locomotive.nudge(heading);
                info!(
                    event = "accelerate",
                    heading = heading.as_str(),
                    velocity = locomotive.velocity()
                );
                motion_ack(
                    locomotive,
                    format!("commanded: accelerate {}", heading.as_str()),
                    date,
                )
            }
            None => {
                warn!(event = "unknown_heading", text = %message.text);
                return Some(frame.to_string());
            }
        },
        MessageType::ChangePoint => {
            let route = if message.text == Route::Diverging.command_text() {
                Route::Diverging
            } else {
                Route::Through
            };
            locomotive.set_route(route);
            info!(event = "change_point", route = route.as_str());
            Envelope {
                route: Some(route),
                ..Envelope::new(
                    MessageType::Ack,
                    format!("commanded: point {}", route.as_str()),
                    date,
                )
            }
        }
        _ => {
            debug!(event = "echo", kind = %message.kind);
            return Some(frame.to_string());
        }
    };

    match encode_envelope(&reply) {
        Ok(frame) => Some(frame),
        Err(err) => {
            warn!(event = "encode_error", kind = %reply.kind, error = %err);
            None
        }
    }
}

fn motion_ack(locomotive: &Locomotive, text: String, date: i64) -> Envelope {
    let mut ack = Envelope {
        velocity: Some(locomotive.velocity()),
        ..Envelope::new(MessageType::Ack, text, date)
    };
    ack.extra.insert("step".to_string(), json!(locomotive.step()));
    ack
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<SimState>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| async move {
        state.handle_socket(socket).await;
    })
}

async fn stop_handler(State(state): State<Arc<SimState>>) -> impl IntoResponse {
    state.stop().await;
    info!(event = "stop", source = "http");
    "stopping"
}

async fn move_handler(
    State(state): State<Arc<SimState>>,
    Path(dir): Path<String>,
) -> impl IntoResponse {
    let Some(heading) = Heading::from_text(&dir) else {
        return (
            StatusCode::BAD_REQUEST,
            format!("Direction '{dir}' is not one of forward, reverse, left, right"),
        );
    };
    let mut locomotive = state.locomotive.lock().await;
    locomotive.run_up(heading);
    info!(
        event = "run_up",
        heading = heading.as_str(),
        velocity = locomotive.velocity()
    );
    (StatusCode::OK, format!("moving {}", heading.as_str()))
}

async fn point_handler(
    State(state): State<Arc<SimState>>,
    Path(diverging): Path<String>,
) -> impl IntoResponse {
    let route = match diverging.as_str() {
        "true" => Route::Diverging,
        "false" => Route::Through,
        _ => {
            return (
                StatusCode::BAD_REQUEST,
                "Diverging must be 'true' or 'false'".to_string(),
            )
        }
    };
    state.locomotive.lock().await.set_route(route);
    info!(event = "change_point", route = route.as_str(), source = "http");
    (StatusCode::OK, format!("point diverging={diverging}"))
}
