use futures_util::{SinkExt, StreamExt};
use throttle_core::TransportEvent;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};
use url::Url;

/// Owns the websocket for one connection attempt.
///
/// Inbound text frames and lifecycle changes go to `events`; strings read from
/// `outbound` are written as text frames. The loop ends on close, on error, or
/// once `outbound` is dropped. There is no reconnect.
pub async fn socket_loop(
    url: Url,
    events: mpsc::Sender<TransportEvent>,
    mut outbound: mpsc::Receiver<String>,
) {
    let (mut ws, _) = match connect_async(url.as_str()).await {
        Ok(value) => value,
        Err(err) => {
            warn!(event = "connect_error", url = %url, error = %err);
            let _ = events.send(TransportEvent::Errored(err.to_string())).await;
            return;
        }
    };
    info!(event = "connected", url = %url);
    if events.send(TransportEvent::Opened).await.is_err() {
        let _ = ws.close(None).await;
        return;
    }

    loop {
        tokio::select! {
            incoming = ws.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        if events.send(TransportEvent::Frame(text)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Binary(bytes))) => {
                        warn!(event = "binary_frame_dropped", size = bytes.len());
                    }
                    Some(Ok(Message::Close(frame))) => {
                        info!(event = "server_close", frame = ?frame);
                        let _ = events.send(TransportEvent::Closed).await;
                        return;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(err)) => {
                        warn!(event = "socket_error", error = %err);
                        let _ = events.send(TransportEvent::Errored(err.to_string())).await;
                        return;
                    }
                    None => {
                        let _ = events.send(TransportEvent::Closed).await;
                        return;
                    }
                }
            }
            message = outbound.recv() => {
                match message {
                    Some(text) => {
                        debug!(event = "frame_out", size = text.len());
                        if let Err(err) = ws.send(Message::Text(text)).await {
                            warn!(event = "send_error", error = %err);
                            let _ = events.send(TransportEvent::Errored(err.to_string())).await;
                            return;
                        }
                    }
                    None => break,
                }
            }
        }
    }

    info!(event = "socket_shutdown");
    let _ = ws.close(None).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::net::TcpListener;
    use tokio_tungstenite::accept_async;

    const WAIT: Duration = Duration::from_secs(5);

    async fn next_event(events: &mut mpsc::Receiver<TransportEvent>) -> Option<TransportEvent> {
        tokio::time::timeout(WAIT, events.recv())
            .await
            .expect("event in time")
    }

    fn move_url(addr: std::net::SocketAddr) -> Url {
        Url::parse(&format!("ws://{addr}/move")).expect("url")
    }

    #[tokio::test]
    async fn refused_connect_reports_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        drop(listener);

        let (events_tx, mut events_rx) = mpsc::channel(8);
        let (_outbound_tx, outbound_rx) = mpsc::channel(8);
        socket_loop(move_url(addr), events_tx, outbound_rx).await;

        assert!(matches!(
            next_event(&mut events_rx).await,
            Some(TransportEvent::Errored(_))
        ));
        assert_eq!(next_event(&mut events_rx).await, None);
    }

    #[tokio::test]
    async fn relays_text_drops_binary_and_closes_when_outbound_ends() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("addr");
        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.expect("accept");
            let mut ws = accept_async(stream).await.expect("handshake");
            ws.send(Message::Binary(vec![1, 2, 3])).await.expect("binary");
            ws.send(Message::Text(r#"{"type":"pong"}"#.to_string()))
                .await
                .expect("text");
            let mut received = Vec::new();
            let mut saw_close = false;
            while let Some(Ok(message)) = ws.next().await {
                match message {
                    Message::Text(text) => received.push(text),
                    Message::Close(_) => {
                        saw_close = true;
                        break;
                    }
                    _ => {}
                }
            }
            (received, saw_close)
        });

        let (events_tx, mut events_rx) = mpsc::channel(8);
        let (outbound_tx, outbound_rx) = mpsc::channel(8);
        let client = tokio::spawn(socket_loop(move_url(addr), events_tx, outbound_rx));

        assert_eq!(next_event(&mut events_rx).await, Some(TransportEvent::Opened));
        assert_eq!(
            next_event(&mut events_rx).await,
            Some(TransportEvent::Frame(r#"{"type":"pong"}"#.to_string()))
        );

        outbound_tx
            .send(r#"{"type":"ping","text":""}"#.to_string())
            .await
            .expect("queue");
        drop(outbound_tx);

        tokio::time::timeout(WAIT, client)
            .await
            .expect("client stops")
            .expect("client task");
        let (received, saw_close) = tokio::time::timeout(WAIT, server)
            .await
            .expect("server stops")
            .expect("server task");
        assert_eq!(received, vec![r#"{"type":"ping","text":""}"#.to_string()]);
        assert!(saw_close);
        assert_eq!(next_event(&mut events_rx).await, None);
    }
}
