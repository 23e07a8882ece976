//! WebSocket upgrade handler

use axum::{
    extract::{
        ws::{Message as WsMessage, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use bytes::Bytes;
use futures::{
    stream::{SplitSink, SplitStream},
    SinkExt, StreamExt,
};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::net::{decode, Channel, PeerId};
use crate::util::rate_limit::PeerRateLimiter;

use super::session::{Datagram, PeerEvent, RELIABLE_CAPACITY};

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, state: AppState) {
    let peer = Uuid::new_v4();
    info!(peer = %peer, "new WebSocket connection");

    let (ws_sink, ws_stream) = socket.split();

    // Register before announcing so the welcome has somewhere to go
    let (reliable_tx, reliable_rx) = mpsc::channel(RELIABLE_CAPACITY);
    state.peers.insert(peer, reliable_tx);
    let unreliable_rx = state.unreliable_tx.subscribe();

    if state.inbound_tx.send(PeerEvent::Joined(peer)).await.is_err() {
        error!(peer = %peer, "authority loop is gone");
        state.peers.remove(&peer);
        return;
    }

    run_session(peer, &state, ws_sink, ws_stream, reliable_rx, unreliable_rx).await;

    state.peers.remove(&peer);
    let _ = state.inbound_tx.send(PeerEvent::Left(peer)).await;

    info!(peer = %peer, "WebSocket connection closed");
}

/// Run the WebSocket session with read/write split
async fn run_session(
    peer: PeerId,
    state: &AppState,
    ws_sink: SplitSink<WebSocket, WsMessage>,
    mut ws_stream: SplitStream<WebSocket>,
    reliable_rx: mpsc::Receiver<Bytes>,
    unreliable_rx: broadcast::Receiver<Datagram>,
) {
    let rate_limiter = PeerRateLimiter::new(state.config.tick_rate);
    let mut writer_handle = tokio::spawn(write_frames(peer, ws_sink, reliable_rx, unreliable_rx));

    // Reader loop: WebSocket -> authority loop, until either side is done
    loop {
        let result = tokio::select! {
            next = ws_stream.next() => match next {
                Some(result) => result,
                None => break,
            },
            _ = &mut writer_handle => {
                debug!(peer = %peer, "writer stopped, ending session");
                break;
            }
        };

        match result {
            Ok(WsMessage::Binary(data)) => {
                let msg = match decode(&data) {
                    Ok(msg) => msg,
                    Err(e) => {
                        warn!(peer = %peer, error = %e, "failed to decode frame");
                        continue;
                    }
                };

                let allowed = match msg.channel() {
                    Channel::Unreliable => rate_limiter.check_movement(),
                    Channel::Reliable => rate_limiter.check_reliable(),
                };
                if !allowed {
                    debug!(peer = %peer, message = msg.name(), "rate limited");
                    continue;
                }

                if state.inbound_tx.send(PeerEvent::Message(peer, msg)).await.is_err() {
                    debug!(peer = %peer, "inbound channel closed");
                    break;
                }
            }
            Ok(WsMessage::Text(_)) => {
                warn!(peer = %peer, "received text frame, ignoring");
            }
            Ok(WsMessage::Ping(_)) | Ok(WsMessage::Pong(_)) => {}
            Ok(WsMessage::Close(_)) => {
                info!(peer = %peer, "client initiated close");
                break;
            }
            Err(e) => {
                error!(peer = %peer, error = %e, "WebSocket error");
                break;
            }
        }
    }

    writer_handle.abort();
}

/// Writer task: reliable queue and unreliable multicast -> WebSocket
async fn write_frames(
    peer: PeerId,
    mut ws_sink: SplitSink<WebSocket, WsMessage>,
    mut reliable_rx: mpsc::Receiver<Bytes>,
    mut unreliable_rx: broadcast::Receiver<Datagram>,
) {
    loop {
        let frame = tokio::select! {
            biased;
            frame = reliable_rx.recv() => match frame {
                Some(frame) => frame,
                None => {
                    debug!(peer = %peer, "reliable queue closed");
                    break;
                }
            },
            datagram = unreliable_rx.recv() => match datagram {
                Ok(datagram) if datagram.target.includes(peer) => datagram.frame,
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    // Skipping is exactly what unreliable delivery allows
                    debug!(peer = %peer, skipped = n, "peer lagged behind multicast");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        };

        if let Err(e) = ws_sink.send(WsMessage::Binary(frame.to_vec())).await {
            debug!(peer = %peer, error = %e, "WebSocket send failed");
            break;
        }
    }
    let _ = ws_sink.close().await;
}
