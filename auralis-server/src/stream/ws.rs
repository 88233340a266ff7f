/// The WebSocket transport for a streaming session: connection-level origin
/// checks, the initial state-push burst, per-connection rate limiting, and
/// translation between the wire's JSON envelopes and the `ControlMessage`
/// `/` `ServerMessage` pair the driver in `stream::controller` speaks.
///
/// Unlike a silent-drop on an unrecognized message type, every malformed or
/// unknown envelope here is logged and answered with a sanitized `error`
/// message -- a client misbehaving (or a protocol skew across a deploy)
/// should be visible, not swallowed.
use crate::repository::{FingerprintsRepo, TracksRepo};
use crate::security;
use crate::state::AppState;
use crate::stream::{ControlMessage, ServerMessage, StreamController};
use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::{header, HeaderMap};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

type WsSink = futures::stream::SplitSink<WebSocket, Message>;

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>, headers: HeaderMap) -> impl IntoResponse {
    let origin = headers.get(header::ORIGIN).and_then(|v| v.to_str().ok()).map(str::to_string);

    if !security::origin_allowed(&state.origin_allowlist, origin.as_deref()) {
        tracing::warn!(?origin, "websocket connection rejected: origin not allowlisted");
        return ws.on_upgrade(close_with_policy_violation);
    }

    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn close_with_policy_violation(mut socket: WebSocket) {
    let _ = socket
        .send(Message::Close(Some(CloseFrame {
            code: 1008,
            reason: "origin not allowed".into(),
        })))
        .await;
}

/// Logs connection teardown; the session task (if any) is aborted by the
/// caller before this drops, so there's nothing else to release here beyond
/// the log line itself.
struct ConnectionGuard {
    connected_at: Instant,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        tracing::debug!(connected_ms = self.connected_at.elapsed().as_millis(), "websocket connection closed");
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClientMessage {
    Ping,
    PlayEnhanced { track_id: u32, preset: String, intensity: f32 },
    PlayNormal { track_id: u32 },
    Pause,
    Resume,
    Seek { position_s: f64 },
    Stop,
    SetPresetIntensity { preset: String, intensity: f32 },
    SubscribeJobProgress { job_id: String },
    AbTrackLoaded { track_id: u32 },
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
enum OutMessage {
    Pong,
    Error { kind: String, message: String },
    PlayerState(crate::models::player_state::PlayerStateSnapshot),
    PositionChanged { position_s: f64 },
}

/// Fixed-window limiter: at most `limit` messages accepted per rolling
/// one-second window, reset lazily on the first message past the window.
struct RateLimiter {
    limit: u32,
    window_start: Instant,
    count: u32,
}

impl RateLimiter {
    fn new(limit: u32) -> Self {
        Self { limit, window_start: Instant::now(), count: 0 }
    }

    fn allow(&mut self) -> bool {
        if self.window_start.elapsed() >= Duration::from_secs(1) {
            self.window_start = Instant::now();
            self.count = 0;
        }
        if self.count >= self.limit {
            return false;
        }
        self.count += 1;
        true
    }
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let _guard = ConnectionGuard { connected_at: Instant::now() };
    let (mut sink, mut incoming) = socket.split();

    let snapshot = state.player.snapshot();
    if send_out(&mut sink, &OutMessage::PlayerState(snapshot)).await.is_err() {
        return;
    }

    // No session is running until the first `play_enhanced`/`play_normal`;
    // each one replaces this with a fresh channel pair bound to its own
    // spawned `StreamController::run` task.
    let mut control_tx: Option<mpsc::Sender<ControlMessage>> = None;
    let (server_tx, mut server_rx) = mpsc::channel::<ServerMessage>(64);
    let mut session_handle: Option<tokio::task::JoinHandle<()>> = None;

    let mut rate_limiter = RateLimiter::new(crate::constants::WS_RATE_LIMIT_PER_SEC);
    let mut position_ticker = tokio::time::interval(Duration::from_secs(1));
    position_ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            incoming_msg = incoming.next() => {
                match incoming_msg {
                    Some(Ok(Message::Text(text))) => {
                        if !rate_limiter.allow() {
                            let _ = send_out(&mut sink, &OutMessage::Error {
                                kind: "backpressure".to_string(),
                                message: "message rate limit exceeded".to_string(),
                            }).await;
                            continue;
                        }
                        let should_stop = handle_client_text(
                            &text,
                            &state,
                            &mut control_tx,
                            &server_tx,
                            &mut session_handle,
                            &mut sink,
                        ).await;
                        if should_stop {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::debug!(error = %e, "websocket read error");
                        break;
                    }
                }
            }
            Some(server_msg) = server_rx.recv() => {
                if send_stream_message(&mut sink, &server_msg).await.is_err() {
                    break;
                }
            }
            _ = position_ticker.tick() => {
                let snapshot = state.player.snapshot();
                if send_out(&mut sink, &OutMessage::PositionChanged {
                    position_s: snapshot.position_samples as f64 / 44100.0,
                }).await.is_err() {
                    break;
                }
            }
        }
    }

    if let Some(handle) = session_handle.take() {
        handle.abort();
    }
}

async fn handle_client_text(
    text: &str,
    state: &Arc<AppState>,
    control_tx: &mut Option<mpsc::Sender<ControlMessage>>,
    server_tx: &mpsc::Sender<ServerMessage>,
    session_handle: &mut Option<tokio::task::JoinHandle<()>>,
    sink: &mut WsSink,
) -> bool {
    let parsed: Result<ClientMessage, _> = serde_json::from_str(text);
    let msg = match parsed {
        Ok(m) => m,
        Err(e) => {
            tracing::warn!(error = %e, raw = %text, "unrecognized websocket message");
            let _ = send_out(
                sink,
                &OutMessage::Error {
                    kind: "invalid".to_string(),
                    message: "unrecognized message type".to_string(),
                },
            )
            .await;
            return false;
        }
    };

    match msg {
        ClientMessage::Ping => {
            let _ = send_out(sink, &OutMessage::Pong).await;
        }
        ClientMessage::PlayEnhanced { track_id, preset, intensity } => {
            start_session(state, track_id, preset, intensity, control_tx, server_tx, session_handle, sink).await;
        }
        ClientMessage::PlayNormal { track_id } => {
            start_session(state, track_id, "natural".to_string(), 0.0, control_tx, server_tx, session_handle, sink).await;
        }
        ClientMessage::Pause => {
            state.player.pause();
            let _ = send_control(control_tx, ControlMessage::Pause).await;
        }
        ClientMessage::Resume => {
            state.player.resume();
            let _ = send_control(control_tx, ControlMessage::Resume).await;
        }
        ClientMessage::Seek { position_s } => {
            state.player.seek((position_s * 44100.0) as u64);
            let _ = send_control(control_tx, ControlMessage::Seek { position_s }).await;
        }
        ClientMessage::Stop => {
            let _ = send_control(control_tx, ControlMessage::Abort).await;
            if let Some(handle) = session_handle.take() {
                handle.abort();
            }
        }
        ClientMessage::SetPresetIntensity { preset, intensity } => {
            let _ = send_control(control_tx, ControlMessage::UpdateSettings { preset, intensity }).await;
        }
        ClientMessage::SubscribeJobProgress { job_id } => {
            tracing::debug!(job_id, "job progress subscription noted (no active job tracker yet)");
        }
        ClientMessage::AbTrackLoaded { track_id } => {
            tracing::debug!(track_id, "a/b comparison track loaded");
        }
    }
    false
}

async fn start_session(
    state: &Arc<AppState>,
    track_id: u32,
    preset: String,
    intensity: f32,
    control_tx: &mut Option<mpsc::Sender<ControlMessage>>,
    server_tx: &mpsc::Sender<ServerMessage>,
    session_handle: &mut Option<tokio::task::JoinHandle<()>>,
    sink: &mut WsSink,
) {
    if let Some(handle) = session_handle.take() {
        handle.abort();
    }

    let track = match TracksRepo::get(&*state.library, track_id) {
        Ok(t) => t,
        Err(e) => {
            let _ = send_out(sink, &OutMessage::Error { kind: e.kind.to_string(), message: e.client_message().to_string() }).await;
            return;
        }
    };
    let fingerprint = FingerprintsRepo::get(&*state.library, track_id)
        .ok()
        .flatten()
        .unwrap_or_else(auralis_dsp::fingerprint::Fingerprint::placeholder);

    // Each session gets its own control channel: the previous one's receiver
    // was already moved into the just-aborted session task.
    let (new_tx, inbox) = mpsc::channel::<ControlMessage>(32);
    *control_tx = Some(new_tx);

    state.player.play(track_id);

    let controller = StreamController::new(state.semaphore.clone());
    let ctx = crate::stream::controller::SessionContext {
        track_id,
        filepath: track.filepath.clone(),
        fingerprint,
        cache: state.cache.clone(),
        player: state.player.clone(),
        library: state.library.clone(),
    };
    let outbound = server_tx.clone();
    let handle = tokio::spawn(async move {
        controller.run(ctx, preset, intensity, inbox, outbound).await;
    });
    *session_handle = Some(handle);
}

async fn send_control(control_tx: &Option<mpsc::Sender<ControlMessage>>, msg: ControlMessage) -> Result<(), ()> {
    match control_tx {
        Some(tx) => tx.send(msg).await.map_err(|_| ()),
        None => Err(()),
    }
}

async fn send_out(sink: &mut WsSink, msg: &OutMessage) -> Result<(), axum::Error> {
    let text = serde_json::to_string(msg).expect("OutMessage always serializes");
    sink.send(Message::Text(text)).await
}

async fn send_stream_message(sink: &mut WsSink, msg: &ServerMessage) -> Result<(), axum::Error> {
    let text = serde_json::to_string(msg).expect("ServerMessage always serializes");
    sink.send(Message::Text(text)).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limiter_allows_up_to_the_configured_burst_then_blocks() {
        let mut limiter = RateLimiter::new(3);
        assert!(limiter.allow());
        assert!(limiter.allow());
        assert!(limiter.allow());
        assert!(!limiter.allow());
    }

    #[test]
    fn unknown_message_type_fails_to_parse_rather_than_silently_matching() {
        let parsed: Result<ClientMessage, _> = serde_json::from_str(r#"{"type":"not_a_real_type"}"#);
        assert!(parsed.is_err());
    }
}
