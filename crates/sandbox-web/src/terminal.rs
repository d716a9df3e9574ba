//! Terminal lifecycle (HTTP) and PTY bridge (WebSocket) — C4/C5/C8.

use crate::error::ApiError;
use crate::state::AppState;
use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use bollard::container::LogOutput;
use futures_util::{SinkExt, StreamExt};
use sandbox_types::SandboxError;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;

const DEFAULT_COLS: u16 = 80;
const DEFAULT_ROWS: u16 = 24;

#[derive(Deserialize)]
pub struct StartTerminalRequest {
    pub user_id: String,
}

#[derive(Serialize)]
pub struct StartTerminalResponse {
    pub session_id: String,
    pub container_id: String,
    pub is_new_container: bool,
}

/// `POST /terminal/start`
pub async fn start_terminal(
    State(state): State<AppState>,
    Json(req): Json<StartTerminalRequest>,
) -> Result<Json<StartTerminalResponse>, ApiError> {
    if req.user_id.trim().is_empty() {
        return Err(SandboxError::Validation("user_id is required".to_string()).into());
    }

    let already_running = state.sessions.has_session_for_user(&req.user_id);
    let session = state.sessions.start_session(&req.user_id).await?;

    Ok(Json(StartTerminalResponse {
        session_id: session.session_id,
        container_id: session.container_id,
        is_new_container: !already_running,
    }))
}

#[derive(Serialize)]
pub struct TerminalStatusResponse {
    pub status: &'static str,
}

/// `GET /terminal/{sid}`
pub async fn terminal_status(
    State(state): State<AppState>,
    Path(sid): Path<String>,
) -> Result<Json<TerminalStatusResponse>, ApiError> {
    state
        .sessions
        .lookup(&sid)
        .ok_or_else(|| SandboxError::NotFound(format!("session {sid}")))?;
    Ok(Json(TerminalStatusResponse { status: "RUNNING" }))
}

#[derive(Serialize)]
pub struct OkResponse {
    pub ok: bool,
}

/// `DELETE /terminal/{sid}`
pub async fn end_terminal(
    State(state): State<AppState>,
    Path(sid): Path<String>,
) -> Result<Json<OkResponse>, ApiError> {
    state
        .sessions
        .lookup(&sid)
        .ok_or_else(|| SandboxError::NotFound(format!("session {sid}")))?;
    state.sessions.end_session(&sid);
    Ok(Json(OkResponse { ok: true }))
}

#[derive(Serialize)]
pub struct CleanupResponse {
    pub status: &'static str,
    pub message: String,
}

/// `POST /terminal/cleanup/{user_id}`
pub async fn cleanup_user(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<CleanupResponse>, ApiError> {
    state.sessions.cleanup_user(&user_id).await?;
    Ok(Json(CleanupResponse {
        status: "ok",
        message: format!("cleaned up container for {user_id}"),
    }))
}

#[derive(Deserialize)]
struct ResizeFrame {
    #[serde(rename = "type")]
    kind: String,
    cols: u16,
    rows: u16,
}

/// `GET /terminal/ws/{sid}`: upgrades only if `sid` names a live session.
pub async fn terminal_ws(
    State(state): State<AppState>,
    Path(sid): Path<String>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    match state.sessions.lookup(&sid) {
        Some(session) => ws.on_upgrade(move |socket| pty_bridge(socket, state, session)),
        None => ws.on_upgrade(|mut socket: WebSocket| async move {
            let _ = socket
                .send(Message::Close(Some(CloseFrame {
                    code: 1008,
                    reason: "unknown session".into(),
                })))
                .await;
        }),
    }
}

/// §4.5: opens an interactive exec at 80x24 and runs the up-pump/down-pump
/// pair until either side terminates, then tears both down together.
async fn pty_bridge(ws: WebSocket, state: AppState, session: sandbox_session::Session) {
    let handle = session.handle();
    let driver = state.sessions.driver().clone();

    let exec = match driver
        .open_exec(&handle, &["/bin/bash", "-l"], DEFAULT_COLS, DEFAULT_ROWS)
        .await
    {
        Ok(e) => e,
        Err(e) => {
            tracing::warn!("failed to open exec for session {}: {e}", session.session_id);
            let (mut sink, _) = ws.split();
            let _ = sink
                .send(Message::Close(Some(CloseFrame {
                    code: 1011,
                    reason: "container unavailable".into(),
                })))
                .await;
            return;
        }
    };

    let (mut ws_sender, mut ws_receiver) = ws.split();
    let mut input = exec.input;
    let mut output = exec.output;
    let exec_id = exec.exec_id.clone();

    // down-pump: shell -> client, raw chunks forwarded as binary frames.
    let down = tokio::spawn(async move {
        while let Some(chunk) = output.next().await {
            match chunk {
                Ok(LogOutput::StdOut { message } | LogOutput::StdErr { message } | LogOutput::Console { message }) => {
                    if ws_sender.send(Message::Binary(message.to_vec())).await.is_err() {
                        break;
                    }
                }
                Ok(LogOutput::StdIn { .. }) => {}
                Err(_) => break,
            }
        }
    });

    // up-pump: client -> shell, intercepting resize control frames.
    let driver_for_resize = driver;
    let up = tokio::spawn(async move {
        while let Some(Ok(msg)) = ws_receiver.next().await {
            match msg {
                Message::Text(text) => {
                    if text.trim_start().starts_with('{') {
                        if let Ok(resize) = serde_json::from_str::<ResizeFrame>(&text) {
                            if resize.kind == "resize" {
                                let _ = driver_for_resize
                                    .exec_resize(&exec_id, resize.cols, resize.rows)
                                    .await;
                                continue;
                            }
                        }
                    }
                    if input.write_all(text.as_bytes()).await.is_err() {
                        break;
                    }
                }
                Message::Binary(data) => {
                    if input.write_all(&data).await.is_err() {
                        break;
                    }
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    // Either pump exiting cancels the other. `abort()` is required, not just
    // letting the losing `JoinHandle` future drop: a spawned task keeps
    // running in the background until its future completes or is aborted,
    // so dropping the handle alone would leak the other pump.
    tokio::select! {
        _ = &mut down => { up.abort(); }
        _ = &mut up => { down.abort(); }
    }

    tracing::info!("pty bridge for session {} closed", session.session_id);
}
