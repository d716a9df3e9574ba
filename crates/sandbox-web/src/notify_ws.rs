//! `GET /db_update/ws/{user_id}` — notification subscription endpoint (C7).

use crate::state::AppState;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::time::interval;

const PING_INTERVAL: Duration = Duration::from_secs(30);

pub async fn notify_ws(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_subscription(socket, state, user_id))
}

async fn handle_subscription(ws: WebSocket, state: AppState, user_id: String) {
    let mut events = state.notify.subscribe(&user_id);
    let (mut sender, mut receiver) = ws.split();
    let mut ticker = interval(PING_INTERVAL);
    let mut missed_pings = 0u8;

    loop {
        tokio::select! {
            event = events.recv() => {
                match event {
                    Ok(event) => {
                        let payload = match serde_json::to_string(&event) {
                            Ok(p) => p,
                            Err(_) => continue,
                        };
                        if sender.send(Message::Text(payload)).await.is_err() {
                            break;
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
            _ = ticker.tick() => {
                missed_pings += 1;
                if missed_pings > 1 {
                    break;
                }
                if sender.send(Message::Text("{\"type\":\"ping\"}".to_string())).await.is_err() {
                    break;
                }
            }
            incoming = receiver.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        if text == "ping" {
                            if sender.send(Message::Text("pong".to_string())).await.is_err() {
                                break;
                            }
                        }
                        missed_pings = 0;
                    }
                    Some(Ok(Message::Pong(_))) => missed_pings = 0,
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(_)) => break,
                    _ => {}
                }
            }
        }
    }

    tracing::info!("notification subscription for {} closed", user_id);
}
