use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Extension, Query,
    },
    http::{HeaderMap, Uri},
    response::{IntoResponse, Response},
};
use futures_util::{SinkExt, StreamExt};
use parley_core::{Identity, ParleyError};
use parley_notify::{Connection, SessionManager};
use serde::Deserialize;

use crate::auth::bearer_token;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct WsQuery {
    #[serde(default)]
    token: Option<String>,
}

/// Verifies the credential before upgrading, so a bad token never gets a socket.
pub async fn websocket_handler(
    Extension(state): Extension<AppState>,
    uri: Uri,
    headers: HeaderMap,
    Query(query): Query<WsQuery>,
    ws: Option<WebSocketUpgrade>,
) -> Response {
    let path = uri.path().to_string();
    let token = match bearer_token(&headers).or(query.token) {
        Some(token) => token,
        None => return ApiError::new(ParleyError::InvalidToken, path).into_response(),
    };

    let identity = match state.sessions.authenticate(&token).await {
        Ok(identity) => identity,
        Err(e) => return ApiError::new(e, path).into_response(),
    };

    match ws {
        Some(ws) => {
            let sessions = state.sessions.clone();
            ws.on_upgrade(move |socket| handle_socket(socket, sessions, identity))
        }
        None => ApiError::new(
            ParleyError::InvalidInput("expected a websocket upgrade".to_string()),
            path,
        )
        .into_response(),
    }
}

async fn handle_socket(socket: WebSocket, sessions: SessionManager, identity: Identity) {
    let Connection { guard, mut events } = sessions.attach(identity);
    let (mut sender, mut receiver) = socket.split();

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                let text = match event.to_json() {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::warn!("Failed to encode {:?} event: {}", event.event_type, e);
                        continue;
                    }
                };
                if let Err(e) = sender.send(Message::Text(text)).await {
                    tracing::debug!("Send to connection {} failed: {}", guard.connection_id(), e);
                    break;
                }
            }
            incoming = receiver.next() => {
                match incoming {
                    Some(Ok(Message::Ping(payload))) => {
                        if sender.send(Message::Pong(payload)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Text(text))) if text.trim() == "ping" => {
                        if sender.send(Message::Text("pong".to_string())).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        tracing::debug!("Connection {} errored: {}", guard.connection_id(), e);
                        break;
                    }
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    // Unregisters the handle.
    drop(guard);
}
