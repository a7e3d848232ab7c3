use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use std::sync::Arc;

use crate::config::ServerConfig;
use crate::orchestrator::{connection_channel, ConnectionOrchestrator};
use crate::session::{GameMode, SessionKey, SessionStore};

/// Frames buffered in each direction between the socket and the game loop.
const CHANNEL_CAPACITY: usize = 256;

/// Shared app state passed to each handler
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn SessionStore>,
    pub config: Arc<ServerConfig>,
}

/// Caller identity; authentication happens in front of this server.
#[derive(Debug, Deserialize)]
pub struct UserQuery {
    pub user: String,
}

/// HTTP handler for WebSocket upgrade on `/ws/{mode}?user=...`
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(mode): Path<String>,
    Query(query): Query<UserQuery>,
    State(app_state): State<AppState>,
) -> impl IntoResponse {
    let key = SessionKey::new(query.user, GameMode::from_param(&mode));
    ws.on_upgrade(move |socket| handle_socket(socket, key, app_state))
}

async fn handle_socket(socket: WebSocket, key: SessionKey, app_state: AppState) {
    let (mut sink, mut stream) = socket.split();

    let (mut client, io) = connection_channel(CHANNEL_CAPACITY);
    let orchestrator =
        ConnectionOrchestrator::connect(key.clone(), app_state.store.clone(), &app_state.config);
    let game = tokio::spawn(orchestrator.run(io));

    tracing::info!("Client {} connected", key);

    loop {
        tokio::select! {
            // Client -> Server
            msg = stream.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if client.to_server.send(text.as_str().to_owned()).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    _ => {} // Ignore ping/pong/binary
                }
            }

            // Server -> Client
            frame = client.from_server.recv() => {
                let Some(frame) = frame else {
                    break;
                };
                match serde_json::to_string(&frame) {
                    Ok(json) => {
                        if sink.send(Message::Text(json.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => tracing::warn!("Client {}: unserializable frame: {}", key, e),
                }
            }
        }
    }

    // Closing our end of the channel stops the loop, which checkpoints on exit.
    drop(client);
    if let Err(e) = game.await {
        tracing::error!("Game task for {} failed: {}", key, e);
    }
    tracing::info!("Client {} disconnected", key);
}
