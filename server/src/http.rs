//! Session endpoints and router assembly.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;

use crate::session::{load_or_fresh, GameMode, SessionBlob, SessionKey};
use crate::ws::{ws_handler, AppState};
use pong_shared::config::TOURNAMENT_PLAYERS;

#[derive(Debug, Deserialize)]
pub struct SessionQuery {
    pub user: String,
    #[serde(default)]
    pub mode: String,
}

impl SessionQuery {
    fn key(&self) -> SessionKey {
        SessionKey::new(self.user.clone(), GameMode::from_param(&self.mode))
    }
}

#[derive(Debug, Deserialize)]
pub struct PlayersBody {
    pub user: String,
    pub players_name: Vec<String>,
}

/// All routes: session endpoints plus the game WebSocket.
pub fn router(app_state: AppState) -> Router {
    Router::new()
        .route("/session", get(get_session).delete(delete_session))
        .route("/session/players", post(set_players))
        .route("/ws/{mode}", get(ws_handler))
        .layer(CorsLayer::permissive())
        .with_state(app_state)
}

/// Stored session for (user, mode), or a fresh one.
pub async fn get_session(
    State(app_state): State<AppState>,
    Query(query): Query<SessionQuery>,
) -> Json<SessionBlob> {
    Json(load_or_fresh(app_state.store.as_ref(), &query.key()))
}

/// Register the four tournament entrants ahead of play.
pub async fn set_players(
    State(app_state): State<AppState>,
    Json(body): Json<PlayersBody>,
) -> (StatusCode, Json<Value>) {
    if body.players_name.len() != TOURNAMENT_PLAYERS
        || body.players_name.iter().any(|n| n.trim().is_empty())
    {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "players_name must hold four non-empty names" })),
        );
    }

    let key = SessionKey::new(body.user, GameMode::Tournament);
    let blob = SessionBlob {
        players_name: body.players_name,
        ..SessionBlob::fresh(GameMode::Tournament)
    };
    match app_state.store.save(&key, &blob, app_state.config.setup_ttl) {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({ "message": "Set session success" })),
        ),
        Err(e) => {
            tracing::warn!("Storing roster for {} failed: {}", key, e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "error": e.to_string() })),
            )
        }
    }
}

/// Forget the stored session for (user, mode).
pub async fn delete_session(
    State(app_state): State<AppState>,
    Query(query): Query<SessionQuery>,
) -> (StatusCode, Json<Value>) {
    let key = query.key();
    match app_state.store.delete(&key) {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({ "message": "Delete session success" })),
        ),
        Err(e) => {
            tracing::warn!("Deleting {} failed: {}", key, e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "error": e.to_string() })),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use crate::session::{MemorySessionStore, SessionStore, SessionStoreError};
    use std::sync::Arc;
    use std::time::Duration;

    fn app_state() -> (AppState, Arc<MemorySessionStore>) {
        let store = Arc::new(MemorySessionStore::new());
        let state = AppState {
            store: store.clone(),
            config: Arc::new(ServerConfig::default()),
        };
        (state, store)
    }

    fn query(user: &str, mode: &str) -> Query<SessionQuery> {
        Query(SessionQuery {
            user: user.to_string(),
            mode: mode.to_string(),
        })
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn roster_is_stored_for_tournament() {
        let (state, store) = app_state();
        let (status, _) = set_players(
            State(state.clone()),
            Json(PlayersBody {
                user: "u".into(),
                players_name: names(&["a", "b", "c", "d"]),
            }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let saved = store
            .load(&SessionKey::new("u", GameMode::Tournament))
            .unwrap()
            .unwrap();
        assert_eq!(saved.players_name, names(&["a", "b", "c", "d"]));
        assert_eq!(saved.round, 1);

        let Json(blob) = get_session(State(state), query("u", "tournament")).await;
        assert_eq!(blob, saved);
    }

    #[tokio::test]
    async fn short_roster_rejected() {
        let (state, store) = app_state();
        let (status, Json(body)) = set_players(
            State(state),
            Json(PlayersBody {
                user: "u".into(),
                players_name: names(&["a", "b", " "]),
            }),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
        assert_eq!(
            store.load(&SessionKey::new("u", GameMode::Tournament)).unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn missing_session_reads_as_fresh() {
        let (state, _) = app_state();
        let Json(blob) = get_session(State(state), query("nobody", "")).await;
        assert_eq!(blob, SessionBlob::fresh(GameMode::Normal));
    }

    #[tokio::test]
    async fn delete_clears_session() {
        let (state, store) = app_state();
        let key = SessionKey::new("u", GameMode::Normal);
        store
            .save(&key, &SessionBlob::default(), state.config.checkpoint_ttl)
            .unwrap();

        let (status, _) = delete_session(State(state), query("u", "normal")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(store.load(&key).unwrap(), None);
    }

    struct DownStore;

    impl SessionStore for DownStore {
        fn load(&self, _key: &SessionKey) -> Result<Option<SessionBlob>, SessionStoreError> {
            Err(SessionStoreError::Unavailable("down".into()))
        }

        fn save(
            &self,
            _key: &SessionKey,
            _blob: &SessionBlob,
            _ttl: Duration,
        ) -> Result<(), SessionStoreError> {
            Err(SessionStoreError::Unavailable("down".into()))
        }

        fn delete(&self, _key: &SessionKey) -> Result<(), SessionStoreError> {
            Err(SessionStoreError::Unavailable("down".into()))
        }
    }

    fn down_state() -> AppState {
        AppState {
            store: Arc::new(DownStore),
            config: Arc::new(ServerConfig::default()),
        }
    }

    #[tokio::test]
    async fn roster_store_failure_is_503() {
        let (status, Json(body)) = set_players(
            State(down_state()),
            Json(PlayersBody {
                user: "u".into(),
                players_name: names(&["a", "b", "c", "d"]),
            }),
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(body["error"].as_str().unwrap().contains("down"));
    }

    #[tokio::test]
    async fn delete_store_failure_is_503() {
        let (status, Json(body)) = delete_session(State(down_state()), query("u", "normal")).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn unreadable_store_serves_fresh_session() {
        let Json(blob) = get_session(State(down_state()), query("u", "tournament")).await;
        assert_eq!(blob, SessionBlob::fresh(GameMode::Tournament));
    }
}
