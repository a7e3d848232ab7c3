//! Integration tests for the pong server.
//!
//! These tests start a real server instance and connect via WebSocket
//! to verify end-to-end behavior.

use futures_util::{SinkExt, StreamExt};
use pong_server::config::ServerConfig;
use pong_server::http::router;
use pong_server::session::{GameMode, MemorySessionStore, SessionBlob, SessionKey, SessionStore};
use pong_server::ws::AppState;
use pong_shared::protocol::ServerMsg;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_tungstenite::{connect_async, tungstenite::Message};

type Ws = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

/// Start a test server on a random available port.
/// Returns the base WebSocket URL and the store the server checkpoints into.
async fn start_test_server() -> (String, Arc<MemorySessionStore>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let config = ServerConfig {
        listen_addr: addr.to_string(),
        tick_period: Duration::from_millis(2),
        ..Default::default()
    };
    let store = Arc::new(MemorySessionStore::new());
    let app_state = AppState {
        store: store.clone(),
        config: Arc::new(config),
    };
    let app = router(app_state);

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("ws://{}/ws", addr), store)
}

/// Connect to the server and return the WebSocket stream.
async fn connect(base: &str, mode: &str, user: &str) -> Ws {
    let url = format!("{}/{}?user={}", base, mode, user);
    let (ws, _) = connect_async(url).await.expect("Failed to connect");
    ws
}

async fn send_text(ws: &mut Ws, text: &str) {
    ws.send(Message::Text(text.into())).await.unwrap();
}

/// Read the next text message and parse as ServerMsg.
async fn recv_msg(ws: &mut Ws) -> ServerMsg {
    loop {
        match ws.next().await {
            Some(Ok(Message::Text(text))) => {
                return serde_json::from_str(&text).expect("Failed to parse server message");
            }
            Some(Ok(_)) => continue, // Skip ping/pong
            Some(Err(e)) => panic!("WebSocket error: {}", e),
            None => panic!("WebSocket closed unexpectedly"),
        }
    }
}

/// Read the next text message with a timeout.
async fn recv_msg_timeout(ws: &mut Ws, timeout: Duration) -> Option<ServerMsg> {
    tokio::time::timeout(timeout, recv_msg(ws)).await.ok()
}

/// Wait for the store to hold an entry under `key`.
async fn wait_for_checkpoint(store: &MemorySessionStore, key: &SessionKey) -> SessionBlob {
    for _ in 0..100 {
        if let Some(blob) = store.load(key).unwrap() {
            return blob;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("No checkpoint written for {}", key);
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_connect_receives_init_data() {
    let (base, _) = start_test_server().await;
    let mut ws = connect(&base, "normal", "alice").await;

    match recv_msg(&mut ws).await {
        ServerMsg::InitData(init) => {
            assert_eq!(init.left_score, 0);
            assert_eq!(init.right_score, 0);
            assert_eq!(init.players_name, ["player1".to_string(), "player2".to_string()]);
        }
        other => panic!("Expected InitData, got {:?}", other),
    }
}

#[tokio::test]
async fn test_no_state_before_start() {
    let (base, _) = start_test_server().await;
    let mut ws = connect(&base, "normal", "idle").await;
    let _init = recv_msg(&mut ws).await;

    assert!(
        recv_msg_timeout(&mut ws, Duration::from_millis(100))
            .await
            .is_none(),
        "Server should stay quiet until start"
    );
}

#[tokio::test]
async fn test_start_streams_state() {
    let (base, _) = start_test_server().await;
    let mut ws = connect(&base, "normal", "bob").await;
    let _init = recv_msg(&mut ws).await;

    send_text(&mut ws, "start").await;

    match recv_msg_timeout(&mut ws, Duration::from_secs(1)).await {
        Some(ServerMsg::State(state)) => {
            assert_eq!(state.panel1[2], 50.0);
            assert_eq!(state.panel2[2], -50.0);
            assert!(state.ball_pos[2] > 0.0, "Ball should head toward the near paddle");
        }
        other => panic!("Expected State, got {:?}", other),
    }
}

#[tokio::test]
async fn test_pause_and_resume() {
    let (base, _) = start_test_server().await;
    let mut ws = connect(&base, "normal", "carol").await;
    let _init = recv_msg(&mut ws).await;

    send_text(&mut ws, "start").await;
    assert!(matches!(
        recv_msg_timeout(&mut ws, Duration::from_secs(1)).await,
        Some(ServerMsg::State(_))
    ));

    send_text(&mut ws, "pause").await;
    // Drain frames already in flight, then expect silence.
    while recv_msg_timeout(&mut ws, Duration::from_millis(50))
        .await
        .is_some()
    {}
    assert!(
        recv_msg_timeout(&mut ws, Duration::from_millis(100))
            .await
            .is_none(),
        "Paused match should not stream"
    );

    send_text(&mut ws, "resume").await;
    assert!(matches!(
        recv_msg_timeout(&mut ws, Duration::from_secs(1)).await,
        Some(ServerMsg::State(_))
    ));
}

#[tokio::test]
async fn test_malformed_frame_gets_error_and_connection_survives() {
    let (base, _) = start_test_server().await;
    let mut ws = connect(&base, "normal", "dave").await;
    let _init = recv_msg(&mut ws).await;

    send_text(&mut ws, "not json").await;
    match recv_msg_timeout(&mut ws, Duration::from_secs(1)).await {
        Some(ServerMsg::Error(err)) => assert!(!err.message.is_empty()),
        other => panic!("Expected Error, got {:?}", other),
    }

    send_text(&mut ws, "start").await;
    assert!(matches!(
        recv_msg_timeout(&mut ws, Duration::from_secs(1)).await,
        Some(ServerMsg::State(_))
    ));
}

#[tokio::test]
async fn test_disconnect_checkpoints_and_reconnect_resumes() {
    let (base, store) = start_test_server().await;
    let key = SessionKey::new("erin", GameMode::Normal);

    let mut ws = connect(&base, "normal", "erin").await;
    let _init = recv_msg(&mut ws).await;
    send_text(&mut ws, "start").await;
    assert!(matches!(
        recv_msg_timeout(&mut ws, Duration::from_secs(1)).await,
        Some(ServerMsg::State(_))
    ));
    ws.close(None).await.unwrap();

    let saved = wait_for_checkpoint(&store, &key).await;
    assert!(saved.placement.is_some(), "Checkpoint should carry positions");

    let mut ws = connect(&base, "normal", "erin").await;
    match recv_msg(&mut ws).await {
        ServerMsg::InitData(init) => {
            assert_eq!(init.left_score, saved.left_score);
            assert_eq!(init.right_score, saved.right_score);
        }
        other => panic!("Expected InitData, got {:?}", other),
    }
}

#[tokio::test]
async fn test_tournament_uses_stored_roster() {
    let (base, store) = start_test_server().await;
    let key = SessionKey::new("frank", GameMode::Tournament);
    let roster = SessionBlob {
        players_name: vec!["ann".into(), "ben".into(), "cat".into(), "dan".into()],
        ..SessionBlob::fresh(GameMode::Tournament)
    };
    store
        .save(&key, &roster, Duration::from_secs(60))
        .unwrap();

    let mut ws = connect(&base, "tournament", "frank").await;
    match recv_msg(&mut ws).await {
        ServerMsg::InitData(init) => {
            assert_eq!(init.players_name, ["ann".to_string(), "ben".to_string()]);
        }
        other => panic!("Expected InitData, got {:?}", other),
    }
}

#[tokio::test]
async fn test_sessions_are_isolated_per_user() {
    let (base, _) = start_test_server().await;
    let mut ws1 = connect(&base, "normal", "gina").await;
    let mut ws2 = connect(&base, "normal", "hank").await;
    let _ = recv_msg(&mut ws1).await;
    let _ = recv_msg(&mut ws2).await;

    send_text(&mut ws1, "start").await;
    assert!(matches!(
        recv_msg_timeout(&mut ws1, Duration::from_secs(1)).await,
        Some(ServerMsg::State(_))
    ));
    assert!(
        recv_msg_timeout(&mut ws2, Duration::from_millis(100))
            .await
            .is_none(),
        "Another user's start must not drive this connection"
    );
}
