//! Load test for the pong server.
//!
//! Spawns multiple fake WebSocket clients that:
//! - Connect to the server, each under its own user id
//! - Start a match and mash movement keys at random
//! - Count state, score and match_end frames
//!
//! Usage: cargo run --bin loadtest -- [OPTIONS]
//!
//! Options:
//!   --clients N     Number of clients to spawn (default: 50)
//!   --duration S    Test duration in seconds (default: 30)
//!   --key-rate R    Key frames per second per client (default: 10)
//!   --seed N        Seed for the key generator (default: 1)
//!   --url URL       Server base URL (default: ws://127.0.0.1:8000/ws/normal)

use futures_util::{SinkExt, StreamExt};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Deserialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_tungstenite::{connect_async, tungstenite::Message};

const KEYS: [&str; 8] = [
    "KeyW",
    "KeyA",
    "KeyS",
    "KeyD",
    "ArrowUp",
    "ArrowLeft",
    "ArrowDown",
    "ArrowRight",
];

// === Protocol types (minimal subset) ===

#[derive(Deserialize)]
#[serde(tag = "type")]
enum ServerMsg {
    #[serde(rename = "init_data")]
    InitData {},
    #[serde(rename = "state")]
    State {},
    #[serde(rename = "score")]
    Score {},
    #[serde(rename = "match_end")]
    MatchEnd { session_complete: bool },
    #[serde(rename = "error")]
    Error { message: String },
}

// === Metrics ===

struct Metrics {
    connected: AtomicU64,
    states_received: AtomicU64,
    scores_received: AtomicU64,
    matches_finished: AtomicU64,
    key_frames_sent: AtomicU64,
    errors: AtomicU64,
    latency_sum_ms: AtomicU64,
    latency_count: AtomicU64,
}

impl Metrics {
    fn new() -> Self {
        Self {
            connected: AtomicU64::new(0),
            states_received: AtomicU64::new(0),
            scores_received: AtomicU64::new(0),
            matches_finished: AtomicU64::new(0),
            key_frames_sent: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            latency_sum_ms: AtomicU64::new(0),
            latency_count: AtomicU64::new(0),
        }
    }
}

/// A random press or release of one movement key.
fn key_frame(rng: &mut ChaCha8Rng) -> String {
    let code = KEYS[rng.gen_range(0..KEYS.len())];
    let pressed: bool = rng.gen();
    serde_json::json!({ code: pressed }).to_string()
}

// === Client task ===

async fn run_client(
    client_id: u32,
    url: String,
    key_rate: f64,
    duration: Duration,
    seed: u64,
    metrics: Arc<Metrics>,
) {
    let connect_start = Instant::now();

    let (mut ws, _) = match connect_async(&url).await {
        Ok(conn) => conn,
        Err(e) => {
            if client_id < 5 {
                eprintln!("Client {} failed to connect: {}", client_id, e);
            }
            metrics.errors.fetch_add(1, Ordering::Relaxed);
            return;
        }
    };

    let connect_latency = connect_start.elapsed();
    metrics
        .latency_sum_ms
        .fetch_add(connect_latency.as_millis() as u64, Ordering::Relaxed);
    metrics.latency_count.fetch_add(1, Ordering::Relaxed);
    metrics.connected.fetch_add(1, Ordering::Relaxed);

    if ws.send(Message::Text("start".into())).await.is_err() {
        metrics.errors.fetch_add(1, Ordering::Relaxed);
        metrics.connected.fetch_sub(1, Ordering::Relaxed);
        return;
    }

    let key_interval = if key_rate > 0.0 {
        Duration::from_secs_f64(1.0 / key_rate)
    } else {
        Duration::from_secs(3600)
    };
    let mut key_timer = tokio::time::interval(key_interval);
    key_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    let mut rng = ChaCha8Rng::seed_from_u64(seed.wrapping_add(client_id as u64));
    let test_end = Instant::now() + duration;

    loop {
        if Instant::now() >= test_end {
            break;
        }

        tokio::select! {
            _ = key_timer.tick() => {
                let frame = key_frame(&mut rng);
                if ws.send(Message::Text(frame.into())).await.is_ok() {
                    metrics.key_frames_sent.fetch_add(1, Ordering::Relaxed);
                } else {
                    metrics.errors.fetch_add(1, Ordering::Relaxed);
                    break;
                }
            }

            msg = ws.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<ServerMsg>(&text) {
                            Ok(ServerMsg::State {}) => {
                                metrics.states_received.fetch_add(1, Ordering::Relaxed);
                            }
                            Ok(ServerMsg::Score {}) => {
                                metrics.scores_received.fetch_add(1, Ordering::Relaxed);
                            }
                            Ok(ServerMsg::MatchEnd { session_complete }) => {
                                metrics.matches_finished.fetch_add(1, Ordering::Relaxed);
                                if session_complete {
                                    break;
                                }
                            }
                            Ok(ServerMsg::Error { message }) => {
                                if client_id < 3 {
                                    eprintln!("Client {} got error: {}", client_id, message);
                                }
                                metrics.errors.fetch_add(1, Ordering::Relaxed);
                            }
                            Ok(ServerMsg::InitData {}) | Err(_) => {}
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        if client_id < 3 {
                            eprintln!("Client {} error: {}", client_id, e);
                        }
                        metrics.errors.fetch_add(1, Ordering::Relaxed);
                        break;
                    }
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    let _ = ws.close(None).await;
    metrics.connected.fetch_sub(1, Ordering::Relaxed);
}

// === Main ===

#[tokio::main]
async fn main() {
    let args: Vec<String> = std::env::args().collect();

    let mut num_clients: u32 = 50;
    let mut duration_secs: u64 = 30;
    let mut key_rate: f64 = 10.0;
    let mut seed: u64 = 1;
    let mut url = "ws://127.0.0.1:8000/ws/normal".to_string();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--clients" => {
                i += 1;
                num_clients = args.get(i).and_then(|s| s.parse().ok()).unwrap_or(50);
            }
            "--duration" => {
                i += 1;
                duration_secs = args.get(i).and_then(|s| s.parse().ok()).unwrap_or(30);
            }
            "--key-rate" => {
                i += 1;
                key_rate = args.get(i).and_then(|s| s.parse().ok()).unwrap_or(10.0);
            }
            "--seed" => {
                i += 1;
                seed = args.get(i).and_then(|s| s.parse().ok()).unwrap_or(1);
            }
            "--url" => {
                i += 1;
                url = args.get(i).cloned().unwrap_or(url);
            }
            _ => {}
        }
        i += 1;
    }

    println!("=== Pong Server Load Test ===");
    println!("Clients: {}", num_clients);
    println!("Duration: {}s", duration_secs);
    println!("Key rate: {}/s per client", key_rate);
    println!("Seed: {}", seed);
    println!("URL: {}", url);
    println!();

    let metrics = Arc::new(Metrics::new());
    let duration = Duration::from_secs(duration_secs);

    let mut handles = Vec::with_capacity(num_clients as usize);
    let spawn_start = Instant::now();

    for client_id in 0..num_clients {
        let client_url = format!("{}?user=load{}", url, client_id);
        let metrics = Arc::clone(&metrics);

        handles.push(tokio::spawn(async move {
            run_client(client_id, client_url, key_rate, duration, seed, metrics).await;
        }));

        // Stagger spawns slightly to avoid thundering herd
        if client_id % 50 == 49 {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    println!("All clients spawned in {:?}", spawn_start.elapsed());
    println!();

    let metrics_clone = Arc::clone(&metrics);
    let stats_handle = tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(5));
        let start = Instant::now();

        loop {
            interval.tick().await;
            let elapsed = start.elapsed().as_secs();
            if elapsed >= duration_secs + 5 {
                break;
            }

            println!(
                "[{:3}s] connected={}, states={}, scores={}, matches={}, keys={}, errors={}",
                elapsed,
                metrics_clone.connected.load(Ordering::Relaxed),
                metrics_clone.states_received.load(Ordering::Relaxed),
                metrics_clone.scores_received.load(Ordering::Relaxed),
                metrics_clone.matches_finished.load(Ordering::Relaxed),
                metrics_clone.key_frames_sent.load(Ordering::Relaxed),
                metrics_clone.errors.load(Ordering::Relaxed),
            );
        }
    });

    for handle in handles {
        let _ = handle.await;
    }

    stats_handle.abort();

    println!();
    println!("=== Final Results ===");
    let states = metrics.states_received.load(Ordering::Relaxed);
    let latency_sum = metrics.latency_sum_ms.load(Ordering::Relaxed);
    let latency_count = metrics.latency_count.load(Ordering::Relaxed);

    println!("Total state frames: {}", states);
    println!(
        "Total score frames: {}",
        metrics.scores_received.load(Ordering::Relaxed)
    );
    println!(
        "Matches finished: {}",
        metrics.matches_finished.load(Ordering::Relaxed)
    );
    println!(
        "Key frames sent: {}",
        metrics.key_frames_sent.load(Ordering::Relaxed)
    );
    println!("Total errors: {}", metrics.errors.load(Ordering::Relaxed));

    if latency_count > 0 {
        println!("Average connect latency: {}ms", latency_sum / latency_count);
    }

    let states_per_client_sec = if num_clients > 0 && duration_secs > 0 {
        states as f64 / num_clients as f64 / duration_secs as f64
    } else {
        0.0
    };
    println!("State frames per client per second: {:.1}", states_per_client_sec);
}
