//! Load test for the pong server.
//!
//! Spawns multiple fake WebSocket clients that:
//! - Connect to the server and send join-game
//! - Periodically send paddle-move for their own slot
//! - Receive and count game-state snapshots
//!
//! Usage: cargo run --bin loadtest -- [OPTIONS]
//!
//! Clients pair up into rooms in arrival order, so an even client count
//! keeps every room ticking.

use clap::Parser;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::json;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_tungstenite::{connect_async, tungstenite::Message};

#[derive(Parser, Debug)]
#[clap(about = "Drive many fake players against a pong server")]
struct Args {
    /// Number of clients to spawn
    #[clap(long, default_value_t = 100)]
    clients: u32,
    /// Test duration in seconds
    #[clap(long, default_value_t = 30)]
    duration: u64,
    /// Paddle moves per second per client
    #[clap(long, default_value_t = 20.0)]
    move_rate: f64,
    /// Server URL
    #[clap(long, default_value = "ws://127.0.0.1:4000/ws")]
    url: String,
    /// Expected snapshot rate of a ticking room
    #[clap(long, default_value_t = 60)]
    tick_rate: u32,
}

// === Protocol types (minimal subset) ===

#[derive(Deserialize)]
#[serde(tag = "type", content = "data")]
enum ServerMsg {
    #[serde(rename = "player-joined")]
    PlayerJoined {
        #[serde(rename = "playerId")]
        player_id: u32,
    },
    #[serde(rename = "game-state")]
    GameState {},
    #[serde(rename = "game-ended")]
    GameEnded {},
    #[serde(rename = "error")]
    Error(String),
}

// === Metrics ===

#[derive(Default)]
struct Metrics {
    connected: AtomicU64,
    seated: AtomicU64,
    messages_received: AtomicU64,
    game_states_received: AtomicU64,
    games_ended: AtomicU64,
    paddle_moves_sent: AtomicU64,
    join_errors: AtomicU64,
    errors: AtomicU64,
    latency_sum_ms: AtomicU64,
    latency_count: AtomicU64,
}

// === Client task ===

async fn run_client(
    client_id: u32,
    url: String,
    move_rate: f64,
    duration: Duration,
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

    metrics.latency_sum_ms.fetch_add(
        connect_start.elapsed().as_millis() as u64,
        Ordering::Relaxed,
    );
    metrics.latency_count.fetch_add(1, Ordering::Relaxed);
    metrics.connected.fetch_add(1, Ordering::Relaxed);

    let join = json!({
        "type": "join-game",
        "data": { "playerName": format!("bot-{}", client_id) },
    });
    if ws.send(Message::Text(join.to_string().into())).await.is_err() {
        metrics.errors.fetch_add(1, Ordering::Relaxed);
        metrics.connected.fetch_sub(1, Ordering::Relaxed);
        return;
    }

    // Wait for our slot before sending input
    let joined = tokio::time::timeout(Duration::from_secs(5), async {
        while let Some(msg) = ws.next().await {
            match msg {
                Ok(Message::Text(text)) => {
                    metrics.messages_received.fetch_add(1, Ordering::Relaxed);
                    match serde_json::from_str::<ServerMsg>(&text) {
                        Ok(ServerMsg::PlayerJoined { player_id }) => return Some(player_id),
                        Ok(ServerMsg::Error(reason)) => {
                            if client_id < 5 {
                                eprintln!("Client {} join refused: {}", client_id, reason);
                            }
                            metrics.join_errors.fetch_add(1, Ordering::Relaxed);
                            return None;
                        }
                        _ => {}
                    }
                }
                Ok(Message::Close(_)) | Err(_) => return None,
                _ => {}
            }
        }
        None
    })
    .await;

    let slot = match joined {
        Ok(Some(slot)) => slot,
        Ok(None) | Err(_) => {
            if client_id < 3 {
                eprintln!("Client {} was not seated", client_id);
            }
            metrics.errors.fetch_add(1, Ordering::Relaxed);
            metrics.connected.fetch_sub(1, Ordering::Relaxed);
            return;
        }
    };
    metrics.seated.fetch_add(1, Ordering::Relaxed);

    let move_interval = if move_rate > 0.0 {
        Duration::from_secs_f64(1.0 / move_rate)
    } else {
        Duration::from_secs(3600) // Effectively never
    };
    let mut move_timer = tokio::time::interval(move_interval);
    move_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    let test_end = Instant::now() + duration;
    let mut phase = client_id as f64;

    loop {
        if Instant::now() >= test_end {
            break;
        }

        tokio::select! {
            _ = move_timer.tick() => {
                // Sweep the paddle up and down, overshooting both ends
                phase += 0.1;
                let y = 150.0 + phase.sin() * 200.0;
                let msg = json!({
                    "type": "paddle-move",
                    "data": { "playerId": slot, "y": y },
                });
                if ws.send(Message::Text(msg.to_string().into())).await.is_ok() {
                    metrics.paddle_moves_sent.fetch_add(1, Ordering::Relaxed);
                } else {
                    metrics.errors.fetch_add(1, Ordering::Relaxed);
                    break;
                }
            }

            msg = ws.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        metrics.messages_received.fetch_add(1, Ordering::Relaxed);
                        match serde_json::from_str::<ServerMsg>(&text) {
                            Ok(ServerMsg::GameState {}) => {
                                metrics.game_states_received.fetch_add(1, Ordering::Relaxed);
                            }
                            Ok(ServerMsg::GameEnded {}) => {
                                metrics.games_ended.fetch_add(1, Ordering::Relaxed);
                                let again = json!({ "type": "play-again" });
                                let _ = ws.send(Message::Text(again.to_string().into())).await;
                            }
                            _ => {}
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
                    Some(_) => {}
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
    let args = Args::parse();

    println!("=== Pong Server Load Test ===");
    println!("Clients: {}", args.clients);
    println!("Duration: {}s", args.duration);
    println!("Move rate: {}/s per client", args.move_rate);
    println!("URL: {}", args.url);
    println!();

    let metrics = Arc::new(Metrics::default());
    let duration = Duration::from_secs(args.duration);

    let mut handles = Vec::with_capacity(args.clients as usize);

    println!("Spawning {} clients...", args.clients);
    let spawn_start = Instant::now();

    for client_id in 0..args.clients {
        let url = args.url.clone();
        let metrics = Arc::clone(&metrics);
        let move_rate = args.move_rate;

        handles.push(tokio::spawn(async move {
            run_client(client_id, url, move_rate, duration, metrics).await;
        }));

        // Stagger spawns slightly to avoid thundering herd
        if client_id % 50 == 49 {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    println!("All clients spawned in {:?}", spawn_start.elapsed());
    println!();

    let metrics_clone = Arc::clone(&metrics);
    let duration_secs = args.duration;
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
                "[{:3}s] connected={}, seated={}, msgs={}, game_states={}, moves={}, ended={}, errors={}",
                elapsed,
                metrics_clone.connected.load(Ordering::Relaxed),
                metrics_clone.seated.load(Ordering::Relaxed),
                metrics_clone.messages_received.load(Ordering::Relaxed),
                metrics_clone.game_states_received.load(Ordering::Relaxed),
                metrics_clone.paddle_moves_sent.load(Ordering::Relaxed),
                metrics_clone.games_ended.load(Ordering::Relaxed),
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
    let msgs = metrics.messages_received.load(Ordering::Relaxed);
    let game_states = metrics.game_states_received.load(Ordering::Relaxed);
    let seated = metrics.seated.load(Ordering::Relaxed);
    let latency_sum = metrics.latency_sum_ms.load(Ordering::Relaxed);
    let latency_count = metrics.latency_count.load(Ordering::Relaxed);

    println!("Clients seated: {}", seated);
    println!("Total messages received: {}", msgs);
    println!("Total game-state messages: {}", game_states);
    println!(
        "Total paddle-move sent: {}",
        metrics.paddle_moves_sent.load(Ordering::Relaxed)
    );
    println!("Games ended: {}", metrics.games_ended.load(Ordering::Relaxed));
    println!("Join refusals: {}", metrics.join_errors.load(Ordering::Relaxed));
    println!("Total errors: {}", metrics.errors.load(Ordering::Relaxed));

    if latency_count > 0 {
        println!("Average connect latency: {}ms", latency_sum / latency_count);
    }

    let expected = args.duration as f64 * f64::from(args.tick_rate);
    let per_client = if seated > 0 {
        game_states as f64 / seated as f64
    } else {
        0.0
    };

    println!();
    println!("Messages/sec (total): {:.0}", msgs as f64 / args.duration.max(1) as f64);
    println!("Game states per seated client: {:.1}", per_client);
    println!("Expected game states per client: {:.1}", expected);
    if expected > 0.0 {
        println!("Delivery rate: {:.1}%", per_client / expected * 100.0);
    }
}
