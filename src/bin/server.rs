use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use futures_util::{SinkExt, StreamExt};
use ghost_maze_server::constants::TICK_MS;
use ghost_maze_server::engine::{GameEngine, GameEngineOptions};
use ghost_maze_server::maze::Maze;
use ghost_maze_server::server_protocol::{
    normalize_time_limit_ms, parse_client_message, sanitize_name, ParsedClientMessage,
};
use rand::distr::Alphanumeric;
use rand::Rng;
use serde_json::{json, Value};
use tokio::sync::{mpsc, Mutex};
use tower_http::services::{ServeDir, ServeFile};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

type SharedState = Arc<Mutex<ServerState>>;

#[derive(Clone)]
struct ClientContext {
    tx: mpsc::Sender<OutboundMessage>,
    name: String,
}

#[derive(Clone, Debug)]
enum OutboundMessage {
    Text(String),
}

struct ServerState {
    clients: HashMap<String, ClientContext>,
    game: Option<GameEngine>,
    controller_id: Option<String>,
}

impl ServerState {
    fn new() -> Self {
        Self {
            clients: HashMap::new(),
            game: None,
            controller_id: None,
        }
    }
}

#[tokio::main]
async fn main() {
    let port = std::env::var("PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let state = Arc::new(Mutex::new(ServerState::new()));
    start_tick_loop(state.clone());

    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/api/status", get(status_handler))
        .route("/ws", get(ws_handler))
        .with_state(state);

    let app = if let Some(static_dir) = resolve_static_dir() {
        let index_file = static_dir.join("index.html");
        println!(
            "[server] static file root: {}",
            static_dir.to_string_lossy()
        );
        app.fallback_service(
            ServeDir::new(static_dir).not_found_service(ServeFile::new(index_file)),
        )
    } else {
        eprintln!("[server] static file root not found; serving API and /ws only.");
        app
    };

    let bind_addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .expect("failed to bind server socket");

    println!("[server] listening on :{port}");
    axum::serve(listener, app)
        .await
        .expect("server runtime failed");
}

fn resolve_static_dir() -> Option<PathBuf> {
    if let Ok(raw) = std::env::var("STATIC_DIR") {
        let path = PathBuf::from(raw);
        if path.join("index.html").is_file() {
            return Some(path);
        }
    }
    let fallback = PathBuf::from("static");
    if fallback.join("index.html").is_file() {
        return Some(fallback);
    }
    None
}

async fn healthz() -> impl IntoResponse {
    Json(json!({ "ok": true }))
}

async fn status_handler(State(state): State<SharedState>) -> impl IntoResponse {
    let guard = state.lock().await;
    let names: Vec<String> = guard
        .clients
        .values()
        .map(|client| client.name.clone())
        .collect();
    Json(json!({
        "clients": names,
        "running": guard.game.is_some(),
    }))
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<SharedState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(state, socket))
}

async fn handle_socket(state: SharedState, socket: WebSocket) {
    let client_id = make_id("client");
    let (tx, mut rx) = mpsc::channel::<OutboundMessage>(256);

    {
        let mut guard = state.lock().await;
        guard.clients.insert(
            client_id.clone(),
            ClientContext {
                tx: tx.clone(),
                name: "Player".to_string(),
            },
        );
    }

    let (mut ws_sender, mut ws_receiver) = socket.split();
    let writer = tokio::spawn(async move {
        while let Some(outbound) = rx.recv().await {
            let OutboundMessage::Text(payload) = outbound;
            if ws_sender.send(Message::Text(payload.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(received) = ws_receiver.next().await {
        let Ok(message) = received else {
            break;
        };

        match message {
            Message::Text(raw) => {
                handle_client_message(state.clone(), &client_id, raw.to_string()).await;
            }
            Message::Binary(raw) => {
                if let Ok(text) = String::from_utf8(raw.to_vec()) {
                    handle_client_message(state.clone(), &client_id, text).await;
                } else {
                    send_error_to_client(&state, &client_id, "invalid utf8 message").await;
                }
            }
            Message::Close(_) => break,
            _ => {}
        }
    }

    {
        let mut guard = state.lock().await;
        guard.clients.remove(&client_id);
        if guard.controller_id.as_deref() == Some(client_id.as_str()) {
            guard.controller_id = None;
        }
    }
    writer.abort();
}

async fn handle_client_message(state: SharedState, client_id: &str, raw: String) {
    let Some(parsed) = parse_client_message(&raw) else {
        send_error_to_client(&state, client_id, "unrecognized message").await;
        return;
    };

    let mut guard = state.lock().await;
    match parsed {
        ParsedClientMessage::Hello {
            name,
            reconnect_token: _,
        } => {
            let name = sanitize_name(&name);
            if let Some(client) = guard.clients.get_mut(client_id) {
                client.name = name.clone();
            }
            if guard.controller_id.is_none() {
                guard.controller_id = Some(client_id.to_string());
            }
            let is_controller = guard.controller_id.as_deref() == Some(client_id);
            let welcome = json!({
                "type": "welcome",
                "clientId": client_id,
                "name": name,
                "controller": is_controller,
                "reconnectToken": make_reconnect_token(),
            });
            send_to_client(&guard, client_id, &welcome);

            if let Some(game) = guard.game.as_ref() {
                let init = json!({
                    "type": "init",
                    "maze": game.maze.to_maze_init(),
                    "config": game.config(),
                });
                send_to_client(&guard, client_id, &init);
            }
        }
        ParsedClientMessage::Start {
            seed,
            time_limit_seconds,
            debug_paths,
        } => {
            if guard.game.as_ref().is_some_and(|game| !game.is_ended()) {
                send_error_to_client_locked(&guard, client_id, "game already running");
                return;
            }
            let seed = seed.unwrap_or_else(now_ms) as u32;
            let game = GameEngine::new(
                Maze::default_level(),
                seed,
                GameEngineOptions {
                    time_limit_ms: normalize_time_limit_ms(time_limit_seconds),
                    debug_paths,
                },
            );
            let init = json!({
                "type": "init",
                "maze": game.maze.to_maze_init(),
                "config": game.config(),
                "seed": seed,
            });
            guard.game = Some(game);
            broadcast(&guard, &init);
            println!("[server] game started by {client_id} (seed {seed})");
        }
        ParsedClientMessage::Input { dir } => {
            if guard.controller_id.as_deref() != Some(client_id) {
                return;
            }
            if let Some(game) = guard.game.as_mut() {
                game.set_desired_dir(dir);
            }
        }
        ParsedClientMessage::Debug { enabled } => {
            if let Some(game) = guard.game.as_mut() {
                game.set_debug_paths(enabled);
            }
        }
        ParsedClientMessage::Ping { t } => {
            let pong = json!({
                "type": "pong",
                "t": t,
                "serverMs": now_ms(),
            });
            send_to_client(&guard, client_id, &pong);
        }
    }
}

fn start_tick_loop(state: SharedState) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_millis(TICK_MS));
        loop {
            interval.tick().await;
            let mut guard = state.lock().await;
            tick_game(&mut guard);
        }
    });
}

fn tick_game(state: &mut ServerState) {
    let snapshot = {
        let Some(game) = state.game.as_mut() else {
            return;
        };
        game.step(TICK_MS);
        game.build_snapshot(true)
    };

    broadcast(
        state,
        &json!({
            "type": "state",
            "snapshot": snapshot,
        }),
    );

    let mut finished_summary = None;
    if let Some(game) = state.game.as_ref() {
        if game.is_ended() {
            finished_summary = Some(game.build_summary());
        }
    }
    if let Some(summary) = finished_summary {
        broadcast(
            state,
            &json!({
                "type": "game_over",
                "summary": summary,
            }),
        );
        state.game = None;
    }
}

fn broadcast(state: &ServerState, payload: &Value) {
    let text = payload.to_string();
    for client in state.clients.values() {
        // Slow consumers just miss this frame; the next snapshot supersedes it.
        let _ = client.tx.try_send(OutboundMessage::Text(text.clone()));
    }
}

fn send_to_client(state: &ServerState, client_id: &str, payload: &Value) {
    if let Some(client) = state.clients.get(client_id) {
        let _ = client.tx.try_send(OutboundMessage::Text(payload.to_string()));
    }
}

async fn send_error_to_client(state: &SharedState, client_id: &str, message: &str) {
    let guard = state.lock().await;
    send_error_to_client_locked(&guard, client_id, message);
}

fn send_error_to_client_locked(state: &ServerState, client_id: &str, message: &str) {
    send_to_client(
        state,
        client_id,
        &json!({
            "type": "error",
            "message": message,
        }),
    );
}

fn make_id(prefix: &str) -> String {
    let seq = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    format!("{prefix}_{seq}")
}

fn make_reconnect_token() -> String {
    rand::rng()
        .sample_iter(Alphanumeric)
        .take(48)
        .map(char::from)
        .collect()
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
