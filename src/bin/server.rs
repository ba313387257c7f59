use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use futures_util::{SinkExt, StreamExt};
use prism_wars_server::constants::{ARCHIVE_MAX_AGE_MS, TIMEOUT_SWEEP_MS};
use prism_wars_server::engine::GameEngine;
use prism_wars_server::error::ActionError;
use prism_wars_server::match_store::{MatchRoom, MatchStore, SharedRoom};
use prism_wars_server::objectives::ObjectivePolicy;
use prism_wars_server::server_protocol::{parse_client_message, ParsedClientMessage};
use prism_wars_server::server_utils::{
    build_engine_options, normalize_match_id, normalize_player_count, now_ms, sanitize_name,
};
use prism_wars_server::state_archive::StateArchive;
use prism_wars_server::types::{PieceType, Snapshot};
use serde_json::{json, Value};
use tokio::sync::{mpsc, Mutex};
use tower_http::services::{ServeDir, ServeFile};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

type SharedState = Arc<AppState>;
type Clients = HashMap<String, ClientContext>;

#[derive(Clone, Debug, PartialEq, Eq)]
struct Binding {
    match_id: String,
    player_id: String,
}

#[derive(Clone)]
struct ClientContext {
    tx: mpsc::Sender<OutboundMessage>,
    binding: Option<Binding>,
}

#[derive(Clone, Debug)]
enum OutboundMessage {
    Text(String),
    Close { code: u16, reason: String },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum QueuePolicy {
    DropOnFull,
    DisconnectOnFull,
}

// Lock order: a match room first, then the client table.
struct AppState {
    clients: Mutex<Clients>,
    store: MatchStore,
    archive: StateArchive,
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let port = std::env::var("PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);
    let state_dir = std::env::var("STATE_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(".data/matches"));

    let archive = StateArchive::new(state_dir);
    archive.prune_older_than(now_ms(), ARCHIVE_MAX_AGE_MS);
    let store = MatchStore::new();
    for room in archive.load_all() {
        store.insert(room).await;
    }
    info!(
        restored = store.len().await,
        dir = %archive.dir().display(),
        "match archive loaded"
    );

    let state = Arc::new(AppState {
        clients: Mutex::new(HashMap::new()),
        store,
        archive,
    });
    start_timeout_sweep(state.clone());

    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/api/matches", get(list_matches))
        .route("/api/matches/{match_id}", get(match_snapshot))
        .route("/ws", get(ws_handler))
        .with_state(state);

    let app = if let Some(static_dir) = resolve_static_dir() {
        let index_file = static_dir.join("index.html");
        info!(root = %static_dir.display(), "serving static files");
        app.fallback_service(
            ServeDir::new(static_dir).not_found_service(ServeFile::new(index_file)),
        )
    } else {
        warn!("static file root not found; serving the API only");
        app
    };

    let bind_addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!(port, "listening");
    axum::serve(listener, app).await
}

fn resolve_static_dir() -> Option<PathBuf> {
    if let Ok(raw) = std::env::var("STATIC_DIR") {
        let path = PathBuf::from(raw);
        if path.join("index.html").is_file() {
            return Some(path);
        }
    }
    [PathBuf::from("dist/client"), PathBuf::from("static")]
        .into_iter()
        .find(|path| path.join("index.html").is_file())
}

async fn healthz() -> impl IntoResponse {
    Json(json!({ "ok": true }))
}

async fn list_matches(State(state): State<SharedState>) -> impl IntoResponse {
    let mut entries = Vec::new();
    for match_id in state.store.ids().await {
        let Ok(room) = state.store.get(&match_id).await else {
            continue;
        };
        let guard = room.lock().await;
        entries.push(json!({
            "matchId": match_id,
            "phase": guard.engine.phase(),
            "players": guard.lobby.members().len(),
            "maxPlayers": guard.lobby.max_players,
            "round": guard.engine.round(),
        }));
    }
    Json(entries)
}

async fn match_snapshot(
    State(state): State<SharedState>,
    Path(raw_id): Path<String>,
) -> impl IntoResponse {
    let Some(match_id) = normalize_match_id(&raw_id) else {
        return (StatusCode::BAD_REQUEST, Json(json!({ "error": "invalid match id" })));
    };
    match state.store.get(&match_id).await {
        Ok(room) => {
            let snapshot = room.lock().await.engine.build_snapshot(None);
            (StatusCode::OK, Json(json!(snapshot)))
        }
        Err(error) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": error.to_string() })),
        ),
    }
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<SharedState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(state, socket))
}

async fn handle_socket(state: SharedState, socket: WebSocket) {
    let client_id = make_id("client");
    let (tx, mut rx) = mpsc::channel::<OutboundMessage>(256);

    state.clients.lock().await.insert(
        client_id.clone(),
        ClientContext {
            tx: tx.clone(),
            binding: None,
        },
    );
    debug!(client_id = %client_id, "client connected");

    let (mut ws_sender, mut ws_receiver) = socket.split();
    let writer = tokio::spawn(async move {
        while let Some(outbound) = rx.recv().await {
            let should_close = matches!(outbound, OutboundMessage::Close { .. });
            let result = match outbound {
                OutboundMessage::Text(payload) => {
                    ws_sender.send(Message::Text(payload.into())).await
                }
                OutboundMessage::Close { code, reason } => {
                    let frame = CloseFrame {
                        code,
                        reason: reason.into(),
                    };
                    ws_sender.send(Message::Close(Some(frame))).await
                }
            };
            if result.is_err() || should_close {
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
                handle_client_message(&state, &client_id, raw.to_string()).await;
            }
            Message::Binary(raw) => {
                if let Ok(text) = String::from_utf8(raw.to_vec()) {
                    handle_client_message(&state, &client_id, text).await;
                } else {
                    send_error(&state, &client_id, "bad_message", "invalid utf8 message").await;
                }
            }
            Message::Close(_) => break,
            _ => {}
        }
    }

    handle_disconnect(&state, &client_id).await;
    drop(tx);
    let _ = writer.await;
}

async fn handle_client_message(state: &SharedState, client_id: &str, raw: String) {
    let Some(message) = parse_client_message(&raw) else {
        send_error(state, client_id, "bad_message", "invalid message").await;
        return;
    };

    match message {
        ParsedClientMessage::Ping { t } => {
            let mut clients = state.clients.lock().await;
            send_to_client(
                &mut clients,
                client_id,
                &json!({ "type": "pong", "t": t }),
                QueuePolicy::DisconnectOnFull,
            );
        }
        ParsedClientMessage::CreateMatch {
            name,
            max_players,
            max_rounds,
            win_points,
            turn_seconds,
            policy,
        } => {
            handle_create_match(
                state,
                client_id,
                &name,
                max_players,
                max_rounds,
                win_points,
                turn_seconds,
                policy,
            )
            .await;
        }
        ParsedClientMessage::JoinMatch {
            match_id,
            name,
            reconnect_token,
        } => {
            handle_join_match(state, client_id, &match_id, &name, reconnect_token).await;
        }
        ParsedClientMessage::Ready { ready } => {
            handle_ready(state, client_id, ready).await;
        }
        ParsedClientMessage::PlacePiece {
            x,
            y,
            piece_type,
            rotation,
        } => {
            apply_action(state, client_id, move |engine, seat, now| {
                let piece_type: PieceType = piece_type.parse()?;
                engine.place_piece(seat, x, y, piece_type, rotation, now)
            })
            .await;
        }
        ParsedClientMessage::PickupPiece { x, y } => {
            apply_action(state, client_id, move |engine, seat, _now| {
                engine.pickup_piece(seat, x, y)
            })
            .await;
        }
        ParsedClientMessage::PassTurn => {
            apply_action(state, client_id, |engine, seat, now| engine.pass_turn(seat, now)).await;
        }
        ParsedClientMessage::Preview {
            x,
            y,
            piece_type,
            rotation,
        } => {
            handle_preview(state, client_id, x, y, &piece_type, rotation).await;
        }
        ParsedClientMessage::Heartbeat => {
            let Some((binding, room)) = resolve_binding(state, client_id).await else {
                return;
            };
            let mut guard = room.lock().await;
            record_heartbeat(&mut guard, &binding, now_ms());
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn handle_create_match(
    state: &SharedState,
    client_id: &str,
    name: &str,
    max_players: Option<i64>,
    max_rounds: Option<i64>,
    win_points: Option<i64>,
    turn_seconds: Option<i64>,
    policy: Option<ObjectivePolicy>,
) {
    let options = build_engine_options(max_rounds, win_points, turn_seconds, policy);
    let (match_id, room) = state
        .store
        .create(normalize_player_count(max_players), options)
        .await;
    let mut guard = room.lock().await;
    match guard.lobby.join(&sanitize_name(name)) {
        Ok(member) => {
            let binding = Binding {
                match_id: match_id.clone(),
                player_id: member.id.clone(),
            };
            let mut clients = state.clients.lock().await;
            bind_client(&mut clients, client_id, binding);
            send_to_client(
                &mut clients,
                client_id,
                &welcome_payload(&guard, &member.id),
                QueuePolicy::DisconnectOnFull,
            );
            broadcast_lobby(&mut clients, &guard);
            drop(clients);
            persist(state, &guard);
        }
        Err(error) => {
            drop(guard);
            state.store.evict(&match_id).await;
            send_error(state, client_id, error.code(), &error.to_string()).await;
        }
    }
}

async fn handle_join_match(
    state: &SharedState,
    client_id: &str,
    raw_match_id: &str,
    name: &str,
    reconnect_token: Option<String>,
) {
    let Some(match_id) = normalize_match_id(raw_match_id) else {
        send_error(state, client_id, "match_not_found", "invalid match id").await;
        return;
    };
    let room = match state.store.get(&match_id).await {
        Ok(room) => room,
        Err(error) => {
            send_error(state, client_id, error.code(), &error.to_string()).await;
            return;
        }
    };

    let mut guard = room.lock().await;
    let joined = match reconnect_token {
        Some(token) => guard
            .lobby
            .reconnect(&token)
            .ok_or(("reconnect_failed", "reconnect token mismatch".to_string())),
        None => guard
            .lobby
            .join(&sanitize_name(name))
            .map_err(|error| (error.code(), error.to_string())),
    };
    let member = match joined {
        Ok(member) => member,
        Err((code, message)) => {
            drop(guard);
            send_error(state, client_id, code, &message).await;
            return;
        }
    };
    info!(match_id = %match_id, player_id = %member.id, "player joined");

    let mut clients = state.clients.lock().await;
    bind_client(
        &mut clients,
        client_id,
        Binding {
            match_id: match_id.clone(),
            player_id: member.id.clone(),
        },
    );
    send_to_client(
        &mut clients,
        client_id,
        &welcome_payload(&guard, &member.id),
        QueuePolicy::DisconnectOnFull,
    );
    if guard.lobby.started {
        let seat = guard.engine.player_index(&member.id);
        send_to_client(
            &mut clients,
            client_id,
            &state_payload(&guard.engine.build_snapshot(seat)),
            QueuePolicy::DisconnectOnFull,
        );
    }
    broadcast_lobby(&mut clients, &guard);
    drop(clients);
    persist(state, &guard);
}

async fn handle_ready(state: &SharedState, client_id: &str, ready: bool) {
    let Some((binding, room)) = resolve_binding(state, client_id).await else {
        send_error(state, client_id, "not_joined", "join a match first").await;
        return;
    };
    let mut guard = room.lock().await;
    if !guard.lobby.set_ready(&binding.player_id, ready) {
        drop(guard);
        send_error(state, client_id, "already_started", "match has already started").await;
        return;
    }

    let mut started = false;
    if guard.lobby.can_start() {
        let players = guard.lobby.start_players();
        let seed = rand::random::<u32>();
        match guard.engine.initialize(players, seed, now_ms()) {
            Ok(_) => {
                guard.lobby.mark_started();
                started = true;
            }
            Err(error) => {
                warn!(match_id = %binding.match_id, %error, "match failed to start");
                drop(guard);
                send_error(state, client_id, error.code(), &error.to_string()).await;
                return;
            }
        }
    }

    let mut clients = state.clients.lock().await;
    broadcast_lobby(&mut clients, &guard);
    if started {
        broadcast_to_match(&mut clients, &binding.match_id, QueuePolicy::DisconnectOnFull, |_| {
            json!({
                "type": "match_started",
                "matchId": binding.match_id,
                "config": guard.engine.config,
                "seed": guard.engine.seed(),
            })
        });
        broadcast_state(&mut clients, &guard, QueuePolicy::DisconnectOnFull);
    }
    drop(clients);
    persist(state, &guard);
}

async fn apply_action<F>(state: &SharedState, client_id: &str, action: F)
where
    F: FnOnce(&mut GameEngine, usize, u64) -> Result<Snapshot, ActionError>,
{
    let Some((binding, room)) = resolve_binding(state, client_id).await else {
        send_error(state, client_id, "not_joined", "join a match first").await;
        return;
    };
    let mut guard = room.lock().await;
    let Some(seat) = guard.engine.player_index(&binding.player_id) else {
        drop(guard);
        send_error(state, client_id, "not_playing", "match is not in progress").await;
        return;
    };

    let was_finished = guard.engine.is_finished();
    if let Err(error) = action(&mut guard.engine, seat, now_ms()) {
        drop(guard);
        let error_code = error.code();
        send_error(state, client_id, error_code, &error.to_string()).await;
        return;
    }
    let finished_now = !was_finished && guard.engine.is_finished();
    publish_update(state, &guard, finished_now).await;
}

async fn handle_preview(
    state: &SharedState,
    client_id: &str,
    x: i32,
    y: i32,
    raw_piece_type: &str,
    rotation: i32,
) {
    let Some((binding, room)) = resolve_binding(state, client_id).await else {
        send_error(state, client_id, "not_joined", "join a match first").await;
        return;
    };
    let mut guard = room.lock().await;
    let Some(seat) = guard.engine.player_index(&binding.player_id) else {
        drop(guard);
        send_error(state, client_id, "not_playing", "match is not in progress").await;
        return;
    };
    let preview = raw_piece_type
        .parse::<PieceType>()
        .map_err(ActionError::from)
        .and_then(|piece_type| guard.engine.preview_placement(seat, x, y, piece_type, rotation));
    drop(guard);

    match preview {
        Ok(preview) => {
            let mut clients = state.clients.lock().await;
            send_to_client(
                &mut clients,
                client_id,
                &json!({ "type": "preview", "preview": preview }),
                QueuePolicy::DropOnFull,
            );
        }
        Err(error) => send_error(state, client_id, error.code(), &error.to_string()).await,
    }
}

async fn handle_disconnect(state: &SharedState, client_id: &str) {
    let context = state.clients.lock().await.remove(client_id);
    let Some(binding) = context.and_then(|ctx| ctx.binding) else {
        return;
    };
    let Ok(room) = state.store.get(&binding.match_id).await else {
        return;
    };

    let mut guard = room.lock().await;
    let still_bound = state
        .clients
        .lock()
        .await
        .values()
        .any(|ctx| ctx.binding.as_ref() == Some(&binding));
    if still_bound {
        return;
    }
    guard.lobby.mark_disconnected(&binding.player_id);
    debug!(match_id = %binding.match_id, player_id = %binding.player_id, "client left");

    if !guard.lobby.started && guard.lobby.members().is_empty() {
        drop(guard);
        state.store.evict(&binding.match_id).await;
        if let Err(error) = state.archive.remove(&binding.match_id) {
            warn!(match_id = %binding.match_id, %error, "failed to remove archive");
        }
        return;
    }

    let mut clients = state.clients.lock().await;
    broadcast_lobby(&mut clients, &guard);
    drop(clients);
    persist(state, &guard);
}

fn start_timeout_sweep(state: SharedState) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_millis(TIMEOUT_SWEEP_MS));
        loop {
            interval.tick().await;
            for swept in state.store.sweep_timeouts(now_ms()).await {
                publish_update(&state, &swept.room, swept.finished_now).await;
            }
        }
    });
}

async fn publish_update(state: &SharedState, room: &MatchRoom, finished_now: bool) {
    let mut clients = state.clients.lock().await;
    broadcast_state(&mut clients, room, QueuePolicy::DropOnFull);
    if finished_now {
        let payload = json!({
            "type": "game_over",
            "matchId": room.match_id(),
            "result": room.engine.result(),
            "endReason": room.engine.end_reason(),
            "standings": room.engine.standings(),
        });
        broadcast_to_match(
            &mut clients,
            room.match_id(),
            QueuePolicy::DisconnectOnFull,
            |_| payload.clone(),
        );
    }
    drop(clients);
    persist(state, room);
}

fn record_heartbeat(room: &mut MatchRoom, binding: &Binding, now_ms: u64) -> bool {
    let Some(seat) = room.engine.player_index(&binding.player_id) else {
        debug!(match_id = %binding.match_id, player_id = %binding.player_id, "heartbeat before match start");
        return false;
    };
    match room.engine.update_heartbeat(seat, now_ms) {
        Ok(()) => true,
        Err(error) => {
            warn!(match_id = %binding.match_id, seat, %error, "heartbeat rejected");
            false
        }
    }
}

fn persist(state: &AppState, room: &MatchRoom) {
    if let Err(error) = state.archive.save(room, now_ms()) {
        warn!(match_id = %room.match_id(), %error, "failed to archive match");
    }
}

async fn resolve_binding(state: &SharedState, client_id: &str) -> Option<(Binding, SharedRoom)> {
    let binding = state
        .clients
        .lock()
        .await
        .get(client_id)
        .and_then(|ctx| ctx.binding.clone())?;
    let room = state.store.get(&binding.match_id).await.ok()?;
    Some((binding, room))
}

// A player id may only be driven by one socket; the older one is closed.
fn bind_client(clients: &mut Clients, client_id: &str, binding: Binding) {
    for (other_id, ctx) in clients.iter_mut() {
        if other_id != client_id && ctx.binding.as_ref() == Some(&binding) {
            ctx.binding = None;
            let _ = ctx.tx.try_send(OutboundMessage::Close {
                code: 4001,
                reason: "superseded by new connection".to_string(),
            });
        }
    }
    if let Some(ctx) = clients.get_mut(client_id) {
        ctx.binding = Some(binding);
    }
}

fn welcome_payload(room: &MatchRoom, player_id: &str) -> Value {
    let member = room.lobby.member(player_id);
    json!({
        "type": "welcome",
        "matchId": room.match_id(),
        "playerId": player_id,
        "color": member.map(|m| m.color.clone()),
        "reconnectToken": member.map(|m| m.reconnect_token.clone()),
        "isHost": room.lobby.host_id() == Some(player_id),
    })
}

fn state_payload(snapshot: &Snapshot) -> Value {
    json!({ "type": "state", "snapshot": snapshot })
}

fn broadcast_lobby(clients: &mut Clients, room: &MatchRoom) {
    let host_id = room.lobby.host_id();
    let players: Vec<Value> = room
        .lobby
        .members()
        .iter()
        .map(|member| {
            json!({
                "id": member.id,
                "name": member.name,
                "color": member.color,
                "ready": member.ready,
                "connected": member.connected,
                "isHost": host_id == Some(member.id.as_str()),
            })
        })
        .collect();
    let payload = json!({
        "type": "lobby",
        "matchId": room.match_id(),
        "maxPlayers": room.lobby.max_players,
        "players": players,
        "canStart": room.lobby.can_start(),
        "started": room.lobby.started,
    });
    broadcast_to_match(clients, room.match_id(), QueuePolicy::DisconnectOnFull, |_| {
        payload.clone()
    });
}

// Each seat gets its own snapshot so secret objectives stay private.
fn broadcast_state(clients: &mut Clients, room: &MatchRoom, policy: QueuePolicy) {
    if !room.lobby.started {
        return;
    }
    broadcast_to_match(clients, room.match_id(), policy, |binding| {
        let seat = room.engine.player_index(&binding.player_id);
        state_payload(&room.engine.build_snapshot(seat))
    });
}

fn broadcast_to_match(
    clients: &mut Clients,
    match_id: &str,
    policy: QueuePolicy,
    payload_for: impl Fn(&Binding) -> Value,
) {
    let mut failed_clients = Vec::new();
    for (client_id, ctx) in clients.iter() {
        let Some(binding) = ctx.binding.as_ref() else {
            continue;
        };
        if binding.match_id != match_id {
            continue;
        }
        let payload = payload_for(binding).to_string();
        if ctx.tx.try_send(OutboundMessage::Text(payload)).is_err()
            && policy == QueuePolicy::DisconnectOnFull
        {
            failed_clients.push(client_id.clone());
        }
    }
    for client_id in failed_clients {
        drop_client(clients, &client_id);
    }
}

fn send_to_client(clients: &mut Clients, client_id: &str, message: &Value, policy: QueuePolicy) {
    let send_failed = clients
        .get(client_id)
        .map(|ctx| {
            ctx.tx
                .try_send(OutboundMessage::Text(message.to_string()))
                .is_err()
        })
        .unwrap_or(false);
    if send_failed && policy == QueuePolicy::DisconnectOnFull {
        drop_client(clients, client_id);
    }
}

fn drop_client(clients: &mut Clients, client_id: &str) {
    if clients.remove(client_id).is_some() {
        warn!(client_id, "outbound queue full; dropping client");
    }
}

async fn send_error(state: &SharedState, client_id: &str, code: &str, message: &str) {
    let mut clients = state.clients.lock().await;
    send_to_client(
        &mut clients,
        client_id,
        &json!({
            "type": "error",
            "code": code,
            "message": message,
        }),
        QueuePolicy::DisconnectOnFull,
    );
}

fn make_id(prefix: &str) -> String {
    let seq = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    format!("{prefix}_{seq}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use prism_wars_server::error::PlacementError;

    fn client(binding: Option<Binding>) -> (ClientContext, mpsc::Receiver<OutboundMessage>) {
        let (tx, rx) = mpsc::channel(4);
        (ClientContext { tx, binding }, rx)
    }

    fn binding(match_id: &str, player_id: &str) -> Binding {
        Binding {
            match_id: match_id.to_string(),
            player_id: player_id.to_string(),
        }
    }

    #[test]
    fn broadcast_only_reaches_clients_of_the_match() {
        let mut clients = Clients::new();
        let (a, mut rx_a) = client(Some(binding("AAAAAA", "AAAAAA_1")));
        let (b, mut rx_b) = client(Some(binding("BBBBBB", "BBBBBB_1")));
        let (c, mut rx_c) = client(None);
        clients.insert("a".to_string(), a);
        clients.insert("b".to_string(), b);
        clients.insert("c".to_string(), c);

        broadcast_to_match(&mut clients, "AAAAAA", QueuePolicy::DropOnFull, |binding| {
            json!({ "to": binding.player_id })
        });
        assert!(matches!(rx_a.try_recv(), Ok(OutboundMessage::Text(text)) if text.contains("AAAAAA_1")));
        assert!(rx_b.try_recv().is_err());
        assert!(rx_c.try_recv().is_err());
    }

    #[test]
    fn rebinding_a_player_closes_the_older_socket() {
        let mut clients = Clients::new();
        let (old, mut rx_old) = client(Some(binding("AAAAAA", "AAAAAA_1")));
        let (new, _rx_new) = client(None);
        clients.insert("old".to_string(), old);
        clients.insert("new".to_string(), new);

        bind_client(&mut clients, "new", binding("AAAAAA", "AAAAAA_1"));
        assert!(clients["old"].binding.is_none());
        assert_eq!(clients["new"].binding, Some(binding("AAAAAA", "AAAAAA_1")));
        assert!(matches!(
            rx_old.try_recv(),
            Ok(OutboundMessage::Close { code: 4001, .. })
        ));
    }

    #[test]
    fn full_queue_disconnects_only_under_strict_policy() {
        let mut clients = Clients::new();
        let (tx, _rx) = mpsc::channel(1);
        clients.insert(
            "a".to_string(),
            ClientContext {
                tx,
                binding: Some(binding("AAAAAA", "AAAAAA_1")),
            },
        );
        let message = json!({ "type": "noop" });
        send_to_client(&mut clients, "a", &message, QueuePolicy::DropOnFull);
        send_to_client(&mut clients, "a", &message, QueuePolicy::DropOnFull);
        assert!(clients.contains_key("a"));
        send_to_client(&mut clients, "a", &message, QueuePolicy::DisconnectOnFull);
        assert!(!clients.contains_key("a"));
    }

    #[test]
    fn heartbeat_is_recorded_only_for_seated_players() {
        let mut room = MatchRoom::new("HEART1", 2, Default::default());
        let a = room.lobby.join("A").expect("seat");
        room.lobby.join("B").expect("seat");
        let seated = binding("HEART1", &a.id);
        assert!(!record_heartbeat(&mut room, &seated, 10));

        room.engine
            .initialize(room.lobby.start_players(), 1, 0)
            .expect("match starts");
        assert!(record_heartbeat(&mut room, &seated, 500));
        assert_eq!(room.engine.player_views()[0].last_seen_ms, Some(500));
        assert!(!record_heartbeat(&mut room, &binding("HEART1", "HEART1_9"), 600));
    }

    #[test]
    fn unknown_piece_type_maps_to_placement_error_code() {
        let error = "laser".parse::<PieceType>().map_err(ActionError::from);
        assert_eq!(
            error.err().map(|e| e.code()),
            Some(PlacementError::UnknownPieceType(String::new()).code())
        );
    }
}
