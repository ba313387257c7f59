use std::collections::HashMap;
use std::sync::Arc;

use rand::Rng;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::info;

use crate::constants::{MATCH_CODE_ALPHABET, MATCH_CODE_LEN};
use crate::engine::{GameEngine, GameEngineOptions};
use crate::error::LifecycleError;
use crate::lobby::Lobby;
use crate::types::MatchPhase;

#[derive(Clone, Debug)]
pub struct MatchRoom {
    pub lobby: Lobby,
    pub engine: GameEngine,
}

impl MatchRoom {
    pub fn new(match_id: &str, max_players: usize, options: GameEngineOptions) -> Self {
        Self {
            lobby: Lobby::new(match_id, max_players),
            engine: GameEngine::new(match_id, options),
        }
    }

    pub fn match_id(&self) -> &str {
        &self.engine.match_id
    }
}

pub type SharedRoom = Arc<Mutex<MatchRoom>>;

// A room whose turn timer fired, still locked so the caller publishes the
// exact state the tick produced.
pub struct TimedOutRoom {
    pub match_id: String,
    pub room: OwnedMutexGuard<MatchRoom>,
    pub finished_now: bool,
}

// Each match sits behind its own lock; the registry lock is only held while
// looking rooms up, never while a match is being mutated.
#[derive(Default)]
pub struct MatchStore {
    rooms: RwLock<HashMap<String, SharedRoom>>,
}

impl MatchStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn create(&self, max_players: usize, options: GameEngineOptions) -> (String, SharedRoom) {
        let mut rooms = self.rooms.write().await;
        let mut match_id = make_match_code();
        while rooms.contains_key(&match_id) {
            match_id = make_match_code();
        }
        let room = Arc::new(Mutex::new(MatchRoom::new(&match_id, max_players, options)));
        rooms.insert(match_id.clone(), room.clone());
        info!(match_id = %match_id, max_players, "match created");
        (match_id, room)
    }

    pub async fn insert(&self, room: MatchRoom) -> SharedRoom {
        let match_id = room.match_id().to_string();
        let shared = Arc::new(Mutex::new(room));
        self.rooms.write().await.insert(match_id, shared.clone());
        shared
    }

    pub async fn get(&self, match_id: &str) -> Result<SharedRoom, LifecycleError> {
        self.rooms
            .read()
            .await
            .get(match_id)
            .cloned()
            .ok_or_else(|| LifecycleError::MatchNotFound(match_id.to_string()))
    }

    pub async fn evict(&self, match_id: &str) -> Option<SharedRoom> {
        let removed = self.rooms.write().await.remove(match_id);
        if removed.is_some() {
            info!(match_id, "match evicted");
        }
        removed
    }

    pub async fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.rooms.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub async fn len(&self) -> usize {
        self.rooms.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rooms.read().await.is_empty()
    }

    // Returns the matches whose state changed, each with its lock held.
    pub async fn sweep_timeouts(&self, now_ms: u64) -> Vec<TimedOutRoom> {
        let rooms: Vec<(String, SharedRoom)> = self
            .rooms
            .read()
            .await
            .iter()
            .map(|(id, room)| (id.clone(), room.clone()))
            .collect();

        let mut changed = Vec::new();
        for (match_id, room) in rooms {
            let mut guard = room.lock_owned().await;
            if guard.engine.phase() != MatchPhase::Playing {
                continue;
            }
            if guard.engine.tick_timeout_check(now_ms).is_some() {
                let finished_now = guard.engine.is_finished();
                changed.push(TimedOutRoom {
                    match_id,
                    room: guard,
                    finished_now,
                });
            }
        }
        changed
    }
}

pub fn make_match_code() -> String {
    let mut rng = rand::rng();
    (0..MATCH_CODE_LEN)
        .map(|_| {
            let idx = rng.random_range(0..MATCH_CODE_ALPHABET.len());
            char::from(MATCH_CODE_ALPHABET[idx])
        })
        .collect()
}
