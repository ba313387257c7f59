use rand::distr::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::constants::{player_color, MAX_PLAYERS, MIN_PLAYERS, PLAYER_COLORS, RECONNECT_TOKEN_LEN};
use crate::error::LifecycleError;
use crate::types::StartPlayer;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LobbyMember {
    pub id: String,
    pub name: String,
    pub color: String,
    pub ready: bool,
    pub connected: bool,
    #[serde(rename = "reconnectToken")]
    pub reconnect_token: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lobby {
    #[serde(rename = "matchId")]
    pub match_id: String,
    #[serde(rename = "maxPlayers")]
    pub max_players: usize,
    pub started: bool,
    members: Vec<LobbyMember>,
    #[serde(rename = "nextSeq", default)]
    next_seq: u64,
}

impl Lobby {
    pub fn new(match_id: impl Into<String>, max_players: usize) -> Self {
        Self {
            match_id: match_id.into(),
            max_players: max_players.clamp(MIN_PLAYERS, MAX_PLAYERS),
            started: false,
            members: Vec::new(),
            next_seq: 1,
        }
    }

    pub fn members(&self) -> &[LobbyMember] {
        &self.members
    }

    pub fn member(&self, player_id: &str) -> Option<&LobbyMember> {
        self.members.iter().find(|member| member.id == player_id)
    }

    pub fn join(&mut self, name: &str) -> Result<LobbyMember, LifecycleError> {
        if self.started {
            return Err(LifecycleError::AlreadyStarted);
        }
        if self.members.len() >= self.max_players {
            return Err(LifecycleError::MatchFull);
        }
        let color = self.free_color();
        let member = LobbyMember {
            id: format!("{}_{}", self.match_id, self.next_seq),
            name: name.to_string(),
            color,
            ready: false,
            connected: true,
            reconnect_token: make_reconnect_token(),
        };
        self.next_seq += 1;
        self.members.push(member.clone());
        Ok(member)
    }

    pub fn reconnect(&mut self, token: &str) -> Option<LobbyMember> {
        let member = self
            .members
            .iter_mut()
            .find(|member| member.reconnect_token == token)?;
        member.connected = true;
        Some(member.clone())
    }

    pub fn set_ready(&mut self, player_id: &str, ready: bool) -> bool {
        match self.members.iter_mut().find(|member| member.id == player_id) {
            Some(member) if !self.started => {
                member.ready = ready;
                true
            }
            _ => false,
        }
    }

    // Before start a dropped member gives up the seat; afterwards the seat is
    // kept so the token can reclaim it.
    pub fn mark_disconnected(&mut self, player_id: &str) {
        if self.started {
            if let Some(member) = self.members.iter_mut().find(|member| member.id == player_id) {
                member.connected = false;
            }
            return;
        }
        self.members.retain(|member| member.id != player_id);
    }

    pub fn can_start(&self) -> bool {
        !self.started
            && self.members.len() >= MIN_PLAYERS
            && self.members.iter().all(|member| member.ready)
    }

    pub fn host_id(&self) -> Option<&str> {
        self.members
            .iter()
            .find(|member| member.connected)
            .map(|member| member.id.as_str())
    }

    pub fn start_players(&self) -> Vec<StartPlayer> {
        self.members
            .iter()
            .map(|member| StartPlayer {
                id: member.id.clone(),
                name: member.name.clone(),
                color: member.color.clone(),
            })
            .collect()
    }

    pub fn mark_started(&mut self) {
        self.started = true;
    }

    fn free_color(&self) -> String {
        PLAYER_COLORS
            .iter()
            .find(|color| self.members.iter().all(|member| member.color != **color))
            .map(|color| color.to_string())
            .unwrap_or_else(|| player_color(self.members.len()).to_string())
    }
}

pub fn make_reconnect_token() -> String {
    rand::rng()
        .sample_iter(Alphanumeric)
        .take(RECONNECT_TOKEN_LEN)
        .map(char::from)
        .collect()
}
