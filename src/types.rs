use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::PlacementError;
use crate::objectives::{ObjectiveId, ObjectivePolicy};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Up,
    Right,
    Down,
    Left,
}

impl Direction {
    pub const CYCLE: [Direction; 4] = [Self::Up, Self::Right, Self::Down, Self::Left];

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "up" => Some(Self::Up),
            "right" => Some(Self::Right),
            "down" => Some(Self::Down),
            "left" => Some(Self::Left),
            _ => None,
        }
    }

    pub fn delta(self) -> (i32, i32) {
        match self {
            Self::Up => (0, -1),
            Self::Right => (1, 0),
            Self::Down => (0, 1),
            Self::Left => (-1, 0),
        }
    }

    pub fn step(self, x: i32, y: i32) -> (i32, i32) {
        let (dx, dy) = self.delta();
        (x + dx, y + dy)
    }

    fn cycle_index(self) -> usize {
        match self {
            Self::Up => 0,
            Self::Right => 1,
            Self::Down => 2,
            Self::Left => 3,
        }
    }

    pub fn counter_clockwise(self) -> Self {
        Self::CYCLE[(self.cycle_index() + 3) % 4]
    }

    pub fn clockwise(self) -> Self {
        Self::CYCLE[(self.cycle_index() + 1) % 4]
    }

    pub fn perpendiculars(self) -> [Self; 2] {
        [self.counter_clockwise(), self.clockwise()]
    }

    // Even quarter turns are a `\` mirror, odd quarter turns a `/` mirror.
    pub fn reflect(self, rotation: i32) -> Self {
        let backslash = rotation.div_euclid(90).rem_euclid(2) == 0;
        match (backslash, self) {
            (true, Self::Up) => Self::Left,
            (true, Self::Left) => Self::Up,
            (true, Self::Down) => Self::Right,
            (true, Self::Right) => Self::Down,
            (false, Self::Up) => Self::Right,
            (false, Self::Right) => Self::Up,
            (false, Self::Down) => Self::Left,
            (false, Self::Left) => Self::Down,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PieceType {
    Mirror,
    Prism,
    Blocker,
    Splitter,
}

impl PieceType {
    pub const ALL: [PieceType; 4] = [Self::Mirror, Self::Prism, Self::Blocker, Self::Splitter];

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "mirror" => Some(Self::Mirror),
            "prism" => Some(Self::Prism),
            "blocker" => Some(Self::Blocker),
            "splitter" => Some(Self::Splitter),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Mirror => "mirror",
            Self::Prism => "prism",
            Self::Blocker => "blocker",
            Self::Splitter => "splitter",
        }
    }

    pub fn splits_light(self) -> bool {
        matches!(self, Self::Prism | Self::Splitter)
    }
}

impl FromStr for PieceType {
    type Err = PlacementError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value).ok_or_else(|| PlacementError::UnknownPieceType(value.to_string()))
    }
}

impl std::fmt::Display for PieceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: i32,
    pub y: i32,
}

impl Vec2 {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Piece {
    #[serde(rename = "type")]
    pub piece_type: PieceType,
    pub player: usize,
    pub rotation: i32,
    pub color: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LightSource {
    pub x: i32,
    pub y: i32,
    pub direction: Direction,
    pub player: usize,
    pub color: String,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inventory {
    pub mirror: u32,
    pub prism: u32,
    pub blocker: u32,
    pub splitter: u32,
}

impl Inventory {
    pub fn remaining(&self, piece_type: PieceType) -> u32 {
        match piece_type {
            PieceType::Mirror => self.mirror,
            PieceType::Prism => self.prism,
            PieceType::Blocker => self.blocker,
            PieceType::Splitter => self.splitter,
        }
    }

    pub fn take(&mut self, piece_type: PieceType) -> bool {
        let slot = match piece_type {
            PieceType::Mirror => &mut self.mirror,
            PieceType::Prism => &mut self.prism,
            PieceType::Blocker => &mut self.blocker,
            PieceType::Splitter => &mut self.splitter,
        };
        if *slot == 0 {
            return false;
        }
        *slot -= 1;
        true
    }

    pub fn total(&self) -> u32 {
        self.mirror + self.prism + self.blocker + self.splitter
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchPhase {
    Waiting,
    Playing,
    Finished,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameOverReason {
    RoundLimit,
    PointThreshold,
    Forfeit,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MatchResult {
    Winner {
        player: usize,
        name: String,
        color: String,
        score: i32,
    },
    Tie {
        players: Vec<usize>,
        score: i32,
    },
    NoWinner,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchConfig {
    #[serde(rename = "boardSize")]
    pub board_size: i32,
    #[serde(rename = "maxRounds")]
    pub max_rounds: u32,
    #[serde(rename = "winPoints")]
    pub win_points: i32,
    #[serde(rename = "turnDurationMs")]
    pub turn_duration_ms: u64,
    #[serde(rename = "maxMissedTurns")]
    pub max_missed_turns: u32,
    #[serde(rename = "objectivesPerPlayer")]
    pub objectives_per_player: usize,
    #[serde(rename = "objectivePolicy")]
    pub objective_policy: ObjectivePolicy,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerView {
    pub index: usize,
    pub id: String,
    pub name: String,
    pub color: String,
    pub inventory: Inventory,
    #[serde(rename = "missedTurns")]
    pub missed_turns: u32,
    pub disconnected: bool,
    #[serde(rename = "lastSeenMs")]
    pub last_seen_ms: Option<u64>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ObjectiveView {
    pub id: ObjectiveId,
    pub label: String,
    pub points: i32,
    pub completed: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ScoreBreakdown {
    pub player: usize,
    pub territory: i32,
    #[serde(rename = "mirrorChain")]
    pub mirror_chain: i32,
    pub cascade: i32,
    pub objectives: i32,
    pub total: i32,
    pub active: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BeamSegment {
    pub from: Vec2,
    pub to: Vec2,
    pub player: usize,
    pub color: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct Snapshot {
    #[serde(rename = "matchId")]
    pub match_id: String,
    pub phase: MatchPhase,
    pub config: MatchConfig,
    pub round: u32,
    #[serde(rename = "currentTurn")]
    pub current_turn: usize,
    #[serde(rename = "turnStartedAtMs")]
    pub turn_started_at_ms: u64,
    #[serde(rename = "turnDeadlineMs")]
    pub turn_deadline_ms: u64,
    pub board: Vec<Vec<Option<Piece>>>,
    #[serde(rename = "lightSources")]
    pub light_sources: Vec<LightSource>,
    #[serde(rename = "protectedZones")]
    pub protected_zones: Vec<Vec2>,
    pub amplifiers: Vec<Vec2>,
    pub players: Vec<PlayerView>,
    pub territory: Vec<Vec<Vec<usize>>>,
    pub beams: Vec<BeamSegment>,
    pub scores: Vec<ScoreBreakdown>,
    #[serde(rename = "myObjectives")]
    pub my_objectives: Vec<ObjectiveView>,
    pub result: Option<MatchResult>,
    #[serde(rename = "endReason")]
    pub end_reason: Option<GameOverReason>,
}

#[derive(Clone, Debug, Serialize)]
pub struct PreviewSnapshot {
    pub placed: Vec2,
    #[serde(rename = "pieceType")]
    pub piece_type: PieceType,
    pub territory: Vec<Vec<Vec<usize>>>,
    pub beams: Vec<BeamSegment>,
    pub scores: Vec<ScoreBreakdown>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Standing {
    pub rank: usize,
    pub player: usize,
    pub name: String,
    pub color: String,
    pub score: i32,
    pub active: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StartPlayer {
    pub id: String,
    pub name: String,
    pub color: String,
}
