use thiserror::Error;

use crate::types::PieceType;

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum PlacementError {
    #[error("cell ({x}, {y}) is outside the board")]
    OutOfBounds { x: i32, y: i32 },
    #[error("cell ({x}, {y}) is protected")]
    ZoneProtected { x: i32, y: i32 },
    #[error("cell ({x}, {y}) is already occupied")]
    CellOccupied { x: i32, y: i32 },
    #[error("unknown piece type '{0}'")]
    UnknownPieceType(String),
    #[error("rotation {0} is not a multiple of 90")]
    InvalidRotation(i32),
    #[error("no {0}s remaining")]
    InventoryExhausted(PieceType),
    #[error("not your turn")]
    NotYourTurn,
    #[error("unknown player index {0}")]
    UnknownPlayer(usize),
    #[error("no piece at ({x}, {y})")]
    EmptyCell { x: i32, y: i32 },
    #[error("piece at ({x}, {y}) belongs to another player")]
    NotPieceOwner { x: i32, y: i32 },
    #[error("piece at ({x}, {y}) is lit by an opponent")]
    PieceClaimed { x: i32, y: i32 },
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum LifecycleError {
    #[error("match is not in progress")]
    NotPlaying,
    #[error("match has already started")]
    AlreadyStarted,
    #[error("match '{0}' not found")]
    MatchNotFound(String),
    #[error("match is full")]
    MatchFull,
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum InitError {
    #[error("at least 2 players are required, got {0}")]
    InsufficientPlayers(usize),
    #[error("at most 4 players are supported, got {0}")]
    TooManyPlayers(usize),
    #[error("objective pool exhausted: {needed} objectives needed, {available} available")]
    ObjectivePoolExhausted { needed: usize, available: usize },
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ActionError {
    #[error(transparent)]
    Placement(#[from] PlacementError),
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum DocumentError {
    #[error("unsupported document version {0}")]
    UnsupportedVersion(u8),
    #[error("board must be {expected}x{expected}, got {rows} rows")]
    BoardSizeMismatch { expected: i32, rows: usize },
    #[error("{field} refers to player {index} but the match has {players} players")]
    PlayerIndexOutOfRange {
        field: &'static str,
        index: usize,
        players: usize,
    },
    #[error("{field} has {actual} entries, expected {expected}")]
    LengthMismatch {
        field: &'static str,
        expected: usize,
        actual: usize,
    },
}

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("archive io failed for {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("archive payload for {match_id} is invalid: {source}")]
    Json {
        match_id: String,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Document(#[from] DocumentError),
}

impl PlacementError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::OutOfBounds { .. } => "out_of_bounds",
            Self::ZoneProtected { .. } => "zone_protected",
            Self::CellOccupied { .. } => "cell_occupied",
            Self::UnknownPieceType(_) => "unknown_piece_type",
            Self::InvalidRotation(_) => "invalid_rotation",
            Self::InventoryExhausted(_) => "inventory_exhausted",
            Self::NotYourTurn => "not_your_turn",
            Self::UnknownPlayer(_) => "unknown_player",
            Self::EmptyCell { .. } => "empty_cell",
            Self::NotPieceOwner { .. } => "not_piece_owner",
            Self::PieceClaimed { .. } => "piece_claimed",
        }
    }
}

impl LifecycleError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotPlaying => "not_playing",
            Self::AlreadyStarted => "already_started",
            Self::MatchNotFound(_) => "match_not_found",
            Self::MatchFull => "match_full",
        }
    }
}

impl InitError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::InsufficientPlayers(_) => "insufficient_players",
            Self::TooManyPlayers(_) => "too_many_players",
            Self::ObjectivePoolExhausted { .. } => "objective_pool_exhausted",
            Self::Lifecycle(inner) => inner.code(),
        }
    }
}

impl ActionError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Placement(inner) => inner.code(),
            Self::Lifecycle(inner) => inner.code(),
        }
    }
}
