use serde::{Deserialize, Serialize};

use super::*;
use crate::error::DocumentError;

pub const DOCUMENT_VERSION: u8 = 1;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerRecord {
    pub id: String,
    pub name: String,
    pub color: String,
    pub inventory: Inventory,
    #[serde(rename = "missedTurns", default)]
    pub missed_turns: u32,
    #[serde(rename = "lastSeenMs", default)]
    pub last_seen_ms: Option<u64>,
}

// Everything needed to resume a match exactly; territory and scores are
// derived on load.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchDocument {
    pub version: u8,
    #[serde(rename = "matchId")]
    pub match_id: String,
    pub seed: u32,
    pub phase: MatchPhase,
    pub config: MatchConfig,
    pub players: Vec<PlayerRecord>,
    pub board: Vec<Vec<Option<Piece>>>,
    #[serde(rename = "lightSources")]
    pub light_sources: Vec<LightSource>,
    #[serde(rename = "protectedZones")]
    pub protected_zones: Vec<Vec2>,
    pub amplifiers: Vec<Vec2>,
    pub objectives: Vec<Vec<ObjectiveId>>,
    #[serde(rename = "completedObjectives")]
    pub completed_objectives: Vec<BTreeSet<ObjectiveId>>,
    pub disconnected: BTreeSet<usize>,
    #[serde(rename = "currentTurn")]
    pub current_turn: usize,
    pub round: u32,
    #[serde(rename = "turnStartedAtMs")]
    pub turn_started_at_ms: u64,
    pub result: Option<MatchResult>,
    #[serde(rename = "endReason")]
    pub end_reason: Option<GameOverReason>,
}

impl GameEngine {
    pub fn to_document(&self) -> MatchDocument {
        MatchDocument {
            version: DOCUMENT_VERSION,
            match_id: self.match_id.clone(),
            seed: self.seed,
            phase: self.phase,
            config: self.config.clone(),
            players: self
                .players
                .iter()
                .map(|player| PlayerRecord {
                    id: player.id.clone(),
                    name: player.name.clone(),
                    color: player.color.clone(),
                    inventory: player.inventory,
                    missed_turns: player.missed_turns,
                    last_seen_ms: player.last_seen_ms,
                })
                .collect(),
            board: self.board.rows(),
            light_sources: self.light_sources.clone(),
            protected_zones: self.board.protected_cells(),
            amplifiers: self.board.amplifier_cells(),
            objectives: self.objectives.clone(),
            completed_objectives: self.completed_objectives.clone(),
            disconnected: self.disconnected.clone(),
            current_turn: self.current_turn,
            round: self.round,
            turn_started_at_ms: self.turn_started_at_ms,
            result: self.result.clone(),
            end_reason: self.end_reason,
        }
    }

    pub fn from_document(document: MatchDocument) -> Result<Self, DocumentError> {
        validate_document(&document)?;

        let size = document.config.board_size;
        let board = Board::restore(
            size,
            document.board,
            &document.protected_zones,
            &document.amplifiers,
        );
        let mut engine = Self {
            match_id: document.match_id,
            seed: document.seed,
            phase: document.phase,
            players: document
                .players
                .into_iter()
                .map(|record| PlayerInternal {
                    id: record.id,
                    name: record.name,
                    color: record.color,
                    inventory: record.inventory,
                    missed_turns: record.missed_turns,
                    last_seen_ms: record.last_seen_ms,
                })
                .collect(),
            board,
            light_sources: document.light_sources,
            objectives: document.objectives,
            completed_objectives: document.completed_objectives,
            disconnected: document.disconnected,
            current_turn: document.current_turn,
            round: document.round,
            turn_started_at_ms: document.turn_started_at_ms,
            result: document.result,
            end_reason: document.end_reason,
            territory: Territory::new(size),
            scores: ScoreReport::default(),
            config: document.config,
        };
        if !engine.players.is_empty() {
            engine.refresh_scores();
        }
        Ok(engine)
    }
}

fn validate_document(document: &MatchDocument) -> Result<(), DocumentError> {
    if document.version != DOCUMENT_VERSION {
        return Err(DocumentError::UnsupportedVersion(document.version));
    }

    let size = document.config.board_size;
    let rows = document.board.len();
    let square = rows == size as usize
        && document
            .board
            .iter()
            .all(|row| row.len() == size as usize);
    if !square {
        return Err(DocumentError::BoardSizeMismatch {
            expected: size,
            rows,
        });
    }

    let players = document.players.len();
    for (field, actual) in [
        ("objectives", document.objectives.len()),
        ("completedObjectives", document.completed_objectives.len()),
    ] {
        if actual != players {
            return Err(DocumentError::LengthMismatch {
                field,
                expected: players,
                actual,
            });
        }
    }

    let out_of_range = |field: &'static str, index: usize| DocumentError::PlayerIndexOutOfRange {
        field,
        index,
        players,
    };
    if players > 0 && document.current_turn >= players {
        return Err(out_of_range("currentTurn", document.current_turn));
    }
    if let Some(&index) = document.disconnected.iter().find(|&&idx| idx >= players) {
        return Err(out_of_range("disconnected", index));
    }
    if let Some(source) = document.light_sources.iter().find(|s| s.player >= players) {
        return Err(out_of_range("lightSources", source.player));
    }
    let stray_piece = document
        .board
        .iter()
        .flatten()
        .flatten()
        .find(|piece| piece.player >= players);
    if let Some(piece) = stray_piece {
        return Err(out_of_range("board", piece.player));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::super::tests::start_match;
    use super::*;

    fn played_match() -> GameEngine {
        let mut engine = start_match(3, GameEngineOptions::default());
        engine
            .place_piece(0, 2, 5, PieceType::Mirror, 90, 10)
            .expect("placement");
        engine
            .place_piece(1, 6, 4, PieceType::Prism, 0, 20)
            .expect("placement");
        engine.update_heartbeat(2, 25).expect("heartbeat");
        engine.pass_turn(2, 30).expect("pass");
        engine
    }

    #[test]
    fn document_round_trips_through_json() {
        let engine = played_match();
        let document = engine.to_document();
        let json = serde_json::to_string(&document).expect("serialize");
        let parsed: MatchDocument = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(parsed, document);

        let restored = GameEngine::from_document(parsed).expect("restore");
        assert_eq!(restored.to_document(), document);
        assert_eq!(restored.scores(), engine.scores());
        assert_eq!(restored.territory(), engine.territory());
    }

    #[test]
    fn restored_match_plays_on_identically() {
        let mut original = played_match();
        let mut restored = GameEngine::from_document(original.to_document()).expect("restore");
        let a = original.place_piece(0, 9, 9, PieceType::Splitter, 0, 40);
        let b = restored.place_piece(0, 9, 9, PieceType::Splitter, 0, 40);
        assert_eq!(a.is_ok(), b.is_ok());
        assert_eq!(original.to_document(), restored.to_document());
    }

    #[test]
    fn waiting_match_round_trips() {
        let engine = GameEngine::new("EMPTY1", GameEngineOptions::default());
        let restored = GameEngine::from_document(engine.to_document()).expect("restore");
        assert_eq!(restored.phase(), MatchPhase::Waiting);
        assert_eq!(restored.to_document(), engine.to_document());
    }

    #[test]
    fn malformed_documents_are_rejected() {
        let engine = played_match();

        let mut document = engine.to_document();
        document.version = 9;
        assert_eq!(
            GameEngine::from_document(document).err(),
            Some(DocumentError::UnsupportedVersion(9))
        );

        let mut document = engine.to_document();
        document.board.pop();
        assert!(matches!(
            GameEngine::from_document(document),
            Err(DocumentError::BoardSizeMismatch { rows: 11, .. })
        ));

        let mut document = engine.to_document();
        document.completed_objectives.pop();
        assert!(matches!(
            GameEngine::from_document(document),
            Err(DocumentError::LengthMismatch {
                field: "completedObjectives",
                ..
            })
        ));

        let mut document = engine.to_document();
        document.disconnected.insert(7);
        assert_eq!(
            GameEngine::from_document(document).err(),
            Some(DocumentError::PlayerIndexOutOfRange {
                field: "disconnected",
                index: 7,
                players: 3
            })
        );
    }
}
