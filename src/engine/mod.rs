use std::collections::BTreeSet;

use tracing::{debug, info, warn};

use crate::board::Board;
use crate::constants::{
    get_source_layout, starting_inventory, BOARD_SIZE, DEFAULT_MAX_ROUNDS, DEFAULT_WIN_POINTS,
    MAX_MISSED_TURNS, MAX_PLAYERS, MIN_PLAYERS, OBJECTIVES_PER_PLAYER, TURN_DURATION_MS,
};
use crate::error::{ActionError, InitError, LifecycleError, PlacementError};
use crate::light::{compute_beam_segments, compute_territory, Territory};
use crate::objectives::{assign_objectives, ObjectiveId, ObjectivePolicy};
use crate::rng::Rng;
use crate::scoring::{evaluate_scores, ScoreInput, ScoreReport};
use crate::types::{
    GameOverReason, Inventory, LightSource, MatchConfig, MatchPhase, MatchResult, ObjectiveView,
    Piece, PieceType, PlayerView, PreviewSnapshot, ScoreBreakdown, Snapshot, Standing, StartPlayer, Vec2,
};

mod document;
mod turn_system;

pub use self::document::{MatchDocument, PlayerRecord, DOCUMENT_VERSION};

#[derive(Clone, Debug, PartialEq, Eq)]
struct PlayerInternal {
    id: String,
    name: String,
    color: String,
    inventory: Inventory,
    missed_turns: u32,
    last_seen_ms: Option<u64>,
}

#[derive(Clone, Debug, Default)]
pub struct GameEngineOptions {
    pub max_rounds_override: Option<u32>,
    pub win_points_override: Option<i32>,
    pub turn_duration_ms_override: Option<u64>,
    pub objective_policy: ObjectivePolicy,
}

impl GameEngineOptions {
    pub fn resolve(&self) -> MatchConfig {
        MatchConfig {
            board_size: BOARD_SIZE,
            max_rounds: self.max_rounds_override.unwrap_or(DEFAULT_MAX_ROUNDS).max(1),
            win_points: self.win_points_override.unwrap_or(DEFAULT_WIN_POINTS),
            turn_duration_ms: self.turn_duration_ms_override.unwrap_or(TURN_DURATION_MS),
            max_missed_turns: MAX_MISSED_TURNS,
            objectives_per_player: OBJECTIVES_PER_PLAYER,
            objective_policy: self.objective_policy,
        }
    }
}

#[derive(Clone, Debug)]
pub struct GameEngine {
    pub match_id: String,
    pub config: MatchConfig,

    seed: u32,
    phase: MatchPhase,
    players: Vec<PlayerInternal>,
    board: Board,
    light_sources: Vec<LightSource>,
    objectives: Vec<Vec<ObjectiveId>>,
    completed_objectives: Vec<BTreeSet<ObjectiveId>>,
    disconnected: BTreeSet<usize>,
    current_turn: usize,
    round: u32,
    turn_started_at_ms: u64,
    result: Option<MatchResult>,
    end_reason: Option<GameOverReason>,

    territory: Territory,
    scores: ScoreReport,
}

impl GameEngine {
    pub fn new(match_id: impl Into<String>, options: GameEngineOptions) -> Self {
        let config = options.resolve();
        Self {
            match_id: match_id.into(),
            seed: 0,
            phase: MatchPhase::Waiting,
            players: Vec::new(),
            board: Board::new(config.board_size),
            light_sources: Vec::new(),
            objectives: Vec::new(),
            completed_objectives: Vec::new(),
            disconnected: BTreeSet::new(),
            current_turn: 0,
            round: 1,
            turn_started_at_ms: 0,
            result: None,
            end_reason: None,
            territory: Territory::new(config.board_size),
            scores: ScoreReport::default(),
            config,
        }
    }

    pub fn start(
        match_id: impl Into<String>,
        players: Vec<StartPlayer>,
        seed: u32,
        options: GameEngineOptions,
        now_ms: u64,
    ) -> Result<Self, InitError> {
        let mut engine = Self::new(match_id, options);
        engine.initialize(players, seed, now_ms)?;
        Ok(engine)
    }

    pub fn initialize(
        &mut self,
        start_players: Vec<StartPlayer>,
        seed: u32,
        now_ms: u64,
    ) -> Result<Snapshot, InitError> {
        if self.phase != MatchPhase::Waiting {
            return Err(LifecycleError::AlreadyStarted.into());
        }
        let player_count = start_players.len();
        if player_count < MIN_PLAYERS {
            return Err(InitError::InsufficientPlayers(player_count));
        }
        if player_count > MAX_PLAYERS {
            return Err(InitError::TooManyPlayers(player_count));
        }

        let mut rng = Rng::new(seed);
        let objectives = assign_objectives(
            player_count,
            self.config.objectives_per_player,
            self.config.objective_policy,
            &mut rng,
        )?;

        let light_sources: Vec<LightSource> = get_source_layout(player_count, self.config.board_size)
            .into_iter()
            .map(|slot| LightSource {
                x: slot.x,
                y: slot.y,
                direction: slot.direction,
                player: slot.player,
                color: start_players[slot.player].color.clone(),
            })
            .collect();

        let mut board = Board::new(self.config.board_size);
        board.protect_source_lanes(&light_sources);
        board.scatter_amplifiers(&mut rng);

        self.seed = seed;
        self.players = start_players
            .into_iter()
            .map(|start| PlayerInternal {
                id: start.id,
                name: start.name,
                color: start.color,
                inventory: starting_inventory(),
                missed_turns: 0,
                last_seen_ms: None,
            })
            .collect();
        self.board = board;
        self.light_sources = light_sources;
        self.completed_objectives = vec![BTreeSet::new(); player_count];
        self.objectives = objectives;
        self.disconnected.clear();
        self.current_turn = 0;
        self.round = 1;
        self.turn_started_at_ms = now_ms;
        self.phase = MatchPhase::Playing;
        self.refresh_scores();

        info!(
            match_id = %self.match_id,
            players = player_count,
            sources = self.light_sources.len(),
            amplifiers = self.board.amplifier_cells().len(),
            seed,
            "match started"
        );
        Ok(self.build_snapshot(None))
    }

    pub fn phase(&self) -> MatchPhase {
        self.phase
    }

    pub fn is_finished(&self) -> bool {
        self.phase == MatchPhase::Finished
    }

    pub fn seed(&self) -> u32 {
        self.seed
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn current_turn(&self) -> usize {
        self.current_turn
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn result(&self) -> Option<&MatchResult> {
        self.result.as_ref()
    }

    pub fn end_reason(&self) -> Option<GameOverReason> {
        self.end_reason
    }

    pub fn disconnected(&self) -> &BTreeSet<usize> {
        &self.disconnected
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn territory(&self) -> &Territory {
        &self.territory
    }

    pub fn scores(&self) -> &[ScoreBreakdown] {
        &self.scores.breakdowns
    }

    pub fn completed_objectives(&self, player: usize) -> Option<&BTreeSet<ObjectiveId>> {
        self.completed_objectives.get(player)
    }

    pub fn missed_turns(&self, player: usize) -> Option<u32> {
        self.players.get(player).map(|p| p.missed_turns)
    }

    pub fn inventory(&self, player: usize) -> Option<Inventory> {
        self.players.get(player).map(|p| p.inventory)
    }

    pub fn player_index(&self, player_id: &str) -> Option<usize> {
        self.players.iter().position(|player| player.id == player_id)
    }

    pub fn turn_deadline_ms(&self) -> u64 {
        self.turn_started_at_ms
            .saturating_add(self.config.turn_duration_ms)
    }

    pub fn place_piece(
        &mut self,
        player: usize,
        x: i32,
        y: i32,
        piece_type: PieceType,
        rotation: i32,
        now_ms: u64,
    ) -> Result<Snapshot, ActionError> {
        self.ensure_playing()?;
        self.ensure_turn(player)?;

        let acting = &mut self.players[player];
        self.board.place_piece(
            x,
            y,
            piece_type,
            rotation,
            player,
            &acting.color,
            &mut acting.inventory,
        )?;
        acting.missed_turns = 0;
        debug!(
            match_id = %self.match_id,
            player,
            x,
            y,
            piece = %piece_type,
            rotation,
            "piece placed"
        );

        self.refresh_scores();
        self.advance_turn(now_ms);
        Ok(self.build_snapshot(Some(player)))
    }

    // Pickup is a free action: the turn stays with the player and the spent
    // piece is not returned to the inventory.
    pub fn pickup_piece(&mut self, player: usize, x: i32, y: i32) -> Result<Snapshot, ActionError> {
        self.ensure_playing()?;
        self.ensure_turn(player)?;
        if !self.board.in_bounds(x, y) {
            return Err(PlacementError::OutOfBounds { x, y }.into());
        }
        let Some(piece) = self.board.piece_at(x, y) else {
            return Err(PlacementError::EmptyCell { x, y }.into());
        };
        if piece.player != player {
            return Err(PlacementError::NotPieceOwner { x, y }.into());
        }
        if self
            .territory
            .claimants(x, y)
            .into_iter()
            .any(|claimant| claimant != player)
        {
            return Err(PlacementError::PieceClaimed { x, y }.into());
        }

        self.board.remove_piece(x, y);
        debug!(match_id = %self.match_id, player, x, y, "piece picked up");
        self.refresh_scores();
        Ok(self.build_snapshot(Some(player)))
    }

    pub fn pass_turn(&mut self, player: usize, now_ms: u64) -> Result<Snapshot, ActionError> {
        self.ensure_playing()?;
        self.ensure_turn(player)?;
        self.players[player].missed_turns = 0;
        debug!(match_id = %self.match_id, player, "turn passed");
        self.advance_turn(now_ms);
        Ok(self.build_snapshot(Some(player)))
    }

    pub fn preview_placement(
        &mut self,
        player: usize,
        x: i32,
        y: i32,
        piece_type: PieceType,
        rotation: i32,
    ) -> Result<PreviewSnapshot, ActionError> {
        self.ensure_playing()?;
        let Some(acting) = self.players.get(player) else {
            return Err(PlacementError::UnknownPlayer(player).into());
        };
        self.board
            .validate_placement(x, y, piece_type, rotation, &acting.inventory)?;

        let piece = Piece {
            piece_type,
            player,
            rotation: rotation.rem_euclid(360),
            color: acting.color.clone(),
        };
        let sources = &self.light_sources;
        let disconnected = &self.disconnected;
        let objectives = &self.objectives;
        let completed = &self.completed_objectives;
        let player_count = self.players.len();

        let preview = self.board.with_overlay(x, y, piece, |board| {
            let territory = compute_territory(board, sources, disconnected);
            let beams = compute_beam_segments(board, sources, disconnected);
            let report = evaluate_scores(&ScoreInput {
                board,
                territory: &territory,
                player_count,
                disconnected,
                objectives,
                completed,
            });
            PreviewSnapshot {
                placed: Vec2::new(x, y),
                piece_type,
                territory: territory.to_rows(),
                beams,
                scores: report.breakdowns,
            }
        })?;
        Ok(preview)
    }

    pub fn tick_timeout_check(&mut self, now_ms: u64) -> Option<Snapshot> {
        if self.phase != MatchPhase::Playing {
            return None;
        }
        let elapsed = now_ms.saturating_sub(self.turn_started_at_ms);
        if elapsed <= self.config.turn_duration_ms {
            return None;
        }
        self.handle_timeout(now_ms);
        Some(self.build_snapshot(None))
    }

    // Liveness only; disconnection is driven by missed turns.
    pub fn update_heartbeat(&mut self, player: usize, now_ms: u64) -> Result<(), ActionError> {
        let Some(target) = self.players.get_mut(player) else {
            return Err(PlacementError::UnknownPlayer(player).into());
        };
        target.last_seen_ms = Some(now_ms);
        Ok(())
    }

    pub fn build_snapshot(&self, viewer: Option<usize>) -> Snapshot {
        let my_objectives = viewer
            .and_then(|player| self.objectives.get(player).map(|list| (player, list)))
            .map(|(player, list)| {
                list.iter()
                    .map(|objective| ObjectiveView {
                        id: *objective,
                        label: objective.label().to_string(),
                        points: objective.points(),
                        completed: self.completed_objectives[player].contains(objective),
                    })
                    .collect()
            })
            .unwrap_or_default();

        Snapshot {
            match_id: self.match_id.clone(),
            phase: self.phase,
            config: self.config.clone(),
            round: self.round,
            current_turn: self.current_turn,
            turn_started_at_ms: self.turn_started_at_ms,
            turn_deadline_ms: self.turn_deadline_ms(),
            board: self.board.rows(),
            light_sources: self.light_sources.clone(),
            protected_zones: self.board.protected_cells(),
            amplifiers: self.board.amplifier_cells(),
            players: self.player_views(),
            territory: self.territory.to_rows(),
            beams: compute_beam_segments(&self.board, &self.light_sources, &self.disconnected),
            scores: self.scores.breakdowns.clone(),
            my_objectives,
            result: self.result.clone(),
            end_reason: self.end_reason,
        }
    }

    pub fn player_views(&self) -> Vec<PlayerView> {
        self.players
            .iter()
            .enumerate()
            .map(|(index, player)| PlayerView {
                index,
                id: player.id.clone(),
                name: player.name.clone(),
                color: player.color.clone(),
                inventory: player.inventory,
                missed_turns: player.missed_turns,
                disconnected: self.disconnected.contains(&index),
                last_seen_ms: player.last_seen_ms,
            })
            .collect()
    }

    fn evaluate(&self, territory: &Territory) -> ScoreReport {
        evaluate_scores(&ScoreInput {
            board: &self.board,
            territory,
            player_count: self.players.len(),
            disconnected: &self.disconnected,
            objectives: &self.objectives,
            completed: &self.completed_objectives,
        })
    }

    fn refresh_scores(&mut self) {
        let territory = compute_territory(&self.board, &self.light_sources, &self.disconnected);
        let report = self.evaluate(&territory);
        for (player, objective) in &report.newly_completed {
            if let Some(done) = self.completed_objectives.get_mut(*player) {
                if done.insert(*objective) {
                    info!(
                        match_id = %self.match_id,
                        player = *player,
                        objective = ?objective,
                        points = objective.points(),
                        "objective completed"
                    );
                }
            }
        }
        self.territory = territory;
        self.scores = report;
    }
}
