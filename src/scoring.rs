use std::collections::{BTreeSet, HashSet, VecDeque};

use crate::board::Board;
use crate::constants::{
    CASCADE_BONUS, CASCADE_MIN_CELLS, CASCADE_RADIUS, MIRROR_CHAIN_MIN_LEN,
    MIRROR_CHAIN_POINTS_PER_LINK,
};
use crate::light::Territory;
use crate::objectives::ObjectiveId;
use crate::types::{Direction, PieceType, ScoreBreakdown};

pub struct ScoreInput<'a> {
    pub board: &'a Board,
    pub territory: &'a Territory,
    pub player_count: usize,
    pub disconnected: &'a BTreeSet<usize>,
    pub objectives: &'a [Vec<ObjectiveId>],
    pub completed: &'a [BTreeSet<ObjectiveId>],
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ScoreReport {
    pub breakdowns: Vec<ScoreBreakdown>,
    pub newly_completed: Vec<(usize, ObjectiveId)>,
}

impl ScoreReport {
    pub fn total(&self, player: usize) -> i32 {
        self.breakdowns
            .get(player)
            .map(|breakdown| breakdown.total)
            .unwrap_or(0)
    }
}

// Pure: objective completions are reported, never written back. The caller
// decides whether to commit them.
pub fn evaluate_scores(input: &ScoreInput<'_>) -> ScoreReport {
    let mut report = ScoreReport::default();
    let chains = mirror_chain_bonuses(input.board, input.player_count);

    for player in 0..input.player_count {
        if input.disconnected.contains(&player) {
            report.breakdowns.push(ScoreBreakdown {
                player,
                active: false,
                ..ScoreBreakdown::default()
            });
            continue;
        }

        let territory = territory_points(input.board, input.territory, player);
        let mirror_chain = chains[player];
        let cascade = cascade_bonus(input.board, input.territory, player);

        let mut objectives = 0;
        let assigned = input.objectives.get(player).map(Vec::as_slice).unwrap_or(&[]);
        let completed = input.completed.get(player);
        for objective in assigned {
            let already = completed.is_some_and(|done| done.contains(objective));
            if already {
                objectives += objective.points();
            } else if objective.is_satisfied(input.board, input.territory, player) {
                objectives += objective.points();
                report.newly_completed.push((player, *objective));
            }
        }

        report.breakdowns.push(ScoreBreakdown {
            player,
            territory,
            mirror_chain,
            cascade,
            objectives,
            total: territory + mirror_chain + cascade + objectives,
            active: true,
        });
    }
    report
}

pub fn territory_points(board: &Board, territory: &Territory, player: usize) -> i32 {
    territory
        .controlled_cells(player)
        .map(|(x, y)| if board.is_amplifier(x, y) { 2 } else { 1 })
        .sum()
}

pub fn mirror_chain_bonuses(board: &Board, player_count: usize) -> Vec<i32> {
    let mut bonuses = vec![0; player_count];
    let mut counted: HashSet<(i32, i32)> = HashSet::new();

    for (x, y, piece) in board.pieces() {
        if piece.piece_type != PieceType::Mirror || counted.contains(&(x, y)) {
            continue;
        }
        let owner = piece.player;
        let mut queue = VecDeque::from([(x, y)]);
        counted.insert((x, y));
        let mut length = 0usize;
        while let Some((cx, cy)) = queue.pop_front() {
            length += 1;
            for direction in Direction::CYCLE {
                let (nx, ny) = direction.step(cx, cy);
                if counted.contains(&(nx, ny)) {
                    continue;
                }
                let same_chain = board
                    .piece_at(nx, ny)
                    .is_some_and(|next| next.piece_type == PieceType::Mirror && next.player == owner);
                if same_chain {
                    counted.insert((nx, ny));
                    queue.push_back((nx, ny));
                }
            }
        }

        if length >= MIRROR_CHAIN_MIN_LEN {
            if let Some(bonus) = bonuses.get_mut(owner) {
                *bonus += MIRROR_CHAIN_POINTS_PER_LINK * (length as i32 - 2);
            }
        }
    }
    bonuses
}

pub fn cascade_bonus(board: &Board, territory: &Territory, player: usize) -> i32 {
    let mut bonus = 0;
    for (x, y, piece) in board.pieces() {
        if piece.player != player || !piece.piece_type.splits_light() {
            continue;
        }
        let mut lit = 0usize;
        for dy in -CASCADE_RADIUS..=CASCADE_RADIUS {
            for dx in -CASCADE_RADIUS..=CASCADE_RADIUS {
                if territory.is_claimed_by(x + dx, y + dy, player) {
                    lit += 1;
                }
            }
        }
        if lit >= CASCADE_MIN_CELLS {
            bonus += CASCADE_BONUS;
        }
    }
    bonus
}
