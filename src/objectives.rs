use serde::{Deserialize, Serialize};

use crate::board::Board;
use crate::error::InitError;
use crate::light::Territory;
use crate::rng::Rng;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectiveId {
    CornerControl,
    CenterControl,
    EdgeRunner,
    AmplifierHoarder,
    FourQuadrants,
}

pub const OBJECTIVE_POOL: [ObjectiveId; 5] = [
    ObjectiveId::CornerControl,
    ObjectiveId::CenterControl,
    ObjectiveId::EdgeRunner,
    ObjectiveId::AmplifierHoarder,
    ObjectiveId::FourQuadrants,
];

const CORNERS_REQUIRED: usize = 2;
const EDGE_CELLS_REQUIRED: usize = 8;
const AMPLIFIERS_REQUIRED: usize = 3;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectivePolicy {
    // Each player draws from the full pool; two players may hold the same objective.
    #[default]
    Independent,
    // No objective is handed to more than one player.
    Exclusive,
}

impl ObjectivePolicy {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "independent" => Some(Self::Independent),
            "exclusive" => Some(Self::Exclusive),
            _ => None,
        }
    }
}

impl ObjectiveId {
    pub fn label(self) -> &'static str {
        match self {
            Self::CornerControl => "Hold two corners",
            Self::CenterControl => "Control the 2x2 center",
            Self::EdgeRunner => "Control 8 edge cells",
            Self::AmplifierHoarder => "Control 3 amplifier tiles",
            Self::FourQuadrants => "Reach every quadrant",
        }
    }

    pub fn points(self) -> i32 {
        match self {
            Self::CornerControl => 15,
            Self::CenterControl => 20,
            Self::EdgeRunner => 10,
            Self::AmplifierHoarder => 15,
            Self::FourQuadrants => 10,
        }
    }

    pub fn is_satisfied(self, board: &Board, territory: &Territory, player: usize) -> bool {
        let size = territory.size();
        let last = size - 1;
        match self {
            Self::CornerControl => {
                let corners = [(0, 0), (last, 0), (0, last), (last, last)];
                corners
                    .iter()
                    .filter(|&&(x, y)| territory.is_controlled_by(x, y, player))
                    .count()
                    >= CORNERS_REQUIRED
            }
            Self::CenterControl => {
                let low = size / 2 - 1;
                let high = size / 2;
                [(low, low), (high, low), (low, high), (high, high)]
                    .iter()
                    .all(|&(x, y)| territory.is_controlled_by(x, y, player))
            }
            Self::EdgeRunner => {
                territory
                    .controlled_cells(player)
                    .filter(|&(x, y)| x == 0 || y == 0 || x == last || y == last)
                    .count()
                    >= EDGE_CELLS_REQUIRED
            }
            Self::AmplifierHoarder => {
                board
                    .amplifier_cells()
                    .iter()
                    .filter(|cell| territory.is_controlled_by(cell.x, cell.y, player))
                    .count()
                    >= AMPLIFIERS_REQUIRED
            }
            Self::FourQuadrants => {
                let half = size / 2;
                let mut seen = [false; 4];
                for (x, y) in territory.controlled_cells(player) {
                    let quadrant = usize::from(x >= half) + 2 * usize::from(y >= half);
                    seen[quadrant] = true;
                }
                seen.iter().all(|hit| *hit)
            }
        }
    }
}

pub fn assign_objectives(
    player_count: usize,
    per_player: usize,
    policy: ObjectivePolicy,
    rng: &mut Rng,
) -> Result<Vec<Vec<ObjectiveId>>, InitError> {
    let available = OBJECTIVE_POOL.len();
    match policy {
        ObjectivePolicy::Independent => {
            if per_player > available {
                return Err(InitError::ObjectivePoolExhausted {
                    needed: per_player,
                    available,
                });
            }
            Ok((0..player_count)
                .map(|_| {
                    rng.sample_indices(available, per_player)
                        .into_iter()
                        .map(|idx| OBJECTIVE_POOL[idx])
                        .collect()
                })
                .collect())
        }
        ObjectivePolicy::Exclusive => {
            let needed = per_player * player_count;
            if needed > available {
                return Err(InitError::ObjectivePoolExhausted { needed, available });
            }
            let drawn = rng.sample_indices(available, needed);
            Ok(drawn
                .chunks(per_player.max(1))
                .take(player_count)
                .map(|chunk| chunk.iter().map(|idx| OBJECTIVE_POOL[*idx]).collect())
                .collect())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::BOARD_SIZE;
    use crate::light::compute_territory;
    use crate::types::{Direction, LightSource, PieceType};
    use std::collections::{BTreeSet, HashSet};

    fn source(player: usize, x: i32, y: i32, direction: Direction) -> LightSource {
        LightSource {
            x,
            y,
            direction,
            player,
            color: "#FF6B6B".to_string(),
        }
    }

    #[test]
    fn independent_policy_gives_distinct_objectives_per_player() {
        for seed in 1..100u32 {
            let mut rng = Rng::new(seed);
            let assigned = assign_objectives(4, 2, ObjectivePolicy::Independent, &mut rng)
                .expect("independent sampling never exhausts at 2 per player");
            assert_eq!(assigned.len(), 4);
            for objectives in assigned {
                assert_eq!(objectives.len(), 2);
                assert_ne!(objectives[0], objectives[1]);
            }
        }
    }

    #[test]
    fn exclusive_policy_never_shares_and_fails_when_pool_is_short() {
        let mut rng = Rng::new(5);
        let assigned = assign_objectives(2, 2, ObjectivePolicy::Exclusive, &mut rng)
            .expect("four of five objectives fit");
        let all: HashSet<ObjectiveId> = assigned.iter().flatten().copied().collect();
        assert_eq!(all.len(), 4);

        let mut rng = Rng::new(5);
        assert_eq!(
            assign_objectives(3, 2, ObjectivePolicy::Exclusive, &mut rng),
            Err(InitError::ObjectivePoolExhausted {
                needed: 6,
                available: 5
            })
        );
    }

    #[test]
    fn center_control_needs_all_four_center_cells() {
        let mut board = Board::new(BOARD_SIZE);
        board.set_piece(5, 3, PieceType::Prism, 0, 0);
        board.set_piece(6, 3, PieceType::Prism, 0, 0);
        let sources = [
            source(0, 5, -1, Direction::Down),
            source(0, 6, -1, Direction::Down),
        ];
        let territory = compute_territory(&board, &sources, &BTreeSet::new());
        assert!(ObjectiveId::CenterControl.is_satisfied(&board, &territory, 0));
        assert!(!ObjectiveId::CenterControl.is_satisfied(&board, &territory, 1));

        let contested = [
            source(0, 5, -1, Direction::Down),
            source(0, 6, -1, Direction::Down),
            source(1, -1, 6, Direction::Right),
        ];
        let board = Board::new(BOARD_SIZE);
        let territory = compute_territory(&board, &contested, &BTreeSet::new());
        assert!(!ObjectiveId::CenterControl.is_satisfied(&board, &territory, 0));
    }

    #[test]
    fn edge_runner_and_corner_control_follow_edge_beams() {
        let board = Board::new(BOARD_SIZE);
        let sources = [
            source(0, 0, -1, Direction::Down),
            source(0, BOARD_SIZE, 11, Direction::Left),
        ];
        let territory = compute_territory(&board, &sources, &BTreeSet::new());
        assert!(ObjectiveId::EdgeRunner.is_satisfied(&board, &territory, 0));
        assert!(ObjectiveId::CornerControl.is_satisfied(&board, &territory, 0));
        assert!(!ObjectiveId::FourQuadrants.is_satisfied(&board, &territory, 0));
    }

    #[test]
    fn four_quadrants_and_amplifiers() {
        let mut board = Board::new(BOARD_SIZE);
        board.set_amplifiers(&[(4, 4), (4, 7), (7, 4)]);
        let sources = [
            source(0, 4, -1, Direction::Down),
            source(0, -1, 4, Direction::Right),
            source(0, 7, BOARD_SIZE, Direction::Up),
        ];
        let territory = compute_territory(&board, &sources, &BTreeSet::new());
        assert!(ObjectiveId::FourQuadrants.is_satisfied(&board, &territory, 0));
        assert!(ObjectiveId::AmplifierHoarder.is_satisfied(&board, &territory, 0));
    }
}
