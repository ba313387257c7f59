use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use crate::board::Board;
use crate::constants::beam_step_budget;
use crate::types::{BeamSegment, Direction, LightSource, PieceType, Vec2};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Territory {
    size: i32,
    claims: Vec<u8>,
}

impl Territory {
    pub fn new(size: i32) -> Self {
        let size = size.max(1);
        Self {
            size,
            claims: vec![0; (size * size) as usize],
        }
    }

    pub fn size(&self) -> i32 {
        self.size
    }

    fn index(&self, x: i32, y: i32) -> Option<usize> {
        if x < 0 || y < 0 || x >= self.size || y >= self.size {
            return None;
        }
        Some((y * self.size + x) as usize)
    }

    fn claim(&mut self, x: i32, y: i32, player: usize) {
        debug_assert!(player < 8, "territory mask holds at most 8 players");
        if player >= 8 {
            return;
        }
        if let Some(idx) = self.index(x, y) {
            self.claims[idx] |= 1 << player;
        }
    }

    pub fn is_claimed_by(&self, x: i32, y: i32, player: usize) -> bool {
        player < 8
            && self
                .index(x, y)
                .map(|idx| self.claims[idx] & (1 << player) != 0)
                .unwrap_or(false)
    }

    pub fn claimants(&self, x: i32, y: i32) -> Vec<usize> {
        let Some(idx) = self.index(x, y) else {
            return Vec::new();
        };
        let mask = self.claims[idx];
        (0..8).filter(|player| mask & (1 << player) != 0).collect()
    }

    pub fn claimant_count(&self, x: i32, y: i32) -> usize {
        self.index(x, y)
            .map(|idx| self.claims[idx].count_ones() as usize)
            .unwrap_or(0)
    }

    // A cell is controlled only when exactly one player's light reaches it.
    pub fn controller(&self, x: i32, y: i32) -> Option<usize> {
        let idx = self.index(x, y)?;
        let mask = self.claims[idx];
        if mask.count_ones() != 1 {
            return None;
        }
        Some(mask.trailing_zeros() as usize)
    }

    pub fn is_controlled_by(&self, x: i32, y: i32, player: usize) -> bool {
        self.controller(x, y) == Some(player)
    }

    pub fn controlled_cells(&self, player: usize) -> impl Iterator<Item = (i32, i32)> + '_ {
        let size = self.size;
        (0..size * size)
            .map(move |idx| (idx % size, idx / size))
            .filter(move |&(x, y)| self.is_controlled_by(x, y, player))
    }

    pub fn to_rows(&self) -> Vec<Vec<Vec<usize>>> {
        (0..self.size)
            .map(|y| (0..self.size).map(|x| self.claimants(x, y)).collect())
            .collect()
    }
}

#[derive(Clone, Debug)]
pub struct Beam {
    pub x: i32,
    pub y: i32,
    pub direction: Direction,
    pub player: usize,
    pub steps_left: u32,
    pub penetrated: bool,
    pub visited: HashSet<(i32, i32)>,
    segment_start: Vec2,
}

impl Beam {
    pub fn from_source(source: &LightSource, steps: u32) -> Self {
        Self {
            x: source.x,
            y: source.y,
            direction: source.direction,
            player: source.player,
            steps_left: steps,
            penetrated: false,
            visited: HashSet::new(),
            segment_start: Vec2::new(source.x, source.y),
        }
    }

    // Children carry a private copy of the visited set and the current
    // penetration flag, and start a fresh trace with their own step budget.
    pub fn fork(&self, direction: Direction, steps: u32) -> Self {
        Self {
            x: self.x,
            y: self.y,
            direction,
            player: self.player,
            steps_left: steps,
            penetrated: self.penetrated,
            visited: self.visited.clone(),
            segment_start: Vec2::new(self.x, self.y),
        }
    }

    fn state_key(&self) -> (i32, i32, Direction, bool) {
        (self.x, self.y, self.direction, self.penetrated)
    }
}

pub trait BeamVisitor {
    fn claim(&mut self, _player: usize, _x: i32, _y: i32) {}

    fn segment(&mut self, _player: usize, _from: Vec2, _to: Vec2) {}
}

struct TerritoryVisitor<'a> {
    territory: &'a mut Territory,
}

impl BeamVisitor for TerritoryVisitor<'_> {
    fn claim(&mut self, player: usize, x: i32, y: i32) {
        self.territory.claim(x, y, player);
    }
}

struct SegmentVisitor<'a> {
    color: &'a str,
    segments: &'a mut Vec<BeamSegment>,
}

impl BeamVisitor for SegmentVisitor<'_> {
    fn segment(&mut self, player: usize, from: Vec2, to: Vec2) {
        if from == to {
            return;
        }
        self.segments.push(BeamSegment {
            from,
            to,
            player,
            color: self.color.to_string(),
        });
    }
}

pub fn trace_source(board: &Board, source: &LightSource, visitor: &mut impl BeamVisitor) {
    let budget = beam_step_budget(board.size());
    let mut expanded: HashMap<(i32, i32, Direction, bool), u32> = HashMap::new();
    let mut pending = VecDeque::from([Beam::from_source(source, budget)]);

    while let Some(mut beam) = pending.pop_front() {
        loop {
            if beam.steps_left == 0 {
                visitor.segment(beam.player, beam.segment_start, Vec2::new(beam.x, beam.y));
                break;
            }
            let (nx, ny) = beam.direction.step(beam.x, beam.y);
            if !board.in_bounds(nx, ny) {
                visitor.segment(beam.player, beam.segment_start, Vec2::new(beam.x, beam.y));
                break;
            }
            beam.steps_left -= 1;
            beam.x = nx;
            beam.y = ny;
            if beam.visited.insert((nx, ny)) {
                visitor.claim(beam.player, nx, ny);
            }

            let Some(piece) = board.piece_at(nx, ny) else {
                continue;
            };
            let here = Vec2::new(nx, ny);
            visitor.segment(beam.player, beam.segment_start, here);
            beam.segment_start = here;

            match piece.piece_type {
                PieceType::Blocker => {
                    if beam.penetrated {
                        break;
                    }
                    beam.penetrated = true;
                }
                PieceType::Mirror => {
                    beam.direction = beam.direction.reflect(piece.rotation);
                }
                PieceType::Prism | PieceType::Splitter => {
                    for direction in beam.direction.perpendiculars() {
                        let child = beam.fork(direction, budget);
                        let key = child.state_key();
                        if expanded
                            .get(&key)
                            .is_some_and(|&seen| seen >= child.steps_left)
                        {
                            continue;
                        }
                        expanded.insert(key, child.steps_left);
                        pending.push_back(child);
                    }
                    if piece.piece_type == PieceType::Splitter {
                        break;
                    }
                }
            }
        }
    }
}

pub fn active_sources<'a>(
    sources: &'a [LightSource],
    disconnected: &'a BTreeSet<usize>,
) -> impl Iterator<Item = &'a LightSource> + 'a {
    sources
        .iter()
        .filter(move |source| !disconnected.contains(&source.player))
}

pub fn compute_territory(
    board: &Board,
    sources: &[LightSource],
    disconnected: &BTreeSet<usize>,
) -> Territory {
    let mut territory = Territory::new(board.size());
    for source in active_sources(sources, disconnected) {
        let mut visitor = TerritoryVisitor {
            territory: &mut territory,
        };
        trace_source(board, source, &mut visitor);
    }
    territory
}

pub fn compute_beam_segments(
    board: &Board,
    sources: &[LightSource],
    disconnected: &BTreeSet<usize>,
) -> Vec<BeamSegment> {
    let mut segments = Vec::new();
    for source in active_sources(sources, disconnected) {
        let mut visitor = SegmentVisitor {
            color: &source.color,
            segments: &mut segments,
        };
        trace_source(board, source, &mut visitor);
    }
    segments
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{get_source_layout, player_color, BOARD_SIZE};
    use crate::rng::Rng;

    fn source(player: usize, x: i32, y: i32, direction: Direction) -> LightSource {
        LightSource {
            x,
            y,
            direction,
            player,
            color: player_color(player).to_string(),
        }
    }

    fn top_source() -> LightSource {
        source(0, 2, -1, Direction::Down)
    }

    fn claimed_cells(territory: &Territory, player: usize) -> Vec<(i32, i32)> {
        let mut cells = Vec::new();
        for y in 0..territory.size() {
            for x in 0..territory.size() {
                if territory.is_claimed_by(x, y, player) {
                    cells.push((x, y));
                }
            }
        }
        cells
    }

    #[derive(Default)]
    struct CountingVisitor {
        claims: usize,
    }

    impl BeamVisitor for CountingVisitor {
        fn claim(&mut self, _player: usize, _x: i32, _y: i32) {
            self.claims += 1;
        }
    }

    #[test]
    fn empty_board_beam_claims_whole_column() {
        let board = Board::new(BOARD_SIZE);
        let territory = compute_territory(&board, &[top_source()], &BTreeSet::new());
        let cells = claimed_cells(&territory, 0);
        assert_eq!(cells.len(), BOARD_SIZE as usize);
        assert!(cells.iter().all(|&(x, _)| x == 2));
        assert_eq!(territory.controller(2, 7), Some(0));
    }

    #[test]
    fn second_blocker_stops_the_beam() {
        let mut board = Board::new(BOARD_SIZE);
        board.set_piece(2, 3, PieceType::Blocker, 1, 0);
        board.set_piece(2, 6, PieceType::Blocker, 1, 0);
        let territory = compute_territory(&board, &[top_source()], &BTreeSet::new());
        for y in 0..=6 {
            assert!(territory.is_claimed_by(2, y, 0), "y={y} should be lit");
        }
        for y in 7..BOARD_SIZE {
            assert!(!territory.is_claimed_by(2, y, 0), "y={y} should be dark");
        }
    }

    #[test]
    fn backslash_mirror_turns_downward_beam_right() {
        let mut board = Board::new(BOARD_SIZE);
        board.set_piece(2, 5, PieceType::Mirror, 0, 0);
        let territory = compute_territory(&board, &[top_source()], &BTreeSet::new());
        for x in 2..BOARD_SIZE {
            assert!(territory.is_claimed_by(x, 5, 0));
        }
        assert!(!territory.is_claimed_by(1, 5, 0));
        assert!(!territory.is_claimed_by(2, 6, 0));
    }

    #[test]
    fn slash_mirror_turns_downward_beam_left() {
        let mut board = Board::new(BOARD_SIZE);
        board.set_piece(2, 5, PieceType::Mirror, 0, 90);
        let territory = compute_territory(&board, &[top_source()], &BTreeSet::new());
        assert!(territory.is_claimed_by(0, 5, 0));
        assert!(!territory.is_claimed_by(3, 5, 0));
    }

    #[test]
    fn prism_lights_straight_and_both_sides() {
        let mut board = Board::new(BOARD_SIZE);
        board.set_piece(2, 5, PieceType::Prism, 0, 0);
        let territory = compute_territory(&board, &[top_source()], &BTreeSet::new());
        for x in 0..BOARD_SIZE {
            assert!(territory.is_claimed_by(x, 5, 0), "row cell x={x}");
        }
        for y in 0..BOARD_SIZE {
            assert!(territory.is_claimed_by(2, y, 0), "column cell y={y}");
        }
    }

    #[test]
    fn splitter_drops_the_straight_ray() {
        let mut board = Board::new(BOARD_SIZE);
        board.set_piece(2, 5, PieceType::Splitter, 0, 0);
        let territory = compute_territory(&board, &[top_source()], &BTreeSet::new());
        assert!(territory.is_claimed_by(0, 5, 0));
        assert!(territory.is_claimed_by(11, 5, 0));
        for y in 6..BOARD_SIZE {
            assert!(!territory.is_claimed_by(2, y, 0));
        }
    }

    #[test]
    fn split_children_inherit_penetration_flag() {
        let mut board = Board::new(BOARD_SIZE);
        board.set_piece(2, 2, PieceType::Blocker, 1, 0);
        board.set_piece(2, 5, PieceType::Prism, 0, 0);
        board.set_piece(6, 5, PieceType::Blocker, 1, 0);
        let territory = compute_territory(&board, &[top_source()], &BTreeSet::new());
        assert!(territory.is_claimed_by(6, 5, 0));
        assert!(!territory.is_claimed_by(7, 5, 0));
        assert!(territory.is_claimed_by(0, 5, 0));
        assert!(territory.is_claimed_by(2, 11, 0));
    }

    #[test]
    fn fork_copies_visited_set_privately() {
        let mut parent = Beam::from_source(&top_source(), 24);
        parent.visited.insert((2, 0));
        parent.steps_left = 3;
        let mut child = parent.fork(Direction::Left, 24);
        child.visited.insert((1, 0));
        assert!(child.visited.contains(&(2, 0)));
        assert!(!parent.visited.contains(&(1, 0)));
        assert_eq!(child.steps_left, 24);
        assert_eq!(parent.steps_left, 3);
    }

    #[test]
    fn late_prism_children_get_a_full_budget() {
        let mut board = Board::new(BOARD_SIZE);
        board.set_piece(2, 11, PieceType::Mirror, 0, 0);
        board.set_piece(10, 11, PieceType::Prism, 0, 0);
        let territory = compute_territory(&board, &[top_source()], &BTreeSet::new());
        // The prism is 20 steps from the source; its upward ray still spans the column.
        for y in 0..BOARD_SIZE {
            assert!(territory.is_claimed_by(10, y, 0), "column cell y={y}");
        }
        assert!(territory.is_claimed_by(11, 11, 0));
    }

    #[test]
    fn crossing_beams_of_two_players_contest_the_cell() {
        let board = Board::new(BOARD_SIZE);
        let sources = [top_source(), source(1, -1, 6, Direction::Right)];
        let territory = compute_territory(&board, &sources, &BTreeSet::new());
        assert_eq!(territory.claimants(2, 6), vec![0, 1]);
        assert_eq!(territory.controller(2, 6), None);
        assert_eq!(territory.controller(2, 5), Some(0));
        assert_eq!(territory.controller(5, 6), Some(1));
    }

    #[test]
    fn disconnected_sources_do_not_emit() {
        let board = Board::new(BOARD_SIZE);
        let sources = [top_source(), source(1, -1, 6, Direction::Right)];
        let disconnected = BTreeSet::from([1]);
        let territory = compute_territory(&board, &sources, &disconnected);
        assert_eq!(territory.claimant_count(5, 6), 0);
        assert_eq!(territory.controller(2, 6), Some(0));
        let beams = compute_beam_segments(&board, &sources, &disconnected);
        assert!(beams.iter().all(|beam| beam.player == 0));
    }

    #[test]
    fn step_budget_cuts_long_mirror_paths() {
        let mut board = Board::new(BOARD_SIZE);
        board.set_piece(2, 2, PieceType::Mirror, 1, 0);
        board.set_piece(8, 2, PieceType::Mirror, 1, 0);
        board.set_piece(8, 8, PieceType::Mirror, 1, 90);
        board.set_piece(2, 8, PieceType::Mirror, 1, 0);
        let mut counter = CountingVisitor::default();
        trace_source(&board, &top_source(), &mut counter);
        assert_eq!(counter.claims, 24);

        let territory = compute_territory(&board, &[top_source()], &BTreeSet::new());
        assert!(territory.is_claimed_by(2, 5, 0));
        assert!(!territory.is_claimed_by(2, 4, 0));
        assert!(!territory.is_claimed_by(0, 2, 0));
    }

    #[test]
    fn beam_segments_break_at_every_occupant() {
        let mut board = Board::new(BOARD_SIZE);
        let beams = compute_beam_segments(&board, &[top_source()], &BTreeSet::new());
        assert_eq!(beams.len(), 1);
        assert_eq!(beams[0].from, Vec2::new(2, -1));
        assert_eq!(beams[0].to, Vec2::new(2, 11));

        board.set_piece(2, 5, PieceType::Mirror, 1, 0);
        board.set_piece(7, 5, PieceType::Blocker, 1, 0);
        let beams = compute_beam_segments(&board, &[top_source()], &BTreeSet::new());
        let pairs: Vec<(Vec2, Vec2)> = beams.iter().map(|beam| (beam.from, beam.to)).collect();
        assert_eq!(
            pairs,
            vec![
                (Vec2::new(2, -1), Vec2::new(2, 5)),
                (Vec2::new(2, 5), Vec2::new(7, 5)),
                (Vec2::new(7, 5), Vec2::new(11, 5)),
            ]
        );
        assert!(beams.iter().all(|beam| beam.color == player_color(0)));
    }

    #[test]
    fn prism_loops_terminate() {
        let mut board = Board::new(BOARD_SIZE);
        board.set_piece(5, 5, PieceType::Prism, 0, 0);
        board.set_piece(5, 3, PieceType::Mirror, 0, 90);
        board.set_piece(7, 3, PieceType::Mirror, 0, 0);
        board.set_piece(7, 5, PieceType::Mirror, 0, 90);
        board.set_piece(3, 5, PieceType::Prism, 0, 0);
        board.set_piece(3, 3, PieceType::Splitter, 0, 0);
        let sources = [source(0, 5, -1, Direction::Down), source(0, -1, 5, Direction::Right)];
        let territory = compute_territory(&board, &sources, &BTreeSet::new());
        assert!(territory.is_claimed_by(5, 5, 0));
    }

    #[test]
    fn random_boards_are_deterministic_and_bounded() {
        for seed in 1..60u32 {
            let mut rng = Rng::new(seed);
            let mut board = Board::new(BOARD_SIZE);
            for _ in 0..40 {
                let x = rng.int(0, BOARD_SIZE - 1);
                let y = rng.int(0, BOARD_SIZE - 1);
                let piece_type = PieceType::ALL[rng.pick_index(4)];
                let player = rng.pick_index(4);
                board.set_piece(x, y, piece_type, player, 90 * rng.int(0, 3));
            }
            let players = 2 + rng.pick_index(3);
            let sources: Vec<LightSource> = get_source_layout(players, BOARD_SIZE)
                .into_iter()
                .map(|slot| source(slot.player, slot.x, slot.y, slot.direction))
                .collect();
            let none = BTreeSet::new();
            let first = compute_territory(&board, &sources, &none);
            let second = compute_territory(&board, &sources, &none);
            assert_eq!(first, second);
            for y in 0..BOARD_SIZE {
                for x in 0..BOARD_SIZE {
                    assert!(first.claimant_count(x, y) <= players);
                }
            }
            for beam in compute_beam_segments(&board, &sources, &none) {
                let length = (beam.to.x - beam.from.x).abs() + (beam.to.y - beam.from.y).abs();
                assert!(length <= 24);
            }
        }
    }
}
