use std::collections::BTreeSet;

use crate::constants::{
    AMPLIFIER_COUNT, AMPLIFIER_EDGE_MARGIN, AMPLIFIER_MAX_ATTEMPTS, PROTECTED_CELLS_PER_SOURCE,
};
use crate::error::PlacementError;
use crate::rng::Rng;
use crate::types::{Inventory, LightSource, Piece, PieceType, Vec2};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Board {
    size: i32,
    cells: Vec<Option<Piece>>,
    protected: BTreeSet<(i32, i32)>,
    amplifiers: BTreeSet<(i32, i32)>,
}

impl Board {
    pub fn new(size: i32) -> Self {
        let size = size.max(1);
        Self {
            size,
            cells: vec![None; (size * size) as usize],
            protected: BTreeSet::new(),
            amplifiers: BTreeSet::new(),
        }
    }

    pub fn size(&self) -> i32 {
        self.size
    }

    pub fn in_bounds(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && x < self.size && y < self.size
    }

    fn index(&self, x: i32, y: i32) -> Option<usize> {
        if !self.in_bounds(x, y) {
            return None;
        }
        Some((y * self.size + x) as usize)
    }

    pub fn piece_at(&self, x: i32, y: i32) -> Option<&Piece> {
        self.index(x, y).and_then(|idx| self.cells[idx].as_ref())
    }

    pub fn is_protected(&self, x: i32, y: i32) -> bool {
        self.protected.contains(&(x, y))
    }

    pub fn is_amplifier(&self, x: i32, y: i32) -> bool {
        self.amplifiers.contains(&(x, y))
    }

    pub fn protected_cells(&self) -> Vec<Vec2> {
        self.protected.iter().map(|&(x, y)| Vec2::new(x, y)).collect()
    }

    pub fn amplifier_cells(&self) -> Vec<Vec2> {
        self.amplifiers.iter().map(|&(x, y)| Vec2::new(x, y)).collect()
    }

    pub fn pieces(&self) -> impl Iterator<Item = (i32, i32, &Piece)> + '_ {
        let size = self.size;
        self.cells.iter().enumerate().filter_map(move |(idx, cell)| {
            let piece = cell.as_ref()?;
            let idx = idx as i32;
            Some((idx % size, idx / size, piece))
        })
    }

    pub fn rows(&self) -> Vec<Vec<Option<Piece>>> {
        self.cells
            .chunks(self.size as usize)
            .map(|row| row.to_vec())
            .collect()
    }

    pub fn protect_source_lanes(&mut self, sources: &[LightSource]) {
        for source in sources {
            let (mut x, mut y) = (source.x, source.y);
            for _ in 0..PROTECTED_CELLS_PER_SOURCE {
                (x, y) = source.direction.step(x, y);
                if self.in_bounds(x, y) {
                    self.protected.insert((x, y));
                }
            }
        }
    }

    // Rejection sampling over the interior; gives up quietly if the attempt
    // budget runs out before the target count is reached.
    pub fn scatter_amplifiers(&mut self, rng: &mut Rng) {
        let min = AMPLIFIER_EDGE_MARGIN;
        let max = self.size - 1 - AMPLIFIER_EDGE_MARGIN;
        if max < min {
            return;
        }
        let mut attempts = 0;
        while self.amplifiers.len() < AMPLIFIER_COUNT && attempts < AMPLIFIER_MAX_ATTEMPTS {
            attempts += 1;
            let x = rng.int(min, max);
            let y = rng.int(min, max);
            if self.protected.contains(&(x, y)) {
                continue;
            }
            self.amplifiers.insert((x, y));
        }
    }

    pub fn validate_placement(
        &self,
        x: i32,
        y: i32,
        piece_type: PieceType,
        rotation: i32,
        inventory: &Inventory,
    ) -> Result<(), PlacementError> {
        self.validate_cell(x, y)?;
        if rotation.rem_euclid(90) != 0 {
            return Err(PlacementError::InvalidRotation(rotation));
        }
        if inventory.remaining(piece_type) == 0 {
            return Err(PlacementError::InventoryExhausted(piece_type));
        }
        Ok(())
    }

    pub fn validate_cell(&self, x: i32, y: i32) -> Result<(), PlacementError> {
        if !self.in_bounds(x, y) {
            return Err(PlacementError::OutOfBounds { x, y });
        }
        if self.is_protected(x, y) {
            return Err(PlacementError::ZoneProtected { x, y });
        }
        if self.piece_at(x, y).is_some() {
            return Err(PlacementError::CellOccupied { x, y });
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    pub fn place_piece(
        &mut self,
        x: i32,
        y: i32,
        piece_type: PieceType,
        rotation: i32,
        player: usize,
        color: &str,
        inventory: &mut Inventory,
    ) -> Result<(), PlacementError> {
        self.validate_placement(x, y, piece_type, rotation, inventory)?;
        if !inventory.take(piece_type) {
            return Err(PlacementError::InventoryExhausted(piece_type));
        }
        let Some(idx) = self.index(x, y) else {
            return Err(PlacementError::OutOfBounds { x, y });
        };
        self.cells[idx] = Some(Piece {
            piece_type,
            player,
            rotation: rotation.rem_euclid(360),
            color: color.to_string(),
        });
        Ok(())
    }

    pub fn remove_piece(&mut self, x: i32, y: i32) -> Option<Piece> {
        let idx = self.index(x, y)?;
        self.cells[idx].take()
    }

    // Lays `piece` on an empty cell for the duration of `f`, then restores the
    // cell. Exclusive access is guaranteed by the `&mut self` borrow.
    pub fn with_overlay<R>(
        &mut self,
        x: i32,
        y: i32,
        piece: Piece,
        f: impl FnOnce(&Board) -> R,
    ) -> Result<R, PlacementError> {
        self.validate_cell(x, y)?;
        let Some(idx) = self.index(x, y) else {
            return Err(PlacementError::OutOfBounds { x, y });
        };
        self.cells[idx] = Some(piece);
        let result = f(self);
        self.cells[idx] = None;
        Ok(result)
    }

    pub(crate) fn restore(
        size: i32,
        rows: Vec<Vec<Option<Piece>>>,
        protected: &[Vec2],
        amplifiers: &[Vec2],
    ) -> Self {
        let mut board = Self::new(size);
        for (y, row) in rows.into_iter().enumerate() {
            for (x, cell) in row.into_iter().enumerate() {
                if let Some(idx) = board.index(x as i32, y as i32) {
                    board.cells[idx] = cell;
                }
            }
        }
        board.protected = protected.iter().map(|cell| (cell.x, cell.y)).collect();
        board.amplifiers = amplifiers.iter().map(|cell| (cell.x, cell.y)).collect();
        board
    }

    #[cfg(test)]
    pub(crate) fn set_piece(&mut self, x: i32, y: i32, piece_type: PieceType, player: usize, rotation: i32) {
        let idx = self.index(x, y).expect("cell in bounds");
        self.cells[idx] = Some(Piece {
            piece_type,
            player,
            rotation,
            color: crate::constants::player_color(player).to_string(),
        });
    }

    #[cfg(test)]
    pub(crate) fn set_amplifiers(&mut self, cells: &[(i32, i32)]) {
        self.amplifiers = cells.iter().copied().collect();
    }
}
