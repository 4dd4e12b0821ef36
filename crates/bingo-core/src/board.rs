//! The local participant's board.
//!
//! An `N×N` grid of optional numbers. Each value in `1..=N²` appears at most
//! once. The board is filled by manual placement or auto-fill before the
//! session starts and sealed when the participant declares readiness; after
//! that it only changes through [`Board::auto_fill`] on a fresh board.

use std::fmt;

use bingo_proto::Number;

use crate::{env::Environment, error::PlacementError};

/// Square grid of placed numbers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Board {
    /// Edge length `N`.
    size: usize,
    /// Cells in row-major order.
    cells: Vec<Option<Number>>,
    /// Cell index of each placed value, indexed by value (slot 0 unused).
    positions: Vec<Option<usize>>,
    /// Set once the board may no longer change.
    sealed: bool,
}

impl Board {
    /// Create an empty `size×size` board.
    pub fn new(size: usize) -> Self {
        let cells = size * size;
        Self { size, cells: vec![None; cells], positions: vec![None; cells + 1], sealed: false }
    }

    /// Edge length `N`.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Highest placeable value (`N²`).
    pub fn max_value(&self) -> usize {
        self.cells.len()
    }

    /// Value at a cell, `None` if empty or out of bounds.
    pub fn get(&self, row: usize, col: usize) -> Option<Number> {
        if row >= self.size || col >= self.size {
            return None;
        }
        self.cells[row * self.size + col]
    }

    /// Cell holding `value`, if it is on the board.
    pub fn position(&self, value: Number) -> Option<(usize, usize)> {
        self.positions
            .get(usize::from(value))
            .copied()
            .flatten()
            .map(|idx| (idx / self.size, idx % self.size))
    }

    /// Whether `value` is placed on this board.
    pub fn contains(&self, value: Number) -> bool {
        self.position(value).is_some()
    }

    /// Number of filled cells.
    pub fn filled(&self) -> usize {
        self.cells.iter().filter(|c| c.is_some()).count()
    }

    /// True iff every cell is filled.
    pub fn is_complete(&self) -> bool {
        self.cells.iter().all(Option::is_some)
    }

    /// Whether the board has been sealed.
    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    /// Forbid further changes.
    pub(crate) fn seal(&mut self) {
        self.sealed = true;
    }

    /// Values still missing from the board, ascending.
    pub fn unplaced(&self) -> impl Iterator<Item = Number> + '_ {
        (1..=self.max_value()).filter_map(|v| Number::try_from(v).ok()).filter(|v| !self.contains(*v))
    }

    /// Place `value` at `(row, col)`.
    ///
    /// Fails without modifying the board if the cell is out of bounds or
    /// occupied, the value is out of range or already placed elsewhere, or
    /// the board is sealed.
    pub fn place(&mut self, row: usize, col: usize, value: Number) -> Result<(), PlacementError> {
        if self.sealed {
            return Err(PlacementError::Sealed);
        }

        if row >= self.size || col >= self.size {
            return Err(PlacementError::OutOfBounds { row, col, size: self.size });
        }

        let slot = usize::from(value);
        if slot == 0 || slot > self.max_value() {
            return Err(PlacementError::ValueOutOfRange { value, max: self.max_value() });
        }

        let idx = row * self.size + col;
        if self.cells[idx].is_some() {
            return Err(PlacementError::CellOccupied { row, col });
        }

        if let Some((row, col)) = self.position(value) {
            return Err(PlacementError::ValueAlreadyPlaced { value, row, col });
        }

        self.cells[idx] = Some(value);
        self.positions[slot] = Some(idx);
        Ok(())
    }

    /// Replace the whole board with `pool` laid out row-major.
    ///
    /// `pool` must be a permutation of `1..=N²`. Existing placements are
    /// discarded.
    pub fn auto_fill(&mut self, pool: &[Number]) -> Result<(), PlacementError> {
        if self.sealed {
            return Err(PlacementError::Sealed);
        }

        if pool.len() != self.max_value() {
            return Err(PlacementError::InvalidPool {
                reason: format!("expected {} numbers, got {}", self.max_value(), pool.len()),
            });
        }

        let mut positions = vec![None; self.max_value() + 1];
        for (idx, &value) in pool.iter().enumerate() {
            let slot = usize::from(value);
            if slot == 0 || slot > self.max_value() {
                return Err(PlacementError::InvalidPool {
                    reason: format!("{value} is outside 1..={}", self.max_value()),
                });
            }
            if positions[slot].is_some() {
                return Err(PlacementError::InvalidPool { reason: format!("{value} appears twice") });
            }
            positions[slot] = Some(idx);
        }

        self.cells = pool.iter().copied().map(Some).collect();
        self.positions = positions;
        Ok(())
    }

    /// Uniformly shuffled permutation of `1..=size²` drawn from `env`.
    pub fn shuffled_pool<E: Environment>(size: usize, env: &E) -> Vec<Number> {
        let mut pool: Vec<Number> =
            (1..=size * size).filter_map(|v| Number::try_from(v).ok()).collect();

        // Fisher-Yates
        for i in (1..pool.len()).rev() {
            let j = env.random_index(i + 1);
            pool.swap(i, j);
        }

        pool
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self.max_value().to_string().len();
        for row in 0..self.size {
            if row > 0 {
                writeln!(f)?;
            }
            for col in 0..self.size {
                if col > 0 {
                    write!(f, " ")?;
                }
                match self.get(row, col) {
                    Some(value) => write!(f, "{value:>width$}")?,
                    None => write!(f, "{:>width$}", ".")?,
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn sequential(size: usize) -> Board {
        let mut board = Board::new(size);
        let pool: Vec<Number> = (1..=size * size).map(|v| Number::try_from(v).unwrap()).collect();
        board.auto_fill(&pool).unwrap();
        board
    }

    #[test]
    fn place_fills_cell() {
        let mut board = Board::new(5);
        board.place(2, 3, 17).unwrap();

        assert_eq!(board.get(2, 3), Some(17));
        assert_eq!(board.position(17), Some((2, 3)));
        assert_eq!(board.filled(), 1);
        assert!(!board.is_complete());
    }

    #[test]
    fn place_rejects_occupied_cell() {
        let mut board = Board::new(5);
        board.place(0, 0, 1).unwrap();

        let result = board.place(0, 0, 2);
        assert_eq!(result, Err(PlacementError::CellOccupied { row: 0, col: 0 }));
        assert_eq!(board.get(0, 0), Some(1));
        assert!(!board.contains(2));
    }

    #[test]
    fn place_rejects_duplicate_value() {
        let mut board = Board::new(5);
        board.place(0, 0, 9).unwrap();
        let before = board.clone();

        let result = board.place(4, 4, 9);
        assert_eq!(result, Err(PlacementError::ValueAlreadyPlaced { value: 9, row: 0, col: 0 }));
        assert_eq!(board, before);
    }

    #[test]
    fn place_rejects_out_of_range() {
        let mut board = Board::new(5);
        assert!(matches!(board.place(0, 0, 0), Err(PlacementError::ValueOutOfRange { .. })));
        assert!(matches!(board.place(0, 0, 26), Err(PlacementError::ValueOutOfRange { .. })));
        assert!(matches!(board.place(5, 0, 1), Err(PlacementError::OutOfBounds { .. })));
    }

    #[test]
    fn sealed_board_rejects_changes() {
        let mut board = sequential(3);
        board.seal();

        assert_eq!(board.place(0, 0, 1), Err(PlacementError::Sealed));
        assert_eq!(board.auto_fill(&[9, 8, 7, 6, 5, 4, 3, 2, 1]), Err(PlacementError::Sealed));
        assert_eq!(board.get(0, 0), Some(1));
    }

    #[test]
    fn auto_fill_is_row_major() {
        let mut board = Board::new(3);
        board.place(1, 1, 4).unwrap();
        board.auto_fill(&[9, 8, 7, 6, 5, 4, 3, 2, 1]).unwrap();

        assert!(board.is_complete());
        assert_eq!(board.get(0, 0), Some(9));
        assert_eq!(board.get(1, 2), Some(4));
        assert_eq!(board.position(1), Some((2, 2)));
    }

    #[test]
    fn auto_fill_rejects_non_permutation() {
        let mut board = Board::new(2);
        assert!(matches!(board.auto_fill(&[1, 2, 3]), Err(PlacementError::InvalidPool { .. })));
        assert!(matches!(board.auto_fill(&[1, 2, 2, 4]), Err(PlacementError::InvalidPool { .. })));
        assert!(matches!(board.auto_fill(&[1, 2, 3, 5]), Err(PlacementError::InvalidPool { .. })));
        assert_eq!(board.filled(), 0);
    }

    #[test]
    fn unplaced_lists_missing_values() {
        let mut board = Board::new(2);
        board.place(0, 1, 3).unwrap();
        assert_eq!(board.unplaced().collect::<Vec<_>>(), vec![1, 2, 4]);
    }

    #[test]
    fn display_renders_grid() {
        let mut board = Board::new(3);
        board.place(0, 1, 2).unwrap();
        board.place(1, 1, 5).unwrap();
        board.place(2, 2, 9).unwrap();

        insta::assert_snapshot!(board.to_string(), @r"
        . 2 .
        . 5 .
        . . 9
        ");
    }
}
