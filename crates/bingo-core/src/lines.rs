//! Line-completion evaluation.
//!
//! A line (row, column or diagonal) is complete when every value on it has
//! been called. [`evaluate`] is pure: it reports only lines that became
//! complete since `already_completed`, so threading its output back in keeps
//! the progress count monotonic and never counts a line twice.

use std::{
    collections::{BTreeSet, HashSet},
    fmt,
};

use bingo_proto::Number;

use crate::board::Board;

/// Identifies one of the `2N + 2` lines of a board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LineId {
    /// Row index, top to bottom.
    Row(u8),
    /// Column index, left to right.
    Col(u8),
    /// Top-left to bottom-right.
    MainDiagonal,
    /// Top-right to bottom-left.
    AntiDiagonal,
}

impl LineId {
    /// Every line of a `size×size` board: rows, then columns, then diagonals.
    pub fn all(size: usize) -> impl Iterator<Item = Self> {
        let indices = (0..size).filter_map(|i| u8::try_from(i).ok());
        indices
            .clone()
            .map(Self::Row)
            .chain(indices.map(Self::Col))
            .chain([Self::MainDiagonal, Self::AntiDiagonal])
    }

    /// Cells covered by this line on a `size×size` board.
    pub fn cells(self, size: usize) -> impl Iterator<Item = (usize, usize)> {
        (0..size).map(move |i| match self {
            Self::Row(row) => (usize::from(row), i),
            Self::Col(col) => (i, usize::from(col)),
            Self::MainDiagonal => (i, i),
            Self::AntiDiagonal => (i, size - 1 - i),
        })
    }
}

impl fmt::Display for LineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Row(row) => write!(f, "row-{row}"),
            Self::Col(col) => write!(f, "col-{col}"),
            Self::MainDiagonal => f.write_str("diag-main"),
            Self::AntiDiagonal => f.write_str("diag-anti"),
        }
    }
}

/// Set of completed lines. Its cardinality is the progress count.
pub type LineSet = BTreeSet<LineId>;

/// Membership test for called numbers.
pub trait CalledNumbers {
    /// Whether `number` has been called.
    fn is_called(&self, number: Number) -> bool;
}

impl CalledNumbers for HashSet<Number> {
    fn is_called(&self, number: Number) -> bool {
        self.contains(&number)
    }
}

impl CalledNumbers for BTreeSet<Number> {
    fn is_called(&self, number: Number) -> bool {
        self.contains(&number)
    }
}

impl CalledNumbers for [Number] {
    fn is_called(&self, number: Number) -> bool {
        self.contains(&number)
    }
}

/// Whether every cell of `line` holds a called value.
///
/// A line with an empty cell is never complete.
pub fn is_complete<C: CalledNumbers + ?Sized>(board: &Board, line: LineId, called: &C) -> bool {
    line.cells(board.size()).all(|(row, col)| board.get(row, col).is_some_and(|v| called.is_called(v)))
}

/// Every line of `board` that is currently complete.
pub fn complete_lines<C: CalledNumbers + ?Sized>(board: &Board, called: &C) -> LineSet {
    LineId::all(board.size()).filter(|&line| is_complete(board, line, called)).collect()
}

/// Lines complete under `called` that are not yet in `already_completed`.
pub fn evaluate<C: CalledNumbers + ?Sized>(
    board: &Board,
    called: &C,
    already_completed: &LineSet,
) -> LineSet {
    LineId::all(board.size())
        .filter(|line| !already_completed.contains(line))
        .filter(|&line| is_complete(board, line, called))
        .collect()
}

/// `|already_completed ∪ newly_completed|`.
pub fn progress_count(already_completed: &LineSet, newly_completed: &LineSet) -> usize {
    already_completed.union(newly_completed).count()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn sequential(size: usize) -> Board {
        let mut board = Board::new(size);
        let pool: Vec<Number> = (1..=size * size).map(|v| Number::try_from(v).unwrap()).collect();
        board.auto_fill(&pool).unwrap();
        board
    }

    #[test]
    fn line_ids_cover_board() {
        let lines: Vec<_> = LineId::all(5).collect();
        assert_eq!(lines.len(), 12);
        assert_eq!(lines[0].to_string(), "row-0");
        assert_eq!(lines[5].to_string(), "col-0");
        assert_eq!(lines[10].to_string(), "diag-main");
        assert_eq!(lines[11].to_string(), "diag-anti");
    }

    #[test]
    fn anti_diagonal_cells() {
        let cells: Vec<_> = LineId::AntiDiagonal.cells(3).collect();
        assert_eq!(cells, vec![(0, 2), (1, 1), (2, 0)]);
    }

    #[test]
    fn row_completes_on_fifth_call() {
        let board = sequential(5);
        let mut called = BTreeSet::new();
        let mut done = LineSet::new();
        let mut progress = Vec::new();

        for n in 1..=5 {
            called.insert(n);
            let new = evaluate(&board, &called, &done);
            done.extend(new);
            progress.push(done.len());
        }

        assert_eq!(progress, vec![0, 0, 0, 0, 1]);
        assert!(done.contains(&LineId::Row(0)));
    }

    #[test]
    fn already_completed_lines_not_recounted() {
        let board = sequential(5);
        let called: BTreeSet<Number> = (1..=5).collect();

        let first = evaluate(&board, &called, &LineSet::new());
        assert_eq!(first.len(), 1);

        let again = evaluate(&board, &called, &LineSet::new());
        assert_eq!(first, again);

        let threaded = evaluate(&board, &called, &first);
        assert!(threaded.is_empty());
        assert_eq!(progress_count(&first, &threaded), 1);
    }

    #[test]
    fn incomplete_board_lines_never_complete() {
        let mut board = Board::new(3);
        board.place(0, 0, 1).unwrap();
        board.place(0, 1, 2).unwrap();
        let called: BTreeSet<Number> = (1..=9).collect();

        assert!(complete_lines(&board, &called).is_empty());
    }

    #[test]
    fn three_rows_and_outer_columns_make_five() {
        let board = sequential(5);
        let mut called: BTreeSet<Number> = (1..=15).collect();
        called.extend([16, 21, 20, 25]);

        let lines = complete_lines(&board, &called);
        assert_eq!(
            lines,
            LineSet::from([
                LineId::Row(0),
                LineId::Row(1),
                LineId::Row(2),
                LineId::Col(0),
                LineId::Col(4),
            ])
        );
    }

    #[test]
    fn first_rows_and_main_diagonal() {
        let board = sequential(5);
        let mut called: BTreeSet<Number> = (1..=10).collect();
        called.extend([13, 19, 25]);

        let lines = complete_lines(&board, &called);
        assert_eq!(lines, LineSet::from([LineId::Row(0), LineId::Row(1), LineId::MainDiagonal]));
    }

    proptest! {
        /// Incremental evaluation yields the same set as one batch evaluation,
        /// whatever the order of calls.
        #[test]
        fn incremental_matches_batch(
            size in 1usize..=6,
            seed in prop::collection::vec(any::<u16>(), 0..64),
        ) {
            let board = sequential(size);
            let max = u16::try_from(size * size).unwrap();
            let calls: Vec<Number> = seed.iter().map(|s| s % max + 1).collect();

            let mut called = HashSet::new();
            let mut done = LineSet::new();
            let mut last = 0;
            for &n in &calls {
                called.insert(n);
                let new = evaluate(&board, &called, &done);
                prop_assert!(new.is_disjoint(&done));
                done.extend(new);
                prop_assert!(done.len() >= last);
                last = done.len();
            }

            let batch = evaluate(&board, &called, &LineSet::new());
            prop_assert_eq!(done, batch);
        }
    }
}
