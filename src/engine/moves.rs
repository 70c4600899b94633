use std::fmt;

use super::state::{Board, Line, SIZE};
use super::tables::{move_tables, LINE_TABLE_SIZE};
use super::EngineError;

/// A direction to move/merge tiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    /// All directions in the fixed order used for search and tie-breaking.
    pub const ALL: [Direction; 4] = [Direction::Up, Direction::Down, Direction::Left, Direction::Right];

    /// Position of this direction in [`Direction::ALL`].
    #[inline]
    pub fn index(self) -> usize {
        match self {
            Direction::Up => 0,
            Direction::Down => 1,
            Direction::Left => 2,
            Direction::Right => 3,
        }
    }

    /// Parse a single-letter token (`u`/`d`/`l`/`r`, case-insensitive).
    pub fn from_char(c: char) -> Result<Self, EngineError> {
        match c.to_ascii_lowercase() {
            'u' => Ok(Direction::Up),
            'd' => Ok(Direction::Down),
            'l' => Ok(Direction::Left),
            'r' => Ok(Direction::Right),
            _ => Err(EngineError::InvalidDirection(c as u32)),
        }
    }
}

impl TryFrom<u8> for Direction {
    type Error = EngineError;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        Direction::ALL.get(v as usize).copied().ok_or(EngineError::InvalidDirection(v as u32))
    }
}

impl From<Direction> for u8 {
    fn from(dir: Direction) -> u8 { dir.index() as u8 }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Direction::Up => "up",
            Direction::Down => "down",
            Direction::Left => "left",
            Direction::Right => "right",
        };
        f.write_str(name)
    }
}

/// Result of resolving one player move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveOutcome {
    pub board: Board,
    /// Sum of 2^rank for every tile produced by a merge.
    pub score_delta: u32,
    /// False when the move left the board bit-for-bit unchanged.
    pub changed: bool,
}

/// Slide/merge tiles in `dir`. No randomness.
///
/// `changed` is decided by comparing the result against the input board.
///
/// ```
/// use anytime_2048::engine::{apply_player_move, Board, Direction};
/// let b = Board::from_ranks([[1, 1, 0, 0], [0; 4], [0; 4], [0; 4]]);
/// let out = apply_player_move(b, Direction::Left);
/// assert_eq!(out.board.get(0, 0), 2);
/// assert_eq!(out.score_delta, 4);
/// assert!(out.changed);
/// ```
#[inline]
pub fn apply_player_move(board: Board, dir: Direction) -> MoveOutcome {
    let tables = move_tables();
    let (moved, score_delta) = match dir {
        Direction::Left => shift_rows(board, &tables.forward, &tables.forward_score),
        Direction::Right => shift_rows(board, &tables.reverse, &tables.reverse_score),
        Direction::Up => {
            let (t, s) = shift_rows(board.transpose(), &tables.forward, &tables.forward_score);
            (t.transpose(), s)
        }
        Direction::Down => {
            let (t, s) = shift_rows(board.transpose(), &tables.reverse, &tables.reverse_score);
            (t.transpose(), s)
        }
    };
    MoveOutcome { board: moved, score_delta, changed: moved != board }
}

/// True if no move in any direction changes the board.
pub fn is_terminal(board: Board) -> bool {
    Direction::ALL.iter().all(|&dir| !apply_player_move(board, dir).changed)
}

/// Directions that change `board`, in [`Direction::ALL`] order.
pub fn legal_moves(board: Board) -> impl Iterator<Item = Direction> {
    Direction::ALL.into_iter().filter(move |&dir| apply_player_move(board, dir).changed)
}

#[inline(always)]
fn shift_rows(board: Board, lines: &[Line], scores: &[u32]) -> (Board, u32) {
    (0..SIZE).fold((board, 0), |(acc, score), row_idx| {
        let row = board.row(row_idx) as usize;
        debug_assert!(row < LINE_TABLE_SIZE);
        (acc.with_row(row_idx, lines[row]), score + scores[row])
    })
}
