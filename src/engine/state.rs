use std::fmt;

/// Raw packed board: 16 nibbles, cell `(row, col)` at bit offset `(row * 4 + col) * 4`.
pub type BoardRaw = u64;
/// A packed row or column: 4 nibbles, index 0 in the low nibble.
pub type Line = u16;
/// Tile exponent; value = 2^rank, 0 = empty.
pub type Rank = u8;

pub const SIZE: usize = 4;

const ROW_MASK: u64 = 0xffff;
const NIBBLE_MASK: u64 = 0xf;

/// Packed 4x4 2048 board as 16 4-bit ranks in a `u64`.
///
/// `Board` is a plain value: every operation returns a new board, and two
/// boards are equal iff their packed representations are identical.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Board(BoardRaw);

impl Board {
    /// A constant empty board (all zeros).
    pub const EMPTY: Board = Board(0);

    /// Construct a `Board` from its raw packed representation.
    #[inline]
    pub const fn from_raw(raw: BoardRaw) -> Self { Board(raw) }

    /// The raw packed `u64` for this `Board`.
    #[inline]
    pub const fn raw(self) -> BoardRaw { self.0 }

    /// Build a board from a row-major grid of ranks.
    ///
    /// Ranks above 15 are truncated to their low nibble.
    ///
    /// ```
    /// use anytime_2048::engine::Board;
    /// let b = Board::from_ranks([[1, 1, 0, 0], [0; 4], [0; 4], [0, 0, 0, 3]]);
    /// assert_eq!(b.get(0, 1), 1);
    /// assert_eq!(b.get(3, 3), 3);
    /// ```
    pub fn from_ranks(grid: [[Rank; SIZE]; SIZE]) -> Self {
        let mut board = Board::EMPTY;
        for (row, ranks) in grid.iter().enumerate() {
            for (col, &rank) in ranks.iter().enumerate() {
                board = board.set(row, col, rank);
            }
        }
        board
    }

    /// The rank stored at `(row, col)`.
    #[inline]
    pub fn get(self, row: usize, col: usize) -> Rank {
        debug_assert!(row < SIZE && col < SIZE);
        ((self.0 >> cell_shift(row, col)) & NIBBLE_MASK) as Rank
    }

    /// Return a copy with `(row, col)` set to `rank`.
    #[inline]
    pub fn set(self, row: usize, col: usize, rank: Rank) -> Self {
        debug_assert!(row < SIZE && col < SIZE);
        let shift = cell_shift(row, col);
        let cleared = self.0 & !(NIBBLE_MASK << shift);
        Board(cleared | ((rank as u64 & NIBBLE_MASK) << shift))
    }

    /// Row `i` as a packed line (column 0 in the low nibble).
    #[inline]
    pub fn row(self, i: usize) -> Line {
        ((self.0 >> (i * 16)) & ROW_MASK) as Line
    }

    /// Return a copy with row `i` replaced by `line`.
    #[inline]
    pub fn with_row(self, i: usize, line: Line) -> Self {
        let shift = i * 16;
        Board((self.0 & !(ROW_MASK << shift)) | ((line as u64) << shift))
    }

    /// Column `i` as a packed line (row 0 in the low nibble).
    ///
    /// Columns are strided in the packed word, so each nibble is moved individually.
    #[inline]
    pub fn column(self, i: usize) -> Line {
        (0..SIZE).fold(0, |line, row| line | ((self.get(row, i) as Line) << (row * 4)))
    }

    /// Return a copy with column `i` replaced by `line`.
    #[inline]
    pub fn with_column(self, i: usize, line: Line) -> Self {
        (0..SIZE).fold(self, |board, row| board.set(row, i, ((line >> (row * 4)) & 0xf) as Rank))
    }

    /// Mirror the board across its main diagonal.
    ///
    /// Three masked shifts swap the off-diagonal nibbles of each 2x2 block, then
    /// the off-diagonal 2x2 blocks themselves.
    #[inline]
    pub fn transpose(self) -> Self {
        let x = self.0;
        let a1 = x & 0xF0F0_0F0F_F0F0_0F0F;
        let a2 = x & 0x0000_F0F0_0000_F0F0;
        let a3 = x & 0x0F0F_0000_0F0F_0000;
        let a = a1 | (a2 << 12) | (a3 >> 12);
        let b1 = a & 0xFF00_FF00_00FF_00FF;
        let b2 = a & 0x00FF_00FF_0000_0000;
        let b3 = a & 0x0000_0000_FF00_FF00;
        Board(b1 | (b2 >> 24) | (b3 << 24))
    }

    /// Count the number of empty cells on the board.
    ///
    /// Each nibble is OR-reduced to its low bit, inverted and masked, then the
    /// 16 single-bit lanes are summed with shifted additions.
    #[inline]
    pub fn count_empty(self) -> u32 {
        let mut x = self.0;
        if x == 0 {
            // The lane sum below only has a nibble of room.
            return 16;
        }
        x |= (x >> 2) & 0x3333_3333_3333_3333;
        x |= x >> 1;
        x = !x & 0x1111_1111_1111_1111;
        x += x >> 32;
        x += x >> 16;
        x += x >> 8;
        x += x >> 4;
        (x & 0xf) as u32
    }

    /// True when no cell is empty.
    #[inline]
    pub fn is_full(self) -> bool { self.count_empty() == 0 }

    /// The largest rank on the board (0 for an empty board).
    pub fn max_rank(self) -> Rank {
        (0..16).map(|idx| ((self.0 >> (idx * 4)) & NIBBLE_MASK) as Rank).max().unwrap_or(0)
    }

    /// Return the highest tile value (e.g., 2048) present on the board, 0 if empty.
    pub fn highest_tile(self) -> u32 {
        rank_value(self.max_rank())
    }

    /// The tile value at `(row, col)`: 2^rank, or 0 if the cell is empty.
    #[inline]
    pub fn tile_value(self, row: usize, col: usize) -> u32 {
        rank_value(self.get(row, col))
    }
}

/// Tile value for a rank: 0 for empty, otherwise 2^rank.
#[inline]
pub fn rank_value(rank: Rank) -> u32 {
    if rank == 0 { 0 } else { 1 << rank }
}

#[inline(always)]
fn cell_shift(row: usize, col: usize) -> usize {
    (row * SIZE + col) * 4
}

impl fmt::Debug for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Board({:#018x})", self.0)
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in 0..SIZE {
            if row > 0 {
                writeln!(f, "-------------------------------")?;
            }
            for col in 0..SIZE {
                if col > 0 {
                    write!(f, "|")?;
                }
                match self.tile_value(row, col) {
                    0 => write!(f, "{:^7}", "")?,
                    v => write!(f, "{:^7}", v)?,
                }
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

impl From<BoardRaw> for Board { fn from(v: BoardRaw) -> Self { Board::from_raw(v) } }
impl From<Board> for BoardRaw { fn from(b: Board) -> Self { b.raw() } }

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    fn naive_count_empty(board: Board) -> u32 {
        let mut count = 0;
        for row in 0..SIZE {
            for col in 0..SIZE {
                if board.get(row, col) == 0 { count += 1; }
            }
        }
        count
    }

    fn naive_transpose(board: Board) -> Board {
        let mut out = Board::EMPTY;
        for row in 0..SIZE {
            for col in 0..SIZE {
                out = out.set(col, row, board.get(row, col));
            }
        }
        out
    }

    #[test]
    fn get_set_layout() {
        let b = Board::EMPTY.set(0, 0, 1).set(1, 2, 5).set(3, 3, 15);
        assert_eq!(b.raw(), 0xf000_0000_0500_0001);
        assert_eq!(b.get(0, 0), 1);
        assert_eq!(b.get(1, 2), 5);
        assert_eq!(b.get(3, 3), 15);
        assert_eq!(b.get(2, 2), 0);
        // overwrite clears the old nibble
        assert_eq!(b.set(1, 2, 3).get(1, 2), 3);
    }

    #[test]
    fn rows_and_columns() {
        let b = Board::from_raw(0x0123_4567_89ab_cdef);
        assert_eq!(b.row(0), 0xcdef);
        assert_eq!(b.row(3), 0x0123);
        // column 0 takes the low nibble of each row, row 0 first
        assert_eq!(b.column(0), 0x37bf);
        assert_eq!(b.column(3), 0x048c);
        assert_eq!(b.with_row(1, 0x1111).row(1), 0x1111);
        assert_eq!(b.with_row(1, 0x1111).row(2), b.row(2));
        let c = b.with_column(2, 0x4321);
        assert_eq!(c.column(2), 0x4321);
        assert_eq!(c.column(1), b.column(1));
    }

    #[test]
    fn column_matches_transposed_row() {
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..1000 {
            let b = Board::from_raw(rng.gen());
            for i in 0..SIZE {
                assert_eq!(b.column(i), b.transpose().row(i));
            }
        }
    }

    #[test]
    fn transpose_is_involution_and_matches_naive() {
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..10_000 {
            let b = Board::from_raw(rng.gen());
            assert_eq!(b.transpose().transpose(), b);
            assert_eq!(b.transpose(), naive_transpose(b));
        }
    }

    #[test]
    fn count_empty_matches_naive_scan() {
        assert_eq!(Board::EMPTY.count_empty(), 16);
        assert_eq!(Board::from_raw(0x1111_0000_1111_0000).count_empty(), 8);
        assert_eq!(Board::from_raw(0x1100_0000_0000_0000).count_empty(), 14);
        assert_eq!(Board::from_raw(u64::MAX).count_empty(), 0);
        let mut rng = StdRng::seed_from_u64(5);
        for _ in 0..10_000 {
            // Sparse random boards so every density shows up.
            let mut b = Board::EMPTY;
            let filled = rng.gen_range(0..=16);
            for _ in 0..filled {
                b = b.set(rng.gen_range(0..4), rng.gen_range(0..4), rng.gen_range(1..16));
            }
            assert_eq!(b.count_empty(), naive_count_empty(b), "{:?}", b);
        }
    }

    #[test]
    fn tile_values() {
        let b = Board::from_ranks([[0, 1, 2, 11], [0; 4], [0; 4], [0; 4]]);
        assert_eq!(b.tile_value(0, 0), 0);
        assert_eq!(b.tile_value(0, 1), 2);
        assert_eq!(b.tile_value(0, 3), 2048);
        assert_eq!(b.max_rank(), 11);
        assert_eq!(b.highest_tile(), 2048);
        assert_eq!(Board::EMPTY.highest_tile(), 0);
    }

    #[test]
    fn display_renders_values() {
        let b = Board::from_ranks([[1, 0, 0, 0], [0; 4], [0; 4], [0, 0, 0, 11]]);
        let s = b.to_string();
        assert!(s.contains('2'));
        assert!(s.contains("2048"));
        assert_eq!(s.lines().count(), 7);
    }
}
