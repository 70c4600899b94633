use rand::Rng;

use super::state::{Board, Rank, SIZE};
use super::EngineError;

/// Probability that a spawned tile is a 2 (rank 1).
pub const RANK1_PROB: f64 = 0.9;
/// Probability that a spawned tile is a 4 (rank 2).
pub const RANK2_PROB: f64 = 0.1;

/// Random (row, col) probes before falling back to picking the k-th empty cell.
const MAX_PROBES: usize = 64;

/// Insert a random 2 (90%) or 4 (10%) tile into a uniformly random empty cell.
///
/// Cells are picked by rejection sampling over random `(row, col)` pairs; after
/// a fixed number of misses the k-th empty cell is chosen directly, so the cost is
/// bounded and the choice stays uniform. Fails with [`EngineError::BoardFull`]
/// when there is no empty cell.
///
/// ```
/// use anytime_2048::engine::{spawn, Board};
/// use rand::{rngs::StdRng, SeedableRng};
/// let mut rng = StdRng::seed_from_u64(123);
/// let b = spawn(spawn(Board::EMPTY, &mut rng).unwrap(), &mut rng).unwrap();
/// assert_eq!(b.count_empty(), 14);
/// ```
pub fn spawn<R: Rng + ?Sized>(board: Board, rng: &mut R) -> Result<Board, EngineError> {
    let empty = board.count_empty();
    if empty == 0 {
        return Err(EngineError::BoardFull);
    }
    let rank = random_rank(rng);
    for _ in 0..MAX_PROBES {
        let (row, col) = (rng.gen_range(0..SIZE), rng.gen_range(0..SIZE));
        if board.get(row, col) == 0 {
            return Ok(board.set(row, col, rank));
        }
    }
    let k = rng.gen_range(0..empty) as usize;
    let (row, col) = empty_cells(board).nth(k).ok_or(EngineError::BoardFull)?;
    Ok(board.set(row, col, rank))
}

/// Place a tile of `rank` at an empty `(row, col)`.
#[inline]
pub fn place_tile(board: Board, row: usize, col: usize, rank: Rank) -> Board {
    debug_assert_eq!(board.get(row, col), 0, "placing onto an occupied cell");
    board.set(row, col, rank)
}

/// Empty cells in row-major order.
pub fn empty_cells(board: Board) -> impl Iterator<Item = (usize, usize)> {
    (0..SIZE * SIZE)
        .map(|idx| (idx / SIZE, idx % SIZE))
        .filter(move |&(row, col)| board.get(row, col) == 0)
}

fn random_rank<R: Rng + ?Sized>(rng: &mut R) -> Rank {
    if rng.gen_bool(RANK2_PROB) { 2 } else { 1 }
}

impl Board {
    /// Method form of [`spawn`].
    #[inline]
    pub fn with_random_tile<R: Rng + ?Sized>(self, rng: &mut R) -> Result<Board, EngineError> {
        spawn(self, rng)
    }
}
