//! A single game of 2048: board, running score and the RNG that drives spawns.

use rand::Rng;

use crate::engine::{apply_player_move, is_terminal, spawn, Board, Direction, EngineError};
use crate::expectimax::Expectimax;

/// One game in progress.
///
/// The score is the sum of every merged tile's value, accumulated from the
/// move resolver's per-move score deltas.
///
/// ```
/// use anytime_2048::engine::Direction;
/// use anytime_2048::game::Game;
/// use rand::{rngs::StdRng, SeedableRng};
///
/// let mut game = Game::new(StdRng::seed_from_u64(42)).unwrap();
/// assert_eq!(game.board().count_empty(), 14);
/// for dir in Direction::ALL {
///     game.apply(dir).unwrap();
/// }
/// assert!(game.moves() >= 1);
/// ```
pub struct Game<R: Rng> {
    board: Board,
    score: u64,
    moves: u64,
    rng: R,
}

impl<R: Rng> Game<R> {
    /// Start from an empty board with two spawned tiles.
    pub fn new(mut rng: R) -> Result<Self, EngineError> {
        let board = spawn(spawn(Board::EMPTY, &mut rng)?, &mut rng)?;
        Ok(Self::with_board(board, rng))
    }

    /// Resume from an arbitrary position with a zero score.
    pub fn with_board(board: Board, rng: R) -> Self {
        Self { board, score: 0, moves: 0, rng }
    }

    /// Apply `dir` and spawn a tile if the board changed.
    ///
    /// Returns `Ok(false)` for a move that leaves the board untouched; no tile
    /// is spawned and the move counter does not advance.
    pub fn apply(&mut self, dir: Direction) -> Result<bool, EngineError> {
        let out = apply_player_move(self.board, dir);
        if !out.changed {
            return Ok(false);
        }
        self.board = spawn(out.board, &mut self.rng)?;
        self.score += out.score_delta as u64;
        self.moves += 1;
        Ok(true)
    }

    /// Ask `ai` for a move and play it. `Ok(None)` means the game is over.
    pub fn play_ai_turn(&mut self, ai: &mut Expectimax) -> Result<Option<Direction>, EngineError> {
        let Some(dir) = ai.best_move(self.board, self.score) else {
            return Ok(None);
        };
        self.apply(dir)?;
        Ok(Some(dir))
    }

    pub fn is_over(&self) -> bool {
        is_terminal(self.board)
    }

    #[inline]
    pub fn board(&self) -> Board { self.board }

    #[inline]
    pub fn score(&self) -> u64 { self.score }

    #[inline]
    pub fn moves(&self) -> u64 { self.moves }
}
