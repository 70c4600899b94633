//! Time-bounded Expectimax search policy for 2048.
//!
//! [`Expectimax`] runs iterative deepening under a wall-clock budget: each
//! round searches every legal root direction (in parallel on rayon by
//! default) to a fixed even depth, and a round that hits the deadline is
//! discarded in favor of the previous round's answer.
//!
//! Notes
//! - The engine's lookup and heuristic tables are initialized lazily; the
//!   constructors warm them for you.
//! - Root directions are reduced after all four branches finish, so ties go
//!   to the first direction in `Up, Down, Left, Right` order regardless of
//!   thread scheduling.
//!
//! Quick start
//! ```
//! use anytime_2048::engine::Board;
//! use anytime_2048::expectimax::{Expectimax, ExpectimaxConfig};
//! use std::time::Duration;
//!
//! let b = Board::from_ranks([[1, 1, 0, 0], [0; 4], [0; 4], [0, 0, 0, 2]]);
//! let cfg = ExpectimaxConfig { time_budget: Duration::from_millis(50), ..Default::default() };
//! let mut ex = Expectimax::with_config(cfg);
//! assert!(ex.best_move(b, 0).is_some());
//! ```

use std::time::Duration;

use crate::engine::{self, Direction};

mod cancel;
mod heuristic;
mod search;
mod transposition;

pub use cancel::CancelToken;
pub use heuristic::{
    EMPTY_WEIGHT, LOST_PENALTY, MERGES_WEIGHT, MONOTONICITY_POWER, MONOTONICITY_WEIGHT, SUM_POWER,
    SUM_WEIGHT,
};
pub use search::{Expectimax, LOSS_SCORE, PRUNED_SCORE};
pub use transposition::TranspositionTable;

/// Configurable knobs for Expectimax. Defaults are the tuned build-time values.
///
/// - `time_budget`: wall-clock budget per decision, shared by all deepening rounds.
/// - `prob_cutoff`: prune branches whose cumulative spawn probability falls below this value.
/// - `start_depth`/`depth_step`: first depth and increment; even values keep
///   Player/Spawner plies paired.
/// - `depth_cap`: optional hard cap on depth (None = limited by time only).
/// - `parallel`: fan the four root directions out over rayon.
/// - `threads`: size of a dedicated rayon pool (None = rayon's global pool).
#[derive(Debug, Clone)]
pub struct ExpectimaxConfig {
    pub time_budget: Duration,
    pub prob_cutoff: f64,
    pub start_depth: u32,
    pub depth_step: u32,
    pub depth_cap: Option<u32>,
    pub parallel: bool,
    pub threads: Option<usize>,
}

impl Default for ExpectimaxConfig {
    fn default() -> Self {
        Self {
            time_budget: Duration::from_millis(400),
            prob_cutoff: 1e-4,
            start_depth: 2,
            depth_step: 2,
            depth_cap: None,
            parallel: true,
            threads: None,
        }
    }
}

/// Per-branch expected value at the root.
///
/// - `ev` is the expected value for taking `dir` from the current board.
/// - `legal` is false when the move is a no-op for the current board.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BranchEval {
    pub dir: Direction,
    pub ev: f64,
    pub legal: bool,
}

impl BranchEval {
    fn illegal(dir: Direction) -> Self {
        Self { dir, ev: 0.0, legal: false }
    }
}

/// Search stats for the last decision.
#[derive(Debug, Clone, Copy, Default)]
pub struct SearchStats {
    /// Deepest fully completed round (0 if none completed).
    pub depth: u32,
    /// Number of completed rounds.
    pub rounds: u32,
    /// Nodes visited across completed rounds.
    pub nodes: u64,
    /// True when the last round was torn down by the deadline.
    pub cancelled: bool,
    pub elapsed: Duration,
}

#[derive(thiserror::Error, Debug)]
pub enum SearchError {
    #[error("failed to build search thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// Common helper for constructors to ensure tables are initialized.
fn warm_engine_and_heuristics() {
    // Safe to call multiple times.
    engine::new();
    heuristic::warm();
}

/// Bench-only: expose the raw static evaluation for a board.
///
/// Enabled only with the `bench-internal` feature to keep the public API small.
#[cfg(feature = "bench-internal")]
#[inline]
pub fn heuristic_value(board: crate::engine::Board) -> f64 { heuristic::evaluate(board) }
