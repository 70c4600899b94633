use std::sync::OnceLock;

use crate::engine::tables::{unpack_line, LINE_TABLE_SIZE};
use crate::engine::{Board, Line, Rank, SIZE};

// Credit to Nneonneo for heuristic structure
pub const LOST_PENALTY: f64 = 200_000.0;
pub const EMPTY_WEIGHT: f64 = 270.0;
pub const MERGES_WEIGHT: f64 = 700.0;
pub const SUM_POWER: f64 = 3.5;
pub const SUM_WEIGHT: f64 = 11.0;
pub const MONOTONICITY_POWER: f64 = 4.0;
pub const MONOTONICITY_WEIGHT: f64 = 47.0;

static HEURISTIC_SCORES: OnceLock<Box<[f64]>> = OnceLock::new();

pub(crate) fn warm() {
    let _ = heuristic_scores();
}

fn heuristic_scores() -> &'static [f64] {
    HEURISTIC_SCORES.get_or_init(|| {
        let scores: Box<[f64]> = (0..LINE_TABLE_SIZE).map(|idx| line_score(idx as Line)).collect();
        log::debug!("generated heuristic table ({} lines)", scores.len());
        scores
    })
}

/// Static evaluation: table score of the 4 rows plus the 4 rows of the transpose.
#[inline]
pub(crate) fn evaluate(board: Board) -> f64 {
    let scores = heuristic_scores();
    let transposed = board.transpose();
    (0..SIZE).fold(0.0, |acc, i| {
        acc + scores[board.row(i) as usize] + scores[transposed.row(i) as usize]
    })
}

/// Raw per-line features, gathered in one scan.
#[derive(Debug, Default, PartialEq)]
struct LineFeatures {
    empty: u32,
    /// Tiles sitting in a run of two or more equal non-empty tiles.
    mergeable: u32,
    /// Sum of `rank^SUM_POWER`.
    mass: f64,
    /// Total `rank^MONOTONICITY_POWER` drop toward nibble 3, and total rise.
    falling: f64,
    rising: f64,
}

impl LineFeatures {
    fn scan(tiles: [Rank; SIZE]) -> Self {
        let mut f = LineFeatures::default();
        let mut run = 1;
        for (i, &rank) in tiles.iter().enumerate() {
            if rank == 0 {
                f.empty += 1;
            }
            f.mass += f64::from(rank).powf(SUM_POWER);
            if i == 0 {
                continue;
            }
            let prev = tiles[i - 1];
            let (a, b) = (f64::from(prev).powf(MONOTONICITY_POWER), f64::from(rank).powf(MONOTONICITY_POWER));
            if a > b {
                f.falling += a - b;
            } else {
                f.rising += b - a;
            }
            if rank != 0 && rank == prev {
                run += 1;
            } else {
                f.close_run(run);
                run = 1;
            }
        }
        f.close_run(run);
        f
    }

    fn close_run(&mut self, run: u32) {
        if run > 1 {
            self.mergeable += run;
        }
    }

    fn score(&self) -> f64 {
        LOST_PENALTY + f64::from(self.empty) * EMPTY_WEIGHT + f64::from(self.mergeable) * MERGES_WEIGHT
            - self.falling.min(self.rising) * MONOTONICITY_WEIGHT
            - self.mass * SUM_WEIGHT
    }
}

/// Desirability of a single packed line; higher is better.
pub(crate) fn line_score(line: Line) -> f64 {
    LineFeatures::scan(unpack_line(line)).score()
}
