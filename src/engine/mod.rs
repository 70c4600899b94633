//! Packed 2048 board, precomputed move tables, move resolution and tile spawning.
//!
//! Everything here is a pure function over [`Board`] values except [`spawn`],
//! which takes the random source explicitly so runs can be reproduced from a seed.

mod moves;
mod spawn;
mod state;
pub(crate) mod tables;

pub use moves::{apply_player_move, is_terminal, legal_moves, Direction, MoveOutcome};
pub use spawn::{empty_cells, place_tile, spawn, RANK1_PROB, RANK2_PROB};
pub use state::{rank_value, Board, BoardRaw, Line, Rank, SIZE};

/// Errors raised at the engine's boundary.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineError {
    #[error("invalid direction token {0}")]
    InvalidDirection(u32),
    #[error("cannot spawn a tile on a full board")]
    BoardFull,
}

/// Initialize internal tables on first use. Safe to call multiple times.
pub fn new() {
    let _ = tables::move_tables();
}
