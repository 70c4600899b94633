//! anytime-2048: a 2048 game engine + time-bounded Expectimax policy
//!
//! This crate provides:
//! - A compact `Board` type packed into a `u64`, with table-driven move resolution
//! - Seeded tile spawning, so whole games can be replayed from one `u64`
//! - An Expectimax AI (`expectimax` module) that deepens until its time budget runs out
//! - A `Game` driver tying the two together
//!
//! Quick start:
//! ```
//! use anytime_2048::engine::{self as GameEngine, apply_player_move, spawn, Board};
//! use anytime_2048::expectimax::{Expectimax, ExpectimaxConfig};
//! use rand::{rngs::StdRng, SeedableRng};
//! use std::time::Duration;
//!
//! // One-time table init
//! GameEngine::new();
//!
//! // Deterministic board initialization with a seeded RNG
//! let mut rng = StdRng::seed_from_u64(42);
//! let b0 = spawn(spawn(Board::EMPTY, &mut rng).unwrap(), &mut rng).unwrap();
//! assert_eq!(b0.count_empty(), 14);
//!
//! let cfg = ExpectimaxConfig { time_budget: Duration::from_millis(30), ..Default::default() };
//! let mut ai = Expectimax::with_config(cfg);
//! let dir = ai.best_move(b0, 0).unwrap();
//! assert!(apply_player_move(b0, dir).changed);
//! ```
//!
pub mod engine;
pub mod expectimax;
pub mod game;
