use ahash::RandomState as AHasher;
use dashmap::DashMap;

use crate::engine::Board;

/// Board -> best-known static evaluation, shared by the parallel root branches.
///
/// Consistency is relaxed: the table only ever keeps the larger of two
/// evaluations for a key, and interleavings between branches are not
/// ordered beyond what the per-shard locks of `DashMap` give. Entries are
/// not depth-tagged, so a value recorded at a leaf may be returned for the
/// same board reached higher up in the tree.
pub struct TranspositionTable {
    map: DashMap<u64, f64, AHasher>,
}

impl TranspositionTable {
    pub fn new() -> Self {
        Self { map: DashMap::with_hasher(AHasher::new()) }
    }

    /// Drop every entry, keeping the allocated capacity.
    pub fn clear(&self) {
        self.map.clear();
    }

    #[inline]
    pub fn get(&self, board: Board) -> Option<f64> {
        self.map.get(&board.raw()).map(|entry| *entry)
    }

    /// Store `eval` unless a higher value is already present; returns the value kept.
    #[inline]
    pub fn record_max(&self, board: Board, eval: f64) -> f64 {
        let mut entry = self.map.entry(board.raw()).or_insert(eval);
        if eval > *entry {
            *entry = eval;
        }
        *entry
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl Default for TranspositionTable {
    fn default() -> Self { Self::new() }
}
