use std::sync::OnceLock;

use super::state::{Line, Rank};

pub(crate) const LINE_TABLE_SIZE: usize = 0x1_0000; // 65,536 possible 16-bit lines

/// Highest rank a nibble can hold; two tiles of this rank do not merge.
const MAX_RANK: Rank = 15;

/// Per-line slide/merge results for both compaction directions.
///
/// `forward` compacts toward nibble 0 (Left on rows, Up on transposed columns),
/// `reverse` compacts toward nibble 3 (Right / Down).
pub(crate) struct MoveTables {
    pub(crate) forward: Box<[Line]>,
    pub(crate) forward_score: Box<[u32]>,
    pub(crate) reverse: Box<[Line]>,
    pub(crate) reverse_score: Box<[u32]>,
}

static MOVE_TABLES: OnceLock<MoveTables> = OnceLock::new();

#[inline(always)]
pub(crate) fn move_tables() -> &'static MoveTables {
    MOVE_TABLES.get_or_init(create_move_tables)
}

fn create_move_tables() -> MoveTables {
    // Allocate on the heap to avoid large stack frames
    let mut forward = vec![0 as Line; LINE_TABLE_SIZE];
    let mut forward_score = vec![0u32; LINE_TABLE_SIZE];
    let mut reverse = vec![0 as Line; LINE_TABLE_SIZE];
    let mut reverse_score = vec![0u32; LINE_TABLE_SIZE];

    for idx in 0..LINE_TABLE_SIZE {
        let line = idx as Line;
        (forward[idx], forward_score[idx]) = slide_line(line, Compaction::Forward);
        (reverse[idx], reverse_score[idx]) = slide_line(line, Compaction::Reverse);
    }
    log::debug!("generated move tables ({} lines per direction)", LINE_TABLE_SIZE);

    MoveTables {
        forward: forward.into_boxed_slice(),
        forward_score: forward_score.into_boxed_slice(),
        reverse: reverse.into_boxed_slice(),
        reverse_score: reverse_score.into_boxed_slice(),
    }
}

#[derive(Clone, Copy)]
pub(crate) enum Compaction {
    Forward,
    Reverse,
}

impl Compaction {
    /// Nibble positions in scan order, starting at the wall tiles compact against.
    fn scan_order(self) -> [usize; 4] {
        match self {
            Compaction::Forward => [0, 1, 2, 3],
            Compaction::Reverse => [3, 2, 1, 0],
        }
    }
}

/// Decode a packed line into its 4 ranks, nibble 0 first.
#[inline]
pub(crate) fn unpack_line(line: Line) -> [Rank; 4] {
    [
        (line & 0xf) as Rank,
        ((line >> 4) & 0xf) as Rank,
        ((line >> 8) & 0xf) as Rank,
        ((line >> 12) & 0xf) as Rank,
    ]
}

#[inline]
pub(crate) fn pack_line(ranks: [Rank; 4]) -> Line {
    ranks
        .iter()
        .enumerate()
        .fold(0, |line, (i, &rank)| line | ((rank as Line & 0xf) << (i * 4)))
}

/// Simulate one slide-and-merge of a single line.
///
/// A pivot marks the cell receiving tiles and a cursor scans ahead of it:
/// empty cursor cells are skipped, a tile slides into an empty pivot, equal
/// tiles merge into the pivot (which then advances, so each tile merges at
/// most once), and otherwise the pivot steps forward. Returns the resulting
/// line and the sum of 2^rank over every merged tile.
pub(crate) fn slide_line(line: Line, compaction: Compaction) -> (Line, u32) {
    let order = compaction.scan_order();
    let mut tiles = unpack_line(line);
    let mut score = 0u32;
    let (mut pivot, mut cursor) = (0usize, 1usize);

    while cursor < 4 {
        let (p, c) = (order[pivot], order[cursor]);
        if tiles[c] == 0 {
            cursor += 1;
        } else if tiles[p] == 0 {
            tiles[p] = tiles[c];
            tiles[c] = 0;
            cursor += 1;
        } else if tiles[p] == tiles[c] && tiles[p] < MAX_RANK {
            tiles[p] += 1;
            score += 1 << tiles[p];
            tiles[c] = 0;
            pivot += 1;
            cursor += 1;
        } else {
            pivot += 1;
            if pivot == cursor {
                cursor += 1;
            }
        }
    }

    (pack_line(tiles), score)
}
