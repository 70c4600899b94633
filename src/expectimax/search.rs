use std::time::{Duration, Instant};

use rayon::prelude::*;
use rayon::ThreadPool;

use crate::engine::{apply_player_move, legal_moves, Board, Direction, RANK1_PROB, RANK2_PROB};

use super::cancel::CancelToken;
use super::heuristic;
use super::transposition::TranspositionTable;
use super::{warm_engine_and_heuristics, BranchEval, ExpectimaxConfig, SearchError, SearchStats};

/// Value of a position with no legal move.
///
/// Static evaluations are bounded below by roughly `-3e7`, so this sits strictly
/// under every live board while staying finite when averaged by chance nodes.
pub const LOSS_SCORE: f64 = -1e12;

/// Value of a branch whose cumulative spawn probability fell below the cutoff.
pub const PRUNED_SCORE: f64 = -1e12;

/// Neutral value returned while unwinding a cancelled round; never adopted.
const CANCELLED_SCORE: f64 = 0.0;

/// The clock is read once every `CLOCK_POLL_MASK + 1` nodes; other checks load the flag only.
const CLOCK_POLL_MASK: u64 = 0xff;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Turn {
    Player,
    Spawner,
}

#[derive(Clone, Copy, Debug)]
struct SearchState {
    score: u64,
    depth: i32,
    turn: Turn,
    prob: f64,
}

impl SearchState {
    #[inline]
    fn child(self, turn: Turn, score_delta: u64, prob_factor: f64) -> Self {
        Self { score: self.score + score_delta, depth: self.depth - 1, turn, prob: self.prob * prob_factor }
    }
}

/// Iterative-deepening Expectimax with a shared transposition table.
///
/// Each top-level decision runs rounds at depth `start_depth`,
/// `start_depth + depth_step`, ... until the time budget or `depth_cap` is
/// reached. Only fully completed rounds are adopted.
pub struct Expectimax {
    cfg: ExpectimaxConfig,
    stats: SearchStats,
    table: TranspositionTable,
    pool: Option<ThreadPool>,
}

/// One full round at a fixed depth.
struct Round {
    branches: [BranchEval; 4],
    nodes: u64,
    /// Some line was cut by the depth limit; a deeper round could change the answer.
    reached_horizon: bool,
}

impl Round {
    /// First legal direction holding the maximum EV, in `Direction::ALL` order.
    fn best(&self) -> Option<Direction> {
        pick_best(&self.branches)
    }
}

impl Expectimax {
    pub fn new() -> Self { Self::with_config(ExpectimaxConfig::default()) }

    /// Build with `cfg`; if a dedicated pool cannot be created the global rayon pool is used.
    pub fn with_config(cfg: ExpectimaxConfig) -> Self {
        match Self::try_with_config(cfg.clone()) {
            Ok(ex) => ex,
            Err(e) => {
                log::warn!("{e}; falling back to the global rayon pool");
                Self::build(ExpectimaxConfig { threads: None, ..cfg }, None)
            }
        }
    }

    /// Build with `cfg`, creating a dedicated thread pool when `cfg.threads` is set.
    pub fn try_with_config(cfg: ExpectimaxConfig) -> Result<Self, SearchError> {
        let pool = match cfg.threads {
            Some(n) => Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(n)
                    .thread_name(|i| format!("expectimax-{i}"))
                    .build()?,
            ),
            None => None,
        };
        Ok(Self::build(cfg, pool))
    }

    fn build(cfg: ExpectimaxConfig, pool: Option<ThreadPool>) -> Self {
        warm_engine_and_heuristics();
        Self { cfg, stats: SearchStats::default(), table: TranspositionTable::new(), pool }
    }

    pub fn config(&self) -> &ExpectimaxConfig { &self.cfg }

    /// Choose a direction for `board` within the configured time budget.
    ///
    /// Returns `None` only when no direction changes the board. If even the
    /// first round runs out of time, the legal move with the best static
    /// evaluation is returned.
    ///
    /// ```
    /// use anytime_2048::engine::{Board, Direction};
    /// use anytime_2048::expectimax::Expectimax;
    /// let mut ex = Expectimax::new();
    /// let stuck = Board::from_ranks([[1, 2, 1, 2], [2, 1, 2, 1], [1, 2, 1, 2], [2, 1, 2, 1]]);
    /// assert_eq!(ex.best_move(stuck, 0), None);
    /// ```
    pub fn best_move(&mut self, board: Board, current_score: u64) -> Option<Direction> {
        self.deepen(board, current_score, |_, remaining| CancelToken::with_budget(remaining))
    }

    /// Iterative deepening with one token per round from `token_for(depth, remaining)`.
    fn deepen<F>(&mut self, board: Board, current_score: u64, mut token_for: F) -> Option<Direction>
    where
        F: FnMut(u32, Duration) -> CancelToken,
    {
        let start = Instant::now();
        let mut stats = SearchStats::default();
        let mut best = None;
        let mut depth = self.cfg.start_depth.max(1);

        loop {
            let elapsed = start.elapsed();
            if elapsed >= self.cfg.time_budget {
                break;
            }
            if self.cfg.depth_cap.is_some_and(|cap| depth > cap) {
                break;
            }
            let token = token_for(depth, self.cfg.time_budget - elapsed);
            let round = self.run_round(board, current_score, depth, &token);
            if token.is_cancelled() {
                log::debug!("depth {depth} cancelled after {:?}", start.elapsed());
                stats.cancelled = true;
                break;
            }

            stats.depth = depth;
            stats.rounds += 1;
            stats.nodes += round.nodes;
            best = round.best();
            log::debug!(
                "depth {depth} complete: best {:?}, {} nodes, {:?} elapsed",
                best,
                round.nodes,
                start.elapsed()
            );
            // No legal move, or every line ended before the depth limit.
            if best.is_none() || !round.reached_horizon {
                break;
            }
            depth = depth.saturating_add(self.cfg.depth_step.max(1));
        }

        if stats.rounds == 0 {
            best = greedy_move(board);
            log::debug!("no round completed; static fallback {:?}", best);
        }
        stats.elapsed = start.elapsed();
        self.stats = stats;
        best
    }

    /// Compute the EV of each direction with one uncancellable round at `depth`.
    ///
    /// Returns a fixed array in order: `[Up, Down, Left, Right]` and marks
    /// illegal moves as `legal=false`.
    ///
    /// ```
    /// use anytime_2048::engine::Board;
    /// use anytime_2048::expectimax::Expectimax;
    /// let b = Board::from_ranks([[0; 4], [0, 1, 0, 0], [0, 0, 2, 0], [0; 4]]);
    /// let mut ex = Expectimax::new();
    /// let branches = ex.branch_evals(b, 0, 2);
    /// assert_eq!(branches.len(), 4);
    /// assert!(branches.iter().all(|br| br.legal));
    /// ```
    pub fn branch_evals(&mut self, board: Board, current_score: u64, depth: u32) -> [BranchEval; 4] {
        let start = Instant::now();
        let round = self.run_round(board, current_score, depth, &CancelToken::never());
        self.stats = SearchStats {
            depth,
            rounds: 1,
            nodes: round.nodes,
            cancelled: false,
            elapsed: start.elapsed(),
        };
        round.branches
    }

    /// Statistics collected from the last call to [`Self::best_move`] or [`Self::branch_evals`].
    #[inline]
    pub fn last_stats(&self) -> SearchStats { self.stats }

    fn run_round(&self, board: Board, current_score: u64, depth: u32, token: &CancelToken) -> Round {
        self.table.clear();
        let depth = i32::try_from(depth).unwrap_or(i32::MAX);
        let prob_cutoff = self.cfg.prob_cutoff;
        let table = &self.table;

        // (branch, nodes visited, reached the depth limit)
        let eval_dir = |dir: Direction| -> (BranchEval, u64, bool) {
            let out = apply_player_move(board, dir);
            if !out.changed {
                return (BranchEval::illegal(dir), 0, false);
            }
            let mut search = Search::new(table, token, prob_cutoff);
            let state = SearchState {
                score: current_score + out.score_delta as u64,
                depth,
                turn: Turn::Spawner,
                prob: 1.0,
            };
            let ev = search.expectimax(out.board, state);
            (BranchEval { dir, ev, legal: true }, search.nodes, search.reached_horizon)
        };

        let results: Vec<(BranchEval, u64, bool)> = if self.cfg.parallel {
            let fan_out = || -> Vec<(BranchEval, u64, bool)> {
                Direction::ALL.par_iter().map(|&dir| eval_dir(dir)).collect()
            };
            match &self.pool {
                Some(pool) => pool.install(fan_out),
                None => fan_out(),
            }
        } else {
            Direction::ALL.iter().map(|&dir| eval_dir(dir)).collect()
        };

        let mut round = Round { branches: Direction::ALL.map(BranchEval::illegal), nodes: 0, reached_horizon: false };
        for (branch, nodes, reached_horizon) in results {
            round.branches[branch.dir.index()] = branch;
            round.nodes += nodes;
            round.reached_horizon |= reached_horizon;
        }
        round
    }
}

impl Default for Expectimax { fn default() -> Self { Self::new() } }

fn pick_best(branches: &[BranchEval]) -> Option<Direction> {
    let mut best: Option<&BranchEval> = None;
    for branch in branches.iter().filter(|b| b.legal) {
        if best.map_or(true, |b| branch.ev > b.ev) {
            best = Some(branch);
        }
    }
    best.map(|b| b.dir)
}

fn greedy_move(board: Board) -> Option<Direction> {
    let branches: Vec<BranchEval> = legal_moves(board)
        .map(|dir| BranchEval { dir, ev: heuristic::evaluate(apply_player_move(board, dir).board), legal: true })
        .collect();
    pick_best(&branches)
}

/// Single-threaded recursion below one root direction.
struct Search<'a> {
    table: &'a TranspositionTable,
    token: &'a CancelToken,
    prob_cutoff: f64,
    nodes: u64,
    reached_horizon: bool,
}

impl<'a> Search<'a> {
    fn new(table: &'a TranspositionTable, token: &'a CancelToken, prob_cutoff: f64) -> Self {
        Self { table, token, prob_cutoff, nodes: 0, reached_horizon: false }
    }

    #[inline]
    fn cancelled(&self) -> bool {
        if self.nodes & CLOCK_POLL_MASK == 0 {
            self.token.poll()
        } else {
            self.token.is_cancelled()
        }
    }

    fn expectimax(&mut self, board: Board, state: SearchState) -> f64 {
        self.nodes += 1;
        if self.cancelled() {
            return CANCELLED_SCORE;
        }
        if state.prob < self.prob_cutoff {
            return PRUNED_SCORE;
        }
        if state.depth <= 0 {
            self.reached_horizon = true;
            // A higher value already in the table wins over the fresh evaluation.
            return self.table.record_max(board, heuristic::evaluate(board));
        }
        if let Some(cached) = self.table.get(board) {
            // cached values come from leaves
            self.reached_horizon = true;
            return cached;
        }
        match state.turn {
            Turn::Player => self.evaluate_player(board, state),
            Turn::Spawner => self.evaluate_spawner(board, state),
        }
    }

    fn evaluate_player(&mut self, board: Board, state: SearchState) -> f64 {
        let mut best = f64::NEG_INFINITY;
        for dir in Direction::ALL {
            if self.token.is_cancelled() {
                return CANCELLED_SCORE;
            }
            let out = apply_player_move(board, dir);
            if !out.changed {
                continue;
            }
            let score = self.expectimax(out.board, state.child(Turn::Spawner, out.score_delta as u64, 1.0));
            if score > best {
                best = score;
            }
        }
        if best == f64::NEG_INFINITY { LOSS_SCORE } else { best }
    }

    fn evaluate_spawner(&mut self, board: Board, state: SearchState) -> f64 {
        let num_empty_tiles = board.count_empty();
        if num_empty_tiles == 0 {
            return LOSS_SCORE;
        }
        let mut sum2 = 0.0;
        let mut sum4 = 0.0;
        let mut tiles_searched = 0;
        let mut tmp = board.raw();
        let mut insert_tile = 1u64;
        while tiles_searched < num_empty_tiles {
            if (tmp & 0xf) == 0 {
                if self.token.is_cancelled() {
                    return CANCELLED_SCORE;
                }
                let board2 = Board::from_raw(board.raw() | insert_tile);
                sum2 += self.expectimax(board2, state.child(Turn::Player, 0, RANK1_PROB));
                let board4 = Board::from_raw(board.raw() | (insert_tile << 1));
                sum4 += self.expectimax(board4, state.child(Turn::Player, 4, RANK2_PROB));
                tiles_searched += 1;
            }
            tmp >>= 4;
            insert_tile <<= 4;
        }
        let n = num_empty_tiles as f64;
        (sum2 / n) * RANK1_PROB + (sum4 / n) * RANK2_PROB
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{is_terminal, spawn};
    use rand::{rngs::StdRng, SeedableRng};
    use std::time::Duration;

    fn fixed_depth(depth: u32, parallel: bool) -> ExpectimaxConfig {
        ExpectimaxConfig {
            time_budget: Duration::from_secs(600),
            depth_cap: Some(depth),
            parallel,
            ..Default::default()
        }
    }

    fn sample_board(seed: u64, moves: usize) -> Board {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut b = spawn(spawn(Board::EMPTY, &mut rng).unwrap(), &mut rng).unwrap();
        let seq = [Direction::Left, Direction::Up, Direction::Right, Direction::Down];
        for i in 0..moves {
            let out = apply_player_move(b, seq[i % seq.len()]);
            if out.changed {
                b = spawn(out.board, &mut rng).unwrap();
            }
        }
        b
    }

    #[test]
    fn terminal_board_has_no_move() {
        let stuck = Board::from_ranks([[1, 2, 1, 2], [2, 1, 2, 1], [1, 2, 1, 2], [2, 1, 2, 1]]);
        assert!(is_terminal(stuck));
        let mut ex = Expectimax::with_config(fixed_depth(2, false));
        assert_eq!(ex.best_move(stuck, 0), None);
        assert!(ex.branch_evals(stuck, 0, 2).iter().all(|b| !b.legal));
    }

    #[test]
    fn only_legal_direction_is_chosen() {
        let b = Board::from_ranks([[1, 2, 1, 2], [2, 1, 2, 1], [1, 2, 1, 2], [2, 1, 2, 0]]);
        let mut ex = Expectimax::with_config(fixed_depth(4, true));
        let mv = ex.best_move(b, 0);
        assert!(matches!(mv, Some(Direction::Down) | Some(Direction::Right)));
    }

    #[test]
    fn single_threaded_search_is_deterministic() {
        let b = sample_board(17, 12);
        let picks: Vec<_> = (0..3)
            .map(|_| Expectimax::with_config(fixed_depth(4, false)).best_move(b, 0))
            .collect();
        assert!(picks[0].is_some());
        assert!(picks.iter().all(|&m| m == picks[0]));
    }

    #[test]
    fn parallel_and_sequential_agree_on_legality() {
        for seed in [1, 2, 3] {
            let b = sample_board(seed, 10);
            let seq = Expectimax::with_config(fixed_depth(2, false)).branch_evals(b, 0, 2);
            let par = Expectimax::with_config(fixed_depth(2, true)).branch_evals(b, 0, 2);
            for (s, p) in seq.iter().zip(par.iter()) {
                assert_eq!(s.dir, p.dir);
                assert_eq!(s.legal, p.legal);
                if s.legal {
                    assert!(s.ev > LOSS_SCORE && p.ev > LOSS_SCORE);
                }
            }
        }
    }

    #[test]
    fn depth_cap_bounds_rounds() {
        let b = sample_board(5, 6);
        let mut ex = Expectimax::with_config(fixed_depth(4, false));
        assert!(ex.best_move(b, 0).is_some());
        let stats = ex.last_stats();
        assert_eq!(stats.depth, 4);
        assert_eq!(stats.rounds, 2);
        assert!(!stats.cancelled);
        assert!(stats.nodes > 0);
    }

    #[test]
    fn zero_budget_falls_back_to_static_choice() {
        let b = sample_board(8, 6);
        let cfg = ExpectimaxConfig { time_budget: Duration::ZERO, ..Default::default() };
        let mut ex = Expectimax::with_config(cfg);
        assert_eq!(ex.best_move(b, 0), greedy_move(b));
        assert!(ex.best_move(b, 0).is_some());
        assert_eq!(ex.last_stats().rounds, 0);
    }

    #[test]
    fn tiny_budget_still_answers() {
        let b = sample_board(21, 30);
        let cfg = ExpectimaxConfig { time_budget: Duration::from_millis(5), ..Default::default() };
        let mut ex = Expectimax::with_config(cfg);
        if !is_terminal(b) {
            let mv = ex.best_move(b, 0).expect("legal move exists");
            assert!(apply_player_move(b, mv).changed);
        }
    }

    #[test]
    fn cancelled_round_unwinds_with_neutral_value() {
        let table = TranspositionTable::new();
        let token = CancelToken::never();
        token.cancel();
        let mut search = Search::new(&table, &token, 1e-4);
        let state = SearchState { score: 0, depth: 6, turn: Turn::Player, prob: 1.0 };
        assert_eq!(search.expectimax(sample_board(3, 4), state), CANCELLED_SCORE);
        assert!(table.is_empty());
    }

    #[test]
    fn probability_cutoff_prunes() {
        let table = TranspositionTable::new();
        let token = CancelToken::never();
        let mut search = Search::new(&table, &token, 1e-4);
        let state = SearchState { score: 0, depth: 0, turn: Turn::Player, prob: 5e-5 };
        assert_eq!(search.expectimax(sample_board(3, 4), state), PRUNED_SCORE);
        assert!(!search.reached_horizon);
        assert!(table.is_empty());
    }

    #[test]
    fn leaf_keeps_higher_cached_value() {
        let table = TranspositionTable::new();
        let token = CancelToken::never();
        let b = sample_board(4, 4);
        let fresh = heuristic::evaluate(b);
        table.record_max(b, fresh + 1000.0);
        let mut search = Search::new(&table, &token, 1e-4);
        let state = SearchState { score: 0, depth: 0, turn: Turn::Spawner, prob: 1.0 };
        assert_eq!(search.expectimax(b, state), fresh + 1000.0);

        // a lower cached value is raised to the fresh evaluation
        let c = sample_board(6, 4);
        table.record_max(c, 1.0);
        assert_eq!(search.expectimax(c, state), heuristic::evaluate(c));
        assert_eq!(table.get(c), Some(heuristic::evaluate(c)));
    }

    #[test]
    fn interior_nodes_reuse_cached_values() {
        let table = TranspositionTable::new();
        let token = CancelToken::never();
        let b = sample_board(9, 4);
        table.record_max(b, 42.0);
        let mut search = Search::new(&table, &token, 1e-4);
        let state = SearchState { score: 0, depth: 4, turn: Turn::Player, prob: 1.0 };
        assert_eq!(search.expectimax(b, state), 42.0);
        assert_eq!(search.nodes, 1);
    }

    #[test]
    fn spawner_node_on_full_board_is_a_loss() {
        let table = TranspositionTable::new();
        let token = CancelToken::never();
        let full = Board::from_ranks([[1, 1, 2, 3], [4, 5, 6, 7], [1, 2, 3, 4], [5, 6, 7, 8]]);
        let mut search = Search::new(&table, &token, 1e-4);
        let state = SearchState { score: 0, depth: 2, turn: Turn::Spawner, prob: 1.0 };
        assert_eq!(search.expectimax(full, state), LOSS_SCORE);
    }

    #[test]
    fn spawner_average_matches_manual_expectation() {
        // One empty cell: EV = 0.9 * eval(with 2) + 0.1 * eval(with 4).
        let b = Board::from_ranks([[1, 2, 3, 4], [5, 6, 7, 8], [9, 10, 11, 12], [13, 14, 1, 0]]);
        let table = TranspositionTable::new();
        let token = CancelToken::never();
        let mut search = Search::new(&table, &token, 1e-4);
        let state = SearchState { score: 0, depth: 1, turn: Turn::Spawner, prob: 1.0 };
        let expected = 0.9 * heuristic::evaluate(b.set(3, 3, 1)) + 0.1 * heuristic::evaluate(b.set(3, 3, 2));
        assert!((search.expectimax(b, state) - expected).abs() < 1e-6);
    }

    #[test]
    fn player_node_keeps_negative_children() {
        // Monotonicity penalties push every child well below zero.
        let b = Board::from_ranks([[11, 1, 11, 1], [1, 11, 1, 11], [11, 1, 11, 1], [1, 11, 1, 0]]);
        let children: Vec<f64> = legal_moves(b).map(|dir| heuristic::evaluate(apply_player_move(b, dir).board)).collect();
        assert!(!children.is_empty());
        let expected = children.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        assert!(expected < 0.0);

        let table = TranspositionTable::new();
        let token = CancelToken::never();
        let mut search = Search::new(&table, &token, 1e-4);
        let state = SearchState { score: 0, depth: 1, turn: Turn::Player, prob: 1.0 };
        assert_eq!(search.expectimax(b, state), expected);
        assert!(expected > LOSS_SCORE);
    }

    #[test]
    fn stuck_player_node_is_a_loss() {
        let stuck = Board::from_ranks([[1, 2, 1, 2], [2, 1, 2, 1], [1, 2, 1, 2], [2, 1, 2, 1]]);
        let table = TranspositionTable::new();
        let token = CancelToken::never();
        let mut search = Search::new(&table, &token, 1e-4);
        let state = SearchState { score: 0, depth: 2, turn: Turn::Player, prob: 1.0 };
        assert_eq!(search.expectimax(stuck, state), LOSS_SCORE);
    }

    #[test]
    fn cancelled_round_keeps_previous_answer() {
        let b = sample_board(31, 10);
        let cfg = fixed_depth(8, false);
        let expected = pick_best(&Expectimax::with_config(cfg.clone()).branch_evals(b, 0, 2));
        assert!(expected.is_some());

        let mut ex = Expectimax::with_config(cfg);
        let mv = ex.deepen(b, 0, |depth, _| {
            let token = CancelToken::never();
            if depth > 2 {
                token.cancel();
            }
            token
        });
        let stats = ex.last_stats();
        assert_eq!(mv, expected);
        assert!(stats.cancelled);
        assert_eq!(stats.depth, 2);
        assert_eq!(stats.rounds, 1);
    }

    #[test]
    fn deepening_stops_when_every_line_ends_early() {
        // Only Up and Right are legal, and every spawn after either leaves a dead board.
        let b = Board::from_ranks([[7, 2, 6, 0], [9, 3, 7, 9], [2, 6, 8, 1], [8, 4, 7, 9]]);
        let mut ex = Expectimax::with_config(fixed_depth(8, false));
        assert_eq!(ex.best_move(b, 0), Some(Direction::Up));
        let stats = ex.last_stats();
        assert_eq!(stats.rounds, 1);
        assert_eq!(stats.depth, 2);
        assert!(!stats.cancelled);
    }

    #[test]
    fn ties_go_to_first_direction() {
        let branches = [
            BranchEval { dir: Direction::Up, ev: 1.0, legal: false },
            BranchEval { dir: Direction::Down, ev: 5.0, legal: true },
            BranchEval { dir: Direction::Left, ev: 5.0, legal: true },
            BranchEval { dir: Direction::Right, ev: 2.0, legal: true },
        ];
        assert_eq!(pick_best(&branches), Some(Direction::Down));
        assert_eq!(pick_best(&Direction::ALL.map(BranchEval::illegal)), None);
    }

    #[test]
    fn dedicated_pool() {
        let cfg = ExpectimaxConfig { threads: Some(2), ..fixed_depth(2, true) };
        let mut ex = Expectimax::try_with_config(cfg).unwrap();
        assert_eq!(ex.config().threads, Some(2));
        assert!(ex.best_move(sample_board(12, 8), 0).is_some());
    }
}
