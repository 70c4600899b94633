use std::io::Write;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use anytime_2048::engine as GameEngine;
use anytime_2048::expectimax::{Expectimax, ExpectimaxConfig};
use anytime_2048::game::Game;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use rand::{rngs::StdRng, SeedableRng};

#[derive(Parser, Debug)]
#[command(author, version, about = "Play 2048 with a time-bounded Expectimax AI", long_about = None)]
struct Args {
    /// Seed for tile spawns (random if omitted; the chosen seed is logged)
    #[arg(long)]
    seed: Option<u64>,

    /// Thinking time per move, in milliseconds
    #[arg(long, default_value_t = 400)]
    budget_ms: u64,

    /// Stop deepening at this depth even if time remains
    #[arg(long)]
    depth_cap: Option<u32>,

    /// Size of a dedicated search thread pool (default: rayon's global pool)
    #[arg(long)]
    threads: Option<usize>,

    /// Search the four root directions one after another
    #[arg(long)]
    sequential: bool,

    /// Stop after this many moves
    #[arg(long)]
    steps: Option<u64>,

    /// Print the board after every move
    #[arg(long)]
    show: bool,

    /// Suppress the status line and final summary
    #[arg(long)]
    quiet: bool,

    /// Log filter used when RUST_LOG is unset (error, warn, info, debug, trace)
    #[arg(long, default_value = "warn")]
    log_level: String,
}

fn main() -> Result<()> {
    let args = Args::parse();

    env_logger::Builder::from_env(
        env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, args.log_level.as_str()),
    )
    .format(|buf, record| writeln!(buf, "[{}] {}: {}", record.level(), record.target(), record.args()))
    .target(env_logger::Target::Stderr)
    .init();

    GameEngine::new();

    let seed = args.seed.unwrap_or_else(rand::random);
    log::info!("seed {seed}");

    let cfg = ExpectimaxConfig {
        time_budget: Duration::from_millis(args.budget_ms),
        depth_cap: args.depth_cap,
        parallel: !args.sequential,
        threads: args.threads,
        ..Default::default()
    };
    let mut ai = Expectimax::try_with_config(cfg).context("building the search thread pool")?;
    let mut game = Game::new(StdRng::seed_from_u64(seed)).context("starting a new game")?;

    let pb = if args.quiet || args.show {
        None
    } else {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::with_template("{spinner} {elapsed_precise} | Moves: {msg}")?
                .tick_chars("⠁⠃⠇⠧⠷⠿⠻⠟⠯⠷⠧⠇⠃"),
        );
        pb.enable_steady_tick(Duration::from_millis(120));
        Some(pb)
    };

    if args.show {
        println!("{}", game.board());
    }

    let start = Instant::now();
    let mut depth_total: u64 = 0;
    while let Some(dir) = game.play_ai_turn(&mut ai)? {
        let stats = ai.last_stats();
        depth_total += stats.depth as u64;
        log::debug!("move {}: {dir} at depth {} ({} nodes)", game.moves(), stats.depth, stats.nodes);

        if args.show {
            println!("{dir}, score {}\n{}", game.score(), game.board());
        }
        if let Some(pb) = &pb {
            let rate = game.moves() as f64 / start.elapsed().as_secs_f64().max(1e-6);
            pb.set_message(format!(
                "{} | moves/sec: {:.1} | score: {} | depth: {}",
                game.moves(),
                rate,
                game.score(),
                stats.depth
            ));
        }
        if args.steps.is_some_and(|limit| game.moves() >= limit) {
            break;
        }
    }

    if let Some(pb) = pb {
        pb.finish_and_clear();
    }
    if !args.quiet {
        let moves = game.moves();
        let avg_depth = if moves == 0 { 0.0 } else { depth_total as f64 / moves as f64 };
        println!(
            "Moves: {} | score: {} | highest tile: {} | avg depth: {:.1} | {}",
            moves,
            game.score(),
            game.board().highest_tile(),
            avg_depth,
            if game.is_over() { "game over" } else { "stopped" }
        );
    }
    Ok(())
}
