//! chessbridge - drive a UCI engine through the bridge from the command line.
//!
//! - `check <PATH>` tells that a binary speaks UCI.
//! - `bestmove` asks for one move in a position.
//! - `analyse` runs live analysis and prints every update the throttle lets
//!   through, until the time runs out or Ctrl-C.
//!
//! Log output goes to stderr and is controlled with `RUST_LOG`.

use anyhow::Context;
use bridge::{ui, BridgeConfig, Controller, EvalUpdate, MoveOutcome, UiLoop};
use chess::Game;
use clap::{Args, Parser, Subcommand};
use engine::{EngineConfig, EngineKind, SearchParams};
use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;
use std::time::Duration;

mod config;

/// How long shutdown may take before we give up on stragglers.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Parser)]
#[command(name = "chessbridge", about = "Talk to a UCI chess engine", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check whether a binary is a UCI engine.
    Check {
        path: PathBuf,
        /// Seconds to wait for `uciok`.
        #[arg(long, default_value_t = 2)]
        timeout: u64,
    },
    /// Ask the engine for one move.
    Bestmove {
        #[command(flatten)]
        engine: EngineArgs,
        /// Search depth.
        #[arg(long, conflicts_with_all = ["movetime", "elo"])]
        depth: Option<u32>,
        /// Search time in milliseconds.
        #[arg(long, conflicts_with = "elo")]
        movetime: Option<u64>,
        /// Target playing strength.
        #[arg(long)]
        elo: Option<u32>,
    },
    /// Run live analysis and print evaluation updates.
    Analyse {
        #[command(flatten)]
        engine: EngineArgs,
        /// Stop after this many seconds.
        #[arg(long, default_value_t = 10)]
        seconds: u64,
        /// Print updates as JSON lines.
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args)]
struct EngineArgs {
    /// Engine binary (default: $CHESSBRIDGE_ENGINE, then common locations).
    #[arg(long)]
    engine: Option<PathBuf>,
    /// Position to work on.
    #[arg(long, default_value = chess::START_FEN)]
    fen: String,
    #[arg(long)]
    threads: Option<u32>,
    /// Hash table size in MB.
    #[arg(long)]
    hash: Option<u32>,
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("no UCI engine found; pass --engine or set CHESSBRIDGE_ENGINE")]
    NoEngine,
    #[error("engine gave no move within {0:?}")]
    NoAnswer(Duration),
}

struct Session {
    controller: Controller,
    ui_loop: UiLoop,
    path: PathBuf,
}

impl Session {
    fn open(args: &EngineArgs) -> anyhow::Result<Self> {
        let path = config::engine_path(args.engine.clone()).ok_or(CliError::NoEngine)?;
        let game = Game::from_fen(&args.fen).with_context(|| format!("bad FEN {:?}", args.fen))?;

        let (handle, ui_loop) = ui::channel();
        let controller = Controller::builder()
            .config(BridgeConfig::from_env())
            .engine_config(EngineConfig {
                threads: args.threads,
                hash_mb: args.hash,
                ..Default::default()
            })
            .move_engine(EngineKind::External(path.clone()))
            .build(game, handle);

        tracing::info!("Using engine {}", path.display());
        Ok(Self {
            controller,
            ui_loop,
            path,
        })
    }

    async fn close(mut self) {
        self.controller.shutdown();
        let drained =
            tokio::time::timeout(SHUTDOWN_TIMEOUT, self.ui_loop.drain(&mut self.controller)).await;
        if drained.is_err() {
            tracing::warn!("Engine threads still busy after {:?}", SHUTDOWN_TIMEOUT);
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    use tracing_subscriber::fmt::format::FmtSpan;
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_span_events(FmtSpan::CLOSE)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Check { path, timeout } => check(path, Duration::from_secs(timeout)),
        Commands::Bestmove {
            engine,
            depth,
            movetime,
            elo,
        } => {
            let params = match (depth, movetime, elo) {
                (Some(depth), _, _) => SearchParams::depth(depth),
                (_, Some(ms), _) => SearchParams::move_time(ms),
                (_, _, Some(elo)) => SearchParams::from_elo(elo),
                _ => SearchParams::default(),
            };
            bestmove(&engine, params).await
        }
        Commands::Analyse {
            engine,
            seconds,
            json,
        } => analyse(&engine, Duration::from_secs(seconds), json).await,
    }
}

fn check(path: PathBuf, timeout: Duration) -> anyhow::Result<()> {
    if engine::is_uci_binary(&path, timeout) {
        println!("{}: UCI engine", path.display());
        Ok(())
    } else {
        anyhow::bail!("{} did not answer `uci` with `uciok`", path.display())
    }
}

async fn bestmove(args: &EngineArgs, params: SearchParams) -> anyhow::Result<()> {
    let mut session = Session::open(args)?;
    let wait = session.controller.config().think_timeout(&params) + Duration::from_secs(1);

    let result = Rc::new(RefCell::new(None));
    let slot = result.clone();
    session
        .controller
        .request_move(params, move |_, outcome| {
            *slot.borrow_mut() = Some(outcome);
        })
        .with_context(|| format!("failed to start {}", session.path.display()))?;

    let answered = tokio::select! {
        answered = session.ui_loop.run_until(&mut session.controller, wait, |c| !c.is_thinking()) => answered,
        _ = tokio::signal::ctrl_c() => {
            session.controller.stop_thinking();
            false
        }
    };

    let outcome = result.borrow_mut().take();
    session.close().await;

    match outcome {
        Some(Ok(MoveOutcome::Played(mv))) => println!("bestmove {mv}"),
        Some(Ok(MoveOutcome::NoMove)) => println!("bestmove (none)"),
        Some(Err(e)) => return Err(e).context("move request failed"),
        None if answered => println!("bestmove (none)"),
        None => return Err(CliError::NoAnswer(wait).into()),
    }
    Ok(())
}

async fn analyse(args: &EngineArgs, duration: Duration, json: bool) -> anyhow::Result<()> {
    let mut session = Session::open(args)?;
    session.controller.set_eval_callback(move |update| {
        if json {
            match serde_json::to_string(update) {
                Ok(line) => println!("{line}"),
                Err(e) => tracing::error!("Failed to encode update: {}", e),
            }
        } else {
            println!("{}", format_update(update));
        }
    });

    let path = session.path.clone();
    session
        .controller
        .start_analysis(Some(&path))
        .with_context(|| format!("failed to start {}", path.display()))?;

    tokio::select! {
        _ = session.ui_loop.run_for(&mut session.controller, duration) => {}
        _ = tokio::signal::ctrl_c() => tracing::info!("Interrupted"),
    }

    session.close().await;
    Ok(())
}

fn format_update(update: &EvalUpdate) -> String {
    let eval = match update.display_mate {
        Some(distance) => format!("#{distance}"),
        None => format!("{:+.2}", f64::from(update.snapshot.score_cp) / 100.0),
    };
    let mut line = format!(
        "depth {:>2}  {:>7}  W/D/L {:.0}/{:.0}/{:.0}",
        update.snapshot.depth,
        eval,
        update.wdl.win * 100.0,
        update.wdl.draw * 100.0,
        update.wdl.loss * 100.0,
    );
    if let Some(best) = &update.snapshot.best_move {
        line.push_str(&format!("  best {best}"));
    }
    if let Some(rating) = &update.rating {
        line.push_str(&format!("  [{rating}]"));
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge::{EvalSnapshot, Wdl};
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_depth_conflicts_with_movetime() {
        let parsed = Cli::try_parse_from(["chessbridge", "bestmove", "--depth", "5", "--movetime", "100"]);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_format_update() {
        let update = EvalUpdate {
            snapshot: EvalSnapshot {
                fen: chess::START_FEN.to_string(),
                score_cp: 35,
                is_mate: false,
                mate_distance: 0,
                best_move: Some("e2e4".to_string()),
                depth: 12,
            },
            display_mate: None,
            wdl: Wdl {
                win: 0.4,
                draw: 0.3,
                loss: 0.3,
            },
            rating: None,
            move_number: 1,
        };
        assert_eq!(
            format_update(&update),
            "depth 12    +0.35  W/D/L 40/30/30  best e2e4"
        );
    }
}
