//! Hidden Positions - walks engine lines and logs tactically hidden positions.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use hidden_positions::{Board, Engines, JsonlSink, MinerConfig, TreeWalker};
use tracing_subscriber::EnvFilter;

/// Mine positions where a shallow search misjudges a hanging queen.
#[derive(Parser, Debug)]
#[command(name = "hidden-positions")]
#[command(about = "Explores engine-favoured lines and logs tactically hidden positions")]
struct Cli {
    /// Config file (defaults to ./miner.toml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Root position as FEN
    #[arg(long)]
    fen: Option<String>,

    /// Run identifier written into every record
    #[arg(long)]
    id: Option<String>,

    /// JSONL file to append records to
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// Levels of the tree to walk, root included
    #[arg(long)]
    tree_depth: Option<u32>,

    /// Candidate moves expanded per node
    #[arg(long)]
    moves: Option<usize>,

    /// Analysis engine executable
    #[arg(long)]
    engine: Option<String>,

    /// Per-request engine timeout in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,
}

impl Cli {
    /// Loads the config file and applies command-line overrides.
    fn resolve(&self) -> anyhow::Result<MinerConfig> {
        let mut config = MinerConfig::load(self.config.as_deref()).context("loading config")?;
        if let Some(fen) = &self.fen {
            config.start_fen = fen.clone();
        }
        if let Some(id) = &self.id {
            config.game_id = id.clone();
        }
        if let Some(out) = &self.out {
            config.output = out.clone();
        }
        if let Some(depth) = self.tree_depth {
            config.tree_depth = depth;
        }
        if let Some(moves) = self.moves {
            config.number_moves = moves;
        }
        if let Some(engine) = &self.engine {
            config.engine.path = engine.clone();
        }
        if let Some(ms) = self.timeout_ms {
            config.engine.timeout_ms = ms;
        }
        config.validate().context("invalid configuration")?;
        Ok(config)
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    let cli = Cli::parse();
    let config = cli.resolve()?;

    tracing::info!("Starting hidden-positions");
    tracing::info!("Run: {}", config.game_id);
    tracing::info!("Output: {:?}", config.output);
    tracing::info!("Engine: {}", config.engine.path);

    let mut board = Board::from_fen(&config.start_fen)?;
    let sink = JsonlSink::open(&config.output)
        .with_context(|| format!("opening {}", config.output.display()))?;
    let engines = Engines::spawn(&config.engine.settings()).context("starting engines")?;

    let mut walker = TreeWalker::new(config, engines, sink);
    let walked = walker.walk(&mut board);

    // Release everything before reporting the walk's own outcome.
    let (engines, sink) = walker.into_parts();
    let shutdown = engines.shutdown();
    let flushed = sink.finish();

    let summary = walked.context("walk aborted")?;
    shutdown.context("shutting down engines")?;
    flushed.context("flushing output")?;

    tracing::info!(
        "Visited {} nodes, wrote {} records ({} classification failures, {} abandoned branches, {} skipped moves)",
        summary.nodes_visited,
        summary.records_written,
        summary.classification_failures,
        summary.abandoned_branches,
        summary.skipped_moves
    );
    Ok(())
}
