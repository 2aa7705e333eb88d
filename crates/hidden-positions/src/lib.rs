//! Mines tactically hidden chess positions.
//!
//! A walk starts from one root position, asks a strong engine for its
//! favourite continuations and follows them a few plies deep. Every
//! position on the way goes through the six gates of [`Classifier`]; the
//! ones that pass are appended to a JSONL log as [`Record`]s.
//!
//! # Example
//!
//! ```ignore
//! use hidden_positions::{Board, Engines, JsonlSink, MinerConfig, TreeWalker};
//!
//! let config = MinerConfig::load(None)?;
//! let mut board = Board::from_fen(&config.start_fen)?;
//! let engines = Engines::spawn(&config.engine.settings())?;
//! let sink = JsonlSink::open(&config.output)?;
//! let mut walker = TreeWalker::new(config, engines, sink);
//! let summary = walker.walk(&mut board)?;
//! ```

pub mod board;
pub mod classifier;
pub mod config;
pub mod engines;
pub mod error;
pub mod record;
pub mod sink;
pub mod walker;

pub use board::{Board, MoveGuard};
pub use classifier::{Classifier, Rejection, Verdict};
pub use config::{ConfigError, EngineConfig, MinerConfig, Side};
pub use engines::{EngineRole, Engines};
pub use error::MinerError;
pub use record::Record;
pub use sink::{JsonlSink, RecordSink};
pub use walker::{TreeWalker, WalkSummary};
