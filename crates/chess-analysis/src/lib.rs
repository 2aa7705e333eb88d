//! Chess position analysis with Stockfish integration.
//!
//! This crate turns a UCI engine process into a synchronous analysis
//! service: one position in, ranked scored continuations out.
//!
//! # Overview
//!
//! - [`Evaluation`] - Position evaluation (centipawn or mate score)
//! - [`Analyst`] - Depth-limited search capability, with mate-aware helpers
//! - [`AnalysisEngine`] - [`Analyst`] backed by an external engine process
//!
//! # Example
//!
//! ```ignore
//! use chess_analysis::{AnalysisEngine, Analyst};
//!
//! let mut engine = AnalysisEngine::new("stockfish")?;
//! let fen = "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 0 1";
//! if let Some(cp) = engine.evaluate(fen, 12)? {
//!     println!("{} says {} for the side to move", engine.name(), cp);
//! }
//! for line in engine.top_lines(fen, 12, 3)? {
//!     println!("{}: {:?} {}", line.rank, line.first_move(), line.centipawns);
//! }
//! ```

pub mod analyst;
pub mod engine;
pub mod evaluation;

pub use analyst::{Analyst, PvLine, ScoredLine};
pub use engine::{AnalysisEngine, EngineError, EngineSettings};
pub use evaluation::Evaluation;
