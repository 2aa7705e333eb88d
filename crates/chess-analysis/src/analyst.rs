//! The analysis capability consumed by position classifiers.
//!
//! [`Analyst`] is the seam between code that needs engine opinions and the
//! process that produces them. [`AnalysisEngine`](crate::AnalysisEngine) is
//! the production implementation; tests substitute scripted analysts.

use crate::engine::EngineError;
use crate::Evaluation;

/// One ranked continuation reported by a multi-line search.
#[derive(Debug, Clone, PartialEq)]
pub struct PvLine {
    /// Rank reported by the engine (1 = best).
    pub rank: u32,
    /// Score of the line from the side to move's view.
    pub evaluation: Evaluation,
    /// Depth at which the line was reported.
    pub depth: u32,
    /// Moves of the principal variation in UCI notation.
    pub moves: Vec<String>,
}

impl PvLine {
    /// The move that starts this line, if the engine sent one.
    pub fn first_move(&self) -> Option<&str> {
        self.moves.first().map(String::as_str)
    }
}

/// A [`PvLine`] whose score is a finite centipawn value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoredLine {
    /// Rank reported by the engine (1 = best).
    pub rank: u32,
    /// Centipawn score from the side to move's view.
    pub centipawns: i32,
    /// Moves of the principal variation in UCI notation.
    pub moves: Vec<String>,
}

impl ScoredLine {
    /// The move that starts this line, if the engine sent one.
    pub fn first_move(&self) -> Option<&str> {
        self.moves.first().map(String::as_str)
    }
}

/// Something that can search chess positions to a fixed depth.
///
/// Implementors only provide [`analyse`](Analyst::analyse); the forced-mate
/// handling of [`evaluate`](Analyst::evaluate) and
/// [`top_lines`](Analyst::top_lines) is shared.
pub trait Analyst {
    /// Searches `fen` to `depth` and returns up to `lines` continuations,
    /// best first.
    ///
    /// # Errors
    ///
    /// Any failure to obtain a well-formed answer from the engine.
    fn analyse(&mut self, fen: &str, depth: u32, lines: usize)
        -> Result<Vec<PvLine>, EngineError>;

    /// Tells the analyst that following positions are unrelated to earlier
    /// ones.
    fn new_game(&mut self) -> Result<(), EngineError> {
        Ok(())
    }

    /// Single-line evaluation of `fen`.
    ///
    /// Returns `Ok(None)` when the engine reports a forced mate: there is no
    /// finite centipawn value to compare, which is an answer, not a failure.
    fn evaluate(&mut self, fen: &str, depth: u32) -> Result<Option<i32>, EngineError> {
        let lines = self.analyse(fen, depth, 1)?;
        let best = lines.into_iter().next().ok_or_else(|| {
            EngineError::InvalidResponse(format!("no evaluation for {}", fen))
        })?;
        Ok(best.evaluation.centipawns())
    }

    /// Multi-line search keeping only lines with a centipawn score.
    ///
    /// Mate-scored lines are dropped without taking their place in `k`, so
    /// the result may be shorter than `k`. Order follows the engine's rank.
    fn top_lines(&mut self, fen: &str, depth: u32, k: usize) -> Result<Vec<ScoredLine>, EngineError> {
        let lines = self.analyse(fen, depth, k)?;
        Ok(lines
            .into_iter()
            .filter_map(|line| {
                line.evaluation.centipawns().map(|centipawns| ScoredLine {
                    rank: line.rank,
                    centipawns,
                    moves: line.moves,
                })
            })
            .collect())
    }
}
