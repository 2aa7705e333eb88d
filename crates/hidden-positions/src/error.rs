//! Error type for the miner library.

use std::io;

use chess_analysis::EngineError;
use thiserror::Error;

use crate::config::ConfigError;
use crate::engines::EngineRole;

/// Errors raised while walking the tree and classifying positions.
///
/// Only [`MinerError::EngineUnavailable`] is recovered from inside a walk;
/// everything else ends the run.
#[derive(Error, Debug)]
pub enum MinerError {
    /// An engine role could not answer a request.
    #[error("{role} engine unavailable: {source}")]
    EngineUnavailable {
        role: EngineRole,
        #[source]
        source: EngineError,
    },
    /// The result log could not be written.
    #[error("Failed to write record: {0}")]
    OutputWrite(#[source] io::Error),
    /// A position string could not be parsed into a legal position.
    #[error("Invalid FEN {fen:?}: {reason}")]
    InvalidFen { fen: String, reason: String },
    /// A move string does not name a legal move in the current position.
    #[error("Illegal move {mv} in {fen}")]
    IllegalMove { mv: String, fen: String },
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl MinerError {
    pub(crate) fn engine(role: EngineRole) -> impl FnOnce(EngineError) -> MinerError {
        move |source| MinerError::EngineUnavailable { role, source }
    }
}
