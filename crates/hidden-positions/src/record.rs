//! The persisted output unit.

use serde::{Deserialize, Serialize};

/// One interesting position, written as one JSON line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Run identifier, e.g. the opening the walk started from.
    #[serde(rename = "ID")]
    pub id: String,
    /// Half-moves since the start of the game.
    pub ply: u32,
    pub fen: String,
    /// Shallow evaluation by the attacker or defender, side to move's view.
    pub eval_shallow: i32,
    /// Deep evaluation by the master, side to move's view.
    pub eval_deep: i32,
    /// Distance between the best and the worst of `evals`.
    pub spread: u32,
    /// Master scores of the top lines, best first.
    pub evals: Vec<i32>,
}
