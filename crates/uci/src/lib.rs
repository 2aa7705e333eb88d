//! UCI (Universal Chess Interface) protocol library, GUI side.
//!
//! This crate provides the types needed to drive an external UCI engine:
//! formatting the commands a GUI sends and parsing the messages the engine
//! answers with.
//!
//! # Commands sent to the engine
//!
//! - `uci` - Initialize engine, get id and options
//! - `isready` / `readyok` - Synchronization
//! - `ucinewgame` - Forget state from previous searches
//! - `setoption name <id> [value <x>]` - Configure the engine
//! - `position fen <fen> [moves <move>...]` - Set position
//! - `go [depth <d>] [movetime <ms>]` - Start search
//! - `stop` - Stop search
//! - `quit` - Exit engine
//!
//! # Messages read from the engine
//!
//! - `id name <name>` / `id author <author>`
//! - `uciok`, `readyok`
//! - `info ...` - Search information, see [`EngineInfo`]
//! - `bestmove <move> [ponder <move>]`

mod command;
mod info;

pub use command::{GoOptions, GuiCommand};
pub use info::{Bound, EngineInfo, Score};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum UciError {
    #[error("Invalid message: {0}")]
    InvalidMessage(String),
}

/// Messages sent from engine to GUI.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineMessage {
    /// Engine identification.
    Id { name: Option<String>, author: Option<String> },
    /// UCI initialization complete.
    UciOk,
    /// Engine is ready.
    ReadyOk,
    /// Search information.
    Info(EngineInfo),
    /// Best move found. `None` when the position has no legal move.
    BestMove { mv: Option<String>, ponder: Option<String> },
    /// Anything else (`option ...`, copyright banners, blank lines).
    Other(String),
}

impl EngineMessage {
    /// Parse one line of engine output.
    ///
    /// Never fails on unknown input: lines the GUI does not care about come
    /// back as [`EngineMessage::Other`]. Only a `bestmove` line without a
    /// move is rejected.
    pub fn parse(line: &str) -> Result<Self, UciError> {
        let line = line.trim();
        let mut parts = line.split_whitespace();

        match parts.next() {
            Some("id") => match parts.next() {
                Some("name") => Ok(EngineMessage::Id {
                    name: Some(parts.collect::<Vec<_>>().join(" ")),
                    author: None,
                }),
                Some("author") => Ok(EngineMessage::Id {
                    name: None,
                    author: Some(parts.collect::<Vec<_>>().join(" ")),
                }),
                _ => Ok(EngineMessage::Other(line.to_string())),
            },
            Some("uciok") => Ok(EngineMessage::UciOk),
            Some("readyok") => Ok(EngineMessage::ReadyOk),
            Some("info") => Ok(EngineInfo::parse(line)
                .map(EngineMessage::Info)
                .unwrap_or_else(|| EngineMessage::Other(line.to_string()))),
            Some("bestmove") => {
                let mv = parts
                    .next()
                    .ok_or_else(|| UciError::InvalidMessage(line.to_string()))?;
                let ponder = match parts.next() {
                    Some("ponder") => parts.next().map(str::to_string),
                    _ => None,
                };
                let mv = match mv {
                    "(none)" | "0000" => None,
                    other => Some(other.to_string()),
                };
                Ok(EngineMessage::BestMove { mv, ponder })
            }
            _ => Ok(EngineMessage::Other(line.to_string())),
        }
    }
}
