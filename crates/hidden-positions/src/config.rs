//! Run configuration loaded from `miner.toml`.
//!
//! Every field has a default, so an empty or missing file describes the
//! classic run: Italian Game root, three candidate moves per node, three
//! plies deep.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chess_analysis::EngineSettings;
use serde::{Deserialize, Serialize};
use shakmaty::Color;
use thiserror::Error;

use crate::board::Board;

/// Errors that can occur when loading or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// An explicitly requested config file does not exist.
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),
    /// Failed to read the configuration file from disk.
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),
    /// Failed to parse the configuration file as valid TOML.
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),
    /// A value is out of range.
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Side whose shallow evaluation comes from the defender engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    White,
    Black,
}

impl From<Side> for Color {
    fn from(side: Side) -> Color {
        match side {
            Side::White => Color::White,
            Side::Black => Color::Black,
        }
    }
}

/// How to launch the analysis engine used for all three roles.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// Executable name or path. Defaults to "stockfish" (assumes it's in PATH).
    #[serde(default = "default_engine_path")]
    pub path: String,
    /// Per-request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// UCI options sent after the handshake, e.g. `Threads = 2`.
    #[serde(default)]
    pub options: BTreeMap<String, toml::Value>,
}

fn default_engine_path() -> String {
    "stockfish".to_string()
}

fn default_timeout_ms() -> u64 {
    30_000
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            path: default_engine_path(),
            timeout_ms: default_timeout_ms(),
            options: BTreeMap::new(),
        }
    }
}

impl EngineConfig {
    pub fn settings(&self) -> EngineSettings {
        let mut settings = EngineSettings::new(self.path.clone())
            .with_timeout(Duration::from_millis(self.timeout_ms));
        for (name, value) in &self.options {
            let value = match value {
                toml::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            settings = settings.with_option(name.clone(), value);
        }
        settings
    }
}

/// Thresholds, depths and I/O for one walk.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MinerConfig {
    /// Search depth of the defender (the disadvantaged side).
    #[serde(default = "default_defender_depth")]
    pub defender_depth: u32,
    /// Search depth of the attacker (the side with the advantage).
    #[serde(default = "default_attacker_depth")]
    pub attacker_depth: u32,
    /// Search depth of the master engine.
    #[serde(default = "default_master_depth")]
    pub master_depth: u32,
    /// Candidate moves expanded at each node.
    #[serde(default = "default_number_moves")]
    pub number_moves: usize,
    /// Levels of the tree below and including the root.
    #[serde(default = "default_tree_depth")]
    pub tree_depth: u32,
    /// Master lines requested for the spread gate.
    #[serde(default = "default_top_count")]
    pub top_count: usize,
    /// Minimum shallow/deep disagreement in centipawns.
    #[serde(default = "default_e_min")]
    pub e_min: i32,
    /// Largest tolerated material imbalance in pawns.
    #[serde(default = "default_material_ceiling")]
    pub material_ceiling: f64,
    /// Largest tolerated deep evaluation in centipawns.
    #[serde(default = "default_max_abs_eval")]
    pub max_abs_eval: i32,
    /// Minimum distance between the best and worst top line.
    #[serde(default = "default_spread_cp")]
    pub spread_cp: u32,
    #[serde(default = "default_defender_side")]
    pub defender_side: Side,
    /// Root of the walk.
    #[serde(default = "default_start_fen")]
    pub start_fen: String,
    /// Written as `ID` into every record.
    #[serde(default = "default_game_id")]
    pub game_id: String,
    /// JSONL file records are appended to.
    #[serde(default = "default_output")]
    pub output: PathBuf,
    #[serde(default)]
    pub engine: EngineConfig,
}

fn default_defender_depth() -> u32 {
    5
}

fn default_attacker_depth() -> u32 {
    3
}

fn default_master_depth() -> u32 {
    10
}

fn default_number_moves() -> usize {
    3
}

fn default_tree_depth() -> u32 {
    3
}

fn default_top_count() -> usize {
    5
}

fn default_e_min() -> i32 {
    100
}

fn default_material_ceiling() -> f64 {
    5.5
}

fn default_max_abs_eval() -> i32 {
    1000
}

fn default_spread_cp() -> u32 {
    100
}

fn default_defender_side() -> Side {
    Side::White
}

fn default_start_fen() -> String {
    "r1bqk2r/ppp2ppp/2np1n2/2b1p3/2B1P3/2NP1N2/PPP2PPP/R1BQK2R w KQkq - 4 6".to_string()
}

fn default_game_id() -> String {
    "ITAL".to_string()
}

fn default_output() -> PathBuf {
    PathBuf::from("hidden_positions.jsonl")
}

impl Default for MinerConfig {
    fn default() -> Self {
        Self {
            defender_depth: default_defender_depth(),
            attacker_depth: default_attacker_depth(),
            master_depth: default_master_depth(),
            number_moves: default_number_moves(),
            tree_depth: default_tree_depth(),
            top_count: default_top_count(),
            e_min: default_e_min(),
            material_ceiling: default_material_ceiling(),
            max_abs_eval: default_max_abs_eval(),
            spread_cp: default_spread_cp(),
            defender_side: default_defender_side(),
            start_fen: default_start_fen(),
            game_id: default_game_id(),
            output: default_output(),
            engine: EngineConfig::default(),
        }
    }
}

impl MinerConfig {
    /// Loads the configuration from `path`, or from [`Self::config_path()`]
    /// when no path is given.
    ///
    /// A missing default file yields the defaults; a missing file that was
    /// asked for by name is an error.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NotFound`], [`ConfigError::ReadError`] or
    /// [`ConfigError::ParseError`]. Values are not validated here.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let (config_path, explicit) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => (Self::config_path(), false),
        };
        if !config_path.exists() {
            if explicit {
                return Err(ConfigError::NotFound(config_path));
            }
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&config_path)?;
        Ok(toml::from_str(&content)?)
    }

    /// `miner.toml` in the current working directory.
    pub fn config_path() -> PathBuf {
        PathBuf::from("miner.toml")
    }

    /// Checks value ranges and that the root position parses.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let depths = [
            ("defender_depth", self.defender_depth),
            ("attacker_depth", self.attacker_depth),
            ("master_depth", self.master_depth),
            ("tree_depth", self.tree_depth),
        ];
        for (name, depth) in depths {
            if depth == 0 {
                return Err(ConfigError::Invalid(format!("{} must be at least 1", name)));
            }
        }
        if self.number_moves == 0 {
            return Err(ConfigError::Invalid("number_moves must be at least 1".to_string()));
        }
        if self.top_count < 2 {
            return Err(ConfigError::Invalid(format!(
                "top_count must be at least 2, got {}",
                self.top_count
            )));
        }
        if self.e_min < 0 || self.max_abs_eval < 0 {
            return Err(ConfigError::Invalid(
                "e_min and max_abs_eval must not be negative".to_string(),
            ));
        }
        if !self.material_ceiling.is_finite() || self.material_ceiling < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "material_ceiling must be a non-negative number, got {}",
                self.material_ceiling
            )));
        }
        if self.engine.timeout_ms == 0 {
            return Err(ConfigError::Invalid("engine.timeout_ms must be at least 1".to_string()));
        }
        Board::from_fen(&self.start_fen).map_err(|e| ConfigError::Invalid(e.to_string()))?;
        Ok(())
    }
}
