//! The three engine roles a walk consults.

use std::fmt;

use chess_analysis::{AnalysisEngine, Analyst, EngineSettings};

use crate::error::MinerError;

/// Which engine answered (or failed to answer) a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineRole {
    /// Shallow searcher for the side holding the advantage.
    Attacker,
    /// Shallow searcher for the designated disadvantaged side.
    Defender,
    /// Deep searcher: reference evaluation, spread and move choice.
    Master,
}

impl fmt::Display for EngineRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EngineRole::Attacker => "attacker",
            EngineRole::Defender => "defender",
            EngineRole::Master => "master",
        };
        f.write_str(name)
    }
}

/// One analyst per role, owned by the walker for the whole run.
pub struct Engines<E> {
    pub attacker: E,
    pub defender: E,
    pub master: E,
}

impl<E: Analyst> Engines<E> {
    pub fn new(attacker: E, defender: E, master: E) -> Self {
        Self {
            attacker,
            defender,
            master,
        }
    }

    pub fn get_mut(&mut self, role: EngineRole) -> &mut E {
        match role {
            EngineRole::Attacker => &mut self.attacker,
            EngineRole::Defender => &mut self.defender,
            EngineRole::Master => &mut self.master,
        }
    }
}

impl Engines<AnalysisEngine> {
    /// Starts three independent processes from the same settings.
    ///
    /// Processes already started are shut down again if a later one fails.
    pub fn spawn(settings: &EngineSettings) -> Result<Self, MinerError> {
        let start = |role: EngineRole| {
            AnalysisEngine::with_settings(settings.clone()).map_err(MinerError::engine(role))
        };
        let attacker = start(EngineRole::Attacker)?;
        let defender = start(EngineRole::Defender)?;
        let master = start(EngineRole::Master)?;
        tracing::info!(engine = %master.name(), "engines ready");
        Ok(Self::new(attacker, defender, master))
    }

    /// Quits all three engines, even when an earlier one fails, and
    /// reports the first failure.
    pub fn shutdown(self) -> Result<(), MinerError> {
        let results = [
            (EngineRole::Attacker, self.attacker.quit()),
            (EngineRole::Defender, self.defender.quit()),
            (EngineRole::Master, self.master.quit()),
        ];
        let mut first = None;
        for (role, result) in results {
            if let Err(source) = result {
                tracing::warn!(%role, error = %source, "engine did not shut down cleanly");
                first.get_or_insert(MinerError::EngineUnavailable { role, source });
            }
        }
        match first {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
