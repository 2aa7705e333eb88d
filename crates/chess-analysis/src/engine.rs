//! UCI engine process wrapper for position analysis.
//!
//! The engine's stdout is drained by a reader thread into a channel so every
//! request can be bounded by a deadline. A request that times out is
//! cancelled with `stop`; if the engine does not acknowledge, the process is
//! discarded and a fresh one is spawned on the next request.

use std::collections::BTreeMap;
use std::io::{self, BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, trace, warn};
use uci::{EngineInfo, EngineMessage, GoOptions, GuiCommand};

use crate::analyst::{Analyst, PvLine};

/// Maximum number of lines to read before giving up on a UCI response.
pub const MAX_UCI_LINES: usize = 100_000;

/// Default bound on a single engine request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// How long `quit` waits for the process to exit before killing it.
const QUIT_GRACE: Duration = Duration::from_millis(500);

/// Errors that can occur when working with chess engines.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Engine executable was not found at the specified path.
    #[error("Engine not found at path: {0}")]
    NotFound(String),
    /// Failed to spawn the engine process.
    #[error("Failed to spawn engine: {0}")]
    Spawn(#[source] io::Error),
    /// Writing to or waiting on the engine failed.
    #[error("Engine I/O error: {0}")]
    Io(#[from] io::Error),
    /// Engine failed to complete the UCI handshake.
    #[error("Engine initialization failed: {0}")]
    InitFailed(String),
    /// Engine returned an invalid or unexpected response.
    #[error("Invalid engine response: {0}")]
    InvalidResponse(String),
    /// Engine did not answer within the configured time.
    #[error("Engine did not answer within {0:?}")]
    Timeout(Duration),
    /// Engine closed its output, usually because it exited.
    #[error("Engine closed unexpectedly")]
    Closed,
}

/// How to launch and configure an engine process.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    /// Executable to run, looked up on `PATH` when not a path.
    pub path: String,
    /// Extra command-line arguments.
    pub args: Vec<String>,
    /// Bound on each request, handshake included.
    pub timeout: Duration,
    /// `setoption` pairs sent once after the handshake.
    pub options: Vec<(String, String)>,
}

impl EngineSettings {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            args: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
            options: Vec::new(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_option(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.options.push((name.into(), value.to_string()));
        self
    }
}

/// Wrapper for UCI-compatible analysis engines like Stockfish.
///
/// One `AnalysisEngine` owns at most one engine process at a time and talks
/// to it strictly request by request.
pub struct AnalysisEngine {
    settings: EngineSettings,
    session: Option<Session>,
    /// The engine's name (reported via UCI id).
    name: String,
}

impl AnalysisEngine {
    /// Spawn `engine_path` with default settings.
    ///
    /// # Errors
    ///
    /// - `EngineError::NotFound` if the executable doesn't exist
    /// - `EngineError::Spawn` if the engine process fails to start
    /// - `EngineError::InitFailed`, `Timeout` or `Closed` if the handshake fails
    pub fn new(engine_path: &str) -> Result<Self, EngineError> {
        Self::with_settings(EngineSettings::new(engine_path))
    }

    /// Spawn an engine and complete the UCI handshake.
    pub fn with_settings(settings: EngineSettings) -> Result<Self, EngineError> {
        let session = Session::start(&settings)?;
        let name = session.name.clone();
        debug!(engine = %name, path = %settings.path, "engine ready");
        Ok(Self {
            settings,
            session: Some(session),
            name,
        })
    }

    /// Returns the engine's name as reported via UCI protocol.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Send `quit` and wait for the process to exit, killing it if it
    /// lingers.
    pub fn quit(mut self) -> Result<(), EngineError> {
        match self.session.take() {
            Some(mut session) => session.close(),
            None => Ok(()),
        }
    }

    /// The live session, spawning a replacement if the last one was
    /// discarded.
    fn session(&mut self) -> Result<&mut Session, EngineError> {
        if self.session.is_none() {
            warn!(path = %self.settings.path, "restarting engine");
            let session = Session::start(&self.settings)?;
            self.name = session.name.clone();
            self.session = Some(session);
        }
        self.session
            .as_mut()
            .ok_or_else(|| EngineError::InitFailed("no engine session".to_string()))
    }

    /// Run `request` on the session, then decide whether the session is
    /// still usable.
    fn with_session<T>(
        &mut self,
        request: impl FnOnce(&mut Session) -> Result<T, EngineError>,
    ) -> Result<T, EngineError> {
        let (result, keep) = {
            let session = self.session()?;
            let result = request(session);
            let keep = match &result {
                Err(EngineError::Closed) | Err(EngineError::Io(_)) => false,
                Err(e) if session.searching => {
                    warn!(error = %e, "engine request failed mid-search, stopping search");
                    match session.abort() {
                        Ok(()) => true,
                        Err(e) => {
                            warn!(error = %e, "engine ignored stop, discarding process");
                            false
                        }
                    }
                }
                Err(EngineError::Timeout(_)) => false,
                _ => true,
            };
            (result, keep)
        };
        if !keep {
            self.session = None;
        }
        result
    }
}

impl Analyst for AnalysisEngine {
    fn analyse(&mut self, fen: &str, depth: u32, lines: usize) -> Result<Vec<PvLine>, EngineError> {
        self.with_session(|session| session.search(fen, depth, lines.max(1)))
    }

    fn new_game(&mut self) -> Result<(), EngineError> {
        self.with_session(|session| {
            session.send(&GuiCommand::UciNewGame)?;
            session.sync()
        })
    }
}

/// One running engine process.
struct Session {
    process: Child,
    stdin: ChildStdin,
    lines: Receiver<String>,
    timeout: Duration,
    /// MultiPV value the engine currently has.
    multipv: usize,
    /// A `go` was sent and its `bestmove` has not been read yet.
    searching: bool,
    name: String,
}

impl Session {
    fn start(settings: &EngineSettings) -> Result<Self, EngineError> {
        let mut process = Command::new(&settings.path)
            .args(&settings.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| match e.kind() {
                io::ErrorKind::NotFound => EngineError::NotFound(settings.path.clone()),
                _ => EngineError::Spawn(e),
            })?;

        let stdin = process
            .stdin
            .take()
            .ok_or_else(|| EngineError::InitFailed("no stdin pipe".to_string()))?;
        let stdout = process
            .stdout
            .take()
            .ok_or_else(|| EngineError::InitFailed("no stdout pipe".to_string()))?;

        let (tx, rx) = mpsc::channel();
        thread::Builder::new()
            .name("uci-reader".to_string())
            .spawn(move || {
                for line in BufReader::new(stdout).lines() {
                    let Ok(line) = line else { break };
                    if tx.send(line).is_err() {
                        break;
                    }
                }
            })
            .map_err(EngineError::Spawn)?;

        let mut session = Self {
            process,
            stdin,
            lines: rx,
            timeout: settings.timeout,
            multipv: 1,
            searching: false,
            name: String::new(),
        };
        session.handshake(settings)?;
        Ok(session)
    }

    fn handshake(&mut self, settings: &EngineSettings) -> Result<(), EngineError> {
        self.send(&GuiCommand::Uci)?;

        let deadline = self.deadline();
        let mut name = None;
        let mut acknowledged = false;
        for _ in 0..MAX_UCI_LINES {
            match EngineMessage::parse(&self.recv(deadline)?) {
                Ok(EngineMessage::Id { name: Some(n), .. }) => name = Some(n),
                Ok(EngineMessage::UciOk) => {
                    acknowledged = true;
                    break;
                }
                _ => {}
            }
        }
        if !acknowledged {
            return Err(EngineError::InitFailed("no uciok".to_string()));
        }
        self.name = name
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| "Unknown Engine".to_string());

        for (option, value) in &settings.options {
            self.send(&GuiCommand::set_option(option, value))?;
            if option.eq_ignore_ascii_case("MultiPV") {
                self.multipv = value.parse().unwrap_or(self.multipv);
            }
        }
        self.sync()
    }

    fn search(&mut self, fen: &str, depth: u32, lines: usize) -> Result<Vec<PvLine>, EngineError> {
        if self.multipv != lines {
            self.send(&GuiCommand::set_option("MultiPV", lines))?;
            self.multipv = lines;
        }
        self.send(&GuiCommand::position_fen(fen))?;
        self.send(&GuiCommand::Go(GoOptions::depth(depth)))?;
        self.searching = true;

        let deadline = self.deadline();
        let mut collector = LineCollector::new(lines);
        for _ in 0..MAX_UCI_LINES {
            let line = self.recv(deadline)?;
            if is_bestmove(&line) {
                self.searching = false;
            }
            match EngineMessage::parse(&line) {
                Ok(EngineMessage::Info(info)) => collector.push(&info),
                Ok(EngineMessage::BestMove { .. }) => return collector.finish(fen),
                Ok(_) => {}
                Err(e) => return Err(EngineError::InvalidResponse(e.to_string())),
            }
        }
        Err(EngineError::InvalidResponse(
            "Too many lines without bestmove".to_string(),
        ))
    }

    /// `isready` round trip.
    fn sync(&mut self) -> Result<(), EngineError> {
        self.send(&GuiCommand::IsReady)?;
        let deadline = self.deadline();
        for _ in 0..MAX_UCI_LINES {
            if let Ok(EngineMessage::ReadyOk) = EngineMessage::parse(&self.recv(deadline)?) {
                return Ok(());
            }
        }
        Err(EngineError::InvalidResponse("no readyok".to_string()))
    }

    /// Cancel a search in flight and discard its output.
    fn abort(&mut self) -> Result<(), EngineError> {
        self.send(&GuiCommand::Stop)?;
        let deadline = self.deadline();
        for _ in 0..MAX_UCI_LINES {
            if is_bestmove(&self.recv(deadline)?) {
                self.searching = false;
                return Ok(());
            }
        }
        Err(EngineError::InvalidResponse("no bestmove after stop".to_string()))
    }

    fn close(&mut self) -> Result<(), EngineError> {
        let sent = self.send(&GuiCommand::Quit);
        let deadline = Instant::now() + QUIT_GRACE;
        loop {
            if self.process.try_wait()?.is_some() {
                return sent;
            }
            if Instant::now() >= deadline {
                self.process.kill()?;
                self.process.wait()?;
                return sent;
            }
            thread::sleep(Duration::from_millis(10));
        }
    }

    fn deadline(&self) -> Instant {
        Instant::now() + self.timeout
    }

    fn send(&mut self, command: &GuiCommand) -> Result<(), EngineError> {
        let line = command.to_uci();
        trace!(target: "uci", "> {}", line);
        writeln!(self.stdin, "{}", line)?;
        self.stdin.flush()?;
        Ok(())
    }

    fn recv(&self, deadline: Instant) -> Result<String, EngineError> {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match self.lines.recv_timeout(remaining) {
            Ok(line) => {
                trace!(target: "uci", "< {}", line);
                Ok(line)
            }
            Err(RecvTimeoutError::Timeout) => Err(EngineError::Timeout(self.timeout)),
            Err(RecvTimeoutError::Disconnected) => Err(EngineError::Closed),
        }
    }
}

/// Ends a search, even when malformed.
fn is_bestmove(line: &str) -> bool {
    line.split_whitespace().next() == Some("bestmove")
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Ok(None) = self.process.try_wait() {
            let _ = self.close();
        }
    }
}

/// Keeps the most recent exact-scored line per MultiPV rank.
///
/// Stockfish reports every rank again at each iteration, so the last line
/// seen for a rank is the deepest one. Bound-only scores from aspiration
/// re-searches are skipped.
#[derive(Debug)]
struct LineCollector {
    limit: usize,
    lines: BTreeMap<u32, PvLine>,
}

impl LineCollector {
    fn new(limit: usize) -> Self {
        Self {
            limit,
            lines: BTreeMap::new(),
        }
    }

    fn push(&mut self, info: &EngineInfo) {
        if !info.has_exact_score() {
            return;
        }
        let Some(score) = info.score else { return };
        let rank = info.multipv.unwrap_or(1);
        if rank == 0 || rank as usize > self.limit {
            return;
        }
        self.lines.insert(
            rank,
            PvLine {
                rank,
                evaluation: score.into(),
                depth: info.depth.unwrap_or(0),
                moves: info.pv.clone(),
            },
        );
    }

    fn finish(self, fen: &str) -> Result<Vec<PvLine>, EngineError> {
        if self.lines.is_empty() {
            return Err(EngineError::InvalidResponse(format!(
                "no scored line for {}",
                fen
            )));
        }
        Ok(self.lines.into_values().collect())
    }
}
