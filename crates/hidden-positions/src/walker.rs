//! Depth-first walk along the master engine's preferred moves.

use chess_analysis::Analyst;
use tracing::{debug, debug_span, info, warn};

use crate::board::Board;
use crate::classifier::{Classifier, Verdict};
use crate::config::MinerConfig;
use crate::engines::{EngineRole, Engines};
use crate::error::MinerError;
use crate::sink::RecordSink;

/// Counters for one walk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WalkSummary {
    /// Non-terminal nodes entered.
    pub nodes_visited: u64,
    /// Nodes the classifier reached a verdict on.
    pub nodes_classified: u64,
    pub records_written: u64,
    /// Nodes whose classification failed on an engine error.
    pub classification_failures: u64,
    /// Nodes whose expansion failed on an engine error.
    pub abandoned_branches: u64,
    /// Engine moves that were not legal in the position.
    pub skipped_moves: u64,
}

/// Owns the engines and the sink for the length of a walk.
///
/// At each node with depth left and the game still running, the walker
/// classifies the position, then asks the master for `number_moves` lines
/// and descends into each first move in rank order. Engine failures only
/// cost the node or branch they happen at; a failed record write ends the
/// walk.
pub struct TreeWalker<E, S> {
    config: MinerConfig,
    engines: Engines<E>,
    sink: S,
    summary: WalkSummary,
}

impl<E: Analyst, S: RecordSink> TreeWalker<E, S> {
    pub fn new(config: MinerConfig, engines: Engines<E>, sink: S) -> Self {
        Self {
            config,
            engines,
            sink,
            summary: WalkSummary::default(),
        }
    }

    pub fn config(&self) -> &MinerConfig {
        &self.config
    }

    pub fn summary(&self) -> &WalkSummary {
        &self.summary
    }

    /// Walks `tree_depth` levels below and including `board`.
    ///
    /// `board` is back in its starting state when this returns, error or
    /// not.
    ///
    /// # Errors
    ///
    /// [`MinerError::OutputWrite`] if a record cannot be written.
    pub fn walk(&mut self, board: &mut Board) -> Result<WalkSummary, MinerError> {
        info!(
            fen = %board.fen(),
            tree_depth = self.config.tree_depth,
            moves = self.config.number_moves,
            "starting walk"
        );
        for role in [EngineRole::Attacker, EngineRole::Defender, EngineRole::Master] {
            if let Err(e) = self.engines.get_mut(role).new_game() {
                warn!(%role, error = %e, "engine reset failed");
            }
        }
        self.visit(board, self.config.tree_depth)?;
        info!(
            visited = self.summary.nodes_visited,
            records = self.summary.records_written,
            abandoned = self.summary.abandoned_branches,
            "walk finished"
        );
        Ok(self.summary.clone())
    }

    /// Hands back the engines and the sink so they can be released.
    pub fn into_parts(self) -> (Engines<E>, S) {
        (self.engines, self.sink)
    }

    fn visit(&mut self, board: &mut Board, depth_left: u32) -> Result<(), MinerError> {
        if depth_left == 0 || board.is_game_over() {
            return Ok(());
        }
        let _span = debug_span!("node", ply = board.ply(), depth_left).entered();
        self.summary.nodes_visited += 1;

        self.classify(board)?;

        let fen = board.fen();
        let lines = match self
            .engines
            .master
            .top_lines(&fen, self.config.master_depth, self.config.number_moves)
        {
            Ok(lines) => lines,
            Err(e) => {
                warn!(role = %EngineRole::Master, error = %e, %fen, "abandoning branch");
                self.summary.abandoned_branches += 1;
                return Ok(());
            }
        };

        for line in lines {
            let Some(uci) = line.first_move() else {
                continue;
            };
            let mut child = match board.play_uci(uci) {
                Ok(child) => child,
                Err(e) => {
                    warn!(error = %e, "skipping engine move");
                    self.summary.skipped_moves += 1;
                    continue;
                }
            };
            self.visit(&mut child, depth_left - 1)?;
        }
        Ok(())
    }

    fn classify(&mut self, board: &mut Board) -> Result<(), MinerError> {
        let verdict = Classifier::new(&self.config).classify(board, &mut self.engines);
        match verdict {
            Ok(Verdict::Interesting(record)) => {
                self.summary.nodes_classified += 1;
                self.sink.append(&record).map_err(MinerError::OutputWrite)?;
                self.summary.records_written += 1;
                info!(
                    ply = record.ply,
                    fen = %record.fen,
                    spread = record.spread,
                    "interesting position"
                );
            }
            Ok(Verdict::Rejected(rejection)) => {
                self.summary.nodes_classified += 1;
                debug!(?rejection, "rejected");
            }
            Err(e @ MinerError::EngineUnavailable { .. }) => {
                warn!(error = %e, "classification failed, expanding anyway");
                self.summary.classification_failures += 1;
            }
            Err(e) => return Err(e),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Record;
    use chess_analysis::{EngineError, Evaluation, PvLine};
    use std::collections::HashMap;
    use std::io;

    /// Master-style stub: every known FEN gets the same scored moves.
    #[derive(Default)]
    struct MoveScript {
        moves: HashMap<String, Vec<(&'static str, Evaluation)>>,
        requests: Vec<(String, usize)>,
        resets: usize,
    }

    impl MoveScript {
        fn at(mut self, fen: &str, moves: &[(&'static str, i32)]) -> Self {
            self.moves.insert(
                fen.to_string(),
                moves.iter().map(|&(m, cp)| (m, Evaluation::Centipawns(cp))).collect(),
            );
            self
        }
    }

    impl Analyst for MoveScript {
        fn analyse(&mut self, fen: &str, _depth: u32, lines: usize) -> Result<Vec<PvLine>, EngineError> {
            self.requests.push((fen.to_string(), lines));
            let moves = self
                .moves
                .get(fen)
                .ok_or_else(|| EngineError::InvalidResponse(format!("unscripted {}", fen)))?;
            Ok(moves
                .iter()
                .take(lines)
                .enumerate()
                .map(|(i, (mv, evaluation))| PvLine {
                    rank: i as u32 + 1,
                    evaluation: *evaluation,
                    depth: 10,
                    moves: vec![mv.to_string()],
                })
                .collect())
        }

        fn new_game(&mut self) -> Result<(), EngineError> {
            self.resets += 1;
            Ok(())
        }
    }

    struct Collect(Vec<Record>);

    impl RecordSink for Collect {
        fn append(&mut self, record: &Record) -> io::Result<()> {
            self.0.push(record.clone());
            Ok(())
        }
    }

    const START: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";
    const AFTER_E4: &str = "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 0 1";
    const AFTER_D4: &str = "rnbqkbnr/pppppppp/8/8/3P4/8/PPP1PPPP/RNBQKBNR b KQkq - 0 1";

    fn config(tree_depth: u32, number_moves: usize) -> MinerConfig {
        MinerConfig {
            tree_depth,
            number_moves,
            start_fen: START.to_string(),
            ..MinerConfig::default()
        }
    }

    #[test]
    fn test_depth_zero_visits_nothing() {
        let engines = Engines::new(MoveScript::default(), MoveScript::default(), MoveScript::default());
        let mut walker = TreeWalker::new(config(1, 2), engines, Collect(vec![]));
        let mut board = Board::from_fen(START).unwrap();

        walker.visit(&mut board, 0).unwrap();
        assert_eq!(walker.summary().nodes_visited, 0);
    }

    #[test]
    fn test_expansion_order_and_backtracking() {
        // Shallow eval equals deep eval everywhere: nothing is interesting.
        let script = || {
            MoveScript::default()
                .at(START, &[("e2e4", 30), ("d2d4", 25)])
                .at(AFTER_E4, &[("e7e5", 30), ("c7c5", 35)])
                .at(AFTER_D4, &[("d7d5", 25)])
        };
        let engines = Engines::new(script(), script(), script());
        let mut walker = TreeWalker::new(config(3, 2), engines, Collect(vec![]));
        let mut board = Board::from_fen(START).unwrap();

        let summary = walker.walk(&mut board).unwrap();

        assert_eq!(board.fen(), START);
        // Root, two children, three grandchildren.
        assert_eq!(summary.nodes_visited, 6);
        assert_eq!(summary.nodes_classified, 3);
        assert_eq!(summary.classification_failures, 3);
        assert_eq!(summary.abandoned_branches, 3);
        assert_eq!(summary.records_written, 0);

        let (engines, sink) = walker.into_parts();
        assert!(sink.0.is_empty());
        assert_eq!(
            (engines.attacker.resets, engines.defender.resets, engines.master.resets),
            (1, 1, 1)
        );
        let expansions: Vec<&str> = engines
            .master
            .requests
            .iter()
            .filter(|(_, lines)| *lines == 2)
            .map(|(fen, _)| fen.as_str())
            .collect();
        // Depth first: the whole e4 subtree before d4.
        assert_eq!(expansions.len(), 6);
        assert_eq!(expansions[0], START);
        assert_eq!(expansions[1], AFTER_E4);
        assert!(expansions[2].starts_with("rnbqkbnr/pppp1ppp/8/4p3/4P3"));
        assert!(expansions[3].starts_with("rnbqkbnr/pp1ppppp/8/2p5/4P3"));
        assert_eq!(expansions[4], AFTER_D4);
    }

    #[test]
    fn test_illegal_engine_move_is_skipped() {
        let script = || MoveScript::default().at(START, &[("e2e5", 30), ("g1f3", 20)]);
        let engines = Engines::new(script(), script(), script());
        let mut walker = TreeWalker::new(config(2, 2), engines, Collect(vec![]));
        let mut board = Board::from_fen(START).unwrap();

        let summary = walker.walk(&mut board).unwrap();

        assert_eq!(summary.skipped_moves, 1);
        assert_eq!(summary.nodes_visited, 2);
        assert_eq!(board.fen(), START);
    }

    #[test]
    fn test_game_over_root_is_terminal() {
        let mated = "r1bqkb1r/pppp1Qpp/2n2n2/4p3/2B1P3/8/PPPP1PPP/RNB1K1NR b KQkq - 0 4";
        let engines = Engines::new(MoveScript::default(), MoveScript::default(), MoveScript::default());
        let mut walker = TreeWalker::new(config(3, 3), engines, Collect(vec![]));
        let mut board = Board::from_fen(mated).unwrap();

        let summary = walker.walk(&mut board).unwrap();
        assert_eq!(summary, WalkSummary::default());
        let (engines, _) = walker.into_parts();
        assert!(engines.master.requests.is_empty());
    }
}
