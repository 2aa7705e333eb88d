//! Decides whether a position is worth keeping as a training position.
//!
//! Gates run cheapest first and stop at the first rejection:
//!
//! 1. shallow and deep evaluations disagree by at least `e_min`
//! 2. no capture leaves the capturing piece unattacked
//! 3. a queen of the side not to move is attacked
//! 4. material imbalance stays within `material_ceiling`
//! 5. the deep evaluation stays within `max_abs_eval`
//! 6. the master's top lines spread by at least `spread_cp`

use chess_analysis::Analyst;
use shakmaty::{Color, Role};

use crate::board::Board;
use crate::config::MinerConfig;
use crate::engines::{EngineRole, Engines};
use crate::error::MinerError;
use crate::record::Record;

/// Outcome of classifying one position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Interesting(Record),
    Rejected(Rejection),
}

/// The gate that turned a position down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// Shallow or deep evaluation is a forced mate.
    ForcedMate,
    SmallDisagreement,
    FreeCapture,
    /// No queen of the side not to move is under attack.
    QueenSafe,
    MaterialImbalance,
    /// The deep evaluation says the game is already decided.
    DecidedPosition,
    /// Fewer than two master lines with a centipawn score.
    TooFewLines,
    NarrowSpread,
}

/// Six-gate filter over one position and the three engine roles.
///
/// Deterministic: the same position and the same engine answers always
/// give the same verdict.
pub struct Classifier<'c> {
    config: &'c MinerConfig,
}

impl<'c> Classifier<'c> {
    pub fn new(config: &'c MinerConfig) -> Self {
        Self { config }
    }

    /// Role and depth of the shallow evaluation for the side to move.
    pub fn shallow_role(&self, board: &Board) -> (EngineRole, u32) {
        if board.turn() == Color::from(self.config.defender_side) {
            (EngineRole::Defender, self.config.defender_depth)
        } else {
            (EngineRole::Attacker, self.config.attacker_depth)
        }
    }

    /// Runs the gates in order.
    ///
    /// The board is borrowed mutably for the capture trials and is returned
    /// unchanged.
    ///
    /// # Errors
    ///
    /// [`MinerError::EngineUnavailable`] when a role fails to answer.
    pub fn classify<E: Analyst>(
        &self,
        board: &mut Board,
        engines: &mut Engines<E>,
    ) -> Result<Verdict, MinerError> {
        let cfg = self.config;
        let fen = board.fen();

        let (role, depth) = self.shallow_role(board);
        let shallow = engines
            .get_mut(role)
            .evaluate(&fen, depth)
            .map_err(MinerError::engine(role))?;
        let deep = engines
            .master
            .evaluate(&fen, cfg.master_depth)
            .map_err(MinerError::engine(EngineRole::Master))?;
        let (Some(eval_shallow), Some(eval_deep)) = (shallow, deep) else {
            return Ok(Verdict::Rejected(Rejection::ForcedMate));
        };

        if eval_deep.abs_diff(eval_shallow) < cfg.e_min.unsigned_abs() {
            return Ok(Verdict::Rejected(Rejection::SmallDisagreement));
        }
        if has_free_capture(board) {
            return Ok(Verdict::Rejected(Rejection::FreeCapture));
        }
        if !queen_exposed(board) {
            return Ok(Verdict::Rejected(Rejection::QueenSafe));
        }
        if f64::from(board.material_balance().abs()) > cfg.material_ceiling {
            return Ok(Verdict::Rejected(Rejection::MaterialImbalance));
        }
        if eval_deep.unsigned_abs() > cfg.max_abs_eval.unsigned_abs() {
            return Ok(Verdict::Rejected(Rejection::DecidedPosition));
        }

        let evals: Vec<i32> = engines
            .master
            .top_lines(&fen, cfg.master_depth, cfg.top_count)
            .map_err(MinerError::engine(EngineRole::Master))?
            .into_iter()
            .map(|line| line.centipawns)
            .collect();
        let Some(spread) = spread(&evals) else {
            return Ok(Verdict::Rejected(Rejection::TooFewLines));
        };
        if spread < cfg.spread_cp {
            return Ok(Verdict::Rejected(Rejection::NarrowSpread));
        }

        Ok(Verdict::Interesting(Record {
            id: cfg.game_id.clone(),
            ply: board.ply(),
            fen,
            eval_shallow,
            eval_deep,
            spread,
            evals,
        }))
    }
}

/// True if some capture leaves the capturing piece on a square the
/// opponent does not attack.
pub fn has_free_capture(board: &mut Board) -> bool {
    board.captures().into_iter().any(|mv| {
        let Ok(after) = board.play(&mv) else {
            return false;
        };
        let opponent = after.turn();
        !after.is_attacked_by(mv.to(), opponent)
    })
}

/// True if a queen of the side not to move stands on a square the side to
/// move attacks. False when that side has no queen.
pub fn queen_exposed(board: &Board) -> bool {
    let mover = board.turn();
    board
        .pieces(Role::Queen, !mover)
        .into_iter()
        .any(|square| board.is_attacked_by(square, mover))
}

/// Distance between the first (best) and last (worst) score, or `None`
/// with fewer than two scores.
pub fn spread(evals: &[i32]) -> Option<u32> {
    match evals {
        [first, .., last] => Some(first.abs_diff(*last)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chess_analysis::{EngineError, Evaluation, PvLine};
    use std::collections::HashMap;

    /// Answers from a FEN-keyed script; unknown positions fail.
    #[derive(Default)]
    struct Scripted {
        lines: HashMap<String, Vec<PvLine>>,
        calls: usize,
    }

    impl Scripted {
        fn with(mut self, fen: &str, scores: &[Evaluation]) -> Self {
            let lines = scores
                .iter()
                .enumerate()
                .map(|(i, &evaluation)| PvLine {
                    rank: i as u32 + 1,
                    evaluation,
                    depth: 1,
                    moves: vec![],
                })
                .collect();
            self.lines.insert(fen.to_string(), lines);
            self
        }
    }

    impl Analyst for Scripted {
        fn analyse(&mut self, fen: &str, _depth: u32, lines: usize) -> Result<Vec<PvLine>, EngineError> {
            self.calls += 1;
            self.lines
                .get(fen)
                .map(|l| l.iter().take(lines).cloned().collect())
                .ok_or(EngineError::Closed)
        }
    }

    fn cp(values: &[i32]) -> Vec<Evaluation> {
        values.iter().map(|&v| Evaluation::Centipawns(v)).collect()
    }

    /// White to move; Black's queen on d4 is hit by the e3 pawn, the only
    /// capture exd4 lands on a square the c5 pawn guards.
    const QUEEN_HIT: &str = "4k3/8/8/2p5/3q4/4P3/8/4K3 w - - 0 1";

    fn engines(shallow: Scripted, master: Scripted) -> Engines<Scripted> {
        Engines::new(Scripted::default(), shallow, master)
    }

    fn config() -> MinerConfig {
        MinerConfig {
            game_id: "TEST".to_string(),
            material_ceiling: 10.0,
            ..MinerConfig::default()
        }
    }

    #[test]
    fn test_free_capture_gate() {
        // Only capture exd4, recaptured by the c5 pawn.
        let mut guarded = Board::from_fen(QUEEN_HIT).unwrap();
        assert!(!has_free_capture(&mut guarded));
        assert_eq!(guarded.fen(), QUEEN_HIT);

        // Same capture without the defending pawn.
        let free_fen = "4k3/8/8/8/3q4/4P3/8/4K3 w - - 0 1";
        let mut free = Board::from_fen(free_fen).unwrap();
        assert!(has_free_capture(&mut free));
        assert_eq!(free.fen(), free_fen);
    }

    #[test]
    fn test_free_capture_en_passant() {
        // d5 pawn takes e5 en passant onto e6, where nothing black attacks.
        let mut board = Board::from_fen("4k3/8/8/3Pp3/8/8/8/4K3 w - e6 0 2").unwrap();
        assert!(has_free_capture(&mut board));
    }

    #[test]
    fn test_queen_exposure() {
        assert!(queen_exposed(&Board::from_fen(QUEEN_HIT).unwrap()));
        // Queen out of reach.
        assert!(!queen_exposed(&Board::from_fen("q3k3/8/8/2p5/8/4P3/8/4K3 w - - 0 1").unwrap()));
        // No queen at all.
        assert!(!queen_exposed(&Board::from_fen("4k3/8/8/8/8/4P3/8/4K3 w - - 0 1").unwrap()));
        // Own queen attacked does not count.
        assert!(!queen_exposed(&Board::from_fen("4k3/8/8/8/8/4p3/3Q4/4K3 w - - 0 1").unwrap()));
    }

    #[test]
    fn test_spread_computation() {
        let evals = [180, 140, 90, 40, -20];
        let spread = spread(&evals).unwrap();
        assert_eq!(spread, 200);
        assert!(spread >= 100);
        assert!(spread < 250);

        assert_eq!(super::spread(&[30]), None);
        assert_eq!(super::spread(&[]), None);
        assert_eq!(super::spread(&[-50, 40]), Some(90));
    }

    #[test]
    fn test_spread_gate_threshold() {
        let run = |spread_cp: u32| {
            let cfg = MinerConfig { spread_cp, ..config() };
            let shallow = Scripted::default().with(QUEEN_HIT, &cp(&[0]));
            let master = Scripted::default().with(QUEEN_HIT, &cp(&[180, 140, 90, 40, -20]));
            let mut engines = engines(shallow, master);
            let mut board = Board::from_fen(QUEEN_HIT).unwrap();
            Classifier::new(&cfg).classify(&mut board, &mut engines).unwrap()
        };

        match run(100) {
            Verdict::Interesting(record) => {
                assert_eq!(record.spread, 200);
                assert_eq!(record.evals, vec![180, 140, 90, 40, -20]);
            }
            other => panic!("expected interesting, got {:?}", other),
        }
        assert_eq!(run(250), Verdict::Rejected(Rejection::NarrowSpread));
    }

    #[test]
    fn test_record_fields() {
        let cfg = config();
        let shallow = Scripted::default().with(QUEEN_HIT, &cp(&[50]));
        let master = Scripted::default().with(QUEEN_HIT, &cp(&[300, 250, 190]));
        let mut engines = engines(shallow, master);
        let mut board = Board::from_fen(QUEEN_HIT).unwrap();

        let verdict = Classifier::new(&cfg).classify(&mut board, &mut engines).unwrap();

        let Verdict::Interesting(record) = verdict else {
            panic!("expected a record");
        };
        assert_eq!(record.id, "TEST");
        assert_eq!(record.ply, 0);
        assert_eq!(record.fen, QUEEN_HIT);
        assert_eq!(record.eval_shallow, 50);
        assert_eq!(record.eval_deep, 300);
        assert_eq!(record.spread, 110);
    }

    #[test]
    fn test_forced_mate_rejects_before_other_gates() {
        let cfg = config();
        let shallow = Scripted::default().with(QUEEN_HIT, &[Evaluation::Mate(3)]);
        let master = Scripted::default().with(QUEEN_HIT, &cp(&[300, 100]));
        let mut engines = engines(shallow, master);
        let mut board = Board::from_fen(QUEEN_HIT).unwrap();

        let verdict = Classifier::new(&cfg).classify(&mut board, &mut engines).unwrap();
        assert_eq!(verdict, Verdict::Rejected(Rejection::ForcedMate));
        // Only the master's single-line evaluation ran.
        assert_eq!(engines.master.calls, 1);
    }

    #[test]
    fn test_gate_order() {
        let cfg = config();
        let cases = [
            // Disagreement 40 < 100.
            (QUEEN_HIT, 0, 40, Rejection::SmallDisagreement),
            // Queen capturable for free.
            ("4k3/8/8/8/3q4/4P3/8/4K3 w - - 0 1", 0, 300, Rejection::FreeCapture),
            // Queen safe.
            ("q3k3/8/8/2p5/8/4P3/8/4K3 w - - 0 1", 0, 300, Rejection::QueenSafe),
            // Everything fine but the deep eval says it's over.
            (QUEEN_HIT, 0, 1200, Rejection::DecidedPosition),
        ];
        for (fen, shallow_cp, deep_cp, expected) in cases {
            let shallow = Scripted::default().with(fen, &cp(&[shallow_cp]));
            let master = Scripted::default().with(fen, &cp(&[deep_cp, deep_cp - 200]));
            let mut engines = engines(shallow, master);
            let mut board = Board::from_fen(fen).unwrap();

            let verdict = Classifier::new(&cfg).classify(&mut board, &mut engines).unwrap();
            assert_eq!(verdict, Verdict::Rejected(expected), "{}", fen);
        }
    }

    #[test]
    fn test_extreme_engine_scores_do_not_overflow() {
        let cfg = config();
        for (shallow_cp, deep_cp) in [(-2_000_000_000, 2_000_000_000), (i32::MAX, i32::MIN)] {
            let shallow = Scripted::default().with(QUEEN_HIT, &cp(&[shallow_cp]));
            let master = Scripted::default().with(QUEEN_HIT, &cp(&[deep_cp]));
            let mut engines = engines(shallow, master);
            let mut board = Board::from_fen(QUEEN_HIT).unwrap();

            let verdict = Classifier::new(&cfg).classify(&mut board, &mut engines).unwrap();
            assert_eq!(verdict, Verdict::Rejected(Rejection::DecidedPosition));
        }
    }

    #[test]
    fn test_material_imbalance_gate() {
        // Black is a queen up.
        let cfg = MinerConfig {
            material_ceiling: 5.5,
            ..config()
        };
        let shallow = Scripted::default().with(QUEEN_HIT, &cp(&[0]));
        let master = Scripted::default().with(QUEEN_HIT, &cp(&[300, 100]));
        let mut engines = engines(shallow, master);
        let mut board = Board::from_fen(QUEEN_HIT).unwrap();

        let verdict = Classifier::new(&cfg).classify(&mut board, &mut engines).unwrap();
        assert_eq!(verdict, Verdict::Rejected(Rejection::MaterialImbalance));
    }

    #[test]
    fn test_too_few_lines_after_dropping_mates() {
        let cfg = config();
        let shallow = Scripted::default().with(QUEEN_HIT, &cp(&[0]));
        let master = Scripted::default().with(
            QUEEN_HIT,
            &[Evaluation::Centipawns(300), Evaluation::Mate(-2), Evaluation::Mate(-1)],
        );
        let mut engines = engines(shallow, master);
        let mut board = Board::from_fen(QUEEN_HIT).unwrap();

        let verdict = Classifier::new(&cfg).classify(&mut board, &mut engines).unwrap();
        assert_eq!(verdict, Verdict::Rejected(Rejection::TooFewLines));
    }

    #[test]
    fn test_shallow_role_follows_defender_side() {
        let cfg = config();
        let classifier = Classifier::new(&cfg);
        let white = Board::from_fen(QUEEN_HIT).unwrap();
        let black = Board::from_fen("4k3/8/8/2p5/3q4/4P3/8/4K3 b - - 0 1").unwrap();
        assert_eq!(classifier.shallow_role(&white), (EngineRole::Defender, 5));
        assert_eq!(classifier.shallow_role(&black), (EngineRole::Attacker, 3));
    }

    #[test]
    fn test_engine_failure_names_role() {
        let cfg = config();
        let mut engines = engines(Scripted::default(), Scripted::default());
        let mut board = Board::from_fen(QUEEN_HIT).unwrap();

        match Classifier::new(&cfg).classify(&mut board, &mut engines) {
            Err(MinerError::EngineUnavailable { role, .. }) => assert_eq!(role, EngineRole::Defender),
            other => panic!("expected engine failure, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_classify_is_deterministic() {
        let cfg = config();
        let classify = || {
            let shallow = Scripted::default().with(QUEEN_HIT, &cp(&[20]));
            let master = Scripted::default().with(QUEEN_HIT, &cp(&[260, 230, 120, 90]));
            let mut engines = engines(shallow, master);
            let mut board = Board::from_fen(QUEEN_HIT).unwrap();
            let verdict = Classifier::new(&cfg).classify(&mut board, &mut engines).unwrap();
            assert_eq!(board.fen(), QUEEN_HIT);
            verdict
        };
        assert_eq!(classify(), classify());
    }
}
