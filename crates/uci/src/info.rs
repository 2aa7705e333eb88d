//! UCI info command types.

/// Score in centipawns or mate distance, from the side to move's view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Score {
    /// Centipawn score (100 = 1 pawn advantage).
    Cp(i32),
    /// Mate in N moves (positive = side to move mates, negative = gets mated).
    Mate(i32),
}

/// Marks a score reported during an aspiration re-search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bound {
    /// The real score is at least this value.
    Lower,
    /// The real score is at most this value.
    Upper,
}

/// Search information from engine.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EngineInfo {
    /// Search depth in plies.
    pub depth: Option<u32>,
    /// Selective search depth.
    pub seldepth: Option<u32>,
    /// Rank of this line when searching several lines (1 = best).
    pub multipv: Option<u32>,
    /// Score evaluation.
    pub score: Option<Score>,
    /// Set when the score is only a bound.
    pub bound: Option<Bound>,
    /// Nodes searched.
    pub nodes: Option<u64>,
    /// Nodes per second.
    pub nps: Option<u64>,
    /// Time spent in milliseconds.
    pub time: Option<u64>,
    /// Principal variation (best line found).
    pub pv: Vec<String>,
    /// Current move being searched.
    pub currmove: Option<String>,
    /// Hash table usage (per mille).
    pub hashfull: Option<u32>,
    /// Arbitrary string info.
    pub string: Option<String>,
}

impl EngineInfo {
    /// Create a new empty info.
    pub fn new() -> Self {
        Self::default()
    }

    /// True when the line carries a score that is not just a bound.
    pub fn has_exact_score(&self) -> bool {
        self.score.is_some() && self.bound.is_none()
    }

    /// Parse UCI info line.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        if !line.starts_with("info") {
            return None;
        }

        let mut info = EngineInfo::new();
        let parts: Vec<&str> = line.split_whitespace().collect();
        let mut i = 1; // Skip "info"

        while i < parts.len() {
            match parts[i] {
                "depth" => {
                    i += 1;
                    if i < parts.len() {
                        info.depth = parts[i].parse().ok();
                    }
                }
                "seldepth" => {
                    i += 1;
                    if i < parts.len() {
                        info.seldepth = parts[i].parse().ok();
                    }
                }
                "multipv" => {
                    i += 1;
                    if i < parts.len() {
                        info.multipv = parts[i].parse().ok();
                    }
                }
                "score" => {
                    i += 1;
                    if i + 1 < parts.len() {
                        let value = parts[i + 1].parse().ok();
                        info.score = match (parts[i], value) {
                            ("cp", Some(cp)) => Some(Score::Cp(cp)),
                            ("mate", Some(m)) => Some(Score::Mate(m)),
                            _ => None,
                        };
                        i += 1;
                    }
                }
                "lowerbound" => info.bound = Some(Bound::Lower),
                "upperbound" => info.bound = Some(Bound::Upper),
                "nodes" => {
                    i += 1;
                    if i < parts.len() {
                        info.nodes = parts[i].parse().ok();
                    }
                }
                "nps" => {
                    i += 1;
                    if i < parts.len() {
                        info.nps = parts[i].parse().ok();
                    }
                }
                "time" => {
                    i += 1;
                    if i < parts.len() {
                        info.time = parts[i].parse().ok();
                    }
                }
                "pv" => {
                    i += 1;
                    // Collect all remaining moves until another keyword or end
                    while i < parts.len() && !is_info_keyword(parts[i]) {
                        info.pv.push(parts[i].to_string());
                        i += 1;
                    }
                    continue;
                }
                "currmove" => {
                    i += 1;
                    if i < parts.len() {
                        info.currmove = Some(parts[i].to_string());
                    }
                }
                "hashfull" => {
                    i += 1;
                    if i < parts.len() {
                        info.hashfull = parts[i].parse().ok();
                    }
                }
                "string" => {
                    // String consumes rest of line
                    info.string = Some(parts[i + 1..].join(" "));
                    break;
                }
                _ => {}
            }
            i += 1;
        }

        Some(info)
    }
}

fn is_info_keyword(s: &str) -> bool {
    matches!(
        s,
        "depth"
            | "seldepth"
            | "multipv"
            | "score"
            | "nodes"
            | "nps"
            | "time"
            | "pv"
            | "currmove"
            | "currmovenumber"
            | "hashfull"
            | "tbhits"
            | "string"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_info() {
        let line = "info depth 12 score cp 30 nodes 125000 nps 500000 pv e2e4 e7e5 g1f3";
        let info = EngineInfo::parse(line).unwrap();

        assert_eq!(info.depth, Some(12));
        assert_eq!(info.score, Some(Score::Cp(30)));
        assert_eq!(info.nodes, Some(125000));
        assert_eq!(info.nps, Some(500000));
        assert_eq!(info.pv, vec!["e2e4", "e7e5", "g1f3"]);
        assert!(info.has_exact_score());
    }

    #[test]
    fn parse_mate_score() {
        let line = "info depth 20 score mate -3 pv e2e4";
        let info = EngineInfo::parse(line).unwrap();

        assert_eq!(info.score, Some(Score::Mate(-3)));
    }

    #[test]
    fn parse_stockfish_multipv_line() {
        let line = "info depth 10 seldepth 14 multipv 3 score cp -20 nodes 48123 nps 962460 \
                    hashfull 12 tbhits 0 time 50 pv d2d4 e5d4 f3d4 c6d4";
        let info = EngineInfo::parse(line).unwrap();

        assert_eq!(info.depth, Some(10));
        assert_eq!(info.seldepth, Some(14));
        assert_eq!(info.multipv, Some(3));
        assert_eq!(info.score, Some(Score::Cp(-20)));
        assert_eq!(info.hashfull, Some(12));
        assert_eq!(info.time, Some(50));
        assert_eq!(info.pv, vec!["d2d4", "e5d4", "f3d4", "c6d4"]);
    }

    #[test]
    fn parse_bound_score() {
        let line = "info depth 9 multipv 1 score cp 41 lowerbound nodes 9000 pv c4f7";
        let info = EngineInfo::parse(line).unwrap();

        assert_eq!(info.score, Some(Score::Cp(41)));
        assert_eq!(info.bound, Some(Bound::Lower));
        assert!(!info.has_exact_score());
    }

    #[test]
    fn parse_currmove_line_has_no_score() {
        let info = EngineInfo::parse("info depth 7 currmove g1f3 currmovenumber 2").unwrap();

        assert_eq!(info.currmove, Some("g1f3".to_string()));
        assert_eq!(info.score, None);
        assert!(!info.has_exact_score());
    }

    #[test]
    fn parse_string_consumes_rest() {
        let info = EngineInfo::parse("info string NNUE evaluation using nn.nnue enabled").unwrap();
        assert_eq!(
            info.string.as_deref(),
            Some("NNUE evaluation using nn.nnue enabled")
        );
    }

    #[test]
    fn non_info_line_is_none() {
        assert!(EngineInfo::parse("bestmove e2e4").is_none());
    }
}
