use crate::{EngineInfo, Score, SearchLimit};
use cozy_chess::{File, Move, Piece, Rank, Square};

/// Incoming message from UCI engine
#[derive(Debug, Clone)]
pub enum UciMessage {
    Id { name: String, value: String },
    UciOk,
    ReadyOk,
    BestMove(BestMove),
    Info(EngineInfo),
}

/// Final answer of a `go` search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BestMove {
    Move { mv: Move, ponder: Option<Move> },
    /// `(none)`, `0000`, or a move token too short to be one.
    NoMove,
}

impl BestMove {
    pub fn as_move(&self) -> Option<Move> {
        match self {
            Self::Move { mv, .. } => Some(*mv),
            Self::NoMove => None,
        }
    }
}

/// Score extracted from one `info` line, already White-relative.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InfoScore {
    pub depth: u32,
    pub multipv: u32,
    pub score_cp: i32,
    pub is_mate: bool,
    /// Positive when White mates. Zero unless `is_mate`.
    pub mate_distance: i32,
    pub pv_first_move: Option<String>,
}

/// Parse a UCI message line
pub fn parse_uci_message(line: &str) -> Result<UciMessage, crate::UciError> {
    let tokens: Vec<&str> = line.split_whitespace().collect();

    match tokens.first() {
        Some(&"uciok") => Ok(UciMessage::UciOk),
        Some(&"readyok") => Ok(UciMessage::ReadyOk),

        Some(&"id") => {
            if tokens.len() < 3 {
                return Err(crate::UciError::MalformedMessage(line.to_string()));
            }
            let name = tokens[1].to_string();
            let value = tokens[2..].join(" ");
            Ok(UciMessage::Id { name, value })
        }

        Some(&"bestmove") => parse_bestmove(line)
            .map(UciMessage::BestMove)
            .ok_or_else(|| crate::UciError::MalformedMessage(line.to_string())),

        Some(&"info") => Ok(UciMessage::Info(parse_info_line(&tokens[1..]))),

        _ => Err(crate::UciError::UnknownMessage(line.to_string())),
    }
}

/// Parse a `bestmove` line.
///
/// Returns `None` for lines that are not a `bestmove` answer at all, so callers
/// waiting for the end of a search keep waiting. A `bestmove` whose move token
/// is missing, `(none)`, `0000`, or unparsable means the engine has no move.
pub fn parse_bestmove(line: &str) -> Option<BestMove> {
    let rest = line.trim_end().strip_prefix("bestmove")?;
    if !rest.is_empty() && !rest.starts_with(char::is_whitespace) {
        return None;
    }

    let mut tokens = rest.split_whitespace();
    let mv = match tokens.next() {
        None | Some("(none)") | Some("0000") => return Some(BestMove::NoMove),
        Some(token) => match parse_uci_move(token) {
            Ok(mv) => mv,
            Err(e) => {
                tracing::debug!("Treating unparsable bestmove as no move: {}", e);
                return Some(BestMove::NoMove);
            }
        },
    };

    let ponder = match (tokens.next(), tokens.next()) {
        (Some("ponder"), Some(token)) => parse_uci_move(token).ok(),
        _ => None,
    };

    Some(BestMove::Move { mv, ponder })
}

/// Parse the evaluation out of an `info` line.
///
/// UCI scores are relative to the side to move; they are negated when Black is
/// to move so the result is always from White's point of view. Lines without a
/// `score` (currmove updates, `info string`, ...) yield `None`.
pub fn parse_info(line: &str, black_to_move: bool) -> Option<InfoScore> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.first() != Some(&"info") {
        return None;
    }

    let info = parse_info_line(&tokens[1..]);
    let score = info.score?;

    // Map to centipawns before flipping: `mate 0` has no sign of its own
    let mut score_cp = score.centipawns();
    let mut mate_distance = match score {
        Score::Mate(n) => n,
        Score::Centipawns(_) => 0,
    };
    if black_to_move {
        score_cp = -score_cp;
        mate_distance = mate_distance.saturating_neg();
    }

    Some(InfoScore {
        depth: info.depth.unwrap_or(0),
        multipv: info.multipv.unwrap_or(1),
        score_cp,
        is_mate: score.is_mate(),
        mate_distance,
        pv_first_move: info.pv.first().map(format_uci_move),
    })
}

/// Parse an "info" line from the engine
fn parse_info_line(tokens: &[&str]) -> EngineInfo {
    let mut info = EngineInfo::default();
    let mut i = 0;

    while i < tokens.len() {
        match tokens[i] {
            "depth" => {
                i += 1;
                info.depth = tokens.get(i).and_then(|s| s.parse().ok());
            }
            "seldepth" => {
                i += 1;
                info.seldepth = tokens.get(i).and_then(|s| s.parse().ok());
            }
            "time" => {
                i += 1;
                info.time_ms = tokens.get(i).and_then(|s| s.parse().ok());
            }
            "nodes" => {
                i += 1;
                info.nodes = tokens.get(i).and_then(|s| s.parse().ok());
            }
            "nps" => {
                i += 1;
                info.nps = tokens.get(i).and_then(|s| s.parse().ok());
            }
            "score" => {
                i += 1;
                if let Some(&score_type) = tokens.get(i) {
                    i += 1;
                    if let Some(value_str) = tokens.get(i) {
                        info.score = match score_type {
                            "cp" => value_str.parse().ok().map(Score::Centipawns),
                            "mate" => value_str.parse().ok().map(Score::Mate),
                            _ => None,
                        };
                    }
                }
            }
            "pv" => {
                // Collect all moves until next keyword
                i += 1;
                while i < tokens.len() && !is_keyword(tokens[i]) {
                    if let Ok(mv) = parse_uci_move(tokens[i]) {
                        info.pv.push(mv);
                    }
                    i += 1;
                }
                continue; // Don't increment i again
            }
            "multipv" => {
                i += 1;
                info.multipv = tokens.get(i).and_then(|s| s.parse().ok());
            }
            "currmove" => {
                i += 1;
                info.currmove = tokens.get(i).and_then(|s| parse_uci_move(s).ok());
            }
            "hashfull" => {
                i += 1;
                info.hashfull = tokens.get(i).and_then(|s| s.parse().ok());
            }
            "string" => break, // Free text runs to end of line
            _ => {
                // Unknown keyword, skip
            }
        }
        i += 1;
    }

    info
}

fn is_keyword(token: &str) -> bool {
    matches!(
        token,
        "depth"
            | "seldepth"
            | "time"
            | "nodes"
            | "score"
            | "pv"
            | "multipv"
            | "currmove"
            | "currmovenumber"
            | "hashfull"
            | "nps"
            | "tbhits"
            | "cpuload"
            | "string"
    )
}

/// `position fen <fen>`
pub fn format_position(fen: &str) -> String {
    format!("position fen {}", fen)
}

/// `go depth N`, `go movetime N` or `go infinite`
pub fn format_go(limit: &SearchLimit) -> String {
    match limit {
        SearchLimit::Depth(depth) => format!("go depth {}", depth),
        SearchLimit::MoveTime(ms) => format!("go movetime {}", ms),
        SearchLimit::Infinite => "go infinite".to_string(),
    }
}

/// `setoption name <name> [value <value>]`
pub fn format_set_option(name: &str, value: Option<&str>) -> String {
    match value {
        Some(value) => format!("setoption name {} value {}", name, value),
        None => format!("setoption name {}", name),
    }
}

/// Parse UCI move format (e2e4, e7e8q)
pub fn parse_uci_move(s: &str) -> Result<Move, crate::UciError> {
    if s.len() < 4 || s.len() > 5 || !s.is_ascii() {
        return Err(crate::UciError::InvalidMove(s.to_string()));
    }

    let from = parse_square(&s[0..2])?;
    let to = parse_square(&s[2..4])?;

    let promotion = if s.len() == 5 {
        Some(match &s[4..5] {
            "q" => Piece::Queen,
            "r" => Piece::Rook,
            "b" => Piece::Bishop,
            "n" => Piece::Knight,
            _ => return Err(crate::UciError::InvalidPromotion(s.to_string())),
        })
    } else {
        None
    };

    Ok(Move {
        from,
        to,
        promotion,
    })
}

fn parse_square(s: &str) -> Result<Square, crate::UciError> {
    let mut chars = s.chars();
    let (Some(file), Some(rank), None) = (chars.next(), chars.next(), chars.next()) else {
        return Err(crate::UciError::InvalidSquare(s.to_string()));
    };

    let file = match file {
        'a' => File::A,
        'b' => File::B,
        'c' => File::C,
        'd' => File::D,
        'e' => File::E,
        'f' => File::F,
        'g' => File::G,
        'h' => File::H,
        _ => return Err(crate::UciError::InvalidSquare(s.to_string())),
    };

    let rank = match rank {
        '1' => Rank::First,
        '2' => Rank::Second,
        '3' => Rank::Third,
        '4' => Rank::Fourth,
        '5' => Rank::Fifth,
        '6' => Rank::Sixth,
        '7' => Rank::Seventh,
        '8' => Rank::Eighth,
        _ => return Err(crate::UciError::InvalidSquare(s.to_string())),
    };

    Ok(Square::new(file, rank))
}

/// Format move for UCI (cozy-chess Move → "e2e4")
pub fn format_uci_move(mv: &Move) -> String {
    let mut s = format!("{}{}", format_square(mv.from), format_square(mv.to));
    if let Some(promo) = mv.promotion {
        s.push(match promo {
            Piece::Queen => 'q',
            Piece::Rook => 'r',
            Piece::Bishop => 'b',
            Piece::Knight => 'n',
            Piece::Pawn | Piece::King => '?',
        });
    }
    s
}

fn format_square(sq: Square) -> String {
    let file = match sq.file() {
        File::A => 'a',
        File::B => 'b',
        File::C => 'c',
        File::D => 'd',
        File::E => 'e',
        File::F => 'f',
        File::G => 'g',
        File::H => 'h',
    };
    let rank = match sq.rank() {
        Rank::First => '1',
        Rank::Second => '2',
        Rank::Third => '3',
        Rank::Fourth => '4',
        Rank::Fifth => '5',
        Rank::Sixth => '6',
        Rank::Seventh => '7',
        Rank::Eighth => '8',
    };
    format!("{}{}", file, rank)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MATE_SCORE;
    use proptest::prelude::*;

    #[test]
    fn test_parse_bestmove() {
        let msg = parse_uci_message("bestmove e2e4 ponder e7e5").unwrap();
        match msg {
            UciMessage::BestMove(BestMove::Move { mv, ponder }) => {
                assert_eq!(format_uci_move(&mv), "e2e4");
                assert_eq!(format_uci_move(&ponder.unwrap()), "e7e5");
            }
            _ => panic!("Wrong message type"),
        }
    }

    #[test]
    fn test_parse_info() {
        let msg = parse_uci_message("info depth 12 score cp 35 nodes 15234 pv e2e4 e7e5").unwrap();
        match msg {
            UciMessage::Info(info) => {
                assert_eq!(info.depth, Some(12));
                assert!(matches!(info.score, Some(Score::Centipawns(35))));
                assert_eq!(info.nodes, Some(15234));
                assert_eq!(info.pv.len(), 2);
            }
            _ => panic!("Wrong message type"),
        }
    }

    #[test]
    fn test_bestmove_without_promotion() {
        let best = parse_bestmove("bestmove e2e4").unwrap();
        let mv = best.as_move().unwrap();
        assert_eq!(format_uci_move(&mv), "e2e4");
        assert_eq!(mv.promotion, None);
    }

    #[test]
    fn test_bestmove_with_promotion() {
        let best = parse_bestmove("bestmove a7a8n").unwrap();
        assert_eq!(best.as_move().unwrap().promotion, Some(Piece::Knight));
    }

    #[test]
    fn test_bestmove_no_move_variants() {
        assert_eq!(parse_bestmove("bestmove (none)"), Some(BestMove::NoMove));
        assert_eq!(parse_bestmove("bestmove 0000"), Some(BestMove::NoMove));
        assert_eq!(parse_bestmove("bestmove"), Some(BestMove::NoMove));
        assert_eq!(parse_bestmove("bestmove e2e"), Some(BestMove::NoMove));
        assert_eq!(parse_bestmove("bestmove z9z9"), Some(BestMove::NoMove));
    }

    #[test]
    fn test_non_bestmove_lines_keep_waiting() {
        assert_eq!(parse_bestmove("info depth 3 score cp 10"), None);
        assert_eq!(parse_bestmove("readyok"), None);
        assert_eq!(parse_bestmove("bestmoves e2e4"), None);
        assert_eq!(parse_bestmove(""), None);
    }

    #[test]
    fn test_info_mate_white_to_move() {
        let info = parse_info("info depth 5 score mate 3 pv h5f7", false).unwrap();
        assert!(info.is_mate);
        assert_eq!(info.mate_distance, 3);
        assert_eq!(info.score_cp, MATE_SCORE);
        assert_eq!(info.depth, 5);
        assert_eq!(info.pv_first_move.as_deref(), Some("h5f7"));
    }

    #[test]
    fn test_info_mate_black_to_move_is_negated() {
        let info = parse_info("info depth 5 score mate 3 pv d8h4", true).unwrap();
        assert!(info.is_mate);
        assert_eq!(info.mate_distance, -3);
        assert_eq!(info.score_cp, -MATE_SCORE);
    }

    #[test]
    fn test_info_black_to_move_negates_cp() {
        let info = parse_info("info depth 10 score cp 42 pv e7e5", true).unwrap();
        assert_eq!(info.score_cp, -42);
        assert!(!info.is_mate);
        assert_eq!(info.mate_distance, 0);
    }

    #[test]
    fn test_info_mated_side_to_move() {
        let white = parse_info("info depth 0 score mate 0", false).unwrap();
        let black = parse_info("info depth 0 score mate 0", true).unwrap();
        assert!(white.is_mate && black.is_mate);
        assert_eq!(white.score_cp, -MATE_SCORE);
        assert_eq!(black.score_cp, MATE_SCORE);
    }

    #[test]
    fn test_info_out_of_range_cp_is_clamped() {
        let info = parse_info("info depth 3 score cp -2147483648 pv e2e4", true).unwrap();
        assert_eq!(info.score_cp, MATE_SCORE);
        let info = parse_info("info depth 3 score mate -2147483648", true).unwrap();
        assert_eq!(info.mate_distance, i32::MAX);
        assert_eq!(info.score_cp, MATE_SCORE);
    }

    #[test]
    fn test_info_bounds_and_multipv() {
        let info = parse_info(
            "info depth 18 seldepth 24 multipv 2 score cp -17 upperbound nodes 1 pv g1f3 d7d5",
            false,
        )
        .unwrap();
        assert_eq!(info.multipv, 2);
        assert_eq!(info.score_cp, -17);
        assert_eq!(info.pv_first_move.as_deref(), Some("g1f3"));
    }

    #[test]
    fn test_info_without_score_is_ignored() {
        assert_eq!(parse_info("info depth 7 currmove e2e4 currmovenumber 1", false), None);
        assert_eq!(parse_info("info string NNUE evaluation enabled", false), None);
        assert_eq!(parse_info("bestmove e2e4", false), None);
        assert_eq!(parse_info("info score cp", false), None);
    }

    #[test]
    fn test_format_go() {
        assert_eq!(format_go(&SearchLimit::Depth(12)), "go depth 12");
        assert_eq!(format_go(&SearchLimit::MoveTime(250)), "go movetime 250");
        assert_eq!(format_go(&SearchLimit::Infinite), "go infinite");
    }

    #[test]
    fn test_format_position_and_option() {
        assert_eq!(
            format_position("8/8/8/8/8/8/8/K6k b - - 0 1"),
            "position fen 8/8/8/8/8/8/8/K6k b - - 0 1"
        );
        assert_eq!(
            format_set_option("EvalFile", Some("/nets/nn.nnue")),
            "setoption name EvalFile value /nets/nn.nnue"
        );
        assert_eq!(format_set_option("Clear Hash", None), "setoption name Clear Hash");
    }

    #[test]
    fn test_parse_uci_move_rejects_garbage() {
        assert!(parse_uci_move("e2").is_err());
        assert!(parse_uci_move("e2e4qq").is_err());
        assert!(parse_uci_move("e7e8k").is_err());
        assert!(parse_uci_move("é2e4").is_err());
    }

    proptest! {
        #[test]
        fn prop_black_to_move_negates_cp(cp in -5000i32..5000) {
            let line = format!("info depth 9 score cp {} pv e2e4", cp);
            let white = parse_info(&line, false).unwrap();
            let black = parse_info(&line, true).unwrap();
            prop_assert_eq!(white.score_cp, cp);
            prop_assert_eq!(black.score_cp, -cp);
        }

        #[test]
        fn prop_any_cp_flips_without_overflow(cp in any::<i32>()) {
            let line = format!("info depth 9 score cp {} pv e2e4", cp);
            let white = parse_info(&line, false).unwrap();
            let black = parse_info(&line, true).unwrap();
            prop_assert_eq!(white.score_cp, -black.score_cp);
            prop_assert!(white.score_cp.abs() <= MATE_SCORE);
        }

        #[test]
        fn prop_mate_score_flips_with_side_to_move(n in -60i32..60) {
            let line = format!("info depth 20 score mate {}", n);
            let white = parse_info(&line, false).unwrap();
            let black = parse_info(&line, true).unwrap();
            prop_assert_eq!(white.score_cp, -black.score_cp);
            prop_assert_eq!(white.score_cp.abs(), MATE_SCORE);
        }

        #[test]
        fn prop_mate_sign_follows_side_to_move(n in 1i32..60) {
            let line = format!("info depth 20 score mate {} pv e2e4", n);
            let white = parse_info(&line, false).unwrap();
            let black = parse_info(&line, true).unwrap();
            prop_assert_eq!(white.mate_distance, n);
            prop_assert_eq!(black.mate_distance, -n);
            prop_assert_eq!(white.score_cp, -black.score_cp);
        }
    }
}
