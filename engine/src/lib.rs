pub mod config;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod transport;
pub mod uci;

pub use config::{EngineConfig, NnueConfig, SearchParams};
pub use transport::{
    find_engine_path, is_uci_binary, EmbeddedEngine, EngineHandle, EngineInput, EngineIo,
    EngineKind, EngineOutput, RecvError, TransportError,
};
pub use uci::{
    format_go, format_position, format_set_option, parse_bestmove, parse_info, BestMove,
    InfoScore, UciError, UciMessage,
};

use cozy_chess::Move;
use std::fmt;

/// Centipawn value a forced mate is mapped to.
pub const MATE_SCORE: i32 = 30_000;

/// Commands sent to the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCommand {
    Uci,
    IsReady,
    SetPosition { fen: String },
    SetOption { name: String, value: Option<String> },
    Go(SearchLimit),
    Stop,
    Quit,
}

impl fmt::Display for EngineCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uci => f.write_str("uci"),
            Self::IsReady => f.write_str("isready"),
            Self::SetPosition { fen } => f.write_str(&format_position(fen)),
            Self::SetOption { name, value } => {
                f.write_str(&format_set_option(name, value.as_deref()))
            }
            Self::Go(limit) => f.write_str(&format_go(limit)),
            Self::Stop => f.write_str("stop"),
            Self::Quit => f.write_str("quit"),
        }
    }
}

/// How a `go` command bounds the search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchLimit {
    Depth(u32),
    MoveTime(u64), // Milliseconds
    Infinite,      // Search until "stop"
}

/// Engine analysis information
#[derive(Debug, Clone, Default)]
pub struct EngineInfo {
    pub depth: Option<u32>,
    pub seldepth: Option<u32>,
    pub time_ms: Option<u64>,
    pub nodes: Option<u64>,
    pub score: Option<Score>,
    pub pv: Vec<Move>, // Principal variation
    pub multipv: Option<u32>,
    pub currmove: Option<Move>,
    pub hashfull: Option<u16>,
    pub nps: Option<u64>,
}

/// Raw UCI score, relative to whoever the position says is to move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Score {
    Centipawns(i32),
    Mate(i32), // Negative for being mated
}

impl Score {
    /// Centipawn value for the side to move, with mates mapped to
    /// `±MATE_SCORE`. `mate 0` means the side to move is already mated.
    pub fn centipawns(self) -> i32 {
        match self {
            Self::Centipawns(cp) => cp.clamp(-MATE_SCORE, MATE_SCORE),
            Self::Mate(n) if n > 0 => MATE_SCORE,
            Self::Mate(_) => -MATE_SCORE,
        }
    }

    pub fn is_mate(self) -> bool {
        matches!(self, Self::Mate(_))
    }
}

/// True when the FEN's side-to-move field is black.
pub fn black_to_move(fen: &str) -> bool {
    fen.split_whitespace().nth(1) == Some("b")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_wire_format() {
        assert_eq!(EngineCommand::Uci.to_string(), "uci");
        assert_eq!(
            EngineCommand::SetPosition {
                fen: "8/8/8/8/8/8/8/K6k w - - 0 1".to_string()
            }
            .to_string(),
            "position fen 8/8/8/8/8/8/8/K6k w - - 0 1"
        );
        assert_eq!(
            EngineCommand::SetOption {
                name: "Skill Level".to_string(),
                value: Some("5".to_string())
            }
            .to_string(),
            "setoption name Skill Level value 5"
        );
        assert_eq!(
            EngineCommand::Go(SearchLimit::Infinite).to_string(),
            "go infinite"
        );
    }

    #[test]
    fn test_mate_maps_to_mate_score() {
        assert_eq!(Score::Mate(3).centipawns(), MATE_SCORE);
        assert_eq!(Score::Mate(-2).centipawns(), -MATE_SCORE);
        assert_eq!(Score::Centipawns(-41).centipawns(), -41);
        assert_eq!(Score::Mate(0).centipawns(), -MATE_SCORE);
        assert_eq!(Score::Centipawns(i32::MIN).centipawns(), -MATE_SCORE);
    }

    #[test]
    fn test_black_to_move() {
        assert!(black_to_move(
            "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 0 1"
        ));
        assert!(!black_to_move(
            "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1"
        ));
        assert!(!black_to_move(""));
    }
}
