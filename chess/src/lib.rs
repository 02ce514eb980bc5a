pub mod fen;
pub mod game;
pub mod types;
pub mod uci;

pub use fen::FenError;
pub use game::{Game, GameError, HistoryEntry};
pub use types::{GameMode, PlayerSide};
pub use uci::{convert_cozy_castling_to_uci, convert_uci_castling_to_cozy};

/// FEN of the standard starting position.
pub const START_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";
