pub mod parser;

pub use parser::{
    format_go, format_position, format_set_option, format_uci_move, parse_bestmove, parse_info,
    parse_uci_message, parse_uci_move, BestMove, InfoScore, UciMessage,
};

#[derive(Debug, thiserror::Error)]
pub enum UciError {
    #[error("Malformed UCI message: {0}")]
    MalformedMessage(String),
    #[error("Unknown UCI message: {0}")]
    UnknownMessage(String),
    #[error("Invalid move: {0}")]
    InvalidMove(String),
    #[error("Invalid square: {0}")]
    InvalidSquare(String),
    #[error("Invalid promotion: {0}")]
    InvalidPromotion(String),
}
