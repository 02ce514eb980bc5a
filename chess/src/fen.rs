use cozy_chess::Board;

/// Parse a FEN string into a Board
pub fn parse_fen(fen: &str) -> Result<Board, FenError> {
    let fields = fen.split_whitespace().count();
    if fields == 0 {
        return Err(FenError::Empty);
    }
    if fields != 6 {
        return Err(FenError::FieldCount(fields));
    }

    fen.parse()
        .map_err(|_| FenError::InvalidPosition(fen.to_string()))
}

/// Format a Board as a FEN string
pub fn format_fen(board: &Board) -> String {
    board.to_string()
}

#[derive(Debug, thiserror::Error)]
pub enum FenError {
    #[error("Empty FEN")]
    Empty,
    #[error("FEN needs 6 fields, got {0}")]
    FieldCount(usize),
    #[error("Invalid FEN position: {0}")]
    InvalidPosition(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip_start_position() {
        let board = parse_fen(crate::START_FEN).unwrap();
        assert_eq!(format_fen(&board), crate::START_FEN);
    }

    #[test]
    fn test_rejects_truncated_fen() {
        assert!(matches!(parse_fen(""), Err(FenError::Empty)));
        assert!(matches!(
            parse_fen("8/8/8/8/8/8/8/K6k w"),
            Err(FenError::FieldCount(2))
        ));
    }

    #[test]
    fn test_rejects_impossible_position() {
        assert!(matches!(
            parse_fen("8/8/8/8/8/8/8/8 w - - 0 1"),
            Err(FenError::InvalidPosition(_))
        ));
    }
}
