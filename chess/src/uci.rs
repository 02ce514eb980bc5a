//! UCI (Universal Chess Interface) move notation

use cozy_chess::{File, Move, Rank, Square};

/// Convert UCI castling notation to cozy_chess notation
///
/// UCI uses standard notation (king moves 2 squares): e1g1, e1c1, e8g8, e8c8
/// cozy_chess uses king-to-rook notation: e1h1, e1a1, e8h8, e8a8
///
/// The converted move is only returned when it is among `legal_moves`, so a
/// king that really moves two squares (impossible in standard chess) or a
/// non-king piece on e1 is left alone.
pub fn convert_uci_castling_to_cozy(mv: Move, legal_moves: &[Move]) -> Move {
    let is_back_rank = matches!(mv.from.rank(), Rank::First | Rank::Eighth);
    let is_e_file = matches!(mv.from.file(), File::E);
    let same_rank = mv.from.rank() == mv.to.rank();

    if !(is_back_rank && is_e_file && same_rank) || mv.promotion.is_some() {
        return mv;
    }

    let rook_file = match mv.to.file() {
        File::G => File::H,
        File::C => File::A,
        _ => return mv,
    };

    let converted = Move {
        from: mv.from,
        to: Square::new(rook_file, mv.from.rank()),
        promotion: None,
    };

    if legal_moves.contains(&converted) {
        converted
    } else {
        mv
    }
}

/// Convert a cozy_chess king-takes-rook castling move back to UCI notation.
pub fn convert_cozy_castling_to_uci(mv: Move, is_castling: bool) -> Move {
    if !is_castling {
        return mv;
    }
    let king_file = match mv.to.file() {
        File::H => File::G,
        File::A => File::C,
        _ => return mv,
    };
    Move {
        from: mv.from,
        to: Square::new(king_file, mv.from.rank()),
        promotion: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cozy_chess::Board;

    fn legal_moves(board: &Board) -> Vec<Move> {
        let mut moves = Vec::new();
        board.generate_moves(|mvs| {
            moves.extend(mvs);
            false
        });
        moves
    }

    #[test]
    fn test_kingside_castle_converts() {
        let board: Board = "r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1".parse().unwrap();
        let moves = legal_moves(&board);
        let uci: Move = "e1g1".parse().unwrap();
        let converted = convert_uci_castling_to_cozy(uci, &moves);
        assert_eq!(converted.to_string(), "e1h1");
        assert_eq!(convert_cozy_castling_to_uci(converted, true), uci);
    }

    #[test]
    fn test_queenside_castle_converts_for_black() {
        let board: Board = "r3k2r/8/8/8/8/8/8/R3K2R b KQkq - 0 1".parse().unwrap();
        let moves = legal_moves(&board);
        let converted = convert_uci_castling_to_cozy("e8c8".parse().unwrap(), &moves);
        assert_eq!(converted.to_string(), "e8a8");
    }

    #[test]
    fn test_ordinary_move_untouched() {
        let board = Board::default();
        let moves = legal_moves(&board);
        let mv: Move = "e2e4".parse().unwrap();
        assert_eq!(convert_uci_castling_to_cozy(mv, &moves), mv);
    }
}
