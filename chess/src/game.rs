use crate::types::{GameMode, PlayerSide};
use crate::uci::{convert_cozy_castling_to_uci, convert_uci_castling_to_cozy};
use cozy_chess::{Board, Color, GameStatus, Move, Piece};

/// Main game state wrapper around cozy-chess Board
#[derive(Debug, Clone)]
pub struct Game {
    position: Board,
    history: Vec<HistoryEntry>,
    mode: GameMode,
}

/// One played move
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub mv: Move,
    /// Standard UCI notation (castling as king two squares)
    pub uci: String,
    pub mover: PlayerSide,
    /// FEN after this move
    pub fen: String,
}

impl Game {
    /// Create a new game from the standard starting position
    pub fn new() -> Self {
        Self {
            position: Board::default(),
            history: Vec::new(),
            mode: GameMode::default(),
        }
    }

    /// Create a game from a FEN string
    pub fn from_fen(fen: &str) -> Result<Self, GameError> {
        let position = crate::fen::parse_fen(fen)?;
        Ok(Self {
            position,
            history: Vec::new(),
            mode: GameMode::default(),
        })
    }

    pub fn with_mode(mut self, mode: GameMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn mode(&self) -> GameMode {
        self.mode
    }

    /// Get the move history
    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    /// Make a move given in cozy-chess notation
    pub fn make_move(&mut self, mv: Move) -> Result<&HistoryEntry, GameError> {
        if !self.legal_moves().contains(&mv) {
            return Err(GameError::IllegalMove(mv.to_string()));
        }

        let mover = PlayerSide::from(self.position.side_to_move());
        let is_castling = self.position.piece_on(mv.from) == Some(Piece::King)
            && self.position.color_on(mv.to) == Some(self.position.side_to_move());
        let uci = convert_cozy_castling_to_uci(mv, is_castling).to_string();

        self.position.play_unchecked(mv);
        let fen = self.to_fen();

        self.history.push(HistoryEntry {
            mv,
            uci,
            mover,
            fen,
        });
        // Just pushed
        Ok(&self.history[self.history.len() - 1])
    }

    /// Parse and play a move in UCI notation (`e2e4`, `e7e8q`, `e1g1`).
    pub fn apply_uci_move(&mut self, uci: &str) -> Result<&HistoryEntry, GameError> {
        let parsed: Move = uci
            .trim()
            .parse()
            .map_err(|_| GameError::InvalidNotation(uci.to_string()))?;
        let mv = convert_uci_castling_to_cozy(parsed, &self.legal_moves());
        self.make_move(mv)
    }

    /// Get all legal moves for the current position
    pub fn legal_moves(&self) -> Vec<Move> {
        let mut moves = Vec::new();
        self.position.generate_moves(|mvs| {
            moves.extend(mvs);
            false
        });
        moves
    }

    /// Get the current game status
    pub fn status(&self) -> GameStatus {
        self.position.status()
    }

    pub fn is_game_over(&self) -> bool {
        self.status() != GameStatus::Ongoing
    }

    /// Get the side to move
    pub fn side_to_move(&self) -> Color {
        self.position.side_to_move()
    }

    /// True when the engine is due to move in the current mode.
    pub fn is_computer_turn(&self) -> bool {
        !self.is_game_over() && self.mode.is_engine(self.side_to_move().into())
    }

    /// Full-move number from the FEN counter.
    pub fn move_number(&self) -> u16 {
        self.position.fullmove_number()
    }

    /// Export position to FEN string
    pub fn to_fen(&self) -> String {
        crate::fen::format_fen(&self.position)
    }
}

impl Default for Game {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GameError {
    #[error("Illegal move: {0}")]
    IllegalMove(String),
    #[error("Not a UCI move: {0}")]
    InvalidNotation(String),
    #[error("FEN parse error: {0}")]
    FenError(#[from] crate::fen::FenError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_uci_move_updates_fen() {
        let mut game = Game::new();
        let entry = game.apply_uci_move("e2e4").unwrap();
        assert_eq!(entry.uci, "e2e4");
        assert_eq!(entry.mover, PlayerSide::White);
        assert_eq!(
            game.to_fen(),
            "rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 0 1"
        );
        assert_eq!(game.side_to_move(), Color::Black);
    }

    #[test]
    fn test_apply_uci_castling() {
        let mut game = Game::from_fen("r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1").unwrap();
        let entry = game.apply_uci_move("e1g1").unwrap();
        assert_eq!(entry.uci, "e1g1");
        assert_eq!(game.to_fen(), "r3k2r/8/8/8/8/8/8/R4RK1 b kq - 1 1");
    }

    #[test]
    fn test_illegal_and_garbage_moves_rejected() {
        let mut game = Game::new();
        assert!(matches!(
            game.apply_uci_move("e2e5"),
            Err(GameError::IllegalMove(_))
        ));
        assert!(matches!(
            game.apply_uci_move("zz"),
            Err(GameError::InvalidNotation(_))
        ));
        assert_eq!(game.to_fen(), crate::START_FEN);
    }

    #[test]
    fn test_checkmate_detected() {
        let mut game = Game::new();
        for mv in ["f2f3", "e7e5", "g2g4", "d8h4"] {
            game.apply_uci_move(mv).unwrap();
        }
        assert!(game.is_game_over());
        assert_eq!(game.status(), GameStatus::Won);
        assert!(!game.is_computer_turn());
    }

    #[test]
    fn test_computer_turn_follows_mode() {
        let game = Game::new().with_mode(GameMode::HumanVsEngine {
            human_side: PlayerSide::Black,
        });
        assert!(game.is_computer_turn());

        let game = Game::new();
        assert!(!game.is_computer_turn());
        assert_eq!(game.move_number(), 1);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Replaying the recorded UCI strings reaches the same positions,
        /// castling included.
        #[test]
        fn uci_history_replays(choices in proptest::collection::vec(any::<prop::sample::Index>(), 1..40)) {
            let mut game = Game::new();
            for choice in &choices {
                let moves = game.legal_moves();
                if moves.is_empty() {
                    break;
                }
                game.make_move(moves[choice.index(moves.len())]).unwrap();
            }

            let mut replay = Game::new();
            for entry in game.history() {
                let replayed = replay.apply_uci_move(&entry.uci).unwrap();
                prop_assert_eq!(&replayed.fen, &entry.fen);
            }
            prop_assert_eq!(replay.to_fen(), game.to_fen());
        }
    }
}
