use chess::{Game, GameError, GameMode};

/// The game the bridge works against.
///
/// The bridge never checks chess rules itself: it reads the FEN, plays moves
/// the engine already considers legal, and asks whose turn it is.
pub trait GamePosition {
    fn fen(&self) -> String;

    fn apply_uci_move(&mut self, uci: &str) -> Result<(), GameError>;

    fn mode(&self) -> GameMode;

    fn is_game_over(&self) -> bool;

    fn move_number(&self) -> u16;

    fn is_computer_turn(&self) -> bool;
}

impl GamePosition for Game {
    fn fen(&self) -> String {
        self.to_fen()
    }

    fn apply_uci_move(&mut self, uci: &str) -> Result<(), GameError> {
        Game::apply_uci_move(self, uci).map(|_| ())
    }

    fn mode(&self) -> GameMode {
        Game::mode(self)
    }

    fn is_game_over(&self) -> bool {
        Game::is_game_over(self)
    }

    fn move_number(&self) -> u16 {
        Game::move_number(self)
    }

    fn is_computer_turn(&self) -> bool {
        Game::is_computer_turn(self)
    }
}
