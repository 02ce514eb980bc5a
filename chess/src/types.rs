//! Who plays which side.

/// One side of the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlayerSide {
    White,
    Black,
}

impl PlayerSide {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::White => "white",
            Self::Black => "black",
        }
    }
}

impl From<cozy_chess::Color> for PlayerSide {
    fn from(c: cozy_chess::Color) -> Self {
        match c {
            cozy_chess::Color::White => Self::White,
            cozy_chess::Color::Black => Self::Black,
        }
    }
}

impl From<PlayerSide> for cozy_chess::Color {
    fn from(side: PlayerSide) -> Self {
        match side {
            PlayerSide::White => Self::White,
            PlayerSide::Black => Self::Black,
        }
    }
}

impl std::fmt::Display for PlayerSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which sides are controlled by a human and which by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GameMode {
    #[default]
    HumanVsHuman,
    HumanVsEngine {
        human_side: PlayerSide,
    },
    EngineVsEngine,
}

impl GameMode {
    pub fn is_human(self, side: PlayerSide) -> bool {
        match self {
            Self::HumanVsHuman => true,
            Self::HumanVsEngine { human_side } => human_side == side,
            Self::EngineVsEngine => false,
        }
    }

    pub fn is_engine(self, side: PlayerSide) -> bool {
        !self.is_human(side)
    }
}
