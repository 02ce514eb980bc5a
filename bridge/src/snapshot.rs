use crate::rating::MoveRating;
use crate::wdl::Wdl;
use engine::InfoScore;
use serde::Serialize;

/// One evaluation of one position, always from White's point of view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EvalSnapshot {
    pub fen: String,
    /// Centipawns; a mate is `±MATE_SCORE` with the sign of the mating side.
    pub score_cp: i32,
    pub is_mate: bool,
    /// Positive when White mates.
    pub mate_distance: i32,
    pub best_move: Option<String>,
    pub depth: u32,
}

impl EvalSnapshot {
    pub fn from_info(fen: impl Into<String>, info: InfoScore) -> Self {
        Self {
            fen: fen.into(),
            score_cp: info.score_cp,
            is_mate: info.is_mate,
            mate_distance: info.mate_distance,
            best_move: info.pv_first_move,
            depth: info.depth,
        }
    }

    /// True when White is to move in the evaluated position.
    pub fn white_to_move(&self) -> bool {
        self.fen.contains(" w ")
    }
}

/// What the UI receives for every surfaced evaluation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvalUpdate {
    pub snapshot: EvalSnapshot,
    /// Mate announcement to show, White-relative. Held for a moment after the
    /// engine stops reporting it and hidden for distant mates.
    pub display_mate: Option<i32>,
    /// Win/draw/loss from the analysis side's point of view.
    pub wdl: Wdl,
    pub rating: Option<MoveRating>,
    pub move_number: u16,
}
