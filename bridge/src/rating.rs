//! Move quality from the evaluation before and after a move.

use crate::snapshot::EvalSnapshot;
use serde::Serialize;
use std::fmt;

/// Scores are clamped to this before comparing so mate scores don't dominate.
const RATING_CLAMP_CP: i32 = 2000;

const BEST_MAX_PENALTY: i32 = 15;
const GOOD_MAX_PENALTY: i32 = 60;
const MISTAKE_MAX_PENALTY: i32 = 180;

/// Ordered from best to worst.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum RatingLabel {
    Best,
    Good,
    Mistake,
    Blunder,
}

impl RatingLabel {
    pub fn for_penalty(penalty_cp: i32) -> Self {
        match penalty_cp {
            p if p <= BEST_MAX_PENALTY => Self::Best,
            p if p <= GOOD_MAX_PENALTY => Self::Good,
            p if p <= MISTAKE_MAX_PENALTY => Self::Mistake,
            _ => Self::Blunder,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Best => "Best",
            Self::Good => "Good",
            Self::Mistake => "Mistake",
            Self::Blunder => "Blunder",
        }
    }

    fn is_error(self) -> bool {
        matches!(self, Self::Mistake | Self::Blunder)
    }
}

impl fmt::Display for RatingLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MoveRating {
    pub label: RatingLabel,
    /// Centipawns lost from the mover's point of view.
    pub penalty_cp: i32,
    /// The move let the opponent force mate.
    pub allowed_mate: bool,
    /// The mover had a forced mate and let it go.
    pub missed_mate: bool,
}

impl MoveRating {
    pub fn reason(&self) -> Option<&'static str> {
        if !self.label.is_error() {
            None
        } else if self.allowed_mate {
            Some("Allowed mate threat")
        } else if self.missed_mate {
            Some("Missed forced mate")
        } else {
            None
        }
    }
}

impl fmt::Display for MoveRating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.reason() {
            Some(reason) => write!(f, "{} ({})", self.label, reason),
            None => write!(f, "{}", self.label),
        }
    }
}

/// True when White made the move that leads away from `before_fen`.
pub fn white_moved(before_fen: &str) -> bool {
    before_fen.contains(" w ")
}

/// Re-express a White-relative score from the mover's side.
pub fn mover_relative(white_moved: bool, score_cp: i32) -> i32 {
    if white_moved {
        score_cp
    } else {
        -score_cp
    }
}

/// Rate the move that turned `before` into `after`.
///
/// `played` is the move in UCI notation, when known; playing the engine's own
/// first choice is always "Best" unless it walks into a forced mate. Giving up
/// a forced mate is at least a "Mistake".
pub fn rate_move(before: &EvalSnapshot, after: &EvalSnapshot, played: Option<&str>) -> MoveRating {
    let white_moved = white_moved(&before.fen);

    let clamp = |cp: i32| cp.clamp(-RATING_CLAMP_CP, RATING_CLAMP_CP);
    let before_mover = mover_relative(white_moved, clamp(before.score_cp));
    let after_mover = mover_relative(white_moved, clamp(after.score_cp));
    let penalty_cp = (before_mover - after_mover).max(0);

    let allowed_mate = after.is_mate && after_mover < 0;
    let had_mate = before.is_mate && before_mover > 0;
    let missed_mate = had_mate && !(after.is_mate && after_mover > 0);

    let played_best = match (played, before.best_move.as_deref()) {
        (Some(played), Some(best)) => played.eq_ignore_ascii_case(best),
        _ => false,
    };

    let label = if missed_mate {
        RatingLabel::for_penalty(penalty_cp).max(RatingLabel::Mistake)
    } else if played_best && !allowed_mate {
        RatingLabel::Best
    } else {
        RatingLabel::for_penalty(penalty_cp)
    };

    MoveRating {
        label,
        penalty_cp,
        allowed_mate,
        missed_mate,
    }
}
