//! Win/draw/loss estimate from an engine score.

use chess::PlayerSide;
use serde::Serialize;

/// Logistic steepness: 0 cp is 50%, 400 cp is about 83%.
const WIN_K: f64 = 0.004;
const DRAW_AT_EQUALITY: f64 = 0.30;
const DRAW_DECAY_CP: f64 = 400.0;
const CLAMP_CP: i32 = 2000;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Wdl {
    pub win: f64,
    pub draw: f64,
    pub loss: f64,
}

impl Wdl {
    /// Estimate for `side` from a White-relative score. `mate` is the
    /// White-relative mate distance when a mate is on the board. A distance
    /// of 0 (already mated) takes its direction from `score_cp`.
    pub fn estimate(side: PlayerSide, score_cp: i32, mate: Option<i32>) -> Self {
        if let Some(distance) = mate {
            let white_mates = if distance == 0 {
                score_cp > 0
            } else {
                distance > 0
            };
            let side_wins = match side {
                PlayerSide::White => white_mates,
                PlayerSide::Black => !white_mates,
            };
            return if side_wins {
                Self::certain_win()
            } else {
                Self::certain_loss()
            };
        }

        let cp = match side {
            PlayerSide::White => score_cp,
            PlayerSide::Black => score_cp.saturating_neg(),
        }
        .clamp(-CLAMP_CP, CLAMP_CP) as f64;

        let p_win = 1.0 / (1.0 + (-WIN_K * cp).exp());
        let draw = (DRAW_AT_EQUALITY * (-cp.abs() / DRAW_DECAY_CP).exp()).clamp(0.0, 1.0);
        let no_draw = 1.0 - draw;
        let win = (p_win * no_draw).clamp(0.0, 1.0);
        let loss = ((1.0 - p_win) * no_draw).clamp(0.0, 1.0);

        let total = win + draw + loss;
        if total <= 1e-9 {
            return Self {
                win: 0.5,
                draw: 0.0,
                loss: 0.5,
            };
        }
        Self {
            win: win / total,
            draw: draw / total,
            loss: loss / total,
        }
    }

    fn certain_win() -> Self {
        Self {
            win: 1.0,
            draw: 0.0,
            loss: 0.0,
        }
    }

    fn certain_loss() -> Self {
        Self {
            win: 0.0,
            draw: 0.0,
            loss: 1.0,
        }
    }
}
