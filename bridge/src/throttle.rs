//! Rate limiting for analysis updates and short-lived display holds.

use crate::snapshot::EvalSnapshot;
use std::time::{Duration, Instant};

/// Decides which analysis updates are worth showing.
///
/// An update goes through immediately when the mate status flips, the mate
/// distance changes, or the score moves by more than the urgent delta.
/// Anything else waits until the interval has passed since the last update
/// that went through.
#[derive(Debug, Clone)]
pub struct AnalysisThrottle {
    interval: Duration,
    urgent_delta: i32,
    last: Option<LastDispatch>,
}

#[derive(Debug, Clone, Copy)]
struct LastDispatch {
    at: Instant,
    score_cp: i32,
    is_mate: bool,
    mate_distance: i32,
}

impl AnalysisThrottle {
    pub fn new(interval: Duration, urgent_delta: i32) -> Self {
        Self {
            interval,
            urgent_delta,
            last: None,
        }
    }

    /// Record `snapshot` and report whether it should be forwarded.
    pub fn should_dispatch(&mut self, snapshot: &EvalSnapshot, now: Instant) -> bool {
        let forward = match self.last {
            None => true,
            Some(last) => {
                let urgent = snapshot.is_mate != last.is_mate
                    || (snapshot.is_mate && snapshot.mate_distance != last.mate_distance)
                    || snapshot.score_cp.saturating_sub(last.score_cp).saturating_abs() > self.urgent_delta;
                urgent || now.saturating_duration_since(last.at) >= self.interval
            }
        };

        if forward {
            self.last = Some(LastDispatch {
                at: now,
                score_cp: snapshot.score_cp,
                is_mate: snapshot.is_mate,
                mate_distance: snapshot.mate_distance,
            });
        }
        forward
    }
}

/// A value that stays visible for a fixed time after it was last set.
#[derive(Debug, Clone)]
pub struct Sticky<T> {
    hold: Duration,
    value: Option<(T, Instant)>,
}

impl<T> Sticky<T> {
    pub fn new(hold: Duration) -> Self {
        Self { hold, value: None }
    }

    pub fn set(&mut self, value: T, now: Instant) {
        self.value = Some((value, now + self.hold));
    }

    /// The held value, if it has not expired.
    pub fn get(&self, now: Instant) -> Option<&T> {
        match &self.value {
            Some((value, expiry)) if now < *expiry => Some(value),
            _ => None,
        }
    }

    pub fn clear(&mut self) {
        self.value = None;
    }

    pub fn set_hold(&mut self, hold: Duration) {
        self.hold = hold;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(score_cp: i32) -> EvalSnapshot {
        EvalSnapshot {
            fen: chess::START_FEN.to_string(),
            score_cp,
            is_mate: false,
            mate_distance: 0,
            best_move: None,
            depth: 10,
        }
    }

    fn mate(distance: i32) -> EvalSnapshot {
        EvalSnapshot {
            score_cp: if distance > 0 { 30_000 } else { -30_000 },
            is_mate: true,
            mate_distance: distance,
            ..snap(0)
        }
    }

    fn throttle() -> AnalysisThrottle {
        AnalysisThrottle::new(Duration::from_millis(200), 15)
    }

    #[test]
    fn test_first_update_always_dispatched() {
        assert!(throttle().should_dispatch(&snap(0), Instant::now()));
    }

    #[test]
    fn test_delta_of_16_is_urgent() {
        let mut t = throttle();
        let start = Instant::now();
        assert!(t.should_dispatch(&snap(20), start));
        assert!(t.should_dispatch(&snap(36), start + Duration::from_millis(1)));
        assert!(t.should_dispatch(&snap(20), start + Duration::from_millis(2)));
    }

    #[test]
    fn test_delta_of_15_waits_for_interval() {
        let mut t = throttle();
        let start = Instant::now();
        assert!(t.should_dispatch(&snap(20), start));
        assert!(!t.should_dispatch(&snap(35), start + Duration::from_millis(199)));
        assert!(!t.should_dispatch(&snap(5), start + Duration::from_millis(150)));
        assert!(t.should_dispatch(&snap(35), start + Duration::from_millis(200)));
    }

    #[test]
    fn test_suppressed_updates_do_not_move_the_baseline() {
        let mut t = throttle();
        let start = Instant::now();
        assert!(t.should_dispatch(&snap(0), start));
        assert!(!t.should_dispatch(&snap(10), start + Duration::from_millis(10)));
        // 16 away from the last forwarded score, 6 from the last seen one
        assert!(t.should_dispatch(&snap(16), start + Duration::from_millis(20)));
    }

    #[test]
    fn test_mate_transitions_are_urgent() {
        let mut t = throttle();
        let start = Instant::now();
        assert!(t.should_dispatch(&snap(500), start));
        assert!(t.should_dispatch(&mate(3), start + Duration::from_millis(1)));
        assert!(!t.should_dispatch(&mate(3), start + Duration::from_millis(2)));
        assert!(t.should_dispatch(&mate(2), start + Duration::from_millis(3)));
        assert!(t.should_dispatch(&snap(30_000), start + Duration::from_millis(4)));
    }

    #[test]
    fn test_extreme_score_jump_is_urgent() {
        let mut t = throttle();
        let start = Instant::now();
        assert!(t.should_dispatch(&snap(i32::MAX), start));
        assert!(t.should_dispatch(&snap(i32::MIN), start + Duration::from_millis(1)));
    }

    #[test]
    fn test_sticky_expires() {
        let mut sticky = Sticky::new(Duration::from_millis(1500));
        let start = Instant::now();
        assert_eq!(sticky.get(start), None);

        sticky.set(3, start);
        assert_eq!(sticky.get(start + Duration::from_millis(1499)), Some(&3));
        assert_eq!(sticky.get(start + Duration::from_millis(1500)), None);

        sticky.set(2, start);
        sticky.clear();
        assert_eq!(sticky.get(start), None);
    }
}
