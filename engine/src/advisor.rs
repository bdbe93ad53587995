//! Training signals derived from consecutive evaluations.
//!
//! The engine reports winrate for whichever color it was asked to analyze;
//! the tracker normalizes every sample to one reference color (the learner)
//! and compares neighbors in the history. The first sample of a game is a
//! calibration baseline and never produces a signal.

use goban::Color;

/// Winrate drop, for the reference color, above which the move just played
/// counts as a blunder.
pub const BLUNDER_THRESHOLD: f64 = 0.07;
/// Winrate gain above which the move counts as a strong one.
pub const STRONG_THRESHOLD: f64 = 0.02;

/// One normalized history sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EvalPoint {
    /// 1-based index of the evaluated move in the game.
    pub move_number: usize,
    /// Winrate for the reference color.
    pub winrate: f64,
    pub score_lead: Option<f64>,
}

/// Signal for the move that produced the newest evaluation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MoveSignal {
    Blunder {
        move_index: usize,
        /// Winrate lost, in [0, 1].
        magnitude: f64,
        /// Points lost according to the score estimate, when both samples
        /// carried one.
        score_loss: Option<f64>,
    },
    Strong {
        move_index: usize,
        magnitude: f64,
    },
}

/// Append-only evaluation history with per-sample classification.
#[derive(Debug, Clone)]
pub struct EvalTracker {
    reference: Color,
    blunder_threshold: f64,
    strong_threshold: f64,
    history: Vec<EvalPoint>,
}

impl EvalTracker {
    pub fn new(reference: Color) -> Self {
        Self::with_thresholds(reference, BLUNDER_THRESHOLD, STRONG_THRESHOLD)
    }

    pub fn with_thresholds(reference: Color, blunder: f64, strong: f64) -> Self {
        Self {
            reference,
            blunder_threshold: blunder,
            strong_threshold: strong,
            history: Vec::new(),
        }
    }

    pub fn reference(&self) -> Color {
        self.reference
    }

    pub fn history(&self) -> &[EvalPoint] {
        &self.history
    }

    pub fn latest(&self) -> Option<EvalPoint> {
        self.history.last().copied()
    }

    /// Start a fresh game; the next sample becomes the new baseline.
    pub fn reset(&mut self) {
        self.history.clear();
    }

    /// Drop the newest sample, e.g. after an undo.
    pub fn pop(&mut self) {
        self.history.pop();
    }

    /// Record one evaluation analyzed from `analyzed`'s perspective and
    /// classify the move that led to it.
    pub fn record(
        &mut self,
        analyzed: Color,
        winrate: f64,
        score_lead: Option<f64>,
    ) -> Option<MoveSignal> {
        let winrate = if analyzed == self.reference {
            winrate
        } else {
            1.0 - winrate
        };
        let score_lead = score_lead.map(|s| if analyzed == self.reference { s } else { -s });

        let previous = self.history.last().copied();
        let point = EvalPoint {
            move_number: self.history.len() + 1,
            winrate,
            score_lead,
        };
        self.history.push(point);

        let previous = previous?;
        let drop = previous.winrate - winrate;

        if drop > self.blunder_threshold {
            let score_loss = match (previous.score_lead, score_lead) {
                (Some(before), Some(after)) => Some(before - after),
                _ => None,
            };
            Some(MoveSignal::Blunder {
                move_index: point.move_number,
                magnitude: drop,
                score_loss,
            })
        } else if drop < -self.strong_threshold {
            Some(MoveSignal::Strong {
                move_index: point.move_number,
                magnitude: -drop,
            })
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-9, "{a} != {b}");
    }

    #[test]
    fn test_first_sample_is_calibration_only() {
        let mut tracker = EvalTracker::new(Color::Black);
        // A terrible first reading must not classify anything.
        assert_eq!(tracker.record(Color::Black, 0.05, None), None);
        assert_eq!(tracker.history().len(), 1);
    }

    #[test]
    fn test_blunder_monotonicity() {
        let mut tracker = EvalTracker::new(Color::Black);
        assert_eq!(tracker.record(Color::Black, 0.50, None), None);
        // A gain is not a blunder (and 0.05 exceeds the strong threshold).
        assert!(matches!(
            tracker.record(Color::Black, 0.55, None),
            Some(MoveSignal::Strong { .. })
        ));
        // The 0.15 drop exceeds the 0.07 threshold.
        match tracker.record(Color::Black, 0.40, None) {
            Some(MoveSignal::Blunder {
                move_index,
                magnitude,
                ..
            }) => {
                assert_eq!(move_index, 3);
                assert_close(magnitude, 0.15);
            }
            other => panic!("expected blunder, got {other:?}"),
        }
    }

    #[test]
    fn test_drop_at_threshold_is_not_a_blunder() {
        let mut tracker = EvalTracker::with_thresholds(Color::Black, 0.07, 0.02);
        tracker.record(Color::Black, 0.50, None);
        assert_eq!(tracker.record(Color::Black, 0.43, None), None);
    }

    #[test]
    fn test_opposite_perspective_is_flipped() {
        let mut tracker = EvalTracker::new(Color::Black);
        // Engine analyzes for White; 0.40 for White is 0.60 for Black.
        tracker.record(Color::White, 0.40, Some(-2.0));
        assert_close(tracker.latest().unwrap().winrate, 0.60);
        assert_close(tracker.latest().unwrap().score_lead.unwrap(), 2.0);

        // White's winrate jumps to 0.55: Black dropped 0.15.
        match tracker.record(Color::White, 0.55, Some(1.5)) {
            Some(MoveSignal::Blunder {
                magnitude,
                score_loss,
                ..
            }) => {
                assert_close(magnitude, 0.15);
                assert_close(score_loss.unwrap(), 3.5);
            }
            other => panic!("expected blunder, got {other:?}"),
        }
    }

    #[test]
    fn test_reset_restarts_calibration() {
        let mut tracker = EvalTracker::new(Color::Black);
        tracker.record(Color::Black, 0.50, None);
        tracker.record(Color::Black, 0.52, None);
        tracker.reset();
        assert_eq!(tracker.record(Color::Black, 0.10, None), None);
    }

    #[test]
    fn test_pop_after_undo() {
        let mut tracker = EvalTracker::new(Color::Black);
        tracker.record(Color::Black, 0.50, None);
        tracker.record(Color::Black, 0.30, None);
        tracker.pop();
        assert_close(tracker.latest().unwrap().winrate, 0.50);
        // Re-recording compares against the restored baseline.
        assert_eq!(tracker.record(Color::Black, 0.49, None), None);
    }
}
