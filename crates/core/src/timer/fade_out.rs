use parking_lot::Mutex;

use crate::universe::GrandMaster;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FadeSequence {
    remaining_ms: i64,
    total_ms: i64,
    saved_grand_master: u8,
}

/// Result of advancing the fade-out countdown by one tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FadeProgress {
    /// No sequence in flight
    Idle,
    /// Grand master lowered, countdown still running
    Fading { remaining_ms: i64 },
    /// Countdown elapsed and the grand master is back at `saved_grand_master`;
    /// everything still running must be stopped
    Completed { saved_grand_master: u8 },
}

/// Drives the "fade everything out, then stop" sequence.
///
/// The state lock is a leaf: it is never held while another lock is taken.
#[derive(Debug, Default)]
pub struct FadeOutController {
    sequence: Mutex<Option<FadeSequence>>,
}

impl FadeOutController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start (or restart) a sequence lasting `timeout_ms`. The grand master is
    /// captured only when no sequence is already running, since a running one
    /// has already lowered it.
    pub fn begin(&self, timeout_ms: u32, grand_master: &GrandMaster) {
        let mut sequence = self.sequence.lock();
        let saved_grand_master = match *sequence {
            Some(running) => {
                log::debug!(
                    "Restarting fade-out sequence with {} ms ({} ms were left)",
                    timeout_ms,
                    running.remaining_ms
                );
                running.saved_grand_master
            }
            None => grand_master.value(),
        };

        *sequence = Some(FadeSequence {
            remaining_ms: timeout_ms as i64,
            total_ms: timeout_ms as i64,
            saved_grand_master,
        });
    }

    /// Abort a running sequence, returning the grand master value it saved
    pub fn cancel(&self) -> Option<u8> {
        self.sequence
            .lock()
            .take()
            .map(|sequence| sequence.saved_grand_master)
    }

    pub fn is_fading(&self) -> bool {
        self.sequence.lock().is_some()
    }

    /// Count down by one tick and lower the grand master linearly towards zero.
    ///
    /// On completion the grand master is restored before the state lock is
    /// released, so a `begin` racing with completion captures the restored level.
    pub fn advance(&self, tick_ms: u32, grand_master: &GrandMaster) -> FadeProgress {
        let mut guard = self.sequence.lock();
        let Some(sequence) = guard.as_mut() else {
            return FadeProgress::Idle;
        };

        sequence.remaining_ms -= tick_ms as i64;
        if sequence.remaining_ms <= 0 {
            let saved_grand_master = sequence.saved_grand_master;
            grand_master.set_value(saved_grand_master);
            *guard = None;
            return FadeProgress::Completed { saved_grand_master };
        }

        let level = sequence.saved_grand_master as i64 * sequence.remaining_ms / sequence.total_ms;
        grand_master.set_value(level.clamp(0, u8::MAX as i64) as u8);

        FadeProgress::Fading {
            remaining_ms: sequence.remaining_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_ramp_and_completion() {
        let controller = FadeOutController::new();
        let gm = GrandMaster::default();
        gm.set_value(200);

        controller.begin(100, &gm);
        assert!(controller.is_fading());

        assert_eq!(
            controller.advance(25, &gm),
            FadeProgress::Fading { remaining_ms: 75 }
        );
        assert_eq!(gm.value(), 150);
        controller.advance(25, &gm);
        assert_eq!(gm.value(), 100);
        controller.advance(25, &gm);
        assert_eq!(gm.value(), 50);

        assert_eq!(
            controller.advance(25, &gm),
            FadeProgress::Completed {
                saved_grand_master: 200
            }
        );
        assert_eq!(gm.value(), 200);
        assert!(!controller.is_fading());
        assert_eq!(controller.advance(25, &gm), FadeProgress::Idle);
    }

    #[test]
    fn test_begin_after_completion_captures_restored_level() {
        let controller = FadeOutController::new();
        let gm = GrandMaster::default();

        controller.begin(40, &gm);
        controller.advance(20, &gm);
        assert_eq!(gm.value(), 127);
        assert_eq!(
            controller.advance(20, &gm),
            FadeProgress::Completed {
                saved_grand_master: 255
            }
        );

        // A new request right after completion must not save the lowered level
        controller.begin(40, &gm);
        controller.advance(20, &gm);
        controller.advance(20, &gm);
        assert_eq!(gm.value(), 255);
    }

    #[test]
    fn test_restart_keeps_original_grand_master() {
        let controller = FadeOutController::new();
        let gm = GrandMaster::default();

        controller.begin(100, &gm);
        controller.advance(50, &gm);
        assert_eq!(gm.value(), 127);

        controller.begin(40, &gm);
        assert_eq!(
            controller.advance(20, &gm),
            FadeProgress::Fading { remaining_ms: 20 }
        );
        assert_eq!(gm.value(), 127);
        assert_eq!(
            controller.advance(20, &gm),
            FadeProgress::Completed {
                saved_grand_master: 255
            }
        );
    }

    #[test]
    fn test_cancel_returns_saved_value() {
        let controller = FadeOutController::new();
        let gm = GrandMaster::default();
        gm.set_value(180);

        assert_eq!(controller.cancel(), None);
        controller.begin(1000, &gm);
        controller.advance(500, &gm);
        assert_eq!(controller.cancel(), Some(180));
        assert!(!controller.is_fading());
    }
}
