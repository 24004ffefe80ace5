use std::hint;
use std::thread;

const SPIN_LIMIT: u32 = 6;
const YIELD_LIMIT: u32 = 10;

/// What [`Backoff::snooze`] did for a given attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackoffAction {
    /// Busy-waited with CPU spin hints
    Spin,
    /// Yielded the rest of the time slice
    Yield,
}

/// Bounded, randomized backoff between failed CAS attempts.
///
/// Spins for a random count in an exponentially growing window, then falls
/// back to yielding. It never sleeps or parks: a retrying thread stays runnable.
#[derive(Debug, Default)]
pub struct Backoff {
    step: u32,
}

impl Backoff {
    pub fn new() -> Self {
        Backoff { step: 0 }
    }

    pub fn reset(&mut self) {
        self.step = 0;
    }

    /// Number of snoozes since creation or the last reset, saturating.
    pub fn attempts(&self) -> u32 {
        self.step
    }

    pub fn snooze(&mut self) -> BackoffAction {
        let action = if self.step <= SPIN_LIMIT {
            // Jitter keeps contending threads from retrying in lockstep
            let window = 1u32 << self.step;
            let spins = rand::random_range(1..=window);
            for _ in 0..spins {
                hint::spin_loop();
            }
            BackoffAction::Spin
        } else {
            thread::yield_now();
            BackoffAction::Yield
        };

        if self.step <= YIELD_LIMIT {
            self.step += 1;
        }
        action
    }
}
