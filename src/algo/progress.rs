//! Progress reporting and cooperative cancellation for iterative algorithms.
//!
//! Relaxation runs report each round through a [`Progress`] callback and poll
//! a [`CancelToken`] before starting the next one. Cancelling is not an
//! error: the running phase stops and keeps the rounds it already completed.
//!
//! # Example
//!
//! ```
//! use tetsample::algo::{CancelToken, Progress};
//!
//! let token = CancelToken::new();
//! let watcher = token.clone();
//! let progress = Progress::new(move |current, total, _message| {
//!     if current + 1 >= total / 2 {
//!         watcher.cancel();
//!     }
//! });
//!
//! progress.report(4, 10, "Lloyd");
//! assert!(token.is_cancelled());
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A progress callback that receives updates during long-running operations.
///
/// The callback receives:
/// - `current`: Current step (0-based)
/// - `total`: Total number of steps
/// - `message`: Description of the current operation
pub struct Progress {
    callback: Box<dyn Fn(usize, usize, &str) + Send + Sync>,
}

impl Progress {
    /// Create a new progress reporter with the given callback.
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(usize, usize, &str) + Send + Sync + 'static,
    {
        Self {
            callback: Box::new(callback),
        }
    }

    /// Report progress.
    #[inline]
    pub fn report(&self, current: usize, total: usize, message: &str) {
        (self.callback)(current, total, message);
    }

    /// Create a no-op progress reporter that discards all updates.
    pub fn none() -> Self {
        Self::new(|_, _, _| {})
    }
}

impl Default for Progress {
    fn default() -> Self {
        Self::none()
    }
}

impl std::fmt::Debug for Progress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Progress").finish_non_exhaustive()
    }
}

/// A shared flag requesting that the running relaxation phase stop.
///
/// Clones share the same flag. Once cancelled, a token stays cancelled.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// Create a token that is not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    /// Whether cancellation was requested.
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// Per-phase reporting and cancellation handed to a relaxation run.
#[derive(Debug, Clone, Copy)]
pub struct RoundControl<'a> {
    /// Receives one report per completed round.
    pub progress: &'a Progress,
    /// Polled before every round.
    pub cancel: &'a CancelToken,
}

impl<'a> RoundControl<'a> {
    /// Bundle a reporter and a token.
    pub fn new(progress: &'a Progress, cancel: &'a CancelToken) -> Self {
        Self { progress, cancel }
    }
}

/// How a relaxation phase ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RelaxOutcome {
    /// Rounds asked for.
    pub requested: usize,
    /// Rounds actually applied.
    pub completed: usize,
    /// Whether the phase stopped early because of a [`CancelToken`].
    pub cancelled: bool,
}

impl RelaxOutcome {
    /// Outcome of a phase that was not run.
    pub fn skipped() -> Self {
        Self::default()
    }
}

/// Run `rounds` rounds of `step`, polling the token before each one.
///
/// Progress is reported after every completed round.
pub(crate) fn run_rounds<F>(
    rounds: usize,
    label: &str,
    control: RoundControl<'_>,
    mut step: F,
) -> RelaxOutcome
where
    F: FnMut(usize),
{
    let mut outcome = RelaxOutcome {
        requested: rounds,
        ..RelaxOutcome::default()
    };
    for round in 0..rounds {
        if control.cancel.is_cancelled() {
            outcome.cancelled = true;
            log::warn!("{} cancelled after {}/{} rounds", label, round, rounds);
            break;
        }
        step(round);
        outcome.completed = round + 1;
        control.progress.report(round + 1, rounds, label);
    }
    outcome
}
