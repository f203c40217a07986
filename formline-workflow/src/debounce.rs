//! Single-slot delayed task scheduling.

use std::time::Duration;

use tokio::task::JoinHandle;

/// Runs the most recently scheduled callback once the quiet period elapses
/// without another call to [`Debouncer::schedule`].
///
/// Each schedule aborts the previous unfired task and bumps a generation
/// counter. The callback receives its generation so the receiver can drop a
/// firing that was already queued before it was superseded.
#[derive(Debug)]
pub struct Debouncer {
    quiet: Duration,
    pending: Option<JoinHandle<()>>,
    generation: u64,
}

impl Debouncer {
    #[must_use]
    pub const fn new(quiet: Duration) -> Self {
        Self {
            quiet,
            pending: None,
            generation: 0,
        }
    }

    /// Schedule `fire` to run after the quiet period, replacing anything
    /// already pending. Returns the generation passed to `fire`.
    pub fn schedule<F>(&mut self, fire: F) -> u64
    where
        F: FnOnce(u64) + Send + 'static,
    {
        self.cancel();

        let generation = self.generation;
        let deadline = tokio::time::Instant::now() + self.quiet;
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            fire(generation);
        }));

        generation
    }

    /// Drop whatever is pending. Firings already queued become stale.
    pub fn cancel(&mut self) {
        if let Some(task) = self.pending.take() {
            task.abort();
        }
        self.generation = self.generation.wrapping_add(1);
    }

    /// Accept a firing. Returns `false` if it was superseded or cancelled.
    pub fn accept(&mut self, generation: u64) -> bool {
        if generation != self.generation || self.pending.is_none() {
            return false;
        }
        self.pending = None;
        true
    }

    #[must_use]
    pub const fn is_pending(&self) -> bool {
        self.pending.is_some()
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        if let Some(task) = self.pending.take() {
            task.abort();
        }
    }
}
