//! Debounced, throttled auto-save timing.
//!
//! Pure bookkeeping over caller-supplied instants: the owner asks [`AutoSave::poll`]
//! whether a save should start and reports back with [`AutoSave::finish`].
//! No I/O happens here.

use std::time::{Duration, Instant};

use tracing::debug;

/// Delay after the last mutation before a save runs.
pub const AUTO_SAVE_DELAY: Duration = Duration::from_secs(30);
/// Minimum spacing between two saves.
pub const MIN_SAVE_INTERVAL: Duration = Duration::from_secs(15);

#[derive(Debug, Clone)]
pub struct AutoSave {
    delay: Duration,
    min_interval: Duration,
    due: Option<Instant>,
    forced: bool,
    saving: bool,
    last_save: Option<Instant>,
}

impl Default for AutoSave {
    fn default() -> Self {
        Self::new(AUTO_SAVE_DELAY, MIN_SAVE_INTERVAL)
    }
}

impl AutoSave {
    pub fn new(delay: Duration, min_interval: Duration) -> Self {
        Self {
            delay,
            min_interval,
            due: None,
            forced: false,
            saving: false,
            last_save: None,
        }
    }

    /// Record a mutation. Repeated calls push the deadline back.
    pub fn schedule(&mut self, now: Instant) {
        if !self.forced {
            self.due = Some(now + self.delay);
        }
    }

    /// Ask for a save at the next poll, ignoring the throttle.
    pub fn request_now(&mut self, now: Instant) {
        self.due = Some(now);
        self.forced = true;
    }

    pub fn is_pending(&self) -> bool {
        self.due.is_some()
    }

    pub fn is_saving(&self) -> bool {
        self.saving
    }

    /// Returns `true` when a save should start now. The caller must follow up
    /// with [`AutoSave::finish`].
    pub fn poll(&mut self, now: Instant) -> bool {
        let Some(due) = self.due else {
            return false;
        };
        if now < due {
            return false;
        }
        if self.saving {
            debug!("save already in progress, skipping");
            self.due = None;
            self.forced = false;
            return false;
        }
        if !self.forced {
            if let Some(last) = self.last_save {
                let since = now.saturating_duration_since(last);
                if since < self.min_interval {
                    debug!(since_secs = since.as_secs(), "throttling auto-save");
                    self.due = Some(last + self.min_interval);
                    return false;
                }
            }
        }
        self.due = None;
        self.forced = false;
        self.saving = true;
        true
    }

    /// Take a pending save immediately, regardless of timing. Used on shutdown.
    pub fn take_pending(&mut self) -> bool {
        if self.saving || self.due.take().is_none() {
            return false;
        }
        self.forced = false;
        self.saving = true;
        true
    }

    pub fn finish(&mut self, ok: bool, now: Instant) {
        self.saving = false;
        if ok {
            self.last_save = Some(now);
        }
    }
}
