//! Best-effort log-level stepping (supplemented from `ha_manager.c`'s
//! `zabbix_increase_log_level`/`decrease_log_level`): clamps at the
//! ends of the level range and never fails the dispatch loop, even if
//! already at the minimum or maximum.

use std::sync::atomic::{AtomicU8, Ordering};

const LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

/// A controller for the coordinator's own log verbosity, stepped by the
/// `LOGLEVEL_INCREASE`/`LOGLEVEL_DECREASE` wire messages.
pub trait LogLevelController: Send {
    fn increase(&mut self);
    fn decrease(&mut self);
    fn current(&self) -> &'static str;
}

/// Tracks a level index independent of any real logging backend; a
/// production binary wires the index changes into
/// `tracing_subscriber::reload::Handle::modify`.
pub struct AtomicLevelController {
    index: AtomicU8,
}

impl AtomicLevelController {
    #[must_use]
    pub fn new(initial: &str) -> Self {
        let index = LEVELS.iter().position(|l| *l == initial).unwrap_or(2);
        Self {
            index: AtomicU8::new(index as u8),
        }
    }
}

impl Default for AtomicLevelController {
    fn default() -> Self {
        Self::new("info")
    }
}

impl LogLevelController for AtomicLevelController {
    fn increase(&mut self) {
        let current = self.index.load(Ordering::Relaxed);
        let next = (current as usize + 1).min(LEVELS.len() - 1);
        self.index.store(next as u8, Ordering::Relaxed);
    }

    fn decrease(&mut self) {
        let current = self.index.load(Ordering::Relaxed);
        let next = current.saturating_sub(1);
        self.index.store(next, Ordering::Relaxed);
    }

    fn current(&self) -> &'static str {
        LEVELS[self.index.load(Ordering::Relaxed) as usize]
    }
}
