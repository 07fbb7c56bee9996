//! Busy/idle gate
//!
//! Turn work nests: every operation enters on start and leaves on finish.
//! When the depth returns to zero the gate arms, and the *next* tick fires
//! deferred callbacks plus `BoardIdle` if nothing re-entered in between.
//! That one-tick grace lets follow-up work queued by the finishing operation
//! register before the board is declared idle.

use std::fmt;

type IdleCallback = Box<dyn FnOnce()>;

#[derive(Default)]
pub struct BusyGate {
    depth: u32,
    idle_armed: bool,
    deferred: Vec<IdleCallback>,
}

impl fmt::Debug for BusyGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BusyGate")
            .field("depth", &self.depth)
            .field("idle_armed", &self.idle_armed)
            .field("deferred", &self.deferred.len())
            .finish()
    }
}

impl BusyGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_busy(&self) -> bool {
        self.depth > 0
    }

    pub fn enter(&mut self) {
        self.depth += 1;
        self.idle_armed = false;
    }

    pub fn leave(&mut self) {
        self.depth = self.depth.saturating_sub(1);
        if self.depth == 0 {
            self.idle_armed = true;
        }
    }

    /// Run `callback` once the board is idle. Runs now when already idle.
    pub fn run_after_idle(&mut self, callback: impl FnOnce() + 'static) {
        if self.depth == 0 && !self.idle_armed {
            callback();
        } else {
            self.deferred.push(Box::new(callback));
        }
    }

    /// Advance one tick. Returns true when the board just became idle.
    pub fn tick(&mut self) -> bool {
        if !self.idle_armed || self.depth > 0 {
            return false;
        }
        self.idle_armed = false;
        for callback in self.deferred.drain(..) {
            callback();
        }
        true
    }
}
