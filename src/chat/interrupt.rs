//! Ctrl+C accounting for the REPL.
//!
//! Requests are never cancelled.  A Ctrl+C while a network call is outstanding warns once; a
//! second one during the same call asks the process to exit.  Outside a call it is ignored,
//! since the line editor handles it.

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Printed on the first Ctrl+C during a network call.
pub const INTERRUPT_NOTICE: &str = "The request runs to completion; press Ctrl+C again to exit.";

/// Exit status after a second Ctrl+C during one network call.
pub const EXIT_INTERRUPTED: i32 = 130;

/// What the signal handler should do with one Ctrl+C.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptAction {
    /// No call is outstanding.
    Ignore,
    /// First interrupt during this call: print [`INTERRUPT_NOTICE`].
    Warn,
    /// Repeated interrupt: exit with [`EXIT_INTERRUPTED`].
    Exit,
}

/// Shared between the REPL task and the signal handler.
#[derive(Debug, Default)]
pub struct InterruptState {
    in_flight: AtomicBool,
    count: AtomicUsize,
}

impl InterruptState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a network call as outstanding until the guard drops.
    pub fn begin(&self) -> InFlightGuard<'_> {
        self.count.store(0, Ordering::SeqCst);
        self.in_flight.store(true, Ordering::SeqCst);
        InFlightGuard { state: self }
    }

    /// Await `call` with the in-flight mark set.
    pub async fn run<F: Future>(&self, call: F) -> F::Output {
        let _guard = self.begin();
        call.await
    }

    /// True while a guard from [`InterruptState::begin`] is alive.
    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Record one Ctrl+C.
    pub fn signal(&self) -> InterruptAction {
        if !self.is_in_flight() {
            return InterruptAction::Ignore;
        }
        if self.count.fetch_add(1, Ordering::SeqCst) == 0 {
            InterruptAction::Warn
        } else {
            InterruptAction::Exit
        }
    }
}

/// Clears the in-flight mark on drop.
pub struct InFlightGuard<'a> {
    state: &'a InterruptState,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.state.in_flight.store(false, Ordering::SeqCst);
    }
}
