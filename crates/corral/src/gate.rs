//! Creation gate
//!
//! At most one connector call may be in flight. Borrowers that are not
//! creating must still be able to wait for an in-flight creation to
//! finish and then re-evaluate pool state, without taking the gate
//! themselves. That observer wait is what distinguishes this from a
//! plain mutex.

use tokio::sync::{watch, Mutex, MutexGuard};

pub(crate) struct CreationGate {
    lock: Mutex<()>,
    held: watch::Sender<bool>,
}

/// Exclusive hold on the gate; released on drop
pub(crate) struct GateGuard<'a> {
    gate: &'a CreationGate,
    _permit: MutexGuard<'a, ()>,
}

impl CreationGate {
    pub(crate) fn new() -> Self {
        let (held, _) = watch::channel(false);
        Self {
            lock: Mutex::new(()),
            held,
        }
    }

    /// Take the gate, waiting for the current holder if there is one
    pub(crate) async fn acquire(&self) -> GateGuard<'_> {
        let permit = self.lock.lock().await;
        self.held.send_replace(true);
        GateGuard {
            gate: self,
            _permit: permit,
        }
    }

    /// Whether someone currently holds the gate
    pub(crate) fn is_held(&self) -> bool {
        *self.held.borrow()
    }

    /// Wait until the gate is not held, without acquiring it
    ///
    /// Returns immediately when nobody holds the gate.
    pub(crate) async fn wait_released(&self) {
        let mut rx = self.held.subscribe();
        while *rx.borrow_and_update() {
            if rx.changed().await.is_err() {
                break;
            }
        }
    }
}

impl Drop for GateGuard<'_> {
    fn drop(&mut self) {
        self.gate.held.send_replace(false);
    }
}
