//! Per-object mutation controller.
//!
//! Two states, no terminal one: an object is PRISTINE until its first
//! write, MUTATING until the epoch is frozen by settlement, then PRISTINE
//! again. The version advances once, at the start of each epoch.
//!
//! Completion requests registered while MUTATING share a single
//! [`EpochWatch`] for the epoch. Freezing takes the watch out of the
//! controller so the next epoch starts with no watchers.

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::task::Waker;

use weft_core::Version;

/// Mutation state of a tracked instance.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MutationState {
    /// No unsettled write since construction or the last freeze.
    #[default]
    Pristine,
    /// At least one write since the last freeze.
    Mutating,
}

/// Shared wait record for one epoch of one instance.
///
/// Every completion future created during the epoch holds a clone. The
/// record is resolved exactly once, when the epoch freezes.
#[derive(Debug, Default)]
pub(crate) struct EpochWatch {
    registered: Cell<usize>,
    resolved: Cell<bool>,
    wakers: RefCell<Vec<Waker>>,
}

impl EpochWatch {
    pub(crate) fn is_resolved(&self) -> bool {
        self.resolved.get()
    }

    /// Outstanding registrations. Zero once resolved.
    pub(crate) fn outstanding(&self) -> usize {
        if self.resolved.get() {
            0
        } else {
            self.registered.get()
        }
    }

    pub(crate) fn park(&self, waker: &Waker) {
        let mut wakers = self.wakers.borrow_mut();
        if !wakers.iter().any(|w| w.will_wake(waker)) {
            wakers.push(waker.clone());
        }
    }

    /// Withdraw one registration. No effect once resolved.
    pub(crate) fn unregister(&self) {
        if !self.resolved.get() {
            self.registered.set(self.registered.get().saturating_sub(1));
        }
    }

    /// Mark resolved and wake every parked task. Idempotent.
    pub(crate) fn resolve(&self) {
        if self.resolved.replace(true) {
            return;
        }
        let wakers = std::mem::take(&mut *self.wakers.borrow_mut());
        for w in wakers {
            w.wake();
        }
    }
}

/// State machine, version counter and watcher registry of one instance.
#[derive(Debug)]
pub(crate) struct MutationController {
    state: MutationState,
    version: Version,
    epoch: Option<Rc<EpochWatch>>,
}

impl MutationController {
    pub(crate) fn new() -> Self {
        Self {
            state: MutationState::Pristine,
            version: Version::INITIAL,
            epoch: None,
        }
    }

    pub(crate) fn state(&self) -> MutationState {
        self.state
    }

    pub(crate) fn is_mutating(&self) -> bool {
        self.state == MutationState::Mutating
    }

    pub(crate) fn version(&self) -> Version {
        self.version
    }

    /// Record a write. Returns the new version when the write opens an
    /// epoch, `None` when the instance was already MUTATING.
    pub(crate) fn begin_write(&mut self) -> Option<Version> {
        match self.state {
            MutationState::Mutating => None,
            MutationState::Pristine => {
                self.state = MutationState::Mutating;
                self.version = self.version.next();
                Some(self.version)
            }
        }
    }

    /// Register a completion request against the current epoch.
    ///
    /// Returns `None` when PRISTINE: the request resolves immediately and
    /// is not counted.
    pub(crate) fn register_watcher(&mut self) -> Option<Rc<EpochWatch>> {
        if !self.is_mutating() {
            return None;
        }
        let watch = self.epoch.get_or_insert_with(Rc::default);
        watch.registered.set(watch.registered.get() + 1);
        Some(Rc::clone(watch))
    }

    pub(crate) fn number_of_watchers(&self) -> usize {
        self.epoch.as_ref().map_or(0, |w| w.outstanding())
    }

    /// End the epoch. Returns the epoch's watch, which the caller resolves
    /// once no borrows are held. `None` if the instance was PRISTINE or had
    /// no watchers.
    pub(crate) fn freeze(&mut self) -> Option<Rc<EpochWatch>> {
        self.state = MutationState::Pristine;
        self.epoch.take()
    }
}
