//! ReconciliationScheduler - when to run a pass, and listener ownership
//!
//! # State machine
//! - Idle -> Scheduled on a vocabulary change (due now) or a relocation
//!   (due after the debounce delay)
//! - Scheduled -> Idle once the pass has run
//!
//! Triggers that arrive while Scheduled collapse into the pending run. A new
//! relocation restarts the debounce (last write wins); a vocabulary change
//! pulls the pending run forward to now.
//!
//! Time is passed in as milliseconds so the host decides what a clock is.

use std::collections::HashMap;

use serde::Serialize;

use crate::console;
use crate::overlay::surface::{DocumentKey, DocumentSurface, ListenerId};

// =============================================================================
// Debounce
// =============================================================================

/// Cancellable single-shot deadline
#[derive(Debug, Clone)]
pub struct Debounce {
    delay_ms: f64,
    deadline: Option<f64>,
    restarts: u64,
}

impl Debounce {
    pub fn new(delay_ms: f64) -> Self {
        Self {
            delay_ms: delay_ms.max(0.0),
            deadline: None,
            restarts: 0,
        }
    }

    pub fn delay_ms(&self) -> f64 {
        self.delay_ms
    }

    /// Start, or restart, the countdown from `now_ms`
    pub fn arm(&mut self, now_ms: f64) -> f64 {
        if self.deadline.is_some() {
            self.restarts += 1;
        }
        let deadline = now_ms + self.delay_ms;
        self.deadline = Some(deadline);
        deadline
    }

    pub fn cancel(&mut self) -> bool {
        self.deadline.take().is_some()
    }

    pub fn deadline(&self) -> Option<f64> {
        self.deadline
    }

    pub fn is_due(&self, now_ms: f64) -> bool {
        self.deadline.is_some_and(|d| now_ms >= d)
    }

    /// How many times a running countdown was restarted
    pub fn restarts(&self) -> u64 {
        self.restarts
    }
}

// =============================================================================
// ReconciliationScheduler
// =============================================================================

/// What asked for a pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    Vocabulary,
    Relocation,
    /// A new content document was attached
    Attach,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SchedulerState {
    Idle,
    Scheduled { trigger: Trigger, due_ms: f64 },
}

#[derive(Debug, Clone)]
pub struct ReconciliationScheduler {
    state: SchedulerState,
    debounce: Debounce,
    collapsed: u64,
    completed: u64,
}

impl ReconciliationScheduler {
    pub fn new(debounce_ms: f64) -> Self {
        Self {
            state: SchedulerState::Idle,
            debounce: Debounce::new(debounce_ms),
            collapsed: 0,
            completed: 0,
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn is_idle(&self) -> bool {
        self.state == SchedulerState::Idle
    }

    /// Deadline of the pending run, if any
    pub fn due_ms(&self) -> Option<f64> {
        match self.state {
            SchedulerState::Idle => None,
            SchedulerState::Scheduled { due_ms, .. } => Some(due_ms),
        }
    }

    /// Triggers folded into an already pending run
    pub fn collapsed_count(&self) -> u64 {
        self.collapsed
    }

    pub fn completed_count(&self) -> u64 {
        self.completed
    }

    pub fn debounce(&self) -> &Debounce {
        &self.debounce
    }

    /// Record a trigger. Returns the deadline of the (single) pending run.
    pub fn notify(&mut self, trigger: Trigger, now_ms: f64) -> f64 {
        if !self.is_idle() {
            self.collapsed += 1;
        }
        let due_ms = match trigger {
            Trigger::Vocabulary => {
                self.debounce.cancel();
                now_ms
            }
            Trigger::Relocation | Trigger::Attach => {
                if let SchedulerState::Scheduled { due_ms, .. } = self.state {
                    if self.debounce.deadline().is_none() {
                        // An immediate run is already pending
                        return due_ms;
                    }
                    console::debug("ReconciliationScheduler", "debounce restarted");
                }
                self.debounce.arm(now_ms)
            }
        };
        self.state = SchedulerState::Scheduled { trigger, due_ms };
        due_ms
    }

    /// True if a pending run should execute at `now_ms`
    pub fn is_due(&self, now_ms: f64) -> bool {
        matches!(self.state, SchedulerState::Scheduled { due_ms, .. } if now_ms >= due_ms)
    }

    /// Take the pending run if due. The caller runs the pass.
    pub fn take_due(&mut self, now_ms: f64) -> Option<Trigger> {
        match self.state {
            SchedulerState::Scheduled { trigger, due_ms } if now_ms >= due_ms => {
                self.complete();
                Some(trigger)
            }
            _ => None,
        }
    }

    /// Back to Idle after a pass ran (or was skipped)
    pub fn complete(&mut self) {
        self.debounce.cancel();
        if !self.is_idle() {
            self.completed += 1;
        }
        self.state = SchedulerState::Idle;
    }

    /// Drop any pending run without counting it
    pub fn cancel(&mut self) {
        self.debounce.cancel();
        self.state = SchedulerState::Idle;
    }
}

// =============================================================================
// ListenerRegistry
// =============================================================================

/// One click-listener slot per content document
#[derive(Debug, Default)]
pub struct ListenerRegistry {
    slots: HashMap<DocumentKey, ListenerId>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Listener currently bound on `key`
    pub fn bound(&self, key: DocumentKey) -> Option<ListenerId> {
        self.slots.get(&key).copied()
    }

    /// Unbind whatever this registry holds for the surface
    pub fn release<S: DocumentSurface>(&mut self, surface: &mut S) -> bool {
        match self.slots.remove(&surface.key()) {
            Some(id) => {
                surface.unbind_click(id);
                true
            }
            None => false,
        }
    }

    /// Run one reconciliation cycle with the slot released around it.
    ///
    /// The previous listener is unbound before `f` runs; a fresh one is
    /// bound afterwards when `f` reports that there is something to click.
    pub fn cycle<S, R, F>(&mut self, surface: &mut S, f: F) -> R
    where
        S: DocumentSurface,
        F: FnOnce(&mut S) -> (R, bool),
    {
        self.release(surface);
        let (result, wants_listener) = f(surface);
        if wants_listener {
            let id = surface.bind_click();
            self.slots.insert(surface.key(), id);
        }
        result
    }

    /// Forget a document without touching it (it is already gone)
    pub fn forget(&mut self, key: DocumentKey) -> Option<ListenerId> {
        self.slots.remove(&key)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overlay::arena::ArenaDocument;

    #[test]
    fn test_debounce_restart_is_last_write_wins() {
        let mut d = Debounce::new(150.0);
        d.arm(0.0);
        d.arm(100.0);
        assert_eq!(d.deadline(), Some(250.0));
        assert_eq!(d.restarts(), 1);
        assert!(!d.is_due(200.0));
        assert!(d.is_due(250.0));
        assert!(d.cancel());
        assert!(!d.is_due(1000.0));
    }

    #[test]
    fn test_vocabulary_runs_immediately() {
        let mut s = ReconciliationScheduler::new(150.0);
        assert_eq!(s.notify(Trigger::Vocabulary, 10.0), 10.0);
        assert_eq!(s.take_due(10.0), Some(Trigger::Vocabulary));
        assert!(s.is_idle());
    }

    #[test]
    fn test_relocation_is_debounced() {
        let mut s = ReconciliationScheduler::new(150.0);
        s.notify(Trigger::Relocation, 0.0);
        assert!(s.take_due(100.0).is_none());
        s.notify(Trigger::Relocation, 100.0);
        assert!(s.take_due(200.0).is_none());
        assert_eq!(s.take_due(250.0), Some(Trigger::Relocation));
        assert_eq!(s.collapsed_count(), 1);
        assert_eq!(s.completed_count(), 1);
        assert!(s.take_due(1000.0).is_none());
    }

    #[test]
    fn test_vocabulary_pulls_pending_relocation_forward() {
        let mut s = ReconciliationScheduler::new(150.0);
        s.notify(Trigger::Relocation, 0.0);
        s.notify(Trigger::Vocabulary, 20.0);
        assert!(s.debounce().deadline().is_none());
        assert_eq!(s.take_due(20.0), Some(Trigger::Vocabulary));
    }

    #[test]
    fn test_relocation_does_not_delay_immediate_run() {
        let mut s = ReconciliationScheduler::new(150.0);
        s.notify(Trigger::Vocabulary, 20.0);
        assert_eq!(s.notify(Trigger::Relocation, 30.0), 20.0);
        assert_eq!(s.take_due(30.0), Some(Trigger::Vocabulary));
    }

    #[test]
    fn test_cancel_returns_to_idle() {
        let mut s = ReconciliationScheduler::new(150.0);
        s.notify(Trigger::Attach, 0.0);
        s.cancel();
        assert!(s.is_idle());
        assert!(s.take_due(500.0).is_none());
        assert_eq!(s.completed_count(), 0);
    }

    #[test]
    fn test_registry_keeps_one_listener_per_document() {
        let mut doc = ArenaDocument::new();
        let mut registry = ListenerRegistry::new();
        for _ in 0..5 {
            registry.cycle(&mut doc, |_| ((), true));
        }
        assert_eq!(doc.listener_count(), 1);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_registry_unbinds_when_nothing_to_click() {
        let mut doc = ArenaDocument::new();
        let mut registry = ListenerRegistry::new();
        registry.cycle(&mut doc, |_| ((), true));
        registry.cycle(&mut doc, |_| ((), false));
        assert_eq!(doc.listener_count(), 0);
        assert!(registry.bound(doc.key()).is_none());
    }

    #[test]
    fn test_registry_slots_are_per_document() {
        let mut a = ArenaDocument::new();
        let mut b = ArenaDocument::new();
        let mut registry = ListenerRegistry::new();
        registry.cycle(&mut a, |_| ((), true));
        registry.cycle(&mut b, |_| ((), true));
        registry.cycle(&mut a, |_| ((), true));
        assert_eq!(a.listener_count(), 1);
        assert_eq!(b.listener_count(), 1);
        assert!(registry.release(&mut b));
        assert_eq!(b.listener_count(), 0);
        assert!(!registry.release(&mut b));
    }
}
