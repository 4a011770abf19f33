//! OverlayEngine - wires the overlay to host events
//!
//! Inputs are discrete events from the host: a document was attached or
//! detached, the renderer relocated, the vocabulary changed, time passed,
//! the user clicked. Each is handled synchronously; nothing here returns an
//! error to the caller. A missing document or frame just means no work.
//!
//! # Usage
//! ```rust,ignore
//! let mut engine = OverlayEngine::new(OverlayConfig::default());
//! engine.attach(document, now);
//! engine.set_vocabulary(store.snapshot(), now);   // runs a pass right away
//! engine.relocated(now);                          // pass after the debounce
//! engine.tick(later);
//! if let Some(view) = engine.click(&target, &host) { render(view) }
//! engine.delete_active(&mut store, now);          // removes word, re-runs
//! ```

use crate::config::OverlayConfig;
use crate::console;
use crate::overlay::bridge::{CrossSurfaceBridge, HostSurface};
use crate::overlay::popover::{DismissReason, PopoverController, PopoverState, PopoverView};
use crate::overlay::reconciler::{HighlightReconciler, ReconcileReport};
use crate::overlay::scheduler::{ListenerRegistry, ReconciliationScheduler, Trigger};
use crate::overlay::surface::DocumentSurface;
use crate::overlay::terms::TermIndex;
use crate::overlay::vocab::{normalize_word, VocabularySnapshot, VocabularyStore};

pub struct OverlayEngine<S: DocumentSurface> {
    config: OverlayConfig,
    reconciler: HighlightReconciler,
    document: Option<S>,
    snapshot: VocabularySnapshot,
    index: TermIndex,
    scheduler: ReconciliationScheduler,
    listeners: ListenerRegistry,
    popover: PopoverController<S::Node>,
    last_report: Option<ReconcileReport>,
}

impl<S: DocumentSurface> OverlayEngine<S> {
    pub fn new(config: OverlayConfig) -> Self {
        Self {
            reconciler: HighlightReconciler::from_config(&config),
            document: None,
            snapshot: VocabularySnapshot::default(),
            index: TermIndex::empty(),
            scheduler: ReconciliationScheduler::new(config.relocation_debounce_ms),
            listeners: ListenerRegistry::new(),
            popover: PopoverController::new(config.popover.clone()),
            last_report: None,
            config,
        }
    }

    pub fn config(&self) -> &OverlayConfig {
        &self.config
    }

    pub fn document(&self) -> Option<&S> {
        self.document.as_ref()
    }

    /// Mutable access for the host (e.g. to feed renderer output)
    pub fn document_mut(&mut self) -> Option<&mut S> {
        self.document.as_mut()
    }

    pub fn snapshot(&self) -> &VocabularySnapshot {
        &self.snapshot
    }

    pub fn index(&self) -> &TermIndex {
        &self.index
    }

    pub fn scheduler(&self) -> &ReconciliationScheduler {
        &self.scheduler
    }

    pub fn popover(&self) -> Option<&PopoverState<S::Node>> {
        self.popover.state()
    }

    pub fn last_report(&self) -> Option<&ReconcileReport> {
        self.last_report.as_ref()
    }

    // =========================================================================
    // Document lifecycle
    // =========================================================================

    /// Make `document` the current content document. Returns the previous
    /// one with its listener released. The first pass waits for the
    /// debounce, like a relocation.
    pub fn attach(&mut self, document: S, now_ms: f64) -> Option<S> {
        let previous = self.detach();
        self.document = Some(document);
        self.scheduler.notify(Trigger::Attach, now_ms);
        previous
    }

    /// Drop the current document: close the popover, cancel pending work,
    /// release the click listener.
    pub fn detach(&mut self) -> Option<S> {
        self.popover.close(DismissReason::AnchorLost);
        self.scheduler.cancel();
        let mut document = self.document.take()?;
        if document.root().is_some() {
            self.listeners.release(&mut document);
        } else {
            self.listeners.forget(document.key());
        }
        Some(document)
    }

    // =========================================================================
    // Triggers
    // =========================================================================

    /// Take a new term snapshot. When its word set differs from the current
    /// one the index is rebuilt and a pass runs immediately; otherwise only
    /// the open popover's content is refreshed.
    pub fn set_vocabulary(
        &mut self,
        snapshot: VocabularySnapshot,
        now_ms: f64,
    ) -> Option<ReconcileReport> {
        let changed = !self.snapshot.same_words(&snapshot);
        self.snapshot = snapshot;
        if !changed {
            self.popover.refresh(&self.snapshot);
            return None;
        }
        self.index = TermIndex::build(self.snapshot.terms());
        self.scheduler.notify(Trigger::Vocabulary, now_ms);
        self.tick(now_ms)
    }

    /// The renderer repaginated or navigated. Returns when the pass is due.
    pub fn relocated(&mut self, now_ms: f64) -> f64 {
        self.scheduler.notify(Trigger::Relocation, now_ms)
    }

    /// Run the pending pass if it is due
    pub fn tick(&mut self, now_ms: f64) -> Option<ReconcileReport> {
        let trigger = self.scheduler.take_due(now_ms)?;
        console::debug("OverlayEngine", &format!("pass ({:?})", trigger));
        self.run_pass()
    }

    /// Run the pending pass whether or not its deadline has been reached.
    /// For host timers, whose clock may disagree with the one passed to
    /// `relocated`.
    pub fn run_pending(&mut self) -> Option<ReconcileReport> {
        if self.scheduler.is_idle() {
            return None;
        }
        self.reconcile_now()
    }

    /// Run a pass now, absorbing anything pending
    pub fn reconcile_now(&mut self) -> Option<ReconcileReport> {
        self.scheduler.complete();
        self.run_pass()
    }

    fn run_pass(&mut self) -> Option<ReconcileReport> {
        let Some(document) = self.document.as_mut() else {
            console::debug("OverlayEngine", "no document, pass skipped");
            return None;
        };
        if document.root().is_none() {
            console::debug("OverlayEngine", "document torn down, pass skipped");
            self.listeners.forget(document.key());
            self.popover.close(DismissReason::AnchorLost);
            return None;
        }

        let reconciler = &self.reconciler;
        let index = &self.index;
        let report = self.listeners.cycle(document, |doc| {
            let report = reconciler.reconcile(doc, index);
            let wants_listener = report.scanned;
            (report, wants_listener)
        });

        let anchor_lost = self
            .popover
            .state()
            .is_some_and(|state| !document.is_attached(state.anchor()));
        if anchor_lost {
            self.popover.close(DismissReason::AnchorLost);
        }

        self.last_report = Some(report.clone());
        Some(report)
    }

    // =========================================================================
    // Popover
    // =========================================================================

    /// A click landed on `target` inside the content document. Opens the
    /// popover for a highlight; anything else counts as an outside click.
    pub fn click(&mut self, target: &S::Node, host: &dyn HostSurface) -> Option<PopoverView> {
        let Some(document) = self.document.as_ref() else {
            self.popover.close(DismissReason::AnchorLost);
            return None;
        };
        let markup = self.reconciler.markup();

        let Some(span) = document.highlight_ancestor(target, markup) else {
            self.popover.close(DismissReason::OutsideClick);
            return None;
        };

        let word = document
            .attribute(&span, &markup.word_attribute)
            .and_then(|w| normalize_word(&w))
            .or_else(|| normalize_word(&document.text_content(&span)));
        let geometry = document
            .bounding_rect(&span)
            .and_then(|local| CrossSurfaceBridge::translate(local, host));

        match (word, geometry) {
            (Some(word), Some(geometry)) => {
                Some(self.popover.open(&word, span, geometry, &self.snapshot))
            }
            _ => {
                self.popover.close(DismissReason::AnchorLost);
                None
            }
        }
    }

    /// Close the popover. Returns false if none was open.
    pub fn dismiss(&mut self, reason: DismissReason) -> bool {
        self.popover.close(reason).is_some()
    }

    /// Delete the open popover's word from the store, close it, and
    /// reconcile against the store's new snapshot. Returns the removed word.
    pub fn delete_active(
        &mut self,
        store: &mut dyn VocabularyStore,
        now_ms: f64,
    ) -> Option<String> {
        let word = self.popover.delete(store)?;
        self.set_vocabulary(store.snapshot(), now_ms);
        Some(word)
    }
}
