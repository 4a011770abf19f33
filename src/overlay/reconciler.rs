//! HighlightReconciler - bring document markup in line with a TermIndex
//!
//! A pass is always clear-then-apply over the whole rendered page:
//! 1. Clear: unwrap every highlight back to a text node, normalize parents
//! 2. Guard: empty index stops here
//! 3. Apply: segment each text run and swap matched runs for markup
//!
//! Highlights are never patched incrementally.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::config::OverlayConfig;
use crate::console;
use crate::overlay::scanner::DocumentScanner;
use crate::overlay::segment::{segment_text, Segment};
use crate::overlay::surface::{DocumentSurface, HighlightMarkup};
use crate::overlay::terms::TermIndex;

/// Outcome of one reconciliation pass
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReconcileReport {
    /// Highlights removed by the clear pass
    pub cleared: usize,
    /// Highlights written by the apply pass
    pub highlighted: usize,
    /// Text runs examined
    pub runs_scanned: usize,
    /// Text runs that were replaced
    pub runs_touched: usize,
    /// Occurrences per normalized word
    pub per_word: BTreeMap<String, usize>,
    /// False when the index was empty and scanning was skipped
    pub scanned: bool,
    pub elapsed_ms: f64,
}

/// Clears and re-applies highlight markup
#[derive(Debug, Clone)]
pub struct HighlightReconciler {
    scanner: DocumentScanner,
    markup: HighlightMarkup,
}

impl HighlightReconciler {
    pub fn new(scanner: DocumentScanner, markup: HighlightMarkup) -> Self {
        Self { scanner, markup }
    }

    pub fn from_config(config: &OverlayConfig) -> Self {
        Self::new(
            DocumentScanner::from_config(config),
            HighlightMarkup::from_config(config),
        )
    }

    pub fn markup(&self) -> &HighlightMarkup {
        &self.markup
    }

    pub fn scanner(&self) -> &DocumentScanner {
        &self.scanner
    }

    /// Unwrap every highlight. Returns how many were removed.
    pub fn clear<S: DocumentSurface>(&self, surface: &mut S) -> usize {
        let spans: Vec<S::Node> = self.scanner.highlights(surface).collect();
        let mut parents: Vec<S::Node> = Vec::new();

        for span in &spans {
            let text = surface.text_content(span);
            if let Some(parent) = surface.parent(span) {
                if !parents.contains(&parent) {
                    parents.push(parent);
                }
            }
            surface.replace_with_text(span, &text);
        }

        for parent in &parents {
            if surface.is_attached(parent) {
                surface.normalize(parent);
            }
        }
        spans.len()
    }

    /// Wrap every occurrence in the scannable text. Expects a cleared
    /// document; runs inside existing highlights are never revisited.
    pub fn apply<S: DocumentSurface>(
        &self,
        surface: &mut S,
        index: &TermIndex,
        report: &mut ReconcileReport,
    ) {
        if index.is_empty() {
            return;
        }
        let runs: Vec<S::Node> = self.scanner.text_runs(surface).collect();
        report.scanned = true;
        report.runs_scanned = runs.len();

        for run in runs {
            let text = surface.text_content(&run);
            let segments = segment_text(&text, index);
            if segments.is_empty() {
                continue;
            }
            for segment in &segments {
                if let Segment::Match { word, .. } = segment {
                    report.highlighted += 1;
                    *report.per_word.entry(word.clone()).or_insert(0) += 1;
                }
            }
            surface.replace_with_segments(&run, &segments, &self.markup);
            report.runs_touched += 1;
        }
    }

    /// One full clear-then-apply pass
    pub fn reconcile<S: DocumentSurface>(
        &self,
        surface: &mut S,
        index: &TermIndex,
    ) -> ReconcileReport {
        let start = instant::Instant::now();
        let mut report = ReconcileReport {
            cleared: self.clear(surface),
            ..Default::default()
        };
        self.apply(surface, index, &mut report);
        report.elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;

        console::debug(
            "HighlightReconciler",
            &format!(
                "cleared:{} highlighted:{} runs:{}/{} ({:.2}ms)",
                report.cleared,
                report.highlighted,
                report.runs_touched,
                report.runs_scanned,
                report.elapsed_ms
            ),
        );
        report
    }
}
