//! Shared fixtures for overlay scenario tests

use crate::config::OverlayConfig;
use crate::overlay::arena::{ArenaDocument, NodeId};
use crate::overlay::bridge::StaticHost;
use crate::overlay::engine::OverlayEngine;
use crate::overlay::scanner::DocumentScanner;
use crate::overlay::vocab::{Term, VocabularySnapshot};

/// A short chapter with nesting, a script block and mixed case
pub fn chapter() -> ArenaDocument {
    let mut doc = ArenaDocument::new();
    let body = doc.body();
    let h2 = doc.element(body, "h2");
    doc.text(h2, "Chapter One");
    let p = doc.element(body, "p");
    doc.text(p, "The cat was ubiquitous. ");
    let i = doc.element(p, "i");
    doc.text(i, "Concatenate");
    doc.text(p, " every CAT & dog.");
    let p2 = doc.element_with(body, "p", &[("class", "note")]);
    doc.text(p2, "It was ubiquitous and UBIQUITOUS.");
    let style = doc.element(body, "style");
    doc.text(style, ".cat { color: red }");
    doc
}

/// One paragraph of plain text
pub fn page(text: &str) -> ArenaDocument {
    let mut doc = ArenaDocument::new();
    let body = doc.body();
    let p = doc.element(body, "p");
    doc.text(p, text);
    doc
}

pub fn snapshot(words: &[&str]) -> VocabularySnapshot {
    VocabularySnapshot::new(words.iter().map(|w| Term::new(*w)).collect())
}

pub fn engine() -> OverlayEngine<ArenaDocument> {
    OverlayEngine::new(OverlayConfig::default())
}

/// Highlight elements currently in the document
pub fn highlights(doc: &ArenaDocument) -> Vec<NodeId> {
    DocumentScanner::from_config(&OverlayConfig::default())
        .highlights(doc)
        .collect()
}

/// Desktop host with the frame at the origin
pub fn desktop_host() -> StaticHost {
    StaticHost::full_frame(1280.0, 800.0)
}
