//! GlossCore: Vocabulary highlight overlay for reflowed book content
//!
//! A Rust/WASM implementation of the reader's saved-word overlay: every
//! occurrence of a saved word on the rendered page is wrapped in a
//! highlight, and clicking one opens an inspector popover.
//!
//! # Architecture
//!
//! ## Overlay Components
//! - `terms.rs` - TermIndex: whole-word, case-insensitive matcher
//! - `scanner.rs` - DocumentScanner: lazy walk over matchable text runs
//! - `reconciler.rs` - HighlightReconciler: clear-then-apply markup passes
//! - `popover.rs` - PopoverController: placement, content, open/close/delete
//! - `scheduler.rs` - ReconciliationScheduler: when to run a pass
//! - `bridge.rs` - CrossSurfaceBridge: content frame -> host coordinates
//! - `engine.rs` - OverlayEngine: all of the above behind host events
//!
//! ## Surfaces
//! - `surface.rs` - DocumentSurface: the adapter every mutation goes through
//! - `arena.rs` - ArenaDocument: in-memory surface
//! - `web.rs` - web_sys surface and JS bindings (wasm32 only)
//!
//! # Usage (WASM)
//! ```javascript,ignore
//! import init, { WordOverlay } from 'glosscore';
//!
//! await init();
//!
//! const overlay = new WordOverlay({ relocation_debounce_ms: 150 });
//! overlay.onRemoveTerm(word => store.remove(word));
//! overlay.onPopover(view => view ? renderPopover(view) : hidePopover());
//!
//! rendition.on('rendered', (_, view) => overlay.attach(view.document, view.iframe));
//! rendition.on('relocated', () => overlay.relocated());
//! store.subscribe(terms => overlay.setVocabulary(terms));
//! ```

pub mod config;
pub mod console;
pub mod error;
pub mod overlay;

#[cfg(target_arch = "wasm32")]
pub mod web;

pub use config::*;
pub use error::*;
pub use overlay::*;

use wasm_bindgen::prelude::*;

// When the `wee_alloc` feature is enabled, use `wee_alloc` as the global
// allocator for smaller WASM bundle size.
#[cfg(feature = "wee_alloc")]
#[global_allocator]
static ALLOC: wee_alloc::WeeAlloc = wee_alloc::WeeAlloc::INIT;

/// Initialize panic hook for better error messages in browser console
#[wasm_bindgen(start)]
pub fn main() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

/// Get version information
#[wasm_bindgen]
pub fn version() -> String {
    format!("glosscore v{}", env!("CARGO_PKG_VERSION"))
}

/// Split `text` around occurrences of `words` (JS binding).
///
/// Returns an array of `{ kind: "plain" | "match", text, word? }`, empty
/// when nothing matches.
#[wasm_bindgen(js_name = segmentText)]
pub fn js_segment_text(text: &str, words: JsValue) -> Result<JsValue, JsValue> {
    let words: Vec<String> = serde_wasm_bindgen::from_value(words)
        .map_err(|e| OverlayError::Serialization(e.to_string()))?;
    let index = TermIndex::from_words(words);
    let segments = segment_text(text, &index);
    serde_wasm_bindgen::to_value(&segments)
        .map_err(|e| OverlayError::Serialization(e.to_string()).into())
}
