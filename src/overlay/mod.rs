//! Vocabulary highlight overlay
//!
//! Leaves first:
//! - `vocab.rs` - Term, VocabularySnapshot, VocabularyStore
//! - `terms.rs` - TermIndex: whole-word, case-insensitive matcher
//! - `segment.rs` - pure text -> plain/match segments
//! - `surface.rs` - DocumentSurface adapter trait, geometry
//! - `arena.rs` - ArenaDocument: in-memory DocumentSurface
//! - `scanner.rs` - DocumentScanner: lazy text-run walk with skip rules
//! - `reconciler.rs` - HighlightReconciler: clear-then-apply passes
//! - `bridge.rs` - CrossSurfaceBridge: content -> host coordinates
//! - `popover.rs` - PopoverController: placement, content, lifecycle
//! - `scheduler.rs` - ReconciliationScheduler, Debounce, ListenerRegistry
//! - `engine.rs` - OverlayEngine: the above driven by host events

pub mod vocab;
pub mod terms;
pub mod segment;
pub mod surface;
pub mod arena;
pub mod scanner;
pub mod reconciler;
pub mod bridge;
pub mod popover;
pub mod scheduler;
pub mod engine;

pub use vocab::*;
pub use terms::*;
pub use segment::*;
pub use surface::*;
pub use arena::*;
pub use scanner::*;
pub use reconciler::*;
pub use bridge::*;
pub use popover::*;
pub use scheduler::*;
pub use engine::*;

#[cfg(test)]
mod tests;
