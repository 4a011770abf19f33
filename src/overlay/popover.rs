//! PopoverController - the single click-to-inspect popover
//!
//! At most one popover is open. Opening always tears down the previous one
//! first; there is no stacking. Placement runs in host coordinates (see
//! `bridge`), content comes from the vocabulary snapshot by normalized word.

use serde::Serialize;

use crate::config::PopoverConfig;
use crate::console;
use crate::overlay::bridge::HostGeometry;
use crate::overlay::surface::Rect;
use crate::overlay::vocab::{normalize_word, VocabularySnapshot, VocabularyStore};

// =============================================================================
// Placement
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlacementMode {
    /// Top edge under the span
    Below,
    /// Flipped: bottom edge over the span
    Above,
    /// Narrow viewport: centered, anchor ignored
    Centered,
}

/// Popover box in host coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Placement {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
    pub mode: PlacementMode,
}

impl Placement {
    pub fn right(&self) -> f64 {
        self.left + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }
}

/// Compute where the popover goes
pub fn place(geometry: &HostGeometry, config: &PopoverConfig) -> Placement {
    let viewport = geometry.viewport;
    let margin = config.viewport_margin;

    if viewport.width < config.mobile_breakpoint {
        let width = config.popover_width.min((viewport.width - 2.0 * margin).max(0.0));
        let height = config.popover_height;
        return Placement {
            left: ((viewport.width - width) / 2.0).max(0.0),
            top: ((viewport.height - height) / 2.0).max(0.0),
            width,
            height,
            mode: PlacementMode::Centered,
        };
    }

    let anchor = geometry.anchor;
    let height = config.popover_height;
    // Room between the left margin and the reserved strip on the right
    let usable_right = viewport.width - geometry.reserved_right - margin;
    let width = config
        .popover_width
        .min((usable_right - margin).max(0.0));

    let below = anchor.bottom() + config.anchor_gap;
    let (top, mode) = if below + height > viewport.height {
        let above = anchor.top - config.anchor_gap - height;
        (above.max(margin), PlacementMode::Above)
    } else {
        (below, PlacementMode::Below)
    };

    let left = anchor.left.min(usable_right - width).max(margin);

    Placement { left, top, width, height, mode }
}

// =============================================================================
// Content
// =============================================================================

/// What the popover shows
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PopoverContent {
    /// Normalized word (store key)
    pub word: String,
    /// Word as saved, or the key when no record exists
    pub display_word: String,
    /// Saved explanation or the configured placeholder
    pub explanation: String,
    pub has_explanation: bool,
    pub context: Option<String>,
    /// `YYYY-MM-DD` of when the word was saved
    pub added_label: Option<String>,
}

impl PopoverContent {
    /// Look `word` up in the snapshot; a missing record is not an error
    pub fn resolve(word: &str, snapshot: &VocabularySnapshot, config: &PopoverConfig) -> Self {
        let key = normalize_word(word).unwrap_or_default();
        match snapshot.lookup(&key) {
            Some(term) => {
                let explanation = term
                    .explanation
                    .as_deref()
                    .map(str::trim)
                    .filter(|e| !e.is_empty());
                Self {
                    display_word: term.word.trim().to_string(),
                    explanation: explanation
                        .map(str::to_string)
                        .unwrap_or_else(|| config.empty_explanation.clone()),
                    has_explanation: explanation.is_some(),
                    context: term
                        .context
                        .as_deref()
                        .map(str::trim)
                        .filter(|c| !c.is_empty())
                        .map(str::to_string),
                    added_label: term.added_at.map(|t| t.format("%Y-%m-%d").to_string()),
                    word: key,
                }
            }
            None => Self {
                display_word: key.clone(),
                explanation: config.empty_explanation.clone(),
                has_explanation: false,
                context: None,
                added_label: None,
                word: key,
            },
        }
    }
}

// =============================================================================
// State
// =============================================================================

/// Why a popover went away
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DismissReason {
    OutsideClick,
    Explicit,
    AnchorLost,
    Deleted,
    Replaced,
}

/// Renderable popover
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PopoverView {
    pub placement: Placement,
    pub content: PopoverContent,
}

/// The open popover
#[derive(Debug, Clone)]
pub struct PopoverState<N> {
    pub anchor_word: String,
    /// Anchor box in host coordinates
    pub anchor_rect: Rect,
    pub visible: bool,
    pub view: PopoverView,
    anchor: N,
}

impl<N> PopoverState<N> {
    /// The highlight element that was clicked
    pub fn anchor(&self) -> &N {
        &self.anchor
    }
}

// =============================================================================
// PopoverController
// =============================================================================

#[derive(Debug)]
pub struct PopoverController<N> {
    config: PopoverConfig,
    current: Option<PopoverState<N>>,
    opened: u64,
}

impl<N> PopoverController<N> {
    pub fn new(config: PopoverConfig) -> Self {
        Self {
            config,
            current: None,
            opened: 0,
        }
    }

    pub fn config(&self) -> &PopoverConfig {
        &self.config
    }

    pub fn is_open(&self) -> bool {
        self.current.is_some()
    }

    pub fn state(&self) -> Option<&PopoverState<N>> {
        self.current.as_ref()
    }

    /// Total popovers opened so far
    pub fn opened_count(&self) -> u64 {
        self.opened
    }

    /// Open for `word`, replacing any open popover
    pub fn open(
        &mut self,
        word: &str,
        anchor: N,
        geometry: HostGeometry,
        snapshot: &VocabularySnapshot,
    ) -> PopoverView {
        self.close(DismissReason::Replaced);

        let content = PopoverContent::resolve(word, snapshot, &self.config);
        let view = PopoverView {
            placement: place(&geometry, &self.config),
            content,
        };
        console::debug(
            "PopoverController",
            &format!("open {:?} ({:?})", view.content.word, view.placement.mode),
        );

        self.current = Some(PopoverState {
            anchor_word: view.content.word.clone(),
            anchor_rect: geometry.anchor,
            visible: true,
            view: view.clone(),
            anchor,
        });
        self.opened += 1;
        view
    }

    /// Tear down the open popover, if any
    pub fn close(&mut self, reason: DismissReason) -> Option<PopoverState<N>> {
        let mut state = self.current.take()?;
        state.visible = false;
        console::debug(
            "PopoverController",
            &format!("close {:?} ({:?})", state.anchor_word, reason),
        );
        Some(state)
    }

    /// Re-resolve the open popover's content against a newer snapshot.
    /// Returns the view when it changed.
    pub fn refresh(&mut self, snapshot: &VocabularySnapshot) -> Option<&PopoverView> {
        let state = self.current.as_mut()?;
        let content = PopoverContent::resolve(&state.anchor_word, snapshot, &self.config);
        if content == state.view.content {
            return None;
        }
        state.view.content = content;
        Some(&state.view)
    }

    /// Remove the open popover's word from the store and close.
    /// Returns the removed word.
    pub fn delete(&mut self, store: &mut dyn VocabularyStore) -> Option<String> {
        let state = self.close(DismissReason::Deleted)?;
        if !store.remove_term(&state.anchor_word) {
            console::warn(
                "PopoverController",
                &format!("{:?} was not in the store", state.anchor_word),
            );
        }
        Some(state.anchor_word)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overlay::surface::Viewport;
    use crate::overlay::vocab::{MemoryVocabulary, Term};
    use chrono::{TimeZone, Utc};

    fn geometry(anchor: Rect, width: f64, height: f64, reserved: f64) -> HostGeometry {
        HostGeometry {
            anchor,
            viewport: Viewport::new(width, height),
            reserved_right: reserved,
        }
    }

    #[test]
    fn test_places_below_span() {
        let config = PopoverConfig::default();
        let p = place(&geometry(Rect::new(100.0, 100.0, 40.0, 20.0), 1280.0, 800.0, 0.0), &config);
        assert_eq!(p.mode, PlacementMode::Below);
        assert_eq!(p.top, 126.0);
        assert_eq!(p.left, 100.0);
    }

    #[test]
    fn test_flips_above_near_bottom() {
        let config = PopoverConfig::default();
        let p = place(&geometry(Rect::new(100.0, 700.0, 40.0, 20.0), 1280.0, 800.0, 0.0), &config);
        assert_eq!(p.mode, PlacementMode::Above);
        assert_eq!(p.bottom(), 694.0);
    }

    #[test]
    fn test_flip_clamps_to_top_margin() {
        let config = PopoverConfig::default();
        // 200px tall viewport: neither side fits
        let p = place(&geometry(Rect::new(100.0, 60.0, 40.0, 20.0), 1280.0, 200.0, 0.0), &config);
        assert_eq!(p.mode, PlacementMode::Above);
        assert_eq!(p.top, 8.0);
    }

    #[test]
    fn test_clamps_left_of_side_panel() {
        let mut config = PopoverConfig::default();
        config.mobile_breakpoint = 600.0;
        for x in [0.0, 300.0, 460.0, 700.0, 790.0] {
            let p = place(&geometry(Rect::new(x, 100.0, 40.0, 20.0), 800.0, 600.0, 320.0), &config);
            assert!(p.right() <= 800.0 - 320.0 - 8.0, "right {} at x {}", p.right(), x);
            assert!(p.left >= 8.0, "left {} at x {}", p.left, x);
        }
    }

    #[test]
    fn test_shrinks_when_space_is_tight() {
        let mut config = PopoverConfig::default();
        config.mobile_breakpoint = 0.0;
        let p = place(&geometry(Rect::new(50.0, 10.0, 40.0, 20.0), 500.0, 600.0, 300.0), &config);
        assert_eq!(p.width, 184.0);
        assert_eq!(p.left, 8.0);
        assert_eq!(p.right(), 192.0);
    }

    #[test]
    fn test_mobile_centers() {
        let config = PopoverConfig::default();
        let p = place(&geometry(Rect::new(5.0, 5.0, 40.0, 20.0), 400.0, 700.0, 0.0), &config);
        assert_eq!(p.mode, PlacementMode::Centered);
        assert_eq!(p.width, 320.0);
        assert_eq!(p.left, 40.0);
        assert_eq!(p.top, 260.0);
    }

    #[test]
    fn test_content_from_record() {
        let added = Utc.with_ymd_and_hms(2024, 3, 9, 12, 0, 0).unwrap();
        let snap = VocabularySnapshot::new(vec![Term::new("Ubiquitous")
            .with_explanation(" found everywhere ")
            .with_context("It was ubiquitous.")
            .with_added_at(added)]);
        let content = PopoverContent::resolve("UBIQUITOUS", &snap, &PopoverConfig::default());
        assert_eq!(content.word, "ubiquitous");
        assert_eq!(content.display_word, "Ubiquitous");
        assert_eq!(content.explanation, "found everywhere");
        assert!(content.has_explanation);
        assert_eq!(content.added_label.as_deref(), Some("2024-03-09"));
    }

    #[test]
    fn test_content_falls_back_to_placeholder() {
        let config = PopoverConfig::default();
        let snap = VocabularySnapshot::new(vec![Term::new("cat").with_explanation("  ")]);
        let blank = PopoverContent::resolve("cat", &snap, &config);
        assert!(!blank.has_explanation);
        assert_eq!(blank.explanation, "No explanation saved");

        let missing = PopoverContent::resolve("dog", &VocabularySnapshot::default(), &config);
        assert_eq!(missing.display_word, "dog");
        assert_eq!(missing.explanation, "No explanation saved");
    }

    #[test]
    fn test_open_replaces_previous() {
        let mut controller: PopoverController<u32> = PopoverController::new(PopoverConfig::default());
        let snap = VocabularySnapshot::default();
        let g = geometry(Rect::new(10.0, 10.0, 10.0, 10.0), 1280.0, 800.0, 0.0);
        controller.open("cat", 1, g, &snap);
        controller.open("dog", 2, g, &snap);
        assert_eq!(controller.opened_count(), 2);
        let state = controller.state().unwrap();
        assert_eq!(state.anchor_word, "dog");
        assert_eq!(*state.anchor(), 2);
        assert!(state.visible);
    }

    #[test]
    fn test_close_is_idempotent() {
        let mut controller: PopoverController<u32> = PopoverController::new(PopoverConfig::default());
        let g = geometry(Rect::default(), 1280.0, 800.0, 0.0);
        controller.open("cat", 1, g, &VocabularySnapshot::default());
        let closed = controller.close(DismissReason::Explicit).unwrap();
        assert!(!closed.visible);
        assert!(controller.close(DismissReason::Explicit).is_none());
        assert!(!controller.is_open());
    }

    #[test]
    fn test_delete_removes_from_store_and_closes() {
        let mut store = MemoryVocabulary::with_terms(vec![Term::new("Cat"), Term::new("dog")]);
        let mut controller: PopoverController<u32> = PopoverController::new(PopoverConfig::default());
        let g = geometry(Rect::default(), 1280.0, 800.0, 0.0);
        controller.open("CAT", 7, g, &store.snapshot());

        assert_eq!(controller.delete(&mut store).as_deref(), Some("cat"));
        assert!(!controller.is_open());
        assert_eq!(store.len(), 1);
        assert!(controller.delete(&mut store).is_none());
    }
}
