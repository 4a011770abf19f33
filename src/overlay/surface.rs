//! DocumentSurface - the thin adapter between the overlay and a live document
//!
//! Everything the overlay does to a page goes through this trait: walking
//! nodes, swapping a text node for highlight markup, unwrapping it again,
//! measuring a span and owning click-listener registrations. `ArenaDocument`
//! implements it in memory; the wasm32 build implements it over `web_sys`.

use serde::{Deserialize, Serialize};

use crate::config::OverlayConfig;
use crate::overlay::segment::Segment;

// =============================================================================
// Geometry
// =============================================================================

/// Axis-aligned rectangle in CSS pixels
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self { left, top, width, height }
    }

    pub fn right(&self) -> f64 {
        self.left + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }

    /// Same size, shifted by (dx, dy)
    pub fn offset(&self, dx: f64, dy: f64) -> Rect {
        Rect::new(self.left + dx, self.top + dy, self.width, self.height)
    }
}

/// Visible area of the host surface
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

impl Viewport {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

// =============================================================================
// Markup
// =============================================================================

/// How highlight elements are written and recognized
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HighlightMarkup {
    pub tag: String,
    pub class: String,
    pub word_attribute: String,
}

impl HighlightMarkup {
    pub fn from_config(config: &OverlayConfig) -> Self {
        Self {
            tag: config.highlight_tag.to_ascii_lowercase(),
            class: config.highlight_class.clone(),
            word_attribute: config.word_attribute.clone(),
        }
    }
}

impl Default for HighlightMarkup {
    fn default() -> Self {
        Self::from_config(&OverlayConfig::default())
    }
}

/// What a node is, as far as scanning cares
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeType {
    /// Lower-cased tag name
    Element(String),
    Text,
    Other,
}

/// Handle for a registered click listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(pub u64);

/// Identity of a content document. A new page load is a new key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentKey(pub u64);

// =============================================================================
// DocumentSurface
// =============================================================================

pub trait DocumentSurface {
    type Node: Clone + PartialEq + std::fmt::Debug + 'static;

    fn key(&self) -> DocumentKey;

    /// Scan root (the body). None once the document is torn down.
    fn root(&self) -> Option<Self::Node>;

    fn first_child(&self, node: &Self::Node) -> Option<Self::Node>;
    fn next_sibling(&self, node: &Self::Node) -> Option<Self::Node>;
    fn parent(&self, node: &Self::Node) -> Option<Self::Node>;
    fn node_type(&self, node: &Self::Node) -> NodeType;
    fn attribute(&self, node: &Self::Node, name: &str) -> Option<String>;

    /// Concatenated text of the node and its descendants
    fn text_content(&self, node: &Self::Node) -> String;

    /// True while the node is still attached under the root
    fn is_attached(&self, node: &Self::Node) -> bool;

    /// Swap a text node for plain text nodes and highlight elements
    fn replace_with_segments(
        &mut self,
        node: &Self::Node,
        segments: &[Segment<'_>],
        markup: &HighlightMarkup,
    );

    /// Swap any node for a single text node
    fn replace_with_text(&mut self, node: &Self::Node, text: &str);

    /// Merge adjacent text descendants and drop empty ones
    fn normalize(&mut self, node: &Self::Node);

    /// Node box in the content surface's own coordinates
    fn bounding_rect(&self, node: &Self::Node) -> Option<Rect>;

    fn bind_click(&mut self) -> ListenerId;
    fn unbind_click(&mut self, id: ListenerId);

    // ---- provided ----

    fn is_text(&self, node: &Self::Node) -> bool {
        self.node_type(node) == NodeType::Text
    }

    fn tag_name(&self, node: &Self::Node) -> Option<String> {
        match self.node_type(node) {
            NodeType::Element(tag) => Some(tag),
            _ => None,
        }
    }

    fn has_class(&self, node: &Self::Node, class: &str) -> bool {
        self.attribute(node, "class")
            .is_some_and(|c| c.split_whitespace().any(|c| c == class))
    }

    /// Element written by the overlay
    fn is_highlight(&self, node: &Self::Node, markup: &HighlightMarkup) -> bool {
        self.tag_name(node).as_deref() == Some(markup.tag.as_str())
            && self.has_class(node, &markup.class)
    }

    /// Nearest highlight at or above `node`
    fn highlight_ancestor(
        &self,
        node: &Self::Node,
        markup: &HighlightMarkup,
    ) -> Option<Self::Node> {
        let mut current = Some(node.clone());
        while let Some(n) = current {
            if self.is_highlight(&n, markup) {
                return Some(n);
            }
            current = self.parent(&n);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rect_edges() {
        let r = Rect::new(10.0, 20.0, 30.0, 40.0);
        assert_eq!(r.right(), 40.0);
        assert_eq!(r.bottom(), 60.0);
        assert_eq!(r.offset(5.0, -5.0), Rect::new(15.0, 15.0, 30.0, 40.0));
    }

    #[test]
    fn test_markup_from_config() {
        let mut config = OverlayConfig::default();
        config.highlight_tag = "MARK".to_string();
        let markup = HighlightMarkup::from_config(&config);
        assert_eq!(markup.tag, "mark");
        assert_eq!(markup.class, "vocab-highlight");
        assert_eq!(markup.word_attribute, "data-word");
    }
}
