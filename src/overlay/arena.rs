//! ArenaDocument - in-memory DocumentSurface
//!
//! A small element/text tree stored in a `Vec`, with deterministic
//! serialization (`to_markup`) and a monospace layout grid for geometry.
//! Native hosts and tests drive the overlay through it.
//!
//! Slots released by a replace or normalize go on a free list and are
//! reused, so repeated passes do not grow the arena. Each slot carries a
//! generation; a `NodeId` kept across a release goes stale instead of
//! aliasing whatever reuses its slot.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::overlay::segment::Segment;
use crate::overlay::surface::{
    DocumentKey, DocumentSurface, HighlightMarkup, ListenerId, NodeType, Rect,
};

static NEXT_DOCUMENT_KEY: AtomicU64 = AtomicU64::new(1);

/// Width of one character cell in the layout grid
pub const CHAR_WIDTH: f64 = 8.0;
/// Height of one line in the layout grid
pub const LINE_HEIGHT: f64 = 20.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    index: usize,
    generation: u32,
}

#[derive(Debug, Clone)]
enum NodeData {
    Element {
        tag: String,
        attrs: Vec<(String, String)>,
    },
    Text(String),
}

#[derive(Debug, Clone)]
struct ArenaNode {
    data: NodeData,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    generation: u32,
}

/// Markup walk step
enum Emit {
    Open(NodeId),
    Close(NodeId),
}

/// In-memory document
#[derive(Debug)]
pub struct ArenaDocument {
    key: DocumentKey,
    nodes: Vec<ArenaNode>,
    free: Vec<usize>,
    root: NodeId,
    torn_down: bool,
    page_width: f64,
    rect_overrides: HashMap<NodeId, Rect>,
    listeners: BTreeSet<ListenerId>,
    next_listener: u64,
}

impl Default for ArenaDocument {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Building
// =============================================================================

impl ArenaDocument {
    /// Empty document with a `<body>` root
    pub fn new() -> Self {
        let root = ArenaNode {
            data: NodeData::Element {
                tag: "body".to_string(),
                attrs: Vec::new(),
            },
            parent: None,
            children: Vec::new(),
            generation: 0,
        };
        Self {
            key: DocumentKey(NEXT_DOCUMENT_KEY.fetch_add(1, Ordering::Relaxed)),
            nodes: vec![root],
            free: Vec::new(),
            root: NodeId { index: 0, generation: 0 },
            torn_down: false,
            page_width: 640.0,
            rect_overrides: HashMap::new(),
            listeners: BTreeSet::new(),
            next_listener: 1,
        }
    }

    /// Body element
    pub fn body(&self) -> NodeId {
        self.root
    }

    /// Append an element under `parent`
    pub fn element(&mut self, parent: NodeId, tag: &str) -> NodeId {
        self.element_with(parent, tag, &[])
    }

    /// Append an element with attributes under `parent`
    pub fn element_with(&mut self, parent: NodeId, tag: &str, attrs: &[(&str, &str)]) -> NodeId {
        let data = NodeData::Element {
            tag: tag.to_ascii_lowercase(),
            attrs: attrs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        };
        let id = self.alloc(data);
        self.append(parent, id);
        id
    }

    /// Append a text node under `parent`
    pub fn text(&mut self, parent: NodeId, text: &str) -> NodeId {
        let id = self.alloc(NodeData::Text(text.to_string()));
        self.append(parent, id);
        id
    }

    /// Detach a node and release its subtree
    pub fn remove(&mut self, node: NodeId) {
        if node == self.root {
            return;
        }
        let Some(parent) = self.get(node).and_then(|n| n.parent) else {
            return;
        };
        self.nodes[parent.index].children.retain(|c| *c != node);
        self.release(node);
    }

    /// Simulate the frame being torn down
    pub fn tear_down(&mut self) {
        self.torn_down = true;
    }

    /// Line width used by the layout grid
    pub fn set_page_width(&mut self, width: f64) {
        self.page_width = width.max(CHAR_WIDTH);
    }

    /// Pin a node's box instead of using the layout grid
    pub fn set_rect(&mut self, node: NodeId, rect: Rect) {
        self.rect_overrides.insert(node, rect);
    }

    /// Number of click listeners currently bound
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Nodes currently in use
    pub fn node_count(&self) -> usize {
        self.nodes.len() - self.free.len()
    }

    /// Allocated slots, in use or free
    pub fn slot_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn children(&self, node: NodeId) -> &[NodeId] {
        self.get(node).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    fn get(&self, id: NodeId) -> Option<&ArenaNode> {
        self.nodes
            .get(id.index)
            .filter(|n| n.generation == id.generation)
    }

    fn alloc(&mut self, data: NodeData) -> NodeId {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.nodes[index];
            slot.data = data;
            return NodeId { index, generation: slot.generation };
        }
        self.nodes.push(ArenaNode {
            data,
            parent: None,
            children: Vec::new(),
            generation: 0,
        });
        NodeId { index: self.nodes.len() - 1, generation: 0 }
    }

    /// Return a detached subtree's slots to the free list
    fn release(&mut self, node: NodeId) {
        let mut stack = vec![node];
        while let Some(id) = stack.pop() {
            if self.get(id).is_none() {
                continue;
            }
            let slot = &mut self.nodes[id.index];
            stack.append(&mut slot.children);
            slot.parent = None;
            slot.data = NodeData::Text(String::new());
            slot.generation = slot.generation.wrapping_add(1);
            self.rect_overrides.remove(&id);
            self.free.push(id.index);
        }
    }

    fn append(&mut self, parent: NodeId, child: NodeId) {
        self.nodes[child.index].parent = Some(parent);
        self.nodes[parent.index].children.push(child);
    }

    fn index_in_parent(&self, node: NodeId) -> Option<(NodeId, usize)> {
        let parent = self.get(node)?.parent?;
        let idx = self.nodes[parent.index]
            .children
            .iter()
            .position(|c| *c == node)?;
        Some((parent, idx))
    }

    /// Put `replacements` where `node` was and release `node`
    fn splice(&mut self, node: NodeId, replacements: Vec<NodeId>) {
        let Some((parent, idx)) = self.index_in_parent(node) else {
            for r in replacements {
                self.release(r);
            }
            return;
        };
        for r in &replacements {
            self.nodes[r.index].parent = Some(parent);
        }
        let _ = self.nodes[parent.index]
            .children
            .splice(idx..=idx, replacements);
        self.release(node);
    }

    /// Merge adjacent text children of one element. Returns the element
    /// children left to visit.
    fn normalize_children(&mut self, node: NodeId) -> Vec<NodeId> {
        let children = std::mem::take(&mut self.nodes[node.index].children);
        let mut merged: Vec<NodeId> = Vec::with_capacity(children.len());
        let mut elements = Vec::new();

        for child in children {
            let text = match &self.nodes[child.index].data {
                NodeData::Text(t) => Some(t.clone()),
                NodeData::Element { .. } => None,
            };
            match text {
                Some(t) if t.is_empty() => self.release(child),
                Some(t) => {
                    let prev_text = merged
                        .last()
                        .copied()
                        .filter(|p| matches!(self.nodes[p.index].data, NodeData::Text(_)));
                    if let Some(prev) = prev_text {
                        if let NodeData::Text(existing) = &mut self.nodes[prev.index].data {
                            existing.push_str(&t);
                        }
                        self.release(child);
                    } else {
                        merged.push(child);
                    }
                }
                None => {
                    elements.push(child);
                    merged.push(child);
                }
            }
        }

        self.nodes[node.index].children = merged;
        elements
    }
}

// =============================================================================
// Serialization
// =============================================================================

impl ArenaDocument {
    /// Deterministic HTML-like serialization of the whole document
    pub fn to_markup(&self) -> String {
        let mut out = String::new();
        let mut stack = vec![Emit::Open(self.root)];
        while let Some(step) = stack.pop() {
            match step {
                Emit::Open(node) => match &self.nodes[node.index].data {
                    NodeData::Text(text) => escape_into(text, false, &mut out),
                    NodeData::Element { tag, attrs } => {
                        out.push('<');
                        out.push_str(tag);
                        for (name, value) in attrs {
                            out.push(' ');
                            out.push_str(name);
                            out.push_str("=\"");
                            escape_into(value, true, &mut out);
                            out.push('"');
                        }
                        out.push('>');
                        stack.push(Emit::Close(node));
                        stack.extend(
                            self.nodes[node.index].children.iter().rev().map(|c| Emit::Open(*c)),
                        );
                    }
                },
                Emit::Close(node) => {
                    if let NodeData::Element { tag, .. } = &self.nodes[node.index].data {
                        out.push_str("</");
                        out.push_str(tag);
                        out.push('>');
                    }
                }
            }
        }
        out
    }

    /// Text content of the whole document
    pub fn body_text(&self) -> String {
        self.text_content(&self.root)
    }

    /// Pre-order walk of the subtree at `node`
    fn preorder(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        let mut stack = vec![node];
        std::iter::from_fn(move || {
            let id = stack.pop()?;
            stack.extend(self.nodes[id.index].children.iter().rev().copied());
            Some(id)
        })
    }

    /// Character offset of `node` within the document's text
    fn text_offset(&self, target: NodeId) -> Option<usize> {
        let mut acc = 0;
        for id in self.preorder(self.root) {
            if id == target {
                return Some(acc);
            }
            if let NodeData::Text(text) = &self.nodes[id.index].data {
                acc += text.chars().count();
            }
        }
        None
    }
}

fn escape_into(text: &str, attribute: bool, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
}

// =============================================================================
// DocumentSurface
// =============================================================================

impl DocumentSurface for ArenaDocument {
    type Node = NodeId;

    fn key(&self) -> DocumentKey {
        self.key
    }

    fn root(&self) -> Option<NodeId> {
        (!self.torn_down).then_some(self.root)
    }

    fn first_child(&self, node: &NodeId) -> Option<NodeId> {
        self.get(*node)?.children.first().copied()
    }

    fn next_sibling(&self, node: &NodeId) -> Option<NodeId> {
        let (parent, idx) = self.index_in_parent(*node)?;
        self.nodes[parent.index].children.get(idx + 1).copied()
    }

    fn parent(&self, node: &NodeId) -> Option<NodeId> {
        self.get(*node)?.parent
    }

    fn node_type(&self, node: &NodeId) -> NodeType {
        match self.get(*node).map(|n| &n.data) {
            Some(NodeData::Element { tag, .. }) => NodeType::Element(tag.clone()),
            Some(NodeData::Text(_)) => NodeType::Text,
            None => NodeType::Other,
        }
    }

    fn attribute(&self, node: &NodeId, name: &str) -> Option<String> {
        match &self.get(*node)?.data {
            NodeData::Element { attrs, .. } => attrs
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.clone()),
            NodeData::Text(_) => None,
        }
    }

    fn text_content(&self, node: &NodeId) -> String {
        if self.get(*node).is_none() {
            return String::new();
        }
        self.preorder(*node)
            .filter_map(|id| match &self.nodes[id.index].data {
                NodeData::Text(text) => Some(text.as_str()),
                NodeData::Element { .. } => None,
            })
            .collect()
    }

    fn is_attached(&self, node: &NodeId) -> bool {
        if self.torn_down || self.get(*node).is_none() {
            return false;
        }
        let mut current = Some(*node);
        while let Some(n) = current {
            if n == self.root {
                return true;
            }
            current = self.nodes[n.index].parent;
        }
        false
    }

    fn replace_with_segments(
        &mut self,
        node: &NodeId,
        segments: &[Segment<'_>],
        markup: &HighlightMarkup,
    ) {
        if self.get(*node).is_none() {
            return;
        }
        let mut replacements = Vec::with_capacity(segments.len());
        for segment in segments {
            match segment {
                Segment::Plain { text } => {
                    replacements.push(self.alloc(NodeData::Text(text.to_string())));
                }
                Segment::Match { text, word } => {
                    let span = self.alloc(NodeData::Element {
                        tag: markup.tag.clone(),
                        attrs: vec![
                            ("class".to_string(), markup.class.clone()),
                            (markup.word_attribute.clone(), word.clone()),
                        ],
                    });
                    let inner = self.alloc(NodeData::Text(text.to_string()));
                    self.append(span, inner);
                    replacements.push(span);
                }
            }
        }
        self.splice(*node, replacements);
    }

    fn replace_with_text(&mut self, node: &NodeId, text: &str) {
        if self.get(*node).is_none() {
            return;
        }
        let replacement = self.alloc(NodeData::Text(text.to_string()));
        self.splice(*node, vec![replacement]);
    }

    fn normalize(&mut self, node: &NodeId) {
        if self.get(*node).is_none() {
            return;
        }
        let mut pending = vec![*node];
        while let Some(id) = pending.pop() {
            if matches!(self.nodes[id.index].data, NodeData::Element { .. }) {
                pending.extend(self.normalize_children(id));
            }
        }
    }

    fn bounding_rect(&self, node: &NodeId) -> Option<Rect> {
        if !self.is_attached(node) {
            return None;
        }
        if let Some(rect) = self.rect_overrides.get(node) {
            return Some(*rect);
        }
        let offset = self.text_offset(*node)? as f64;
        let chars = self.text_content(node).chars().count().max(1) as f64;
        let per_line = (self.page_width / CHAR_WIDTH).floor().max(1.0);
        let line = (offset / per_line).floor();
        let column = offset - line * per_line;
        Some(Rect::new(
            column * CHAR_WIDTH,
            line * LINE_HEIGHT,
            chars * CHAR_WIDTH,
            LINE_HEIGHT,
        ))
    }

    fn bind_click(&mut self) -> ListenerId {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        self.listeners.insert(id);
        id
    }

    fn unbind_click(&mut self, id: ListenerId) {
        self.listeners.remove(&id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> (ArenaDocument, NodeId) {
        let mut doc = ArenaDocument::new();
        let body = doc.body();
        let p = doc.element_with(body, "p", &[("class", "lead")]);
        doc.text(p, "a <cat> & dog");
        (doc, p)
    }

    #[test]
    fn test_markup_serialization() {
        let (doc, _) = sample();
        assert_eq!(
            doc.to_markup(),
            "<body><p class=\"lead\">a &lt;cat&gt; &amp; dog</p></body>"
        );
    }

    #[test]
    fn test_replace_with_segments_and_back() {
        let (mut doc, p) = sample();
        let text_node = doc.children(p)[0];
        let markup = HighlightMarkup::default();
        doc.replace_with_segments(
            &text_node,
            &[
                Segment::Plain { text: "a <" },
                Segment::Match { text: "cat", word: "cat".to_string() },
                Segment::Plain { text: "> & dog" },
            ],
            &markup,
        );
        assert_eq!(doc.children(p).len(), 3);
        assert!(!doc.is_attached(&text_node));

        let span = doc.children(p)[1];
        assert!(doc.is_highlight(&span, &markup));
        assert_eq!(doc.attribute(&span, "data-word").as_deref(), Some("cat"));

        doc.replace_with_text(&span, "cat");
        doc.normalize(&p);
        assert_eq!(doc.children(p).len(), 1);
        assert_eq!(doc.body_text(), "a <cat> & dog");
    }

    #[test]
    fn test_normalize_drops_empty_text() {
        let mut doc = ArenaDocument::new();
        let body = doc.body();
        doc.text(body, "");
        doc.text(body, "x");
        doc.text(body, "");
        doc.normalize(&body);
        assert_eq!(doc.children(body).len(), 1);
    }

    #[test]
    fn test_torn_down_has_no_root() {
        let (mut doc, p) = sample();
        doc.tear_down();
        assert!(doc.root().is_none());
        assert!(!doc.is_attached(&p));
    }

    #[test]
    fn test_layout_grid() {
        let mut doc = ArenaDocument::new();
        doc.set_page_width(80.0); // 10 cells per line
        let body = doc.body();
        doc.text(body, "0123456789ab");
        let span = doc.element(body, "span");
        doc.text(span, "cat");
        // offset 12 -> line 1, column 2
        assert_eq!(
            doc.bounding_rect(&span),
            Some(Rect::new(16.0, 20.0, 24.0, 20.0))
        );
    }

    #[test]
    fn test_listener_bookkeeping() {
        let mut doc = ArenaDocument::new();
        let a = doc.bind_click();
        let b = doc.bind_click();
        assert_ne!(a, b);
        assert_eq!(doc.listener_count(), 2);
        doc.unbind_click(a);
        doc.unbind_click(a);
        assert_eq!(doc.listener_count(), 1);
    }

    #[test]
    fn test_released_slots_are_reused() {
        let (mut doc, p) = sample();
        let markup = HighlightMarkup::default();
        let slots = doc.slot_count();
        for _ in 0..50 {
            let text_node = doc.children(p)[0];
            doc.replace_with_segments(
                &text_node,
                &[
                    Segment::Plain { text: "a <" },
                    Segment::Match { text: "cat", word: "cat".to_string() },
                    Segment::Plain { text: "> & dog" },
                ],
                &markup,
            );
            let span = doc.children(p)[1];
            doc.replace_with_text(&span, "cat");
            doc.normalize(&p);
        }
        assert_eq!(doc.node_count(), 3);
        assert!(doc.slot_count() <= slots + 5);
        assert_eq!(doc.body_text(), "a <cat> & dog");
    }

    #[test]
    fn test_stale_id_does_not_alias_reused_slot() {
        let (mut doc, p) = sample();
        let old = doc.children(p)[0];
        doc.replace_with_text(&old, "fresh");
        let fresh = doc.children(p)[0];
        assert_ne!(old, fresh);
        assert!(!doc.is_attached(&old));
        assert!(doc.is_attached(&fresh));
        assert_eq!(doc.text_content(&old), "");
        assert_eq!(doc.node_type(&old), NodeType::Other);
    }

    #[test]
    fn test_deep_tree_serializes_without_recursion() {
        let mut doc = ArenaDocument::new();
        let mut parent = doc.body();
        for _ in 0..100_000 {
            parent = doc.element(parent, "div");
        }
        doc.text(parent, "cat");
        assert_eq!(doc.body_text(), "cat");
        assert!(doc.to_markup().ends_with("cat</div></div></body>"));
        let body = doc.body();
        doc.normalize(&body);
        assert!(doc.bounding_rect(&parent).is_some());
    }

    #[test]
    fn test_documents_have_distinct_keys() {
        assert_ne!(ArenaDocument::new().key(), ArenaDocument::new().key());
    }
}
