//! DocumentScanner - lazy walk over the text runs of a document
//!
//! The walk is pre-order with no stack: the cursor moves via first child,
//! next sibling and parent, so a `TextRuns` holds nothing but the next node.
//! Exclusion is data (`ScanRegion`), not branching: a node matching any
//! `SkipRule` is not entered.

use std::collections::HashSet;

use crate::config::OverlayConfig;
use crate::overlay::surface::{DocumentSurface, HighlightMarkup, NodeType};

// =============================================================================
// ScanRegion
// =============================================================================

/// One exclusion rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipRule {
    /// Elements with this (lower-case) tag
    Tag(String),
    /// Elements carrying this class
    Class(String),
    /// Elements carrying this attribute at all
    Attribute(String),
}

/// Predicate over subtrees that must not be scanned
#[derive(Debug, Clone, Default)]
pub struct ScanRegion {
    tags: HashSet<String>,
    rules: Vec<SkipRule>,
}

impl ScanRegion {
    pub fn new() -> Self {
        Self::default()
    }

    /// Non-rendering tags from config, plus the overlay's own markup
    pub fn from_config(config: &OverlayConfig) -> Self {
        let markup = HighlightMarkup::from_config(config);
        let mut region = Self::new();
        for tag in &config.excluded_tags {
            region = region.skip(SkipRule::Tag(tag.clone()));
        }
        region.skip(SkipRule::Class(markup.class))
    }

    pub fn skip(mut self, rule: SkipRule) -> Self {
        match rule {
            SkipRule::Tag(tag) => {
                self.tags.insert(tag.to_ascii_lowercase());
            }
            other => self.rules.push(other),
        }
        self
    }

    /// True if `node`'s subtree is outside the region
    pub fn excludes<S: DocumentSurface>(&self, surface: &S, node: &S::Node) -> bool {
        let NodeType::Element(tag) = surface.node_type(node) else {
            return false;
        };
        if self.tags.contains(&tag) {
            return true;
        }
        self.rules.iter().any(|rule| match rule {
            SkipRule::Class(class) => surface.has_class(node, class),
            SkipRule::Attribute(name) => surface.attribute(node, name).is_some(),
            SkipRule::Tag(_) => false,
        })
    }
}

// =============================================================================
// Walk
// =============================================================================

/// What the walk does with a node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visit {
    /// Yield it and continue into its children
    Yield,
    /// Yield it, do not enter
    YieldAndSkip,
    /// Enter without yielding
    Descend,
    /// Neither
    Skip,
}

/// Pre-order walk below a root, driven by a classifier
pub struct Walk<'a, S: DocumentSurface, F> {
    surface: &'a S,
    root: S::Node,
    next: Option<S::Node>,
    classify: F,
}

impl<'a, S, F> Walk<'a, S, F>
where
    S: DocumentSurface,
    F: FnMut(&S, &S::Node) -> Visit,
{
    pub fn new(surface: &'a S, root: S::Node, classify: F) -> Self {
        let next = surface.first_child(&root);
        Self { surface, root, next, classify }
    }

    /// Next node after `node`, optionally entering it
    fn advance(&self, node: &S::Node, enter: bool) -> Option<S::Node> {
        if enter {
            if let Some(child) = self.surface.first_child(node) {
                return Some(child);
            }
        }
        let mut current = node.clone();
        loop {
            if current == self.root {
                return None;
            }
            if let Some(sibling) = self.surface.next_sibling(&current) {
                return Some(sibling);
            }
            current = self.surface.parent(&current)?;
        }
    }
}

impl<'a, S, F> Iterator for Walk<'a, S, F>
where
    S: DocumentSurface,
    F: FnMut(&S, &S::Node) -> Visit,
{
    type Item = S::Node;

    fn next(&mut self) -> Option<S::Node> {
        while let Some(node) = self.next.take() {
            let visit = (self.classify)(self.surface, &node);
            let enter = matches!(visit, Visit::Yield | Visit::Descend);
            self.next = self.advance(&node, enter);
            if matches!(visit, Visit::Yield | Visit::YieldAndSkip) {
                return Some(node);
            }
        }
        None
    }
}

// =============================================================================
// DocumentScanner
// =============================================================================

/// Produces the matchable text runs of a document
#[derive(Debug, Clone)]
pub struct DocumentScanner {
    region: ScanRegion,
    markup: HighlightMarkup,
}

impl DocumentScanner {
    pub fn new(region: ScanRegion, markup: HighlightMarkup) -> Self {
        Self { region, markup }
    }

    pub fn from_config(config: &OverlayConfig) -> Self {
        Self::new(
            ScanRegion::from_config(config),
            HighlightMarkup::from_config(config),
        )
    }

    pub fn region(&self) -> &ScanRegion {
        &self.region
    }

    /// Raw text nodes in document order, outside excluded subtrees.
    ///
    /// Empty when the document has no root. Each call starts over.
    pub fn text_runs<'a, S: DocumentSurface>(
        &'a self,
        surface: &'a S,
    ) -> impl Iterator<Item = S::Node> + 'a {
        let region = &self.region;
        surface.root().into_iter().flat_map(move |root| {
            Walk::new(surface, root, move |s: &S, n: &S::Node| {
                if s.is_text(n) {
                    Visit::YieldAndSkip
                } else if region.excludes(s, n) {
                    Visit::Skip
                } else {
                    Visit::Descend
                }
            })
        })
    }

    /// Highlight elements currently in the document, outermost only
    pub fn highlights<'a, S: DocumentSurface>(
        &'a self,
        surface: &'a S,
    ) -> impl Iterator<Item = S::Node> + 'a {
        let markup = &self.markup;
        surface.root().into_iter().flat_map(move |root| {
            Walk::new(surface, root, move |s: &S, n: &S::Node| {
                if s.is_highlight(n, markup) {
                    Visit::YieldAndSkip
                } else {
                    Visit::Descend
                }
            })
        })
    }
}
