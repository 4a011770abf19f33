//! Browser bindings: a `DocumentSurface` over `web_sys` and the `WordOverlay`
//! JS class.
//!
//! The content document lives in the reader's iframe; the popover is drawn
//! by the host page through the `onPopover` callback. Vocabulary stays in JS:
//! `setVocabulary` pushes snapshots in, `onRemoveTerm` carries deletions out.

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::rc::{Rc, Weak};

use serde::Serialize;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{Document, Element, Event, Node, Window};

use crate::config::OverlayConfig;
use crate::console;
use crate::error::OverlayError;
use crate::overlay::bridge::HostSurface;
use crate::overlay::engine::OverlayEngine;
use crate::overlay::popover::{DismissReason, PopoverView};
use crate::overlay::segment::Segment;
use crate::overlay::surface::{
    DocumentKey, DocumentSurface, HighlightMarkup, ListenerId, NodeType, Rect, Viewport,
};
use crate::overlay::vocab::{
    normalize_word, terms_from_records, Term, VocabularySnapshot, VocabularyStore,
};

static NEXT_WEB_DOCUMENT: std::sync::atomic::AtomicU64 = std::sync::atomic::AtomicU64::new(1);

fn now_ms() -> f64 {
    js_sys::Date::now()
}

/// Plain objects instead of ES `Map`s for map-typed fields
fn to_js<T: Serialize>(value: &T) -> Option<JsValue> {
    value
        .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
        .ok()
}

fn to_rect(r: &web_sys::DomRect) -> Rect {
    Rect::new(r.x(), r.y(), r.width(), r.height())
}

// =============================================================================
// WebDocument
// =============================================================================

type ClickCallback = Rc<dyn Fn(Node)>;
type ClickClosure = Closure<dyn FnMut(Event)>;

/// Content document of the reader frame
pub struct WebDocument {
    key: DocumentKey,
    document: Document,
    /// One handler for the document's lifetime; bind/unbind only toggle
    /// its registration
    click: ClickClosure,
    listeners: BTreeSet<ListenerId>,
    next_listener: u64,
}

impl WebDocument {
    pub fn new(document: Document, on_click: ClickCallback) -> Self {
        let click: ClickClosure = Closure::wrap(Box::new(move |event: Event| {
            if let Some(target) = event.target().and_then(|t| t.dyn_into::<Node>().ok()) {
                on_click(target);
            }
        }) as Box<dyn FnMut(Event)>);
        Self {
            key: DocumentKey(NEXT_WEB_DOCUMENT.fetch_add(1, std::sync::atomic::Ordering::Relaxed)),
            document,
            click,
            listeners: BTreeSet::new(),
            next_listener: 1,
        }
    }

    pub fn document(&self) -> &Document {
        &self.document
    }
}

impl DocumentSurface for WebDocument {
    type Node = Node;

    fn key(&self) -> DocumentKey {
        self.key
    }

    fn root(&self) -> Option<Node> {
        // A document whose frame was removed has no window
        self.document.default_view()?;
        self.document.body().map(|b| b.unchecked_into::<Node>())
    }

    fn first_child(&self, node: &Node) -> Option<Node> {
        node.first_child()
    }

    fn next_sibling(&self, node: &Node) -> Option<Node> {
        node.next_sibling()
    }

    fn parent(&self, node: &Node) -> Option<Node> {
        node.parent_node()
    }

    fn node_type(&self, node: &Node) -> NodeType {
        match node.node_type() {
            Node::ELEMENT_NODE => NodeType::Element(node.node_name().to_ascii_lowercase()),
            Node::TEXT_NODE => NodeType::Text,
            _ => NodeType::Other,
        }
    }

    fn attribute(&self, node: &Node, name: &str) -> Option<String> {
        node.dyn_ref::<Element>()?.get_attribute(name)
    }

    fn text_content(&self, node: &Node) -> String {
        node.text_content().unwrap_or_default()
    }

    fn is_attached(&self, node: &Node) -> bool {
        node.is_connected() && self.document.contains(Some(node))
    }

    fn replace_with_segments(
        &mut self,
        node: &Node,
        segments: &[Segment<'_>],
        markup: &HighlightMarkup,
    ) {
        let Some(parent) = node.parent_node() else {
            return;
        };
        let fragment = self.document.create_document_fragment();
        for segment in segments {
            let child: Result<Node, JsValue> = match segment {
                Segment::Plain { text } => Ok(self.document.create_text_node(text).into()),
                Segment::Match { text, word } => {
                    self.document.create_element(&markup.tag).and_then(|el| {
                        el.set_class_name(&markup.class);
                        el.set_attribute(&markup.word_attribute, word)?;
                        el.set_text_content(Some(text));
                        Ok(el.into())
                    })
                }
            };
            if let Err(e) = child.and_then(|c| fragment.append_child(&c)) {
                console::warn("WebDocument", &format!("segment build failed: {:?}", e));
                return;
            }
        }
        if let Err(e) = parent.replace_child(&fragment, node) {
            console::warn("WebDocument", &format!("replace failed: {:?}", e));
        }
    }

    fn replace_with_text(&mut self, node: &Node, text: &str) {
        let Some(parent) = node.parent_node() else {
            return;
        };
        let replacement = self.document.create_text_node(text);
        if let Err(e) = parent.replace_child(&replacement, node) {
            console::warn("WebDocument", &format!("unwrap failed: {:?}", e));
        }
    }

    fn normalize(&mut self, node: &Node) {
        node.normalize();
    }

    fn bounding_rect(&self, node: &Node) -> Option<Rect> {
        let element = node.dyn_ref::<Element>()?;
        Some(to_rect(&element.get_bounding_client_rect()))
    }

    fn bind_click(&mut self) -> ListenerId {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        if self.listeners.is_empty() {
            if let Err(e) = self
                .document
                .add_event_listener_with_callback("click", self.click.as_ref().unchecked_ref())
            {
                console::warn("WebDocument", &format!("addEventListener failed: {:?}", e));
            }
        }
        self.listeners.insert(id);
        id
    }

    fn unbind_click(&mut self, id: ListenerId) {
        if self.listeners.remove(&id) && self.listeners.is_empty() {
            let _ = self
                .document
                .remove_event_listener_with_callback("click", self.click.as_ref().unchecked_ref());
        }
    }
}

// =============================================================================
// WebHost
// =============================================================================

/// The page that hosts the reader frame
pub struct WebHost {
    window: Window,
    frame: Element,
    side_panel_selector: String,
}

impl HostSurface for WebHost {
    fn viewport(&self) -> Viewport {
        let width = self.window.inner_width().ok().and_then(|v| v.as_f64()).unwrap_or(0.0);
        let height = self.window.inner_height().ok().and_then(|v| v.as_f64()).unwrap_or(0.0);
        Viewport::new(width, height)
    }

    fn frame_rect(&self) -> Option<Rect> {
        if !self.frame.is_connected() {
            return None;
        }
        Some(to_rect(&self.frame.get_bounding_client_rect()))
    }

    fn side_panel_width(&self) -> f64 {
        let Some(document) = self.window.document() else {
            return 0.0;
        };
        let Ok(panels) = document.query_selector_all(&self.side_panel_selector) else {
            return 0.0;
        };
        (0..panels.length())
            .filter_map(|i| panels.item(i))
            .filter_map(|n| n.dyn_into::<Element>().ok())
            .map(|el| el.get_bounding_client_rect().width())
            .fold(0.0, f64::max)
    }
}

// =============================================================================
// JsVocabulary
// =============================================================================

/// Local copy of the JS store's terms. Removals are queued and handed to
/// `onRemoveTerm` once the overlay state is no longer borrowed.
#[derive(Default)]
struct JsVocabulary {
    terms: Vec<Term>,
    removed: Vec<String>,
    revision: u64,
}

impl VocabularyStore for JsVocabulary {
    fn snapshot(&self) -> VocabularySnapshot {
        VocabularySnapshot::new(self.terms.clone())
    }

    fn remove_term(&mut self, word: &str) -> bool {
        let Some(key) = normalize_word(word) else {
            return false;
        };
        let before = self.terms.len();
        self.terms.retain(|t| t.key().as_deref() != Some(key.as_str()));
        let removed = self.terms.len() != before;
        if removed {
            self.removed.push(key);
            self.revision += 1;
        }
        removed
    }

    fn revision(&self) -> u64 {
        self.revision
    }
}

// =============================================================================
// WordOverlay
// =============================================================================

struct Shared {
    engine: OverlayEngine<WebDocument>,
    host: Option<WebHost>,
    /// Last detached document, kept until the next swap so its click
    /// handler outlives a callback that detached it
    retired: Option<WebDocument>,
    vocabulary: JsVocabulary,
    on_remove: Option<js_sys::Function>,
    on_popover: Option<js_sys::Function>,
    /// Created once and reused by every `setTimeout`
    tick: Option<Closure<dyn FnMut()>>,
    timer: Option<i32>,
}

impl Shared {
    fn view(&self) -> Option<PopoverView> {
        self.engine.popover().map(|state| state.view.clone())
    }
}

/// JS calls owed after a state change. Delivered with `shared` unborrowed,
/// so callbacks may call back into the overlay.
#[derive(Default)]
struct Outbox {
    removed: Vec<String>,
    popover: Option<Option<PopoverView>>,
}

impl Outbox {
    fn popover_change(before: Option<PopoverView>, after: Option<PopoverView>) -> Self {
        Self {
            removed: Vec::new(),
            popover: (before != after).then_some(after),
        }
    }

    fn deliver(self, shared: &Rc<RefCell<Shared>>) {
        let (on_remove, on_popover) = {
            let s = shared.borrow();
            (s.on_remove.clone(), s.on_popover.clone())
        };
        if let Some(callback) = on_remove {
            for word in &self.removed {
                if let Err(e) = callback.call1(&JsValue::NULL, &JsValue::from_str(word)) {
                    console::warn("WordOverlay", &format!("onRemoveTerm threw: {:?}", e));
                }
            }
        }
        if let (Some(callback), Some(view)) = (on_popover, self.popover) {
            let value = view.as_ref().and_then(to_js).unwrap_or(JsValue::NULL);
            if let Err(e) = callback.call1(&JsValue::NULL, &value) {
                console::warn("WordOverlay", &format!("onPopover threw: {:?}", e));
            }
        }
    }
}

/// Saved-word overlay for one reader view
#[wasm_bindgen]
pub struct WordOverlay {
    shared: Rc<RefCell<Shared>>,
}

#[wasm_bindgen]
impl WordOverlay {
    /// Create an overlay. `config` is a partial `OverlayConfig` or undefined.
    #[wasm_bindgen(constructor)]
    pub fn new(config: JsValue) -> Result<WordOverlay, JsValue> {
        let config: OverlayConfig = if config.is_undefined() || config.is_null() {
            OverlayConfig::default()
        } else {
            let config: OverlayConfig = serde_wasm_bindgen::from_value(config)
                .map_err(|e| OverlayError::Config(e.to_string()))?;
            config.validate()?;
            config
        };
        let shared = Rc::new(RefCell::new(Shared {
            engine: OverlayEngine::new(config),
            host: None,
            retired: None,
            vocabulary: JsVocabulary::default(),
            on_remove: None,
            on_popover: None,
            tick: None,
            timer: None,
        }));

        let weak = Rc::downgrade(&shared);
        let tick = Closure::wrap(Box::new(move || timer_fired(&weak)) as Box<dyn FnMut()>);
        shared.borrow_mut().tick = Some(tick);
        Ok(WordOverlay { shared })
    }

    /// Called with the normalized word when the user deletes it
    #[wasm_bindgen(js_name = onRemoveTerm)]
    pub fn on_remove_term(&self, callback: js_sys::Function) {
        self.shared.borrow_mut().on_remove = Some(callback);
    }

    /// Called with a popover view, or null when the popover closes
    #[wasm_bindgen(js_name = onPopover)]
    pub fn on_popover(&self, callback: js_sys::Function) {
        self.shared.borrow_mut().on_popover = Some(callback);
    }

    /// Replace the term snapshot. Expects an array of `{ word, explanation?,
    /// context?, addedAt? }`; records that do not fit are skipped.
    #[wasm_bindgen(js_name = setVocabulary)]
    pub fn set_vocabulary(&self, terms: JsValue) -> Result<(), JsValue> {
        let records: Vec<serde_json::Value> = serde_wasm_bindgen::from_value(terms)
            .map_err(|e| OverlayError::Serialization(e.to_string()))?;
        let terms = terms_from_records(records);
        let outbox = {
            let mut s = self.shared.borrow_mut();
            let before = s.view();
            s.vocabulary.terms = terms.clone();
            s.engine.set_vocabulary(VocabularySnapshot::new(terms), now_ms());
            Outbox::popover_change(before, s.view())
        };
        outbox.deliver(&self.shared);
        Ok(())
    }

    /// Attach the frame's content document. `frame` is the iframe element
    /// in the host page.
    pub fn attach(&self, document: Document, frame: Element) -> Result<(), JsValue> {
        let window = web_sys::window().ok_or(OverlayError::DocumentUnavailable)?;
        let weak = Rc::downgrade(&self.shared);
        let on_click: ClickCallback = Rc::new(move |target: Node| handle_click(&weak, target));
        let outbox = {
            let mut s = self.shared.borrow_mut();
            let before = s.view();
            let selector = s.engine.config().side_panel_selector.clone();
            s.host = Some(WebHost {
                window,
                frame,
                side_panel_selector: selector,
            });
            if let Some(previous) = s.engine.attach(WebDocument::new(document, on_click), now_ms()) {
                s.retired = Some(previous);
            }
            Outbox::popover_change(before, s.view())
        };
        arm_timer(&self.shared);
        outbox.deliver(&self.shared);
        Ok(())
    }

    /// Release the current document
    pub fn detach(&self) {
        let outbox = {
            let mut s = self.shared.borrow_mut();
            let before = s.view();
            if let Some(previous) = s.engine.detach() {
                s.retired = Some(previous);
            }
            s.host = None;
            Outbox::popover_change(before, s.view())
        };
        clear_timer(&self.shared);
        outbox.deliver(&self.shared);
    }

    /// The renderer repaginated or navigated
    pub fn relocated(&self) {
        self.shared.borrow_mut().engine.relocated(now_ms());
        arm_timer(&self.shared);
    }

    /// Delete the word shown in the popover
    #[wasm_bindgen(js_name = deleteActive)]
    pub fn delete_active(&self) -> Option<String> {
        let (removed, outbox) = {
            let mut guard = self.shared.borrow_mut();
            let s = &mut *guard;
            let before = s.view();
            let removed = s.engine.delete_active(&mut s.vocabulary, now_ms());
            let mut outbox = Outbox::popover_change(before, s.view());
            outbox.removed = std::mem::take(&mut s.vocabulary.removed);
            (removed, outbox)
        };
        outbox.deliver(&self.shared);
        removed
    }

    /// Close the popover (host-side outside click, close button)
    pub fn dismiss(&self) -> bool {
        let (closed, outbox) = {
            let mut s = self.shared.borrow_mut();
            let before = s.view();
            let closed = s.engine.dismiss(DismissReason::Explicit);
            (closed, Outbox::popover_change(before, s.view()))
        };
        outbox.deliver(&self.shared);
        closed
    }

    /// View of the open popover, or null
    #[wasm_bindgen(js_name = clickedPopover)]
    pub fn clicked_popover(&self) -> JsValue {
        self.shared
            .borrow()
            .view()
            .as_ref()
            .and_then(to_js)
            .unwrap_or(JsValue::NULL)
    }

    /// Last reconciliation report, or null
    #[wasm_bindgen(js_name = lastReport)]
    pub fn last_report(&self) -> JsValue {
        let s = self.shared.borrow();
        s.engine
            .last_report()
            .and_then(to_js)
            .unwrap_or(JsValue::NULL)
    }
}

impl Drop for WordOverlay {
    fn drop(&mut self) {
        clear_timer(&self.shared);
    }
}

fn handle_click(shared: &Weak<RefCell<Shared>>, target: Node) {
    let Some(shared) = shared.upgrade() else {
        return;
    };
    let outbox = {
        let mut guard = shared.borrow_mut();
        let s = &mut *guard;
        let before = s.view();
        let opened = match s.host.as_ref() {
            Some(host) => s.engine.click(&target, host),
            None => None,
        };
        match opened {
            // Reopening on the same word still redraws
            Some(view) => Outbox {
                removed: Vec::new(),
                popover: Some(Some(view)),
            },
            None => Outbox::popover_change(before, s.view()),
        }
    };
    outbox.deliver(&shared);
}

/// The browser timer is authoritative: `Date.now()` may be coarsened, so
/// the pending pass runs even if the engine's clock says it is early.
fn timer_fired(shared: &Weak<RefCell<Shared>>) {
    let Some(shared) = shared.upgrade() else {
        return;
    };
    let outbox = {
        let mut s = shared.borrow_mut();
        s.timer = None;
        let before = s.view();
        s.engine.run_pending();
        Outbox::popover_change(before, s.view())
    };
    outbox.deliver(&shared);
}

/// (Re)start the browser timer for the pending pass
fn arm_timer(shared: &Rc<RefCell<Shared>>) {
    clear_timer(shared);
    let Some(window) = web_sys::window() else {
        return;
    };
    let scheduled = {
        let s = shared.borrow();
        match (s.engine.scheduler().due_ms(), s.tick.as_ref()) {
            (Some(due), Some(tick)) => {
                let delay = (due - now_ms()).max(0.0).ceil() as i32;
                Some(window.set_timeout_with_callback_and_timeout_and_arguments_0(
                    tick.as_ref().unchecked_ref(),
                    delay,
                ))
            }
            _ => None,
        }
    };
    match scheduled {
        Some(Ok(handle)) => shared.borrow_mut().timer = Some(handle),
        Some(Err(e)) => console::warn("WordOverlay", &format!("setTimeout failed: {:?}", e)),
        None => {}
    }
}

fn clear_timer(shared: &Rc<RefCell<Shared>>) {
    let timer = shared.borrow_mut().timer.take();
    if let (Some(handle), Some(window)) = (timer, web_sys::window()) {
        window.clear_timeout_with_handle(handle);
    }
}
