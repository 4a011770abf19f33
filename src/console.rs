//! Console logging for the overlay
//!
//! Messages go to the browser console with a `[Component]` prefix. Native
//! builds (tests, tooling) compile these to nothing.

/// Debug-level message
#[allow(unused_variables)]
pub fn debug(component: &str, msg: &str) {
    #[cfg(target_arch = "wasm32")]
    web_sys::console::debug_1(&wasm_bindgen::JsValue::from_str(&format!(
        "[{}] {}",
        component, msg
    )));
}

/// Warning-level message
#[allow(unused_variables)]
pub fn warn(component: &str, msg: &str) {
    #[cfg(target_arch = "wasm32")]
    web_sys::console::warn_1(&wasm_bindgen::JsValue::from_str(&format!(
        "[{}] {}",
        component, msg
    )));
}
