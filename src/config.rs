//! Configuration types and defaults for the highlight overlay

use serde::{Deserialize, Serialize};

use crate::error::OverlayError;

// =============================================================================
// Defaults
// =============================================================================

fn default_debounce_ms() -> f64 { 150.0 }
fn default_highlight_tag() -> String { "span".to_string() }
fn default_highlight_class() -> String { "vocab-highlight".to_string() }
fn default_word_attribute() -> String { "data-word".to_string() }
fn default_anchor_gap() -> f64 { 6.0 }
fn default_viewport_margin() -> f64 { 8.0 }
fn default_mobile_breakpoint() -> f64 { 768.0 }
fn default_popover_width() -> f64 { 320.0 }
fn default_popover_height() -> f64 { 180.0 }
fn default_empty_explanation() -> String { "No explanation saved".to_string() }
fn default_side_panel_selector() -> String { "[data-side-panel]".to_string() }

fn default_excluded_tags() -> Vec<String> {
    ["script", "style", "noscript", "template", "svg", "math"]
        .iter()
        .map(|t| t.to_string())
        .collect()
}

// =============================================================================
// Popover Configuration
// =============================================================================

/// Geometry and copy for the inspector popover
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PopoverConfig {
    /// Distance between the span and the popover edge. Default: 6
    #[serde(default = "default_anchor_gap")]
    pub anchor_gap: f64,
    /// Minimum distance from the viewport edges. Default: 8
    #[serde(default = "default_viewport_margin")]
    pub viewport_margin: f64,
    /// Viewports narrower than this get a centered popover. Default: 768
    #[serde(default = "default_mobile_breakpoint")]
    pub mobile_breakpoint: f64,
    #[serde(default = "default_popover_width")]
    pub popover_width: f64,
    #[serde(default = "default_popover_height")]
    pub popover_height: f64,
    /// Shown when the clicked word has no saved explanation
    #[serde(default = "default_empty_explanation")]
    pub empty_explanation: String,
}

impl Default for PopoverConfig {
    fn default() -> Self {
        Self {
            anchor_gap: default_anchor_gap(),
            viewport_margin: default_viewport_margin(),
            mobile_breakpoint: default_mobile_breakpoint(),
            popover_width: default_popover_width(),
            popover_height: default_popover_height(),
            empty_explanation: default_empty_explanation(),
        }
    }
}

// =============================================================================
// Main Configuration
// =============================================================================

/// Overlay configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlayConfig {
    /// Delay after a relocation before rescanning. Default: 150ms
    #[serde(default = "default_debounce_ms")]
    pub relocation_debounce_ms: f64,
    /// Element used to wrap a highlighted word
    #[serde(default = "default_highlight_tag")]
    pub highlight_tag: String,
    /// Class marking overlay-owned elements
    #[serde(default = "default_highlight_class")]
    pub highlight_class: String,
    /// Attribute carrying the normalized word
    #[serde(default = "default_word_attribute")]
    pub word_attribute: String,
    /// Elements whose subtrees are never scanned
    #[serde(default = "default_excluded_tags")]
    pub excluded_tags: Vec<String>,
    /// Host selector for docked side panels (web only)
    #[serde(default = "default_side_panel_selector")]
    pub side_panel_selector: String,
    #[serde(default)]
    pub popover: PopoverConfig,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            relocation_debounce_ms: default_debounce_ms(),
            highlight_tag: default_highlight_tag(),
            highlight_class: default_highlight_class(),
            word_attribute: default_word_attribute(),
            excluded_tags: default_excluded_tags(),
            side_panel_selector: default_side_panel_selector(),
            popover: PopoverConfig::default(),
        }
    }
}

impl OverlayConfig {
    /// Parse from JSON; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self, OverlayError> {
        let config: OverlayConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would break scanning or placement
    pub fn validate(&self) -> Result<(), OverlayError> {
        if self.highlight_tag.trim().is_empty() {
            return Err(OverlayError::Config("highlight_tag must not be empty".into()));
        }
        if self.highlight_class.trim().is_empty() {
            return Err(OverlayError::Config("highlight_class must not be empty".into()));
        }
        if self.word_attribute.trim().is_empty() {
            return Err(OverlayError::Config("word_attribute must not be empty".into()));
        }
        if self.relocation_debounce_ms < 0.0 {
            return Err(OverlayError::Config(
                "relocation_debounce_ms must be >= 0".into(),
            ));
        }
        if self.popover.popover_width <= 0.0 || self.popover.popover_height <= 0.0 {
            return Err(OverlayError::Config("popover size must be positive".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = OverlayConfig::default();
        assert_eq!(config.relocation_debounce_ms, 150.0);
        assert_eq!(config.popover.anchor_gap, 6.0);
        assert_eq!(config.popover.viewport_margin, 8.0);
        assert!(config.excluded_tags.iter().any(|t| t == "script"));
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config = OverlayConfig::from_json(
            r#"{ "relocation_debounce_ms": 300, "popover": { "mobile_breakpoint": 600 } }"#,
        )
        .unwrap();
        assert_eq!(config.relocation_debounce_ms, 300.0);
        assert_eq!(config.popover.mobile_breakpoint, 600.0);
        assert_eq!(config.popover.anchor_gap, 6.0);
        assert_eq!(config.highlight_class, "vocab-highlight");
    }

    #[test]
    fn test_rejects_empty_class() {
        let err = OverlayConfig::from_json(r#"{ "highlight_class": "  " }"#).unwrap_err();
        assert!(matches!(err, OverlayError::Config(_)));
    }

    #[test]
    fn test_rejects_malformed_json() {
        assert!(OverlayConfig::from_json("{").is_err());
    }
}
