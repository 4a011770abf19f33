//! Error types for the highlight overlay
//!
//! Nothing in the overlay is fatal: engine entry points log these and
//! degrade (missing highlights, empty popover). They surface as values only
//! from the building blocks and at the WASM boundary.

/// Overlay errors
#[derive(Debug, Clone, PartialEq)]
pub enum OverlayError {
    /// A vocabulary word could not be turned into a pattern
    InvalidTerm { word: String, reason: String },
    /// Configuration could not be parsed
    Config(String),
    /// JS <-> Rust value conversion failed
    Serialization(String),
    /// The content document or its frame is gone
    DocumentUnavailable,
}

impl std::fmt::Display for OverlayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OverlayError::InvalidTerm { word, reason } => {
                write!(f, "Invalid term {:?}: {}", word, reason)
            }
            OverlayError::Config(msg) => write!(f, "Config error: {}", msg),
            OverlayError::Serialization(msg) => write!(f, "Serialization error: {}", msg),
            OverlayError::DocumentUnavailable => write!(f, "Content document unavailable"),
        }
    }
}

impl std::error::Error for OverlayError {}

impl From<serde_json::Error> for OverlayError {
    fn from(e: serde_json::Error) -> Self {
        OverlayError::Config(e.to_string())
    }
}

impl From<OverlayError> for wasm_bindgen::JsValue {
    fn from(e: OverlayError) -> Self {
        wasm_bindgen::JsValue::from_str(&e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_invalid_term() {
        let err = OverlayError::InvalidTerm {
            word: "cat".to_string(),
            reason: "too large".to_string(),
        };
        assert_eq!(err.to_string(), "Invalid term \"cat\": too large");
    }

    #[test]
    fn test_json_error_maps_to_config() {
        let err: OverlayError = serde_json::from_str::<u32>("nope").unwrap_err().into();
        assert!(matches!(err, OverlayError::Config(_)));
    }
}
