//! Pure text segmentation: (text run, TermIndex) -> ordered segments
//!
//! This is the whole matching step of a reconciliation pass with no document
//! attached. The reconciler hands the result to a `DocumentSurface`, which
//! turns each `Match` into a highlight element and each `Plain` into a text
//! node.

use serde::Serialize;

use crate::overlay::terms::TermIndex;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Segment<'a> {
    Plain { text: &'a str },
    Match { text: &'a str, word: String },
}

impl<'a> Segment<'a> {
    pub fn text(&self) -> &'a str {
        match self {
            Segment::Plain { text } | Segment::Match { text, .. } => text,
        }
    }

    pub fn is_match(&self) -> bool {
        matches!(self, Segment::Match { .. })
    }
}

/// Split `text` around term occurrences.
///
/// Returns an empty vector when nothing matches, so callers can leave the
/// run untouched. Otherwise the concatenated segment texts equal `text`.
pub fn segment_text<'a>(text: &'a str, index: &TermIndex) -> Vec<Segment<'a>> {
    let mut segments = Vec::new();
    let mut cursor = 0;

    for m in index.find_iter(text) {
        if m.start > cursor {
            segments.push(Segment::Plain {
                text: &text[cursor..m.start],
            });
        }
        segments.push(Segment::Match {
            text: &text[m.start..m.end],
            word: m.word,
        });
        cursor = m.end;
    }

    if segments.is_empty() {
        return segments;
    }
    if cursor < text.len() {
        segments.push(Segment::Plain {
            text: &text[cursor..],
        });
    }
    segments
}
