//! Vocabulary model: saved terms and the store that owns them
//!
//! The overlay never owns vocabulary. It reads a `VocabularySnapshot` per
//! reconciliation pass and calls `VocabularyStore::remove_term` on delete.

use std::collections::BTreeSet;
use std::rc::Rc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::console;

// =============================================================================
// Term
// =============================================================================

/// A saved vocabulary entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Term {
    pub word: String,
    #[serde(default)]
    pub explanation: Option<String>,
    /// Sentence the word was saved from
    #[serde(default)]
    pub context: Option<String>,
    /// Written as RFC 3339. Read from RFC 3339 or epoch milliseconds; an
    /// unreadable value becomes None.
    #[serde(
        default,
        rename = "addedAt",
        alias = "added_at",
        deserialize_with = "lenient_timestamp"
    )]
    pub added_at: Option<DateTime<Utc>>,
}

impl Term {
    pub fn new(word: impl Into<String>) -> Self {
        Self {
            word: word.into(),
            explanation: None,
            context: None,
            added_at: None,
        }
    }

    pub fn with_explanation(mut self, explanation: impl Into<String>) -> Self {
        self.explanation = Some(explanation.into());
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn with_added_at(mut self, added_at: DateTime<Utc>) -> Self {
        self.added_at = Some(added_at);
        self
    }

    /// Identity key, or None for blank words
    pub fn key(&self) -> Option<String> {
        normalize_word(&self.word)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawTimestamp {
    Millis(f64),
    Text(String),
    Other(#[allow(dead_code)] serde::de::IgnoredAny),
}

fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<RawTimestamp>::deserialize(deserializer)?;
    Ok(match raw {
        Some(RawTimestamp::Millis(ms)) if ms.is_finite() => {
            DateTime::from_timestamp_millis(ms as i64)
        }
        Some(RawTimestamp::Text(text)) => {
            let text = text.trim();
            DateTime::parse_from_rfc3339(text)
                .map(|t| t.with_timezone(&Utc))
                .ok()
                .or_else(|| text.parse::<i64>().ok().and_then(DateTime::from_timestamp_millis))
        }
        _ => None,
    })
}

/// Parse loosely typed records, skipping any that are not a term
pub fn terms_from_records(records: Vec<serde_json::Value>) -> Vec<Term> {
    let total = records.len();
    let terms: Vec<Term> = records
        .into_iter()
        .filter_map(|record| serde_json::from_value(record).ok())
        .collect();
    if terms.len() < total {
        console::warn(
            "Vocabulary",
            &format!("skipped {} malformed record(s)", total - terms.len()),
        );
    }
    terms
}

/// Trim and lower-case a word. Blank input has no key.
pub fn normalize_word(word: &str) -> Option<String> {
    let trimmed = word.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_lowercase())
    }
}

// =============================================================================
// VocabularySnapshot
// =============================================================================

/// Immutable view of the term list at one point in time
#[derive(Debug, Clone, Default)]
pub struct VocabularySnapshot {
    terms: Rc<Vec<Term>>,
}

impl VocabularySnapshot {
    pub fn new(terms: Vec<Term>) -> Self {
        Self { terms: Rc::new(terms) }
    }

    pub fn terms(&self) -> &[Term] {
        &self.terms
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Same underlying list (reference identity)
    pub fn ptr_eq(&self, other: &VocabularySnapshot) -> bool {
        Rc::ptr_eq(&self.terms, &other.terms)
    }

    /// Normalized, deduplicated words
    pub fn word_set(&self) -> BTreeSet<String> {
        self.terms.iter().filter_map(Term::key).collect()
    }

    /// Value comparison on word sets; explanation edits do not count
    pub fn same_words(&self, other: &VocabularySnapshot) -> bool {
        self.ptr_eq(other) || self.word_set() == other.word_set()
    }

    /// Case-insensitive lookup. First saved record wins on duplicates.
    pub fn lookup(&self, word: &str) -> Option<&Term> {
        let key = normalize_word(word)?;
        self.terms
            .iter()
            .find(|t| t.key().as_deref() == Some(key.as_str()))
    }
}

impl From<Vec<Term>> for VocabularySnapshot {
    fn from(terms: Vec<Term>) -> Self {
        Self::new(terms)
    }
}

// =============================================================================
// VocabularyStore
// =============================================================================

/// The external owner of saved terms
pub trait VocabularyStore {
    /// Current term list
    fn snapshot(&self) -> VocabularySnapshot;

    /// Remove every record whose key matches `word`. Returns true if
    /// anything was removed.
    fn remove_term(&mut self, word: &str) -> bool;

    /// Monotonic change counter
    fn revision(&self) -> u64;
}

/// In-process vocabulary store
#[derive(Debug, Default)]
pub struct MemoryVocabulary {
    terms: Vec<Term>,
    revision: u64,
}

impl MemoryVocabulary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_terms(terms: Vec<Term>) -> Self {
        Self { terms, revision: 0 }
    }

    /// Insert, or replace the record with the same key
    pub fn add_term(&mut self, term: Term) {
        let Some(key) = term.key() else {
            return;
        };
        match self
            .terms
            .iter_mut()
            .find(|t| t.key().as_deref() == Some(key.as_str()))
        {
            Some(existing) => *existing = term,
            None => self.terms.push(term),
        }
        self.revision += 1;
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}

impl VocabularyStore for MemoryVocabulary {
    fn snapshot(&self) -> VocabularySnapshot {
        VocabularySnapshot::new(self.terms.clone())
    }

    fn remove_term(&mut self, word: &str) -> bool {
        let Some(key) = normalize_word(word) else {
            return false;
        };
        let before = self.terms.len();
        self.terms
            .retain(|t| t.key().as_deref() != Some(key.as_str()));
        let removed = self.terms.len() != before;
        if removed {
            self.revision += 1;
        }
        removed
    }

    fn revision(&self) -> u64 {
        self.revision
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_word() {
        assert_eq!(normalize_word("  Cat "), Some("cat".to_string()));
        assert_eq!(normalize_word("   "), None);
        assert_eq!(normalize_word(""), None);
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let snap = VocabularySnapshot::new(vec![
            Term::new("Ubiquitous").with_explanation("found everywhere"),
        ]);
        let term = snap.lookup("UBIQUITOUS").unwrap();
        assert_eq!(term.explanation.as_deref(), Some("found everywhere"));
        assert!(snap.lookup("rare").is_none());
    }

    #[test]
    fn test_same_words_ignores_case_order_and_blanks() {
        let a = VocabularySnapshot::new(vec![Term::new("Cat"), Term::new("dog"), Term::new(" ")]);
        let b = VocabularySnapshot::new(vec![Term::new("DOG"), Term::new("cat")]);
        let c = VocabularySnapshot::new(vec![Term::new("cat")]);
        assert!(a.same_words(&b));
        assert!(!a.same_words(&c));
    }

    #[test]
    fn test_store_remove_by_normalized_word() {
        let mut store = MemoryVocabulary::with_terms(vec![Term::new("Cat"), Term::new("dog")]);
        assert!(store.remove_term(" CAT "));
        assert_eq!(store.len(), 1);
        assert_eq!(store.revision(), 1);
        assert!(!store.remove_term("cat"));
        assert_eq!(store.revision(), 1);
    }

    #[test]
    fn test_store_add_replaces_same_key() {
        let mut store = MemoryVocabulary::new();
        store.add_term(Term::new("cat"));
        store.add_term(Term::new("CAT").with_explanation("feline"));
        store.add_term(Term::new("  "));
        assert_eq!(store.len(), 1);
        let snap = store.snapshot();
        assert_eq!(snap.lookup("cat").unwrap().explanation.as_deref(), Some("feline"));
    }

    #[test]
    fn test_term_deserializes_js_record() {
        let term: Term = serde_json::from_str(
            r#"{ "word": "cat", "explanation": "a small feline", "addedAt": 1700000000000 }"#,
        )
        .unwrap();
        assert_eq!(term.word, "cat");
        assert_eq!(term.added_at.unwrap().timestamp(), 1_700_000_000);
        assert!(term.context.is_none());
    }

    #[test]
    fn test_added_at_accepts_rfc3339_and_degrades_on_garbage() {
        let terms: Vec<Term> = serde_json::from_str(
            r#"[
                { "word": "cat", "addedAt": "2024-03-09T12:00:00Z" },
                { "word": "dog" },
                { "word": "eel", "addedAt": "last tuesday" },
                { "word": "fox", "addedAt": { "nested": true } },
                { "word": "gnu", "added_at": null }
            ]"#,
        )
        .unwrap();
        assert_eq!(terms.len(), 5);
        assert_eq!(
            terms[0].added_at.unwrap().format("%Y-%m-%d").to_string(),
            "2024-03-09"
        );
        assert!(terms[1..].iter().all(|t| t.added_at.is_none()));
    }

    #[test]
    fn test_added_at_serializes_as_rfc3339() {
        let term = Term::new("cat").with_added_at(
            DateTime::from_timestamp_millis(1_700_000_000_000).unwrap(),
        );
        let json = serde_json::to_value(&term).unwrap();
        assert_eq!(json["addedAt"], "2023-11-14T22:13:20Z");
        let back: Term = serde_json::from_value(json).unwrap();
        assert_eq!(back, term);
    }

    #[test]
    fn test_malformed_records_are_skipped() {
        let records: Vec<serde_json::Value> = serde_json::from_str(
            r#"[{ "word": "cat" }, { "explanation": "no word" }, 42, { "word": "dog" }]"#,
        )
        .unwrap();
        let terms = terms_from_records(records);
        let words: Vec<&str> = terms.iter().map(|t| t.word.as_str()).collect();
        assert_eq!(words, ["cat", "dog"]);
    }
}
