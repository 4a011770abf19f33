//! TermIndex - Whole-word, case-insensitive matcher over saved terms
//!
//! Built from a vocabulary snapshot and never mutated afterwards; a changed
//! word set means a new index.
//!
//! # Pattern shape
//! Every word is trimmed, lower-cased, deduplicated and regex-escaped, then
//! joined into one alternation: `(?:\bword\b|\bother\b|...)`, compiled
//! case-insensitively. Alternatives are ordered longest first so that at a
//! given start position "ice cream" is preferred over "ice".
//!
//! A boundary assertion is only emitted next to a word character, so terms
//! like "C++" still match at their edges.

use std::collections::BTreeSet;

use regex::{Regex, RegexBuilder};

use crate::console;
use crate::error::OverlayError;
use crate::overlay::vocab::{normalize_word, Term};

/// Upper bound for the compiled alternation
const MATCHER_SIZE_LIMIT: usize = 64 * (1 << 20);

// =============================================================================
// Types
// =============================================================================

/// One occurrence of a term inside a text run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TermMatch {
    /// Byte offsets into the scanned text
    pub start: usize,
    pub end: usize,
    /// Normalized (lower-cased) word
    pub word: String,
}

/// Compiled term matcher
#[derive(Debug, Clone, Default)]
pub struct TermIndex {
    matcher: Option<Regex>,
    words: BTreeSet<String>,
    dropped: Vec<String>,
}

// =============================================================================
// Construction
// =============================================================================

impl TermIndex {
    /// Index that matches nothing
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build from vocabulary records
    pub fn build(terms: &[Term]) -> Self {
        Self::from_words(terms.iter().map(|t| t.word.as_str()))
    }

    /// Build from raw words. Blank words are skipped; words whose pattern
    /// fails to compile are dropped and reported through `dropped()`.
    pub fn from_words<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let unique: BTreeSet<String> = words
            .into_iter()
            .filter_map(|w| normalize_word(w.as_ref()))
            .collect();

        let mut ordered: Vec<String> = unique.into_iter().collect();
        ordered.sort_by(|a, b| {
            b.chars()
                .count()
                .cmp(&a.chars().count())
                .then_with(|| a.cmp(b))
        });

        let mut pieces = Vec::with_capacity(ordered.len());
        let mut accepted = BTreeSet::new();
        let mut dropped = Vec::new();

        for word in ordered {
            match word_pattern(&word) {
                Ok(piece) => {
                    pieces.push(piece);
                    accepted.insert(word);
                }
                Err(e) => {
                    console::warn("TermIndex", &e.to_string());
                    dropped.push(word);
                }
            }
        }

        if pieces.is_empty() {
            return Self {
                matcher: None,
                words: accepted,
                dropped,
            };
        }

        let pattern = format!("(?:{})", pieces.join("|"));
        match compile(&pattern) {
            Ok(matcher) => Self {
                matcher: Some(matcher),
                words: accepted,
                dropped,
            },
            Err(e) => {
                console::warn("TermIndex", &format!("alternation rejected: {}", e));
                dropped.extend(accepted);
                Self {
                    matcher: None,
                    words: BTreeSet::new(),
                    dropped,
                }
            }
        }
    }
}

/// Escape a normalized word and wrap it in boundary assertions
fn word_pattern(word: &str) -> Result<String, OverlayError> {
    let escaped = regex::escape(word);
    let lead = if word.chars().next().is_some_and(is_word_char) { r"\b" } else { "" };
    let trail = if word.chars().last().is_some_and(is_word_char) { r"\b" } else { "" };
    let piece = format!("{}{}{}", lead, escaped, trail);

    compile(&piece).map_err(|e| OverlayError::InvalidTerm {
        word: word.to_string(),
        reason: e.to_string(),
    })?;
    Ok(piece)
}

fn compile(pattern: &str) -> Result<Regex, regex::Error> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .size_limit(MATCHER_SIZE_LIMIT)
        .build()
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

// =============================================================================
// Queries
// =============================================================================

impl TermIndex {
    /// True when there is nothing to match. Callers clear and skip scanning.
    pub fn is_empty(&self) -> bool {
        self.matcher.is_none()
    }

    /// Number of indexed words
    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn contains(&self, word: &str) -> bool {
        normalize_word(word).is_some_and(|w| self.words.contains(&w))
    }

    pub fn words(&self) -> &BTreeSet<String> {
        &self.words
    }

    /// Words that were rejected during construction
    pub fn dropped(&self) -> &[String] {
        &self.dropped
    }

    /// The compiled alternation, if any
    pub fn pattern(&self) -> Option<&str> {
        self.matcher.as_ref().map(|m| m.as_str())
    }

    /// Leftmost-first, non-overlapping matches in `text`
    pub fn find_iter<'i, 't>(&'i self, text: &'t str) -> impl Iterator<Item = TermMatch> + 'i
    where
        't: 'i,
    {
        self.matcher
            .iter()
            .flat_map(move |re| re.find_iter(text))
            .map(|m| TermMatch {
                start: m.start(),
                end: m.end(),
                word: m.as_str().to_lowercase(),
            })
    }

    /// Quick check without collecting matches
    pub fn contains_any(&self, text: &str) -> bool {
        self.matcher.as_ref().is_some_and(|re| re.is_match(text))
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn words(index: &TermIndex, text: &str) -> Vec<String> {
        index.find_iter(text).map(|m| m.word).collect()
    }

    #[test]
    fn test_empty_input_gives_empty_matcher() {
        let index = TermIndex::from_words(Vec::<String>::new());
        assert!(index.is_empty());
        assert!(index.pattern().is_none());
        assert_eq!(index.find_iter("anything at all").count(), 0);
    }

    #[test]
    fn test_blank_words_are_filtered() {
        let index = TermIndex::from_words(["", "   ", "\t"]);
        assert!(index.is_empty());
        assert_eq!(index.len(), 0);
    }

    #[test]
    fn test_dedupes_case_variants() {
        let index = TermIndex::from_words(["Cat", "cat", " CAT "]);
        assert_eq!(index.len(), 1);
        assert!(index.contains("cAt"));
    }

    #[test]
    fn test_whole_word_only() {
        let index = TermIndex::from_words(["cat"]);
        let found: Vec<TermMatch> = index.find_iter("concatenate a cat").collect();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].start, 14);
        assert_eq!(found[0].end, 17);
    }

    #[test]
    fn test_prefix_terms_do_not_cross_match() {
        let index = TermIndex::from_words(["cat", "category"]);
        assert_eq!(words(&index, "a category of cat"), vec!["category", "cat"]);
    }

    #[test]
    fn test_case_insensitive_and_normalized() {
        let index = TermIndex::from_words(["ubiquitous"]);
        assert_eq!(
            words(&index, "It was ubiquitous and UBIQUITOUS."),
            vec!["ubiquitous", "ubiquitous"]
        );
    }

    #[test]
    fn test_metacharacters_are_escaped() {
        let index = TermIndex::from_words(["a.b", "C++", "(x)"]);
        assert!(index.dropped().is_empty());
        assert_eq!(words(&index, "axb a.b"), vec!["a.b"]);
        assert_eq!(words(&index, "I like C++ a lot"), vec!["c++"]);
        assert_eq!(words(&index, "f(x) and (x)"), vec!["(x)", "(x)"]);
    }

    #[test]
    fn test_longer_alternative_wins_at_same_start() {
        let index = TermIndex::from_words(["ice", "ice cream"]);
        assert_eq!(words(&index, "Ice cream and ice"), vec!["ice cream", "ice"]);
    }

    #[test]
    fn test_deterministic_pattern() {
        let a = TermIndex::from_words(["dog", "cat", "bird"]);
        let b = TermIndex::from_words(["bird", "CAT", "dog", "dog"]);
        assert_eq!(a.pattern(), b.pattern());
    }

    #[test]
    fn test_build_from_terms() {
        let index = TermIndex::build(&[Term::new("Serendipity"), Term::new("")]);
        assert_eq!(index.len(), 1);
        assert!(index.contains_any("pure SERENDIPITY"));
        assert!(!index.contains_any("nothing here"));
    }
}
