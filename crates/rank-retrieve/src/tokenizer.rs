//! Tokenizer capability: turns document/query text into normalized terms.
//!
//! This module ships two reference tokenizers — the SPIMI builder and query
//! engine only depend on the [`Tokenizer`] trait, so a caller may substitute
//! their own.
//! Two concrete tokenizers are shipped: [`SimpleTokenizer`] (fast, no
//! dependencies beyond regex) and [`StopwordStemmingTokenizer`] (stopword
//! removal + Snowball stemming, selected by the CLI's `-t` flag).
//!
//! Both guarantee terms are non-empty, lowercased, and free of `:`, `;`, `,`,
//! `-` — the posting codec and shard-naming scheme rely on this.

use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use std::collections::HashMap;
use std::sync::OnceLock;

/// Capability that turns text into a sequence of normalized terms.
pub trait Tokenizer {
    /// Tokenize `text` into `(term, count)` pairs, one per distinct term.
    /// Used by non-positional scoring modes.
    fn tokenize_counts(&self, text: &str) -> Vec<(String, u32)> {
        let mut counts: HashMap<String, u32> = HashMap::new();
        let mut order: Vec<String> = Vec::new();
        for term in self.tokenize_ordered(text) {
            if !counts.contains_key(&term) {
                order.push(term.clone());
            }
            *counts.entry(term).or_insert(0) += 1;
        }
        order.into_iter().map(|t| { let c = counts[&t]; (t, c) }).collect()
    }

    /// Tokenize `text` into terms in document order, duplicates included.
    /// Used by positional scoring modes, which need occurrence order to build
    /// per-term position lists.
    fn tokenize_ordered(&self, text: &str) -> Vec<String>;
}

fn non_alpha() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new("[^a-zA-Z]+").unwrap())
}

fn non_alnum() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new("[^a-zA-Z0-9]+").unwrap())
}

/// Alphabetic-only tokenizer: strips anything that isn't a letter, lowercases,
/// and drops tokens shorter than 3 characters. No stopword removal, no
/// stemming. Mirrors `Tokenizer.py`'s `SimpleTokenizer`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimpleTokenizer;

impl Tokenizer for SimpleTokenizer {
    fn tokenize_ordered(&self, text: &str) -> Vec<String> {
        non_alpha()
            .replace_all(text, " ")
            .to_lowercase()
            .split_whitespace()
            .filter(|t| t.len() >= 3)
            .map(|t| t.to_string())
            .collect()
    }
}

/// A small, fixed English stopword list. Shipped inline rather than loaded
/// from a file (`ImprovedTokenizer` in its source-of-truth form reads
/// `stopwords.json` off disk) so that selecting `-t` can never fail with a
/// missing-file error.
const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "for", "from", "has", "he", "in", "is",
    "it", "its", "of", "on", "that", "the", "to", "was", "were", "will", "with", "this", "but",
    "they", "have", "had", "not", "or", "which", "their", "there", "been", "can", "could",
    "would", "should", "about", "into", "than", "them", "then", "these", "those", "over",
    "such", "also", "more", "most", "other", "some", "any", "all", "may", "do", "does", "did",
    "we", "you", "your", "our", "his", "her", "what", "when", "where", "who", "how", "why",
];

/// Keeps letters and digits, lowercases, drops stopwords, and stems with the
/// English Snowball algorithm. Mirrors `ImprovedTokenizer`, except hyphens
/// are treated as separators rather than preserved: shard filenames use `-`
/// to delimit a term range, so tokenizer output must stay free of it.
pub struct StopwordStemmingTokenizer {
    stemmer: Stemmer,
}

impl StopwordStemmingTokenizer {
    pub fn new() -> Self {
        Self {
            stemmer: Stemmer::create(Algorithm::English),
        }
    }
}

impl Default for StopwordStemmingTokenizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Tokenizer for StopwordStemmingTokenizer {
    fn tokenize_ordered(&self, text: &str) -> Vec<String> {
        non_alnum()
            .replace_all(text, " ")
            .to_lowercase()
            .split_whitespace()
            .filter(|t| !STOPWORDS.contains(t))
            .map(|t| self.stemmer.stem(t).into_owned())
            .filter(|t| !t.is_empty())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_tokenizer_lowercases_and_filters_short() {
        let t = SimpleTokenizer;
        let terms = t.tokenize_ordered("The Quick Brown Fox! 42");
        assert_eq!(terms, vec!["the", "quick", "brown", "fox"]);
    }

    #[test]
    fn simple_tokenizer_counts_distinct_terms() {
        let t = SimpleTokenizer;
        let counts = t.tokenize_counts("fox fox dog fox");
        let map: HashMap<_, _> = counts.into_iter().collect();
        assert_eq!(map.get("fox"), Some(&3));
        assert_eq!(map.get("dog"), Some(&1));
    }

    #[test]
    fn stopword_stemming_tokenizer_drops_stopwords() {
        let t = StopwordStemmingTokenizer::new();
        let terms = t.tokenize_ordered("the cats are running in the park");
        assert!(!terms.contains(&"the".to_string()));
        assert!(!terms.contains(&"are".to_string()));
        assert!(!terms.contains(&"in".to_string()));
    }

    #[test]
    fn stopword_stemming_tokenizer_stems() {
        let t = StopwordStemmingTokenizer::new();
        let terms = t.tokenize_ordered("running runner runs");
        // Snowball should collapse these to a shared stem.
        let unique: std::collections::HashSet<_> = terms.iter().collect();
        assert!(unique.len() <= 2);
    }

    #[test]
    fn no_tokenizer_output_contains_reserved_bytes() {
        let simple = SimpleTokenizer;
        let improved = StopwordStemmingTokenizer::new();
        let text = "co-located; comma,separated: colon-term-with-hyphens";
        for term in simple.tokenize_ordered(text) {
            assert!(!term.contains([':', ';', ',', '-']));
        }
        for term in improved.tokenize_ordered(text) {
            assert!(!term.contains([':', ';', ',', '-']));
        }
    }

    #[test]
    fn ordered_preserves_document_order_with_duplicates() {
        let t = SimpleTokenizer;
        let terms = t.tokenize_ordered("alpha beta alpha gamma");
        assert_eq!(terms, vec!["alpha", "beta", "alpha", "gamma"]);
    }
}
