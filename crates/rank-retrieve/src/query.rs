//! Query engine: turns a query string into a ranked document list against a
//! sharded, weighted index.
//!
//! Grounded on `Query.__process`/`lookup_idf`/`lookup_bm25`. tf-idf queries
//! weight each term by its raw query frequency times idf (no logarithm on
//! the query side, unlike the cosine-normalized logarithmic tf carried by
//! documents), then cosine-normalize the query vector before dot-producting
//! against each candidate document; BM25 queries sum each query-term
//! occurrence's precomputed per-document weight directly, with no
//! deduplication of repeated query terms (so a term mentioned twice in a
//! query contributes twice). The positional proximity boost mirrors
//! `Query._boost`: it is computed and exposed, but never folded into the
//! ranking `search` returns.

use crate::error::RetrieveResult;
use crate::reader::IndexReader;
use crate::spimi::ScoringMode;
use crate::tokenizer::Tokenizer;
use std::cmp::Ordering;
use std::collections::HashMap;

/// Window (in token positions) within which two query terms' occurrences are
/// considered "close" for the proximity boost. Matches `token_range`.
pub const PROX_WINDOW: u32 = 50;

/// One scored document from a query.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredDoc {
    pub doc: String,
    pub score: f32,
}

/// Runs queries against an [`IndexReader`] under a fixed [`ScoringMode`].
pub struct QueryEngine<'a, T: Tokenizer> {
    reader: &'a IndexReader,
    tokenizer: &'a T,
    mode: ScoringMode,
}

impl<'a, T: Tokenizer> QueryEngine<'a, T> {
    pub fn new(reader: &'a IndexReader, tokenizer: &'a T, mode: ScoringMode) -> Self {
        Self {
            reader,
            tokenizer,
            mode,
        }
    }

    /// Rank every document carrying at least one query term, descending by
    /// score, ties broken by document id ascending for determinism.
    pub fn search(&self, query_text: &str) -> RetrieveResult<Vec<ScoredDoc>> {
        match self.mode {
            ScoringMode::TfIdf | ScoringMode::TfIdfPositional => self.search_tfidf(query_text),
            ScoringMode::Bm25 | ScoringMode::Bm25Positional => self.search_bm25(query_text),
        }
    }

    fn search_tfidf(&self, query_text: &str) -> RetrieveResult<Vec<ScoredDoc>> {
        let counts = self.tokenizer.tokenize_counts(query_text);

        let mut raw_weights: HashMap<String, f32> = HashMap::new();
        let mut norm_sq = 0f32;
        for (term, freq) in &counts {
            let Some(term_line) = self.reader.get_token_search(term)? else {
                continue;
            };
            let idf = term_line.idf.unwrap_or(0.0);
            let weight = *freq as f32 * idf;
            norm_sq += weight * weight;
            raw_weights.insert(term.clone(), weight);
        }

        if raw_weights.is_empty() {
            return Ok(Vec::new());
        }
        let norm = norm_sq.sqrt();

        let mut scores: HashMap<String, f32> = HashMap::new();
        for (term, weight) in &raw_weights {
            let query_weight = if norm > 0.0 { weight / norm } else { 0.0 };
            if let Some(term_line) = self.reader.get_token_search(term)? {
                for posting in &term_line.postings {
                    *scores.entry(posting.doc.clone()).or_insert(0.0) += query_weight * posting.raw_weight;
                }
            }
        }

        Ok(sort_scores(scores))
    }

    fn search_bm25(&self, query_text: &str) -> RetrieveResult<Vec<ScoredDoc>> {
        let ordered = self.tokenizer.tokenize_ordered(query_text);

        let mut scores: HashMap<String, f32> = HashMap::new();
        for term in &ordered {
            if let Some(term_line) = self.reader.get_token_search(term)? {
                for posting in &term_line.postings {
                    *scores.entry(posting.doc.clone()).or_insert(0.0) += posting.raw_weight;
                }
            }
        }

        Ok(sort_scores(scores))
    }

    /// Per-document proximity boost across all distinct pairs of query terms:
    /// for every `(p1, p2)` position pair from the two terms' postings whose
    /// distance falls within [`PROX_WINDOW`] in a shared document, adds the
    /// product of the two terms' document-side weights once — a document
    /// where the terms co-occur closely at several positions accumulates the
    /// product that many times. Empty for non-positional modes or query
    /// terms with no indexed positions.
    pub fn proximity_boost(&self, query_text: &str) -> RetrieveResult<HashMap<String, f32>> {
        let mut boost: HashMap<String, f32> = HashMap::new();
        if !self.mode.is_positional() {
            return Ok(boost);
        }

        let ordered = self.tokenizer.tokenize_ordered(query_text);
        let distinct: std::collections::BTreeSet<String> = ordered.into_iter().collect();

        let mut term_lines = Vec::new();
        for term in &distinct {
            if let Some(term_line) = self.reader.get_token_search(term)? {
                term_lines.push(term_line);
            }
        }

        for i in 0..term_lines.len() {
            for j in (i + 1)..term_lines.len() {
                for p1 in &term_lines[i].postings {
                    let Some(p2) = term_lines[j].postings.iter().find(|p| p.doc == p1.doc) else {
                        continue;
                    };
                    let (Some(pos1), Some(pos2)) = (&p1.positions, &p2.positions) else {
                        continue;
                    };
                    let mut pair_count = 0u32;
                    for &a in pos1 {
                        for &b in pos2 {
                            if a.abs_diff(b) <= PROX_WINDOW {
                                pair_count += 1;
                            }
                        }
                    }
                    if pair_count > 0 {
                        *boost.entry(p1.doc.clone()).or_insert(0.0) +=
                            p1.raw_weight * p2.raw_weight * pair_count as f32;
                    }
                }
            }
        }

        Ok(boost)
    }
}

fn sort_scores(scores: HashMap<String, f32>) -> Vec<ScoredDoc> {
    let mut scored: Vec<ScoredDoc> = scores
        .into_iter()
        .map(|(doc, score)| ScoredDoc { doc, score })
        .collect();
    scored.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.doc.cmp(&b.doc))
    });
    scored
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shard::split_into_shards;
    use crate::tokenizer::SimpleTokenizer;
    use std::fs::File;
    use std::io::Write as _;
    use std::path::Path;

    fn build_shards(dir: &Path, lines: &[&str]) {
        let final_path = dir.join("final.txt");
        let mut file = File::create(&final_path).unwrap();
        for line in lines {
            writeln!(file, "{line}").unwrap();
        }
        drop(file);
        split_into_shards(&final_path, dir, 1024 * 1024).unwrap();
    }

    #[test]
    fn tfidf_query_ranks_by_dot_product() {
        let dir = tempfile::tempdir().unwrap();
        build_shards(
            dir.path(),
            &["fox:0.301;d1:0.80;d2:0.20", "dog:0.301;d2:0.90"],
        );
        let reader = IndexReader::open(dir.path()).unwrap();
        let tokenizer = SimpleTokenizer;
        let engine = QueryEngine::new(&reader, &tokenizer, ScoringMode::TfIdf);

        let results = engine.search("fox").unwrap();
        assert_eq!(results[0].doc, "d1");
        assert!(results[0].score > results[1].score);
    }

    #[test]
    fn bm25_query_sums_per_term_weights_without_dedup() {
        let dir = tempfile::tempdir().unwrap();
        build_shards(dir.path(), &["fox:0.5;d1:1.00;d2:0.40"]);
        let reader = IndexReader::open(dir.path()).unwrap();
        let tokenizer = SimpleTokenizer;
        let engine = QueryEngine::new(&reader, &tokenizer, ScoringMode::Bm25);

        let once = engine.search("fox").unwrap();
        let twice = engine.search("fox fox").unwrap();
        assert!((twice[0].score - 2.0 * once[0].score).abs() < 1e-4);
    }

    #[test]
    fn empty_query_yields_no_results() {
        let dir = tempfile::tempdir().unwrap();
        build_shards(dir.path(), &["fox:0.5;d1:1.00"]);
        let reader = IndexReader::open(dir.path()).unwrap();
        let tokenizer = SimpleTokenizer;
        let engine = QueryEngine::new(&reader, &tokenizer, ScoringMode::TfIdf);
        assert!(engine.search("").unwrap().is_empty());
        assert!(engine.search("qq").unwrap().is_empty());
    }

    #[test]
    fn proximity_boost_empty_for_non_positional_mode() {
        let dir = tempfile::tempdir().unwrap();
        build_shards(dir.path(), &["fox:0.5;d1:1.00:0,1"]);
        let reader = IndexReader::open(dir.path()).unwrap();
        let tokenizer = SimpleTokenizer;
        let engine = QueryEngine::new(&reader, &tokenizer, ScoringMode::TfIdf);
        assert!(engine.proximity_boost("fox").unwrap().is_empty());
    }

    #[test]
    fn proximity_boost_rewards_nearby_positional_terms() {
        let dir = tempfile::tempdir().unwrap();
        build_shards(
            dir.path(),
            &["fox:0.5;d1:0.70:0,200", "dog:0.5;d1:0.60:1,300"],
        );
        let reader = IndexReader::open(dir.path()).unwrap();
        let tokenizer = SimpleTokenizer;
        let engine = QueryEngine::new(&reader, &tokenizer, ScoringMode::TfIdfPositional);

        let boost = engine.proximity_boost("fox dog").unwrap();
        // only (0, 1) is within PROX_WINDOW; (0, 300), (200, 1), (200, 300) are not.
        assert!((boost["d1"] - 0.70 * 0.60).abs() < 1e-4);
    }

    #[test]
    fn proximity_boost_accumulates_once_per_qualifying_position_pair() {
        let dir = tempfile::tempdir().unwrap();
        build_shards(
            dir.path(),
            &["fox:0.5;d1:0.70:0,40", "dog:0.5;d1:0.60:1,90"],
        );
        let reader = IndexReader::open(dir.path()).unwrap();
        let tokenizer = SimpleTokenizer;
        let engine = QueryEngine::new(&reader, &tokenizer, ScoringMode::TfIdfPositional);

        let boost = engine.proximity_boost("fox dog").unwrap();
        // qualifying pairs: (0,1), (40,1), (40,90) — 3 pairs within PROX_WINDOW.
        assert!((boost["d1"] - 0.70 * 0.60 * 3.0).abs() < 1e-4);
    }
}
