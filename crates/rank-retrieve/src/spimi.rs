//! SPIMI builder: consumes a corpus batch-by-batch, accumulates postings into
//! a [`PartialIndex`], and flushes sorted run files whenever the memory
//! budget is exceeded.
//!
//! The build loop branches on [`ScoringMode`] — a tagged variant where one
//! enum selects the per-document ingestion strategy, the weighter's rewrite
//! rule, and the shard-reader's parser, with no trait objects or dynamic
//! dispatch needed beyond the tag.

use crate::corpus::CorpusReader;
use crate::error::RetrieveResult;
use crate::partial_index::PartialIndex;
use crate::posting::Posting;
use crate::tokenizer::Tokenizer;
use std::path::Path;

/// Which scoring model (and positional variant) a build targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoringMode {
    /// lnc.ltc tf-idf, cosine-normalized on the document side.
    TfIdf,
    /// tf-idf with per-term position lists retained.
    TfIdfPositional,
    /// Okapi BM25, document-length normalized.
    Bm25,
    /// BM25 with per-term position lists retained.
    Bm25Positional,
}

impl ScoringMode {
    pub fn is_positional(self) -> bool {
        matches!(self, ScoringMode::TfIdfPositional | ScoringMode::Bm25Positional)
    }

    pub fn is_bm25(self) -> bool {
        matches!(self, ScoringMode::Bm25 | ScoringMode::Bm25Positional)
    }
}

/// BM25 tuning parameters, validated by the CLI before any work starts.
#[derive(Debug, Clone, Copy)]
pub struct Bm25Params {
    /// Term frequency saturation parameter, must lie in `(1, 2)`.
    pub k1: f32,
    /// Length-normalization strength, must lie in `(0, 1)`.
    pub b: f32,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self { k1: 1.2, b: 0.75 }
    }
}

impl Bm25Params {
    /// Validate `k1 ∈ (1,2)` and `b ∈ (0,1)`.
    pub fn validate(self) -> Result<(), String> {
        if !(self.k1 > 1.0 && self.k1 < 2.0) {
            return Err(format!("k1 must be in (1, 2), got {}", self.k1));
        }
        if !(self.b > 0.0 && self.b < 1.0) {
            return Err(format!("b must be in (0, 1), got {}", self.b));
        }
        Ok(())
    }
}

/// Build-time tuning: memory budget and batch size.
#[derive(Debug, Clone, Copy)]
pub struct BuildConfig {
    /// Flush the partial index once its estimated size exceeds this, in bytes.
    /// Default 8 MiB.
    pub mem_limit_bytes: usize,
    /// Documents requested per `next_batch` call. Default 1000.
    pub batch_docs: usize,
    pub mode: ScoringMode,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            mem_limit_bytes: 8 * 1024 * 1024,
            batch_docs: 1000,
            mode: ScoringMode::TfIdf,
        }
    }
}

/// Counters accumulated across the whole build, needed by the weighter.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuildStats {
    pub number_of_read_docs: u64,
    /// Sum of per-document lengths (distinct-term counts), BM25 modes only.
    pub total_doc_length_sum: u64,
    pub run_files_written: u64,
}

/// Run the SPIMI build loop, writing `index-part-<n>.txt` run files into
/// `index_dir`. `index_dir` must already exist and be empty.
pub fn build<C: CorpusReader, T: Tokenizer>(
    corpus: &mut C,
    tokenizer: &T,
    index_dir: impl AsRef<Path>,
    config: BuildConfig,
) -> RetrieveResult<BuildStats> {
    let index_dir = index_dir.as_ref();
    let mut partial = PartialIndex::new();
    let mut flush_counter: u64 = 0;
    let mut total_doc_length_sum: u64 = 0;

    let mut flush = |partial: &mut PartialIndex, flush_counter: &mut u64| -> RetrieveResult<()> {
        *flush_counter += 1;
        let path = index_dir.join(format!("index-part-{flush_counter}.txt"));
        partial.flush(&path)?;
        partial.clear();
        Ok(())
    };

    loop {
        let (batch, end_of_stream) = corpus.next_batch(config.batch_docs)?;

        for (doc_id, text) in batch {
            match config.mode {
                ScoringMode::TfIdf => ingest_tfidf(&mut partial, tokenizer, &doc_id, &text),
                ScoringMode::TfIdfPositional => {
                    ingest_tfidf_positional(&mut partial, tokenizer, &doc_id, &text)
                }
                ScoringMode::Bm25 => {
                    let doc_length = ingest_bm25(&mut partial, tokenizer, &doc_id, &text);
                    total_doc_length_sum += doc_length as u64;
                }
                ScoringMode::Bm25Positional => {
                    let doc_length = ingest_bm25_positional(&mut partial, tokenizer, &doc_id, &text);
                    total_doc_length_sum += doc_length as u64;
                }
            }

            if partial.size() > config.mem_limit_bytes {
                flush(&mut partial, &mut flush_counter)?;
            }
        }

        if partial.term_count() > 0 {
            flush(&mut partial, &mut flush_counter)?;
        }

        if end_of_stream {
            break;
        }
    }

    // A build over an empty corpus must still leave at least one run file
    // behind, so the merger and weighter have something to operate on.
    if flush_counter == 0 {
        flush(&mut partial, &mut flush_counter)?;
    }

    Ok(BuildStats {
        number_of_read_docs: corpus.number_of_read_docs(),
        total_doc_length_sum,
        run_files_written: flush_counter,
    })
}

fn ingest_tfidf<T: Tokenizer>(partial: &mut PartialIndex, tokenizer: &T, doc_id: &str, text: &str) {
    let counts = tokenizer.tokenize_counts(text);
    let mut doc_weight_sq = 0.0f32;

    for (term, freq) in &counts {
        let tf = 1.0 + (*freq as f32).log10();
        partial.add(term.clone(), Posting::new(doc_id, tf));
        doc_weight_sq += tf * tf;
    }

    let norm = doc_weight_sq.sqrt();
    for (term, _) in &counts {
        if let Some(posting) = partial.last_posting_mut(term) {
            posting.raw_weight /= norm;
        }
    }
}

fn ingest_tfidf_positional<T: Tokenizer>(
    partial: &mut PartialIndex,
    tokenizer: &T,
    doc_id: &str,
    text: &str,
) {
    let ordered = tokenizer.tokenize_ordered(text);
    for (i, term) in ordered.iter().enumerate() {
        if !partial.last_posting_doc_is(term, doc_id) {
            partial.add(term.clone(), Posting::new(doc_id, 0.0));
        }
        partial
            .last_posting_mut(term)
            .expect("just inserted")
            .add_position(i as u32);
    }

    let distinct: std::collections::BTreeSet<&String> = ordered.iter().collect();
    let mut doc_weight_sq = 0.0f32;
    for term in &distinct {
        let count = partial.last_posting_mut(term).expect("present").raw_weight;
        let tf = 1.0 + count.log10();
        doc_weight_sq += tf * tf;
    }
    let norm = doc_weight_sq.sqrt();
    for term in &distinct {
        let posting = partial.last_posting_mut(term).expect("present");
        posting.raw_weight /= norm;
    }
}

fn ingest_bm25<T: Tokenizer>(partial: &mut PartialIndex, tokenizer: &T, doc_id: &str, text: &str) -> u32 {
    let counts = tokenizer.tokenize_counts(text);
    let doc_length = counts.len() as u32;
    for (term, freq) in counts {
        partial.add(term, Posting::with_doc_length(doc_id, freq as f32, doc_length));
    }
    doc_length
}

fn ingest_bm25_positional<T: Tokenizer>(
    partial: &mut PartialIndex,
    tokenizer: &T,
    doc_id: &str,
    text: &str,
) -> u32 {
    let ordered = tokenizer.tokenize_ordered(text);
    let doc_length = ordered.iter().collect::<std::collections::BTreeSet<_>>().len() as u32;

    for (i, term) in ordered.iter().enumerate() {
        if !partial.last_posting_doc_is(term, doc_id) {
            partial.add(term.clone(), Posting::with_doc_length(doc_id, 0.0, doc_length));
        }
        partial
            .last_posting_mut(term)
            .expect("just inserted")
            .add_position(i as u32);
    }

    doc_length
}
