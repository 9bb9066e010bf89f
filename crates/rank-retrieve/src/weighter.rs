//! Weighting pass: turns the single merged run into the final index, folding
//! in idf (and, for BM25, the full term-weight formula) now that document
//! frequencies are known globally.
//!
//! Grounded on `Indexer._calculate_weights` (`IndexerTFIDF`/`IndexerBM25`) for
//! the per-model formulas. Both models share the same `idf = log10(N / df)`
//! definition; only the per-posting weight formula differs between them.

use crate::error::RetrieveResult;
use crate::posting::{parse_run_line, Posting, TermLine};
use crate::spimi::Bm25Params;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// Rewrite a merged tf-idf run into its final, idf-bearing form.
///
/// Document-side weights were already logarithmic-tf and cosine-normalized at
/// build time (`spimi::ingest_tfidf`), so this pass only computes `idf =
/// log10(N / df)` per term and leaves postings untouched.
pub fn weight_tfidf(
    merged_path: impl AsRef<Path>,
    number_of_docs: u64,
    out_path: impl AsRef<Path>,
) -> RetrieveResult<()> {
    let merged_path = merged_path.as_ref();
    let out_path = out_path.as_ref();

    let reader = BufReader::new(File::open(merged_path)?);
    let mut writer = BufWriter::new(File::create(out_path)?);

    for line in reader.lines() {
        let line = line?;
        if line.is_empty() {
            continue;
        }
        let term_line = parse_run_line(&line)?;
        let df = term_line.postings.len() as f64;
        let idf = ((number_of_docs as f64) / df).log10() as f32;

        let final_line = TermLine {
            term: term_line.term,
            idf: Some(idf),
            postings: term_line.postings,
        };
        writeln!(writer, "{final_line}")?;
    }

    writer.flush()?;
    std::fs::remove_file(merged_path)?;
    Ok(())
}

/// Rewrite a merged BM25 run into its final, idf-and-weight-bearing form.
///
/// Each posting's `raw_weight` is its pre-weighting term frequency and
/// `doc_length` its document's distinct-term count (set by
/// `spimi::ingest_bm25`/`ingest_bm25_positional`); both get folded into the
/// final per-document weight here, and `doc_length` is dropped from the
/// output (the reader/query engine never need it again).
pub fn weight_bm25(
    merged_path: impl AsRef<Path>,
    number_of_docs: u64,
    total_doc_length_sum: u64,
    params: Bm25Params,
    out_path: impl AsRef<Path>,
) -> RetrieveResult<()> {
    let merged_path = merged_path.as_ref();
    let out_path = out_path.as_ref();

    let avg_doc_length = if number_of_docs == 0 {
        0.0
    } else {
        total_doc_length_sum as f32 / number_of_docs as f32
    };

    let reader = BufReader::new(File::open(merged_path)?);
    let mut writer = BufWriter::new(File::create(out_path)?);

    for line in reader.lines() {
        let line = line?;
        if line.is_empty() {
            continue;
        }
        let term_line = parse_run_line(&line)?;
        let df = term_line.postings.len() as f64;
        let idf = ((number_of_docs as f64) / df).log10() as f32;

        let postings = term_line
            .postings
            .into_iter()
            .map(|p| bm25_weight(p, idf, avg_doc_length, params))
            .collect();

        let final_line = TermLine {
            term: term_line.term,
            idf: Some(idf),
            postings,
        };
        writeln!(writer, "{final_line}")?;
    }

    writer.flush()?;
    std::fs::remove_file(merged_path)?;
    Ok(())
}

fn bm25_weight(p: Posting, idf: f32, avg_doc_length: f32, params: Bm25Params) -> Posting {
    let raw_freq = p.raw_weight;
    let doc_length = p.doc_length.unwrap_or(0) as f32;
    let length_norm = if avg_doc_length > 0.0 {
        (1.0 - params.b) + params.b * (doc_length / avg_doc_length)
    } else {
        1.0 - params.b
    };
    let weight = idf * (params.k1 + 1.0) * raw_freq / (params.k1 * length_norm + raw_freq);

    Posting {
        doc: p.doc,
        raw_weight: weight,
        doc_length: None,
        positions: p.positions,
    }
}
