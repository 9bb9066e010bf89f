//! Posting records and their line-oriented text codec.
//!
//! A posting is one `(term, doc)` record carrying whatever payload the current
//! pipeline stage needs: a raw or final weight, an optional document length
//! (BM25 only, pre-weighting), and an optional ascending position list
//! (positional scoring modes only). The codec is deliberately textual so that
//! every stage (SPIMI builder, merger, weighter, shard splitter, reader) can be
//! implemented as straight line-at-a-time I/O with no whole-file buffering.
//!
//! # Wire shapes
//!
//! ```text
//! doc:weight
//! doc,doclen:weight
//! doc:weight:p1,p2,…,pk
//! doc,doclen:weight:p1,p2,…,pk
//! ```
//!
//! The shape is chosen by which optional fields are present, never by which
//! pipeline stage wrote it: `doc_length` appears only for BM25 postings before
//! weighting, `positions` only for positional scoring modes.

use crate::error::{RetrieveError, RetrieveResult};
use std::fmt;

/// One `(term, doc)` posting record.
#[derive(Debug, Clone, PartialEq)]
pub struct Posting {
    /// Document identifier this posting belongs to.
    pub doc: String,
    /// Term frequency / model weight, whichever this pipeline stage produces.
    pub raw_weight: f32,
    /// Number of distinct terms in the document (BM25 variants, pre-weighting only).
    pub doc_length: Option<u32>,
    /// Ascending 0-based term offsets within the document (positional variants only).
    pub positions: Option<Vec<u32>>,
}

impl Posting {
    /// Construct a posting with neither `doc_length` nor `positions` set.
    pub fn new(doc: impl Into<String>, raw_weight: f32) -> Self {
        Self {
            doc: doc.into(),
            raw_weight,
            doc_length: None,
            positions: None,
        }
    }

    /// Construct a BM25 build-time posting carrying the document length.
    pub fn with_doc_length(doc: impl Into<String>, raw_weight: f32, doc_length: u32) -> Self {
        Self {
            doc: doc.into(),
            raw_weight,
            doc_length: Some(doc_length),
            positions: None,
        }
    }

    /// Append a 0-based position, incrementing `raw_weight` to track the
    /// occurrence count (see `IndexerTFIDFPositions`/`IndexerBM25Positions`:
    /// `raw_weight` doubles as a running tally of positions pushed onto this
    /// posting during document ingestion).
    pub fn add_position(&mut self, position: u32) {
        self.positions.get_or_insert_with(Vec::new).push(position);
        self.raw_weight += 1.0;
    }
}

/// Render one posting in its wire shape.
///
/// `decimals` controls the weight's fixed-point precision: build/merge/final
/// postings use 2, the persisted-form convention used throughout this index.
pub fn format_posting(p: &Posting, decimals: usize) -> String {
    let mut out = String::new();
    match p.doc_length {
        Some(len) => out.push_str(&format!("{},{}", p.doc, len)),
        None => out.push_str(&p.doc),
    }
    out.push(':');
    out.push_str(&format!("{:.*}", decimals, p.raw_weight));
    if let Some(positions) = &p.positions {
        out.push(':');
        let joined = positions
            .iter()
            .map(|pos| pos.to_string())
            .collect::<Vec<_>>()
            .join(",");
        out.push_str(&joined);
    }
    out
}

/// Parse one posting from its wire shape.
///
/// Recognizes the four shapes in the module docs by counting `:`-delimited
/// segments and checking for a `,` before the first `:`.
pub fn parse_posting(s: &str) -> RetrieveResult<Posting> {
    let parts: Vec<&str> = s.splitn(3, ':').collect();
    if parts.len() < 2 {
        return Err(RetrieveError::FormatViolation(format!(
            "posting missing ':' separator: {s:?}"
        )));
    }

    let (doc, doc_length) = match parts[0].split_once(',') {
        Some((doc, len)) => {
            let len: u32 = len.parse().map_err(|_| {
                RetrieveError::FormatViolation(format!("invalid doc_length in posting: {s:?}"))
            })?;
            (doc.to_string(), Some(len))
        }
        None => (parts[0].to_string(), None),
    };

    let raw_weight: f32 = parts[1]
        .parse()
        .map_err(|_| RetrieveError::FormatViolation(format!("invalid weight in posting: {s:?}")))?;

    let positions = match parts.get(2) {
        Some(pos_str) if !pos_str.is_empty() => {
            let mut positions = Vec::new();
            for p in pos_str.split(',') {
                let p: u32 = p.parse().map_err(|_| {
                    RetrieveError::FormatViolation(format!("invalid position in posting: {s:?}"))
                })?;
                positions.push(p);
            }
            Some(positions)
        }
        Some(_) => Some(Vec::new()),
        None => None,
    };

    Ok(Posting {
        doc,
        raw_weight,
        doc_length,
        positions,
    })
}

/// A term line as found in run, merged, or final index files: a term header
/// (with or without an idf suffix) followed by `;`-separated postings.
#[derive(Debug, Clone, PartialEq)]
pub struct TermLine {
    pub term: String,
    /// Present only on final/shard lines (`term:idf;...`).
    pub idf: Option<f32>,
    pub postings: Vec<Posting>,
}

impl fmt::Display for TermLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.idf {
            Some(idf) => write!(f, "{}:{:.3}", self.term, idf)?,
            None => write!(f, "{}", self.term)?,
        }
        for p in &self.postings {
            write!(f, ";{}", format_posting(p, 2))?;
        }
        Ok(())
    }
}

/// Parse a run/merged term line: `term;posting;posting;...` (no idf).
pub fn parse_run_line(line: &str) -> RetrieveResult<TermLine> {
    let line = line.trim_end_matches('\n');
    let sep = line.find(';').ok_or_else(|| {
        RetrieveError::FormatViolation(format!("term line missing ';' separator: {line:?}"))
    })?;
    let term = line[..sep].to_string();
    let postings = line[sep + 1..]
        .split(';')
        .map(parse_posting)
        .collect::<RetrieveResult<Vec<_>>>()?;
    Ok(TermLine {
        term,
        idf: None,
        postings,
    })
}

/// Parse a final/shard term line: `term:idf;posting;posting;...`.
pub fn parse_final_line(line: &str) -> RetrieveResult<TermLine> {
    let line = line.trim_end_matches('\n');
    let sep = line.find(';').ok_or_else(|| {
        RetrieveError::FormatViolation(format!("term line missing ';' separator: {line:?}"))
    })?;
    let header = &line[..sep];
    let (term, idf) = header.split_once(':').ok_or_else(|| {
        RetrieveError::FormatViolation(format!("final term header missing idf: {header:?}"))
    })?;
    let idf: f32 = idf.parse().map_err(|_| {
        RetrieveError::FormatViolation(format!("invalid idf in term header: {header:?}"))
    })?;
    let postings = line[sep + 1..]
        .split(';')
        .map(parse_posting)
        .collect::<RetrieveResult<Vec<_>>>()?;
    Ok(TermLine {
        term: term.to_string(),
        idf: Some(idf),
        postings,
    })
}
