//! Corpus iterator capability: yields `(doc_id, text)` batches from a streamed
//! source until exhausted.
//!
//! The corpus reader is treated as an external collaborator — the SPIMI
//! builder only depends on the [`CorpusReader`] trait. [`CsvCorpusReader`]
//! is the reference implementation the CLI wires up, reading a CSV file one
//! batch at a time so the whole corpus never has to fit in memory.

use crate::error::{RetrieveError, RetrieveResult};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Capability that yields batches of `(doc_id, text)` pairs from a corpus.
pub trait CorpusReader {
    /// Read up to `n` more documents.
    ///
    /// Returns the batch (at most `n` entries; rows with an empty designated
    /// text field are skipped) and whether the underlying source is exhausted
    /// after this batch.
    fn next_batch(&mut self, n: usize) -> RetrieveResult<(BTreeMap<String, String>, bool)>;

    /// Total documents read (including skipped rows) once the corpus has been
    /// fully consumed. Used by the weighter to compute idf.
    fn number_of_read_docs(&self) -> u64;
}

/// Reads `(doc_id, text)` pairs out of a CSV file.
///
/// `id_column` supplies the document identifier; `text_columns` are
/// concatenated (space-joined) to form the document text. A row is skipped
/// if the identifier is empty or every configured text column is empty,
/// matching the "skip rows with an empty designated text field" contract.
pub struct CsvCorpusReader {
    reader: csv::Reader<BufReader<File>>,
    id_column: usize,
    text_columns: Vec<usize>,
    number_of_read_docs: u64,
    exhausted: bool,
}

impl CsvCorpusReader {
    /// Open `path`, treating column 0 as the document id and concatenating
    /// columns 2 and 7 as the document text (the original corpus's
    /// `title`/`abstract` columns).
    pub fn open(path: impl AsRef<Path>) -> RetrieveResult<Self> {
        Self::with_columns(path, 0, vec![2, 7])
    }

    /// Open `path` with explicit id/text column indices.
    pub fn with_columns(
        path: impl AsRef<Path>,
        id_column: usize,
        text_columns: Vec<usize>,
    ) -> RetrieveResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(RetrieveError::InputNotFound(path.display().to_string()));
        }
        let file = File::open(path)?;
        let reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(BufReader::new(file));
        Ok(Self {
            reader,
            id_column,
            text_columns,
            number_of_read_docs: 0,
            exhausted: false,
        })
    }
}

impl CorpusReader for CsvCorpusReader {
    fn next_batch(&mut self, n: usize) -> RetrieveResult<(BTreeMap<String, String>, bool)> {
        let mut batch = BTreeMap::new();
        let mut read = 0usize;

        if self.exhausted {
            return Ok((batch, true));
        }

        let mut records = self.reader.records();
        while read < n {
            match records.next() {
                Some(record) => {
                    let record = record.map_err(|e| {
                        RetrieveError::FormatViolation(format!("malformed CSV row: {e}"))
                    })?;
                    read += 1;

                    let doc_id = record.get(self.id_column).unwrap_or("").trim();
                    if doc_id.is_empty() {
                        continue;
                    }

                    let text = self
                        .text_columns
                        .iter()
                        .filter_map(|&c| record.get(c))
                        .collect::<Vec<_>>()
                        .join(" ");
                    let has_text = self
                        .text_columns
                        .iter()
                        .any(|&c| !record.get(c).unwrap_or("").trim().is_empty());
                    if !has_text {
                        continue;
                    }

                    batch.insert(doc_id.to_string(), text);
                }
                None => {
                    self.exhausted = true;
                    break;
                }
            }
        }

        self.number_of_read_docs += read as u64;
        Ok((batch, self.exhausted))
    }

    fn number_of_read_docs(&self) -> u64 {
        self.number_of_read_docs
    }
}
