//! In-memory partial index: the SPIMI builder's working set between flushes.
//!
//! Holds `term -> postings` with append-only insertion order preserved per
//! term (postings for a term are appended in document-arrival order within a
//! batch, and batches are consumed in document order, so the list stays
//! monotonic). Sorting only happens at `flush` time, so a run file is written
//! once, sequentially, with a single sort pass over the term set.

use crate::error::RetrieveResult;
use crate::posting::{format_posting, Posting};
use std::collections::HashMap;
use std::io::Write;
use std::path::Path;

/// Conservative per-posting byte overhead used by `size()` to trigger a flush
/// before the process's actual heap usage could exceed `mem_limit`. Chosen to
/// comfortably over-estimate a `Posting`'s serialized text plus `HashMap`/`Vec`
/// overhead, matching the role `sys.getsizeof(self._index)` played in
/// `Indexer._spimi_build`'s overflow check.
const POSTING_OVERHEAD_BYTES: usize = 48;

/// Term -> ordered postings, with a running byte-size estimate.
pub struct PartialIndex {
    entries: HashMap<String, Vec<Posting>>,
    estimated_bytes: usize,
}

impl PartialIndex {
    /// Create an empty partial index.
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            estimated_bytes: 0,
        }
    }

    /// Append a posting for `term`. Callers are responsible for merging
    /// repeated occurrences within one document into a single posting before
    /// calling `add` (the SPIMI builder does this via its per-document term
    /// accumulator).
    pub fn add(&mut self, term: impl Into<String>, posting: Posting) {
        let term = term.into();
        self.estimated_bytes += term.len() + POSTING_OVERHEAD_BYTES;
        self.entries.entry(term).or_default().push(posting);
    }

    /// Mutable access to the last posting appended for `term`, if any. Used by
    /// positional build loops to extend the current document's posting
    /// in-place (`add_position`) without re-hashing.
    pub fn last_posting_mut(&mut self, term: &str) -> Option<&mut Posting> {
        self.entries.get_mut(term).and_then(|v| v.last_mut())
    }

    /// Whether `term`'s most recently appended posting belongs to `doc`.
    pub fn last_posting_doc_is(&self, term: &str, doc: &str) -> bool {
        self.entries
            .get(term)
            .and_then(|v| v.last())
            .map(|p| p.doc == doc)
            .unwrap_or(false)
    }

    /// Conservative estimate, in bytes, of the partial index's footprint.
    /// Compared against `mem_limit` to decide when to flush.
    pub fn size(&self) -> usize {
        self.estimated_bytes
    }

    /// Number of distinct terms currently buffered.
    pub fn term_count(&self) -> usize {
        self.entries.len()
    }

    /// Reset to empty, ready to accumulate the next run.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.estimated_bytes = 0;
    }

    /// Write every buffered term to `path`, one line per term, sorted by term
    /// ascending (run-file invariant: run files must be sorted for the merger
    /// to be linear).
    pub fn flush(&self, path: impl AsRef<Path>) -> RetrieveResult<()> {
        let mut terms: Vec<&String> = self.entries.keys().collect();
        terms.sort_unstable();

        let file = std::fs::File::create(path)?;
        let mut writer = std::io::BufWriter::new(file);
        for term in terms {
            let postings = &self.entries[term];
            let mut line = term.clone();
            for p in postings {
                line.push(';');
                line.push_str(&format_posting(p, 2));
            }
            line.push('\n');
            writer.write_all(line.as_bytes())?;
        }
        writer.flush()?;
        Ok(())
    }
}

impl Default for PartialIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flush_sorts_terms_ascending() {
        let mut idx = PartialIndex::new();
        idx.add("zebra", Posting::new("d1", 1.0));
        idx.add("apple", Posting::new("d1", 1.0));
        idx.add("mango", Posting::new("d1", 1.0));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.txt");
        idx.flush(&path).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let terms: Vec<&str> = contents
            .lines()
            .map(|l| l.split(';').next().unwrap())
            .collect();
        assert_eq!(terms, vec!["apple", "mango", "zebra"]);
    }

    #[test]
    fn clear_resets_size_and_terms() {
        let mut idx = PartialIndex::new();
        idx.add("term", Posting::new("d1", 1.0));
        assert!(idx.size() > 0);
        idx.clear();
        assert_eq!(idx.size(), 0);
        assert_eq!(idx.term_count(), 0);
    }

    #[test]
    fn size_grows_with_additions() {
        let mut idx = PartialIndex::new();
        let empty = idx.size();
        idx.add("term", Posting::new("d1", 1.0));
        assert!(idx.size() > empty);
    }
}
