//! Sharded index reader: resolves a term to its covering shard, lazily loads
//! that shard's term lines, and serves per-term lookups and frequencies.
//!
//! Grounded on `Indexer.get_index_file`/`get_token_search`/`get_token_freq`.
//! A naive single-term shard lookup on `token >= filename_term` would match
//! every term greater than or equal to a single-term shard's name instead of
//! only that one term. This reader instead resolves the shard whose
//! `[start_term, end_term]` range covers the query term, uniformly for both
//! single- and multi-term shards, and returns "absent" for a term no shard
//! covers.

use crate::error::RetrieveResult;
use crate::posting::{parse_final_line, TermLine};
use crate::shard::{read_manifest, ShardMeta};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

/// Reads a sharded, weighted index built by [`crate::shard::split_into_shards`].
pub struct IndexReader {
    shards: Vec<ShardMeta>,
    cache: RefCell<HashMap<PathBuf, HashMap<String, TermLine>>>,
}

impl IndexReader {
    /// Open a shard directory, reading its manifest. Shard contents are
    /// loaded lazily, one file at a time, on first lookup that falls in their
    /// range.
    pub fn open(shard_dir: impl AsRef<Path>) -> RetrieveResult<Self> {
        let mut shards = read_manifest(shard_dir)?;
        shards.sort_by(|a, b| a.start_term.cmp(&b.start_term));
        Ok(Self {
            shards,
            cache: RefCell::new(HashMap::new()),
        })
    }

    /// The shard whose `[start_term, end_term]` range covers `term`, if any.
    fn covering_shard(&self, term: &str) -> Option<&ShardMeta> {
        self.shards
            .iter()
            .find(|s| s.start_term.as_str() <= term && term <= s.end_term.as_str())
    }

    fn load_shard(&self, shard: &ShardMeta) -> RetrieveResult<()> {
        if self.cache.borrow().contains_key(&shard.path) {
            return Ok(());
        }
        let reader = BufReader::new(File::open(&shard.path)?);
        let mut entries = HashMap::new();
        for line in reader.lines() {
            let line = line?;
            if line.is_empty() {
                continue;
            }
            let term_line = parse_final_line(&line)?;
            entries.insert(term_line.term.clone(), term_line);
        }
        self.cache.borrow_mut().insert(shard.path.clone(), entries);
        Ok(())
    }

    /// Look up the full term line (postings + idf) for `term`, if present.
    pub fn get_token_search(&self, term: &str) -> RetrieveResult<Option<TermLine>> {
        let Some(shard) = self.covering_shard(term) else {
            return Ok(None);
        };
        self.load_shard(shard)?;
        Ok(self
            .cache
            .borrow()
            .get(&shard.path)
            .and_then(|entries| entries.get(term))
            .cloned())
    }

    /// Cached idf for `term`, or 0.0 if the term is absent from the index
    /// entirely. Note this returns idf, not a document-frequency count,
    /// despite the name "freq".
    pub fn get_token_freq(&self, term: &str) -> RetrieveResult<f32> {
        Ok(self
            .get_token_search(term)?
            .and_then(|t| t.idf)
            .unwrap_or(0.0))
    }
}
