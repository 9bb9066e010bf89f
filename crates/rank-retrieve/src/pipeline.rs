//! Top-level orchestration: wires the build, merge, weight, and shard stages
//! into the single `indexing()` call a caller actually wants.
//!
//! Grounded on `Indexer.indexing()`, which runs `_create_index_directory ->
//! _spimi_build -> _merge_docs -> _calculate_weights -> _divide_docs` in
//! sequence. The "recreate the index directory" step makes a rebuild
//! idempotent: a prior partial build's run files never leak into a fresh one.

use crate::corpus::CorpusReader;
use crate::error::RetrieveResult;
use crate::merge::{self, DEFAULT_FAN_IN};
use crate::shard::{self, ShardMeta, DEFAULT_SHARD_BYTES};
use crate::spimi::{self, Bm25Params, BuildConfig, BuildStats, ScoringMode};
use crate::tokenizer::Tokenizer;
use std::path::{Path, PathBuf};

/// Everything the build pipeline produced, needed to open an [`crate::reader::IndexReader`]
/// and report on the build.
#[derive(Debug, Clone)]
pub struct BuildOutcome {
    pub shards: Vec<ShardMeta>,
    pub stats: BuildStats,
}

/// Delete `dir` if present and recreate it empty. Used for both the working
/// index directory and the shard directory, so a rebuild never mixes stale
/// files from a previous, possibly-interrupted run.
fn recreate_dir(dir: &Path) -> RetrieveResult<()> {
    if dir.exists() {
        std::fs::remove_dir_all(dir)?;
    }
    std::fs::create_dir_all(dir)?;
    Ok(())
}

/// Run the full SPIMI build -> merge -> weight -> shard pipeline.
///
/// `work_dir` holds transient run/merge/final files and is recreated empty on
/// entry; `shard_dir` holds the durable shard files a later [`crate::reader::IndexReader`]
/// will open, and is also recreated empty (a fresh build fully replaces any
/// index previously written there).
pub fn build_index<C: CorpusReader, T: Tokenizer>(
    corpus: &mut C,
    tokenizer: &T,
    work_dir: impl AsRef<Path>,
    shard_dir: impl AsRef<Path>,
    config: BuildConfig,
    bm25: Bm25Params,
    shard_bytes: usize,
) -> RetrieveResult<BuildOutcome> {
    build_index_with_flat_copy(
        corpus, tokenizer, work_dir, shard_dir, config, bm25, shard_bytes, None,
    )
}

/// As [`build_index`], but if `flat_copy` is given, the fully-weighted flat
/// final index (pre-sharding) is copied there before it is consumed by the
/// shard splitter. This backs the CLI's `-w PATH` flag, which asks for a
/// single flat index file in addition to the sharded one the reader uses.
#[allow(clippy::too_many_arguments)]
pub fn build_index_with_flat_copy<C: CorpusReader, T: Tokenizer>(
    corpus: &mut C,
    tokenizer: &T,
    work_dir: impl AsRef<Path>,
    shard_dir: impl AsRef<Path>,
    config: BuildConfig,
    bm25: Bm25Params,
    shard_bytes: usize,
    flat_copy: Option<&Path>,
) -> RetrieveResult<BuildOutcome> {
    let work_dir = work_dir.as_ref();
    let shard_dir = shard_dir.as_ref();

    recreate_dir(work_dir)?;
    recreate_dir(shard_dir)?;

    println!("Start spimi algorithm");
    let stats = spimi::build(corpus, tokenizer, work_dir, config)?;

    println!("Start merging");
    let merged_path = merge::merge_runs(work_dir, DEFAULT_FAN_IN)?;

    println!("Start weighting");
    let final_path = weight(&merged_path, &stats, config.mode, bm25)?;

    if let Some(flat_path) = flat_copy {
        std::fs::copy(&final_path, flat_path)?;
    }

    println!("Start sharding");
    let shards = shard::split_into_shards(&final_path, shard_dir, shard_bytes)?;

    Ok(BuildOutcome { shards, stats })
}

/// As [`build_index`], but with fan-in and shard-size defaults applied.
pub fn build_index_with_defaults<C: CorpusReader, T: Tokenizer>(
    corpus: &mut C,
    tokenizer: &T,
    work_dir: impl AsRef<Path>,
    shard_dir: impl AsRef<Path>,
    mode: ScoringMode,
    bm25: Bm25Params,
) -> RetrieveResult<BuildOutcome> {
    build_index(
        corpus,
        tokenizer,
        work_dir,
        shard_dir,
        BuildConfig {
            mode,
            ..BuildConfig::default()
        },
        bm25,
        DEFAULT_SHARD_BYTES,
    )
}

fn weight(
    merged_path: &Path,
    stats: &BuildStats,
    mode: ScoringMode,
    bm25: Bm25Params,
) -> RetrieveResult<PathBuf> {
    let final_path = merged_path
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join("final.txt");

    if mode.is_bm25() {
        crate::weighter::weight_bm25(
            merged_path,
            stats.number_of_read_docs,
            stats.total_doc_length_sum,
            bm25,
            &final_path,
        )?;
    } else {
        crate::weighter::weight_tfidf(merged_path, stats.number_of_read_docs, &final_path)?;
    }

    Ok(final_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::SimpleTokenizer;
    use std::collections::BTreeMap;

    struct FixedCorpus {
        docs: Vec<(String, String)>,
        cursor: usize,
        read: u64,
    }

    impl FixedCorpus {
        fn new(docs: Vec<(&str, &str)>) -> Self {
            Self {
                docs: docs.into_iter().map(|(a, b)| (a.to_string(), b.to_string())).collect(),
                cursor: 0,
                read: 0,
            }
        }
    }

    impl CorpusReader for FixedCorpus {
        fn next_batch(&mut self, n: usize) -> RetrieveResult<(BTreeMap<String, String>, bool)> {
            let mut batch = BTreeMap::new();
            let end = (self.cursor + n).min(self.docs.len());
            for (id, text) in &self.docs[self.cursor..end] {
                batch.insert(id.clone(), text.clone());
            }
            self.read += (end - self.cursor) as u64;
            self.cursor = end;
            Ok((batch, self.cursor >= self.docs.len()))
        }

        fn number_of_read_docs(&self) -> u64 {
            self.read
        }
    }

    #[test]
    fn full_pipeline_produces_queryable_shards() {
        let mut corpus = FixedCorpus::new(vec![
            ("d1", "the quick brown fox"),
            ("d2", "the lazy dog sleeps"),
            ("d3", "quick foxes jump high"),
        ]);
        let tokenizer = SimpleTokenizer;
        let root = tempfile::tempdir().unwrap();
        let work_dir = root.path().join("work");
        let shard_dir = root.path().join("shards");

        let outcome = build_index_with_defaults(
            &mut corpus,
            &tokenizer,
            &work_dir,
            &shard_dir,
            ScoringMode::TfIdf,
            Bm25Params::default(),
        )
        .unwrap();

        assert_eq!(outcome.stats.number_of_read_docs, 3);
        assert!(!outcome.shards.is_empty());

        let reader = crate::reader::IndexReader::open(&shard_dir).unwrap();
        assert!(reader.get_token_search("quick").unwrap().is_some());
        assert!(reader.get_token_search("absent").unwrap().is_none());
    }

    #[test]
    fn rebuild_recreates_directories_cleanly() {
        let mut corpus = FixedCorpus::new(vec![("d1", "alpha beta gamma")]);
        let tokenizer = SimpleTokenizer;
        let root = tempfile::tempdir().unwrap();
        let work_dir = root.path().join("work");
        let shard_dir = root.path().join("shards");

        build_index_with_defaults(
            &mut corpus,
            &tokenizer,
            &work_dir,
            &shard_dir,
            ScoringMode::TfIdf,
            Bm25Params::default(),
        )
        .unwrap();

        std::fs::write(shard_dir.join("stale.txt"), b"leftover").unwrap();

        let mut corpus2 = FixedCorpus::new(vec![("d2", "delta epsilon")]);
        build_index_with_defaults(
            &mut corpus2,
            &tokenizer,
            &work_dir,
            &shard_dir,
            ScoringMode::TfIdf,
            Bm25Params::default(),
        )
        .unwrap();

        assert!(!shard_dir.join("stale.txt").exists());
    }
}
