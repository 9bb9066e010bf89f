//! External k-way merge: folds the SPIMI builder's run files down to one
//! term-sorted file, bounded to `fan_in` open readers at a time.
//!
//! Grounded on `Indexer._merge_docs`: each pass
//! takes up to `fan_in` run files, merges them with a streaming lookahead
//! reader per file (never materializing a whole run in memory), and writes
//! `index-part-<counter>.txt` outputs. Passes repeat until one file remains,
//! which the caller renames to the merged index.

use crate::error::RetrieveResult;
use crate::posting::{parse_run_line, TermLine};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Default number of run files merged together per pass.
pub const DEFAULT_FAN_IN: usize = 5;

/// A single open run file with one line of lookahead.
struct RunReader {
    lines: std::io::Lines<BufReader<File>>,
    pending: Option<TermLine>,
}

impl RunReader {
    fn open(path: &Path) -> RetrieveResult<Self> {
        let file = File::open(path)?;
        let mut lines = BufReader::new(file).lines();
        let pending = Self::read_next(&mut lines)?;
        Ok(Self { lines, pending })
    }

    fn read_next(lines: &mut std::io::Lines<BufReader<File>>) -> RetrieveResult<Option<TermLine>> {
        match lines.next() {
            Some(line) => {
                let line = line?;
                if line.is_empty() {
                    Self::read_next(lines)
                } else {
                    Ok(Some(parse_run_line(&line)?))
                }
            }
            None => Ok(None),
        }
    }

    fn advance(&mut self) -> RetrieveResult<()> {
        self.pending = Self::read_next(&mut self.lines)?;
        Ok(())
    }
}

/// Merge all `index-part-*.txt` run files under `index_dir` into one sorted
/// file, `fan_in` at a time, deleting consumed run files as each pass
/// completes. Returns the path of the single surviving merged file.
///
/// Pass outputs are written under a `merge-part-` prefix, distinct from the
/// SPIMI build's `index-part-` run files: the output counter starts from 1,
/// and reusing the input prefix would let an early chunk's output path
/// collide with a same-pass input file that hasn't been read yet.
pub fn merge_runs(index_dir: impl AsRef<Path>, fan_in: usize) -> RetrieveResult<PathBuf> {
    let index_dir = index_dir.as_ref();
    let mut counter: u64 = 0;
    let mut runs = list_run_files(index_dir)?;

    loop {
        if runs.len() <= 1 {
            break;
        }
        let mut next_runs = Vec::new();
        for chunk in runs.chunks(fan_in) {
            counter += 1;
            let out_path = index_dir.join(format!("merge-part-{counter}.txt"));
            merge_chunk(chunk, &out_path)?;
            for path in chunk {
                std::fs::remove_file(path)?;
            }
            next_runs.push(out_path);
        }
        runs = next_runs;
    }

    match runs.into_iter().next() {
        Some(path) => Ok(path),
        None => {
            // No run files at all: produce an empty merged file so downstream
            // stages always have something to operate on.
            let path = index_dir.join("merge-part-1.txt");
            File::create(&path)?;
            Ok(path)
        }
    }
}

/// List `index-part-*.txt` files in `index_dir`, sorted by filename so merge
/// order is deterministic across runs.
fn list_run_files(index_dir: &Path) -> RetrieveResult<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(index_dir)? {
        let entry = entry?;
        let path = entry.path();
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
        if name.starts_with("index-part-") && name.ends_with(".txt") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// K-way merge one chunk of run files into `out_path`. When two or more input
/// files carry the same term, their postings are concatenated in input order
/// (this only happens across merge passes for a term whose postings were
/// split across SPIMI flushes; a single document never appears twice under
/// one term because `PartialIndex` keys postings by term within one flush).
fn merge_chunk(paths: &[PathBuf], out_path: &Path) -> RetrieveResult<()> {
    let mut readers: Vec<RunReader> = paths
        .iter()
        .map(|p| RunReader::open(p))
        .collect::<RetrieveResult<Vec<_>>>()?;

    let out = File::create(out_path)?;
    let mut writer = BufWriter::new(out);

    loop {
        // Find the reader(s) whose pending term is lexicographically smallest.
        let mut min_term: Option<String> = None;
        for reader in &readers {
            if let Some(term_line) = &reader.pending {
                if min_term.as_ref().map(|m| &term_line.term < m).unwrap_or(true) {
                    min_term = Some(term_line.term.clone());
                }
            }
        }

        let Some(term) = min_term else { break };

        let mut merged = TermLine {
            term: term.clone(),
            idf: None,
            postings: Vec::new(),
        };

        for reader in &mut readers {
            let matches = reader
                .pending
                .as_ref()
                .map(|t| t.term == term)
                .unwrap_or(false);
            if matches {
                let term_line = reader.pending.take().unwrap();
                merged.postings.extend(term_line.postings);
                reader.advance()?;
            }
        }

        writeln!(writer, "{merged}")?;
    }

    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    fn write_run(dir: &Path, name: &str, lines: &[&str]) -> PathBuf {
        let path = dir.join(name);
        let mut file = File::create(&path).unwrap();
        for line in lines {
            writeln!(file, "{line}").unwrap();
        }
        path
    }

    #[test]
    fn merges_two_runs_in_term_order() {
        let dir = tempfile::tempdir().unwrap();
        write_run(dir.path(), "index-part-1.txt", &["apple;d1:1.00", "zebra;d2:1.00"]);
        write_run(dir.path(), "index-part-2.txt", &["mango;d3:1.00"]);

        let merged_path = merge_runs(dir.path(), 5).unwrap();
        let contents = std::fs::read_to_string(&merged_path).unwrap();
        let terms: Vec<&str> = contents.lines().map(|l| l.split(';').next().unwrap()).collect();
        assert_eq!(terms, vec!["apple", "mango", "zebra"]);
    }

    #[test]
    fn concatenates_postings_for_shared_terms_across_runs() {
        let dir = tempfile::tempdir().unwrap();
        write_run(dir.path(), "index-part-1.txt", &["fox;d1:1.00"]);
        write_run(dir.path(), "index-part-2.txt", &["fox;d2:0.50"]);

        let merged_path = merge_runs(dir.path(), 5).unwrap();
        let contents = std::fs::read_to_string(&merged_path).unwrap();
        let term_line = parse_run_line(contents.lines().next().unwrap()).unwrap();
        assert_eq!(term_line.postings.len(), 2);
    }

    #[test]
    fn bounded_fan_in_runs_multiple_passes() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..7 {
            write_run(
                dir.path(),
                &format!("index-part-{i}.txt"),
                &[&format!("term{i};d{i}:1.00")],
            );
        }

        let merged_path = merge_runs(dir.path(), 2).unwrap();
        let contents = std::fs::read_to_string(&merged_path).unwrap();
        assert_eq!(contents.lines().count(), 7);
        // Only the final merged file should remain in the directory.
        let remaining: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(remaining.len(), 1);
    }

    #[test]
    fn no_run_files_yields_empty_merged_file() {
        let dir = tempfile::tempdir().unwrap();
        let merged_path = merge_runs(dir.path(), 5).unwrap();
        let contents = std::fs::read_to_string(&merged_path).unwrap();
        assert!(contents.is_empty());
    }
}
