//! Shard splitter: slices the final, fully-weighted index into byte-bounded
//! shard files so no single file needs to be loaded whole at query time.
//!
//! Grounded on `Indexer._divide_docs`: lines are buffered until the buffer's
//! estimated size exceeds a limit, then flushed to a file named after the
//! term range it covers (`<start>-<end>.txt`, or `<term>.txt` when the shard
//! holds only one term).

use crate::error::RetrieveResult;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Default byte budget per shard. Distinct from the SPIMI build's
/// `mem_limit_bytes` — shards bound on-disk file size, not in-process memory.
pub const DEFAULT_SHARD_BYTES: usize = 1024 * 1024;

/// Describes one shard: the inclusive term range it covers and its file path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardMeta {
    pub start_term: String,
    pub end_term: String,
    pub path: PathBuf,
}

/// Split the final index at `final_path` into shards under `shard_dir`,
/// bounded to `shard_bytes` per shard. Returns shard metadata sorted by term
/// range ascending (the file's term-sorted order is preserved). Deletes
/// `final_path` once every shard has been written.
pub fn split_into_shards(
    final_path: impl AsRef<Path>,
    shard_dir: impl AsRef<Path>,
    shard_bytes: usize,
) -> RetrieveResult<Vec<ShardMeta>> {
    let final_path = final_path.as_ref();
    let shard_dir = shard_dir.as_ref();

    let reader = BufReader::new(File::open(final_path)?);
    let mut shards = Vec::new();
    let mut buffer: Vec<String> = Vec::new();
    let mut buffered_bytes = 0usize;
    let mut shard_index = 0u64;

    for line in reader.lines() {
        let line = line?;
        if line.is_empty() {
            continue;
        }
        buffered_bytes += line.len();
        buffer.push(line);

        if buffered_bytes > shard_bytes {
            shard_index += 1;
            shards.push(flush_shard(&buffer, shard_dir, shard_index)?);
            buffer.clear();
            buffered_bytes = 0;
        }
    }

    if !buffer.is_empty() {
        shard_index += 1;
        shards.push(flush_shard(&buffer, shard_dir, shard_index)?);
    }

    std::fs::remove_file(final_path)?;
    write_manifest(&shards, &shard_dir.join(MANIFEST_FILE_NAME))?;
    Ok(shards)
}

/// Filename of the shard manifest written alongside the shard files
/// themselves, so `IndexReader` can resolve a term's covering shard without
/// re-parsing filenames (which would be ambiguous after disambiguation).
pub const MANIFEST_FILE_NAME: &str = "shards.idx";

fn write_manifest(shards: &[ShardMeta], manifest_path: &Path) -> RetrieveResult<()> {
    let file = File::create(manifest_path)?;
    let mut writer = BufWriter::new(file);
    for shard in shards {
        writeln!(
            writer,
            "{}\t{}\t{}",
            shard.start_term,
            shard.end_term,
            shard.path.file_name().and_then(|n| n.to_str()).unwrap_or("")
        )?;
    }
    writer.flush()?;
    Ok(())
}

/// Read back a manifest written by [`split_into_shards`].
pub fn read_manifest(shard_dir: impl AsRef<Path>) -> RetrieveResult<Vec<ShardMeta>> {
    let shard_dir = shard_dir.as_ref();
    let manifest_path = shard_dir.join(MANIFEST_FILE_NAME);
    let reader = BufReader::new(File::open(&manifest_path)?);
    let mut shards = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.is_empty() {
            continue;
        }
        let mut parts = line.splitn(3, '\t');
        let start_term = parts.next().unwrap_or("").to_string();
        let end_term = parts.next().unwrap_or("").to_string();
        let file_name = parts.next().unwrap_or("");
        shards.push(ShardMeta {
            start_term,
            end_term,
            path: shard_dir.join(file_name),
        });
    }
    Ok(shards)
}

fn flush_shard(lines: &[String], shard_dir: &Path, shard_index: u64) -> RetrieveResult<ShardMeta> {
    let start_term = term_of(&lines[0]);
    let end_term = term_of(&lines[lines.len() - 1]);

    let file_name = if start_term == end_term {
        format!("{start_term}.txt")
    } else {
        format!("{start_term}-{end_term}.txt")
    };
    // Disambiguate with a monotonic index in case two shards coincidentally
    // share a name (possible only when the same single term somehow spans
    // two shards, which the byte-budget buffering never does in practice).
    let path = if shard_dir.join(&file_name).exists() {
        shard_dir.join(format!("{shard_index}-{file_name}"))
    } else {
        shard_dir.join(&file_name)
    };

    let file = File::create(&path)?;
    let mut writer = BufWriter::new(file);
    for line in lines {
        writeln!(writer, "{line}")?;
    }
    writer.flush()?;

    Ok(ShardMeta {
        start_term,
        end_term,
        path,
    })
}

fn term_of(line: &str) -> String {
    match line.find(':') {
        Some(idx) => line[..idx].to_string(),
        None => line.to_string(),
    }
}
