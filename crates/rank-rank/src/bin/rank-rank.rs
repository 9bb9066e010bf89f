//! CLI entry point: build an index from a CSV corpus, then either run a
//! single query or evaluate a batch of judged query topics against it.
//!
//! Grounded on `main.py`'s argparse surface: a corpus path, a tokenizer
//! switch, an optional flat-index dump path, a BM25-vs-tfidf switch with
//! its own parameter overrides, and query/relevance-file inputs for
//! evaluation mode. Parameter-range errors are reported before any
//! indexing work starts, a fail-fast discipline.

use anyhow::{bail, Context, Result};
use clap::Parser;
use rank_retrieve::prelude::*;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "rank-rank", about = "External-memory SPIMI index builder and ranked retriever")]
struct Cli {
    /// CSV corpus file to index.
    #[arg(short = 'f', long = "corpus")]
    corpus: PathBuf,

    /// Use the improved (stopwords + stemming) tokenizer instead of the
    /// simple one.
    #[arg(short = 't', long = "improved-tokenizer", default_value_t = false)]
    improved_tokenizer: bool,

    /// Additionally write a single flat (unsharded) index file here.
    #[arg(short = 'w', long = "write-flat")]
    write_flat: Option<PathBuf>,

    /// Score with BM25 instead of tf-idf.
    #[arg(short = 'b', long = "bm25", default_value_t = false)]
    bm25: bool,

    /// BM25 k1, must be in (1, 2). Requires -b.
    #[arg(long = "bk1")]
    bk1: Option<f32>,

    /// BM25 b, must be in (0, 1). Requires -b.
    #[arg(long = "bb")]
    bb: Option<f32>,

    /// Retain term positions and compute the proximity boost.
    #[arg(short = 'p', long = "positions", default_value_t = false)]
    positions: bool,

    /// Query topics file (newline-delimited text, or TREC-style XML if it
    /// ends in `.xml`). Without this, the CLI only builds the index.
    #[arg(short = 'q', long = "queries")]
    queries: Option<PathBuf>,

    /// Relevance judgements file. Requires -q; when present, runs the
    /// evaluator instead of printing raw search results.
    #[arg(long = "qr")]
    relevance: Option<PathBuf>,

    /// Working directory for transient build files.
    #[arg(long = "work-dir", default_value = "work")]
    work_dir: PathBuf,

    /// Directory the final sharded index is written to.
    #[arg(long = "index-dir", default_value = "index")]
    index_dir: PathBuf,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mode = resolve_scoring_mode(cli.bm25, cli.positions);
    let bm25_params = resolve_bm25_params(&cli)?;

    if cli.relevance.is_some() && cli.queries.is_none() {
        bail!("--qr requires -q/--queries");
    }

    if !cli.corpus.exists() {
        bail!("corpus file not found: {:?}", cli.corpus);
    }

    if cli.improved_tokenizer {
        run(&cli, mode, bm25_params, StopwordStemmingTokenizer::new())
    } else {
        run(&cli, mode, bm25_params, SimpleTokenizer)
    }
}

fn resolve_scoring_mode(bm25: bool, positions: bool) -> ScoringMode {
    match (bm25, positions) {
        (false, false) => ScoringMode::TfIdf,
        (false, true) => ScoringMode::TfIdfPositional,
        (true, false) => ScoringMode::Bm25,
        (true, true) => ScoringMode::Bm25Positional,
    }
}

fn resolve_bm25_params(cli: &Cli) -> Result<Bm25Params> {
    if !cli.bm25 {
        if cli.bk1.is_some() || cli.bb.is_some() {
            bail!("--bk1/--bb require -b");
        }
        return Ok(Bm25Params::default());
    }

    let params = Bm25Params {
        k1: cli.bk1.unwrap_or(Bm25Params::default().k1),
        b: cli.bb.unwrap_or(Bm25Params::default().b),
    };
    params.validate().map_err(anyhow::Error::msg)?;
    Ok(params)
}

fn run<T: Tokenizer>(cli: &Cli, mode: ScoringMode, bm25: Bm25Params, tokenizer: T) -> Result<()> {
    let mut corpus = CsvCorpusReader::open(&cli.corpus)
        .with_context(|| format!("opening corpus {:?}", cli.corpus))?;

    println!("building index from {:?} (mode={:?})", cli.corpus, mode);
    let outcome = build_index_with_flat_copy(
        &mut corpus,
        &tokenizer,
        &cli.work_dir,
        &cli.index_dir,
        BuildConfig { mode, ..BuildConfig::default() },
        bm25,
        rank_retrieve::shard::DEFAULT_SHARD_BYTES,
        cli.write_flat.as_deref(),
    )?;
    println!(
        "indexed {} documents into {} shard(s)",
        outcome.stats.number_of_read_docs,
        outcome.shards.len()
    );
    if let Some(flat) = &cli.write_flat {
        println!("wrote flat index to {flat:?}");
    }

    let Some(queries_path) = &cli.queries else {
        return Ok(());
    };

    let reader = IndexReader::open(&cli.index_dir)?;
    let engine = QueryEngine::new(&reader, &tokenizer, mode);
    let topics = read_topics(queries_path)?;

    let Some(relevance_path) = &cli.relevance else {
        for topic in &topics {
            println!("query {}: {:?}", topic.id, topic.text);
            for doc in engine.search(&topic.text)?.into_iter().take(10) {
                println!("  {} {:.4}", doc.doc, doc.score);
            }
        }
        return Ok(());
    };

    let judgements = rank_retrieve::eval::read_relevance_file(relevance_path)
        .with_context(|| format!("reading relevance judgements {relevance_path:?}"))?;
    let evaluator = Evaluator::new(&engine, &judgements);
    let (_, aggregate) = evaluator.evaluate_all(&topics)?;
    print_metrics(&aggregate);

    Ok(())
}

fn read_topics(path: &PathBuf) -> Result<Vec<QueryTopic>> {
    let is_xml = path.extension().and_then(|e| e.to_str()) == Some("xml");
    let topics = if is_xml {
        rank_retrieve::eval::read_queries_xml(path)
    } else {
        rank_retrieve::eval::read_queries_txt(path)
    };
    topics.with_context(|| format!("reading query topics {path:?}"))
}

fn print_metrics(aggregate: &AggregateMetrics) {
    println!("{:<6} {:>8} {:>8} {:>8} {:>8} {:>8}", "k", "P@k", "R@k", "F@k", "AP@k", "NDCG@k");
    for &k in &rank_retrieve::eval::EVAL_KS {
        println!(
            "{:<6} {:>8.4} {:>8.4} {:>8.4} {:>8.4} {:>8.4}",
            k,
            aggregate.mean_precision[&k],
            aggregate.mean_recall[&k],
            aggregate.mean_f1[&k],
            aggregate.mean_average_precision[&k],
            aggregate.mean_ndcg[&k],
        );
    }
    println!(
        "median latency: {:.4}s, throughput: {:.2} queries/s",
        aggregate.median_latency_seconds, aggregate.throughput_queries_per_second
    );
}
