//! External-memory SPIMI inverted-index builder and ranked-retrieval engine.
//!
//! A text collection too large to index in memory is read in batches
//! ([`corpus`]), tokenized ([`tokenizer`]), and accumulated into sorted run
//! files bounded by a memory budget ([`spimi`]). Run files are folded down to
//! one sorted file by an external k-way merge ([`merge`]), reweighted into
//! tf-idf or BM25 form once global document frequencies are known
//! ([`weighter`]), and split into byte-bounded shards for low-memory querying
//! ([`shard`]). [`reader`] resolves a term to its shard and serves lookups;
//! [`query`] ranks documents against a query string; [`eval`] scores a ranked
//! retriever against relevance judgements.
//!
//! [`pipeline::build_index`] wires the build/merge/weight/shard stages
//! together for the common case of building a fresh index from scratch.
//!
//! ```no_run
//! use rank_retrieve::corpus::CsvCorpusReader;
//! use rank_retrieve::pipeline::build_index_with_defaults;
//! use rank_retrieve::query::QueryEngine;
//! use rank_retrieve::reader::IndexReader;
//! use rank_retrieve::spimi::{Bm25Params, ScoringMode};
//! use rank_retrieve::tokenizer::SimpleTokenizer;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut corpus = CsvCorpusReader::open("corpus.csv")?;
//! let tokenizer = SimpleTokenizer;
//! build_index_with_defaults(
//!     &mut corpus,
//!     &tokenizer,
//!     "work",
//!     "index",
//!     ScoringMode::Bm25,
//!     Bm25Params::default(),
//! )?;
//!
//! let reader = IndexReader::open("index")?;
//! let engine = QueryEngine::new(&reader, &tokenizer, ScoringMode::Bm25);
//! for doc in engine.search("brown fox")? {
//!     println!("{} {}", doc.doc, doc.score);
//! }
//! # Ok(())
//! # }
//! ```

pub mod corpus;
pub mod error;
pub mod eval;
pub mod merge;
pub mod partial_index;
pub mod pipeline;
pub mod posting;
pub mod query;
pub mod reader;
pub mod shard;
pub mod spimi;
pub mod tokenizer;
pub mod weighter;

/// The common imports most callers need.
pub mod prelude {
    pub use crate::corpus::{CorpusReader, CsvCorpusReader};
    pub use crate::error::{RetrieveError, RetrieveResult};
    pub use crate::eval::{AggregateMetrics, Evaluator, Judgements, QueryMetrics, QueryTopic};
    pub use crate::pipeline::{
        build_index, build_index_with_defaults, build_index_with_flat_copy, BuildOutcome,
    };
    pub use crate::query::{QueryEngine, ScoredDoc};
    pub use crate::reader::IndexReader;
    pub use crate::spimi::{Bm25Params, BuildConfig, ScoringMode};
    pub use crate::tokenizer::{SimpleTokenizer, StopwordStemmingTokenizer, Tokenizer};
}
