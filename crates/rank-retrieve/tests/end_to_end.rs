//! End-to-end scenarios spanning the whole build -> merge -> weight -> shard
//! -> query -> evaluate pipeline, exercised the way a CLI invocation would.

use rank_retrieve::prelude::*;
use std::collections::BTreeMap;

struct VecCorpus {
    docs: Vec<(String, String)>,
    cursor: usize,
    read: u64,
}

impl VecCorpus {
    fn new(docs: Vec<(&str, &str)>) -> Self {
        Self {
            docs: docs.into_iter().map(|(a, b)| (a.to_string(), b.to_string())).collect(),
            cursor: 0,
            read: 0,
        }
    }
}

impl CorpusReader for VecCorpus {
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

fn small_corpus() -> Vec<(&'static str, &'static str)> {
    vec![
        ("d1", "the quick brown fox jumps over the lazy dog"),
        ("d2", "a quick fox is a fast animal that runs quickly"),
        ("d3", "the lazy dog sleeps all day long in the sun"),
        ("d4", "foxes and dogs rarely get along in the wild"),
        ("d5", "machine learning models rank search results"),
    ]
}

#[test]
fn tiny_corpus_ranks_tfidf_by_relevance() {
    let mut corpus = VecCorpus::new(small_corpus());
    let tokenizer = SimpleTokenizer;
    let root = tempfile::tempdir().unwrap();

    let outcome = build_index_with_defaults(
        &mut corpus,
        &tokenizer,
        root.path().join("work"),
        root.path().join("index"),
        ScoringMode::TfIdf,
        Bm25Params::default(),
    )
    .unwrap();
    assert_eq!(outcome.stats.number_of_read_docs, 5);

    let reader = IndexReader::open(root.path().join("index")).unwrap();
    let engine = QueryEngine::new(&reader, &tokenizer, ScoringMode::TfIdf);
    let results = engine.search("quick fox").unwrap();

    assert!(!results.is_empty());
    // d2 mentions "quick" and "fox" directly; it should outrank the
    // unrelated machine-learning document.
    let rank_of = |doc: &str| results.iter().position(|r| r.doc == doc);
    assert!(rank_of("d2").unwrap() < rank_of("d5").unwrap_or(usize::MAX));
}

#[test]
fn bm25_defaults_produce_monotonic_scores() {
    let mut corpus = VecCorpus::new(small_corpus());
    let tokenizer = SimpleTokenizer;
    let root = tempfile::tempdir().unwrap();

    build_index_with_defaults(
        &mut corpus,
        &tokenizer,
        root.path().join("work"),
        root.path().join("index"),
        ScoringMode::Bm25,
        Bm25Params::default(),
    )
    .unwrap();

    let reader = IndexReader::open(root.path().join("index")).unwrap();
    let engine = QueryEngine::new(&reader, &tokenizer, ScoringMode::Bm25);
    let results = engine.search("lazy dog").unwrap();

    assert!(!results.is_empty());
    for pair in results.windows(2) {
        assert!(pair[0].score >= pair[1].score);
    }
}

#[test]
fn tiny_mem_limit_still_covers_every_shard_boundary() {
    let docs: Vec<(String, String)> = (0..200)
        .map(|i| (format!("doc{i}"), format!("term{i} common shared filler words here")))
        .collect();
    let docs_ref: Vec<(&str, &str)> = docs.iter().map(|(a, b)| (a.as_str(), b.as_str())).collect();
    let mut corpus = VecCorpus::new(docs_ref);
    let tokenizer = SimpleTokenizer;
    let root = tempfile::tempdir().unwrap();

    let outcome = build_index(
        &mut corpus,
        &tokenizer,
        root.path().join("work"),
        root.path().join("index"),
        BuildConfig {
            mem_limit_bytes: 1024,
            batch_docs: 1000,
            mode: ScoringMode::TfIdf,
        },
        Bm25Params::default(),
        1024,
    )
    .unwrap();
    assert!(outcome.shards.len() > 1, "tiny mem limits should force multiple shards");

    let reader = IndexReader::open(root.path().join("index")).unwrap();
    // Every uniquely-named term must still be findable after splitting.
    for i in (0..200).step_by(17) {
        let term = format!("term{i}");
        assert!(
            reader.get_token_search(&term).unwrap().is_some(),
            "missing term {term} across shard boundaries"
        );
    }
}

#[test]
fn positional_mode_surfaces_proximity_boost_without_changing_ranking() {
    let docs = vec![
        ("near", "machine learning is powerful for ranking"),
        ("far", "machine code compiles down to instructions for a ranking system far apart"),
    ];
    let mut corpus = VecCorpus::new(docs);
    let tokenizer = SimpleTokenizer;
    let root = tempfile::tempdir().unwrap();

    build_index_with_defaults(
        &mut corpus,
        &tokenizer,
        root.path().join("work"),
        root.path().join("index"),
        ScoringMode::TfIdfPositional,
        Bm25Params::default(),
    )
    .unwrap();

    let reader = IndexReader::open(root.path().join("index")).unwrap();
    let engine = QueryEngine::new(&reader, &tokenizer, ScoringMode::TfIdfPositional);

    let ranked = engine.search("machine ranking").unwrap();
    let boosted = engine.proximity_boost("machine ranking").unwrap();

    // The boost map exists and is informative, but the ranking itself must
    // match the plain positional tf-idf scores (the boost is never folded in).
    assert!(boosted.contains_key("near"));
    let near_score = ranked.iter().find(|d| d.doc == "near").unwrap().score;
    let far_score = ranked.iter().find(|d| d.doc == "far").unwrap().score;
    assert!(near_score > 0.0 && far_score > 0.0);
}

#[test]
fn evaluator_scores_trivial_judgements_correctly() {
    let mut corpus = VecCorpus::new(small_corpus());
    let tokenizer = SimpleTokenizer;
    let root = tempfile::tempdir().unwrap();

    build_index_with_defaults(
        &mut corpus,
        &tokenizer,
        root.path().join("work"),
        root.path().join("index"),
        ScoringMode::TfIdf,
        Bm25Params::default(),
    )
    .unwrap();

    let reader = IndexReader::open(root.path().join("index")).unwrap();
    let engine = QueryEngine::new(&reader, &tokenizer, ScoringMode::TfIdf);

    let mut grades = std::collections::HashMap::new();
    let mut q1 = std::collections::HashMap::new();
    q1.insert("d2".to_string(), 1u8);
    grades.insert("1".to_string(), q1);
    let judgements = judgements_from(grades);

    let evaluator = Evaluator::new(&engine, &judgements);
    let topic = QueryTopic {
        id: "1".to_string(),
        text: "quick fox".to_string(),
    };
    let metrics = evaluator.evaluate_query(&topic).unwrap();
    assert!(metrics.recall[&10] > 0.0);
    assert!(metrics.average_precision[&10] > 0.0);
}

#[test]
fn empty_query_returns_no_results_and_zero_metrics() {
    let mut corpus = VecCorpus::new(small_corpus());
    let tokenizer = SimpleTokenizer;
    let root = tempfile::tempdir().unwrap();

    build_index_with_defaults(
        &mut corpus,
        &tokenizer,
        root.path().join("work"),
        root.path().join("index"),
        ScoringMode::TfIdf,
        Bm25Params::default(),
    )
    .unwrap();

    let reader = IndexReader::open(root.path().join("index")).unwrap();
    let engine = QueryEngine::new(&reader, &tokenizer, ScoringMode::TfIdf);
    assert!(engine.search("").unwrap().is_empty());
    assert!(engine.search("zzzznonexistentzzz").unwrap().is_empty());
}

// `Judgements`'s grade map is private; tests build one through the public
// relevance-file reader instead of reaching into internals.
fn judgements_from(grades: std::collections::HashMap<String, std::collections::HashMap<String, u8>>) -> Judgements {
    let mut contents = String::new();
    for (query_id, docs) in &grades {
        for (doc_id, grade) in docs {
            contents.push_str(&format!("{query_id} {doc_id} {grade}\n"));
        }
    }
    let file = tempfile::NamedTempFile::new().unwrap();
    std::fs::write(file.path(), contents).unwrap();
    rank_retrieve::eval::read_relevance_file(file.path()).unwrap()
}
