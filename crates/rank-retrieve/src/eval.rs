//! Query topics, relevance judgements, and ranking evaluation.
//!
//! Grounded on `QueryReader`/`main.metrics`/`main.print_metrics` for the
//! query-topic/relevance-file formats and the metric set (P@k/R@k/F@k/AP@k/
//! NDCG@k for k in {10, 20, 50}, latency, throughput), and on
//! `rank-retrieve`'s `benchmark/metrics.rs` (`MetricStatistics`-style
//! aggregation, `mean`/percentile helpers) for how per-query metrics are
//! aggregated into a report. NDCG's discount here is `grade(r_1)` undiscounted,
//! `grade(r_i)/log2(i)` for `i >= 2` — distinct from the Burges
//! `log2(rank + 1)` variant some readers may expect.

use crate::error::{RetrieveError, RetrieveResult};
use crate::query::QueryEngine;
use crate::tokenizer::Tokenizer;
use quick_xml::events::Event;
use quick_xml::reader::Reader as XmlReader;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

/// Cutoffs every report is computed at.
pub const EVAL_KS: [usize; 3] = [10, 20, 50];

/// One query topic: an identifier and its free-text query.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryTopic {
    pub id: String,
    pub text: String,
}

/// Read newline-delimited queries, one per line, numbered from 1 in file
/// order (blank lines are skipped and do not consume a number).
pub fn read_queries_txt(path: impl AsRef<Path>) -> RetrieveResult<Vec<QueryTopic>> {
    let contents = fs::read_to_string(path)?;
    let mut topics = Vec::new();
    let mut next_id = 1u32;
    for line in contents.lines() {
        let text = line.trim();
        if text.is_empty() {
            continue;
        }
        topics.push(QueryTopic {
            id: next_id.to_string(),
            text: text.to_string(),
        });
        next_id += 1;
    }
    Ok(topics)
}

/// Read TREC-style XML query topics: `<topic number="N">query text</topic>`
/// elements, in any nesting under the document root.
pub fn read_queries_xml(path: impl AsRef<Path>) -> RetrieveResult<Vec<QueryTopic>> {
    let contents = fs::read_to_string(path)?;
    let mut reader = XmlReader::from_str(&contents);
    reader.config_mut().trim_text(true);

    let mut topics = Vec::new();
    let mut current_id: Option<String> = None;
    let mut current_text = String::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.name().as_ref() == b"topic" => {
                current_text.clear();
                for attr in e.attributes().flatten() {
                    if attr.key.as_ref() == b"number" {
                        current_id = Some(
                            String::from_utf8_lossy(&attr.value).trim().to_string(),
                        );
                    }
                }
            }
            Ok(Event::Text(t)) => {
                current_text.push_str(&t.unescape().map_err(|e| {
                    RetrieveError::FormatViolation(format!("invalid XML text: {e}"))
                })?);
            }
            Ok(Event::End(e)) if e.name().as_ref() == b"topic" => {
                if let Some(id) = current_id.take() {
                    topics.push(QueryTopic {
                        id,
                        text: current_text.trim().to_string(),
                    });
                }
                current_text.clear();
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(RetrieveError::FormatViolation(format!(
                    "malformed query topics XML: {e}"
                )))
            }
        }
        buf.clear();
    }

    Ok(topics)
}

/// Relevance judgements: `query_id -> doc_id -> grade` (0, 1, or 2).
#[derive(Debug, Default, Clone)]
pub struct Judgements {
    grades: HashMap<String, HashMap<String, u8>>,
}

impl Judgements {
    pub fn grade_of(&self, query_id: &str, doc: &str) -> u8 {
        self.grades
            .get(query_id)
            .and_then(|m| m.get(doc))
            .copied()
            .unwrap_or(0)
    }

    /// Documents judged relevant (grade >= 1) for `query_id`.
    pub fn relevant_docs(&self, query_id: &str) -> HashSet<&String> {
        self.grades
            .get(query_id)
            .map(|m| m.iter().filter(|(_, &g)| g >= 1).map(|(doc, _)| doc).collect())
            .unwrap_or_default()
    }

    /// Grades for `query_id`, sorted descending and truncated to `k` —
    /// the ideal ranking's relevance sequence, used to compute IDCG@k.
    pub fn ideal_grades(&self, query_id: &str, k: usize) -> Vec<u8> {
        let mut grades: Vec<u8> = self
            .grades
            .get(query_id)
            .map(|m| m.values().copied().collect())
            .unwrap_or_default();
        grades.sort_unstable_by(|a, b| b.cmp(a));
        grades.truncate(k);
        grades
    }
}

/// Read a relevance file: whitespace-separated `query_id doc_id grade` per
/// line.
pub fn read_relevance_file(path: impl AsRef<Path>) -> RetrieveResult<Judgements> {
    let contents = fs::read_to_string(path)?;
    let mut grades: HashMap<String, HashMap<String, u8>> = HashMap::new();

    for line in contents.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let mut parts = line.split_whitespace();
        let (Some(query_id), Some(doc_id), Some(grade_str)) =
            (parts.next(), parts.next(), parts.next())
        else {
            return Err(RetrieveError::FormatViolation(format!(
                "malformed relevance line: {line:?}"
            )));
        };
        let grade: u8 = grade_str.parse().map_err(|_| {
            RetrieveError::FormatViolation(format!("invalid relevance grade: {grade_str:?}"))
        })?;
        grades
            .entry(query_id.to_string())
            .or_default()
            .insert(doc_id.to_string(), grade);
    }

    Ok(Judgements { grades })
}

/// Per-query metrics at every cutoff in [`EVAL_KS`].
#[derive(Debug, Clone)]
pub struct QueryMetrics {
    pub query_id: String,
    pub precision: HashMap<usize, f32>,
    pub recall: HashMap<usize, f32>,
    pub f1: HashMap<usize, f32>,
    pub average_precision: HashMap<usize, f32>,
    pub ndcg: HashMap<usize, f32>,
    pub latency_seconds: f64,
}

/// Corpus-level aggregation across all evaluated queries.
#[derive(Debug, Clone)]
pub struct AggregateMetrics {
    pub mean_precision: HashMap<usize, f32>,
    pub mean_recall: HashMap<usize, f32>,
    pub mean_f1: HashMap<usize, f32>,
    pub mean_average_precision: HashMap<usize, f32>,
    pub mean_ndcg: HashMap<usize, f32>,
    pub median_latency_seconds: f64,
    pub throughput_queries_per_second: f64,
}

/// Evaluates a [`QueryEngine`] against a set of judged query topics.
pub struct Evaluator<'a, T: Tokenizer> {
    engine: &'a QueryEngine<'a, T>,
    judgements: &'a Judgements,
}

impl<'a, T: Tokenizer> Evaluator<'a, T> {
    pub fn new(engine: &'a QueryEngine<'a, T>, judgements: &'a Judgements) -> Self {
        Self { engine, judgements }
    }

    /// Run one query topic and compute its metrics at every cutoff.
    pub fn evaluate_query(&self, topic: &QueryTopic) -> RetrieveResult<QueryMetrics> {
        let start = std::time::Instant::now();
        let results = self.engine.search(&topic.text)?;
        let latency_seconds = start.elapsed().as_secs_f64();

        let relevant = self.judgements.relevant_docs(&topic.id);

        let mut precision = HashMap::new();
        let mut recall = HashMap::new();
        let mut f1 = HashMap::new();
        let mut average_precision = HashMap::new();
        let mut ndcg = HashMap::new();

        for &k in &EVAL_KS {
            let top_k = &results[..results.len().min(k)];

            let retrieved_relevant = top_k.iter().filter(|d| relevant.contains(&d.doc)).count();
            let p = retrieved_relevant as f32 / k as f32;
            let r = if relevant.is_empty() {
                0.0
            } else {
                retrieved_relevant as f32 / relevant.len() as f32
            };
            let f = if p + r > 0.0 { 2.0 * p * r / (p + r) } else { 0.0 };
            precision.insert(k, p);
            recall.insert(k, r);
            f1.insert(k, f);

            let mut hits = 0usize;
            let mut sum_precision = 0.0f32;
            for (i, doc) in top_k.iter().enumerate() {
                if relevant.contains(&doc.doc) {
                    hits += 1;
                    sum_precision += hits as f32 / (i + 1) as f32;
                }
            }
            let ap = if relevant.is_empty() {
                0.0
            } else {
                sum_precision / relevant.len() as f32
            };
            average_precision.insert(k, ap);

            let dcg: f32 = top_k
                .iter()
                .enumerate()
                .map(|(i, d)| {
                    let grade = self.judgements.grade_of(&topic.id, &d.doc) as f32;
                    if grade > 0.0 {
                        grade / dcg_discount(i + 1)
                    } else {
                        0.0
                    }
                })
                .sum();
            let ideal_grades = self.judgements.ideal_grades(&topic.id, k);
            let idcg: f32 = ideal_grades
                .iter()
                .enumerate()
                .map(|(i, &g)| {
                    if g > 0 {
                        g as f32 / dcg_discount(i + 1)
                    } else {
                        0.0
                    }
                })
                .sum();
            ndcg.insert(k, if idcg > 0.0 { dcg / idcg } else { 0.0 });
        }

        Ok(QueryMetrics {
            query_id: topic.id.clone(),
            precision,
            recall,
            f1,
            average_precision,
            ndcg,
            latency_seconds,
        })
    }

    /// Evaluate every topic and aggregate.
    pub fn evaluate_all(&self, topics: &[QueryTopic]) -> RetrieveResult<(Vec<QueryMetrics>, AggregateMetrics)> {
        let mut per_query = Vec::with_capacity(topics.len());
        for topic in topics {
            per_query.push(self.evaluate_query(topic)?);
        }
        let aggregate = aggregate(&per_query);
        Ok((per_query, aggregate))
    }
}

/// Aggregate per-query metrics into corpus-level means, median latency, and
/// throughput. Median latency averages the two middle values on an even
/// query count, matching `print_metrics`.
pub fn aggregate(per_query: &[QueryMetrics]) -> AggregateMetrics {
    let n = per_query.len().max(1) as f32;

    let mean_at = |f: &dyn Fn(&QueryMetrics, usize) -> f32| -> HashMap<usize, f32> {
        EVAL_KS
            .iter()
            .map(|&k| (k, per_query.iter().map(|m| f(m, k)).sum::<f32>() / n))
            .collect()
    };

    let mean_precision = mean_at(&|m, k| m.precision[&k]);
    let mean_recall = mean_at(&|m, k| m.recall[&k]);
    let mean_f1 = mean_at(&|m, k| m.f1[&k]);
    let mean_average_precision = mean_at(&|m, k| m.average_precision[&k]);
    let mean_ndcg = mean_at(&|m, k| m.ndcg[&k]);

    let mut latencies: Vec<f64> = per_query.iter().map(|m| m.latency_seconds).collect();
    latencies.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let median_latency_seconds = median(&latencies);

    let total_latency: f64 = latencies.iter().sum();
    let throughput_queries_per_second = if total_latency > 0.0 {
        per_query.len() as f64 / total_latency
    } else {
        0.0
    };

    AggregateMetrics {
        mean_precision,
        mean_recall,
        mean_f1,
        mean_average_precision,
        mean_ndcg,
        median_latency_seconds,
        throughput_queries_per_second,
    }
}

/// DCG/IDCG positional discount for a 1-indexed rank: undiscounted at rank 1,
/// `log2(rank)` from rank 2 onward.
fn dcg_discount(rank: usize) -> f32 {
    if rank <= 1 {
        1.0
    } else {
        (rank as f32).log2()
    }
}

fn median(sorted: &[f64]) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}
