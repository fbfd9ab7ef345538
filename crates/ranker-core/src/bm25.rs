//! Stage A: weighted BM25 retrieval with quality boost, exact-phrase
//! bonus, proximity boost, and optional semantic-score mixing (§4.3).
//!
//! Scoring is hand-rolled rather than delegated to an off-the-shelf
//! index: the per-document quality/exact/proximity/semantic components
//! must survive as individually-inspectable fields on [`ScoredResult`],
//! which an opaque index scorer cannot expose.

use std::collections::HashMap;

use crate::canon::relevant_admission_stopwords;
use crate::config::{FieldWeights, RankingConfig};
use crate::corpus::Practitioner;
use crate::diagnostics::ScoredResult;
use crate::text::{build_weighted_text, tokenize};

/// A document prepared for BM25 scoring: its weighted text, token
/// counts, and length.
struct IndexedDoc<'a> {
    practitioner: &'a Practitioner,
    term_freqs: HashMap<String, usize>,
    doc_len: usize,
    weighted_text: String,
}

fn index_corpus<'a>(practitioners: &[&'a Practitioner], weights: &FieldWeights) -> Vec<IndexedDoc<'a>> {
    practitioners
        .iter()
        .map(|p| {
            let weighted_text = build_weighted_text(p, weights);
            let tokens = tokenize(&weighted_text);
            let doc_len = tokens.len();
            let mut term_freqs = HashMap::new();
            for tok in tokens {
                *term_freqs.entry(tok).or_insert(0usize) += 1;
            }
            IndexedDoc {
                practitioner: p,
                term_freqs,
                doc_len,
                weighted_text,
            }
        })
        .collect()
}

fn document_frequencies(docs: &[IndexedDoc]) -> HashMap<String, usize> {
    let mut df: HashMap<String, usize> = HashMap::new();
    for doc in docs {
        for term in doc.term_freqs.keys() {
            *df.entry(term.clone()).or_insert(0) += 1;
        }
    }
    df
}

/// IDF per term: `max(0, log((N - df + 0.5)/(df + 0.5) + 1))` (§4.3).
/// Always non-negative (§3, §8).
pub fn idf(n: usize, df: usize) -> f64 {
    let n = n as f64;
    let df = df as f64;
    let raw = ((n - df + 0.5) / (df + 0.5) + 1.0).ln();
    raw.max(0.0)
}

fn average_doc_len(docs: &[IndexedDoc]) -> f64 {
    if docs.is_empty() {
        return 0.0;
    }
    let total: usize = docs.iter().map(|d| d.doc_len).sum();
    total as f64 / docs.len() as f64
}

fn bm25_score_doc(doc: &IndexedDoc, query_terms: &[String], df: &HashMap<String, usize>, n: usize, avgdl: f64, k1: f64, b: f64) -> f64 {
    let mut score = 0.0;
    for term in query_terms {
        let tf = *doc.term_freqs.get(term).unwrap_or(&0) as f64;
        if tf == 0.0 {
            continue;
        }
        let term_df = *df.get(term).unwrap_or(&0);
        let term_idf = idf(n, term_df);
        let denom = tf + k1 * (1.0 - b + b * (doc.doc_len as f64 / avgdl.max(1.0)));
        score += term_idf * (tf * (k1 + 1.0)) / denom;
    }
    score
}

/// Quality boost: multiplicative tiers over rating, review count,
/// experience, verified flag, and relevant-admissions volume (§4.3).
pub fn quality_boost(p: &Practitioner, meaningful_terms: &[String]) -> f64 {
    let mut boost = 1.0;

    if let Some(rating) = p.rating_value {
        if rating >= 4.8 {
            boost *= 1.3;
        } else if rating >= 4.5 {
            boost *= 1.2;
        } else if rating >= 4.0 {
            boost *= 1.1;
        }
    }

    if p.review_count >= 100 {
        boost *= 1.2;
    } else if p.review_count >= 50 {
        boost *= 1.15;
    } else if p.review_count >= 20 {
        boost *= 1.1;
    }

    if p.years_experience >= 20 {
        boost *= 1.15;
    } else if p.years_experience >= 10 {
        boost *= 1.1;
    }

    if p.verified {
        boost *= 1.1;
    }

    boost *= relevant_admissions_multiplier(p, meaningful_terms);

    boost
}

/// Filter query terms to the "meaningful" subset: not in the generic
/// stopword set and length > 3 (§4.3).
pub fn meaningful_terms(query_tokens: &[String]) -> Vec<String> {
    let stopwords = relevant_admission_stopwords();
    query_tokens
        .iter()
        .filter(|t| t.len() > 3 && !stopwords.contains(t.to_lowercase().as_str()))
        .cloned()
        .collect()
}

fn is_relevant_procedure(name: &str, meaningful: &[String]) -> bool {
    // Spec's "contains any meaningful term OR (contains >=2 AND >=2
    // words)" collapses to "contains any meaningful term", since the
    // second clause is already a subset of the first.
    let lower = name.to_lowercase();
    meaningful.iter().any(|t| lower.contains(t.as_str()))
}

fn relevant_admissions_multiplier(p: &Practitioner, meaningful: &[String]) -> f64 {
    if p.procedure_groups.is_empty() {
        return 1.0;
    }
    let relevant_sum: u32 = p
        .procedure_groups
        .iter()
        .filter(|pg| is_relevant_procedure(&pg.name, meaningful))
        .map(|pg| pg.admission_count)
        .sum();

    if relevant_sum == 0 {
        return 0.85;
    }

    match relevant_sum {
        n if n >= 150 => 2.5,
        n if n >= 100 => 2.2,
        n if n >= 75 => 2.0,
        n if n >= 50 => 1.7,
        n if n >= 30 => 1.5,
        n if n >= 20 => 1.4,
        n if n >= 10 => 1.3,
        n if n >= 5 => 1.2,
        n if n >= 1 => 1.1,
        _ => 1.0,
    }
}

/// Exact-phrase bonus: +2.0 if the full lowercased query is a
/// substring of the weighted text, plus +1.0 per matched 2- or 3-word
/// phrase generated from the query tokens, cumulative (§4.3).
pub fn exact_phrase_bonus(query: &str, weighted_text: &str) -> f64 {
    let mut bonus = 0.0;
    let lower_query = query.to_lowercase();
    let lower_text = weighted_text.to_lowercase();

    if !lower_query.trim().is_empty() && lower_text.contains(lower_query.trim()) {
        bonus += 2.0;
    }

    let words: Vec<&str> = lower_query.split_whitespace().collect();
    for window_len in [2usize, 3] {
        if words.len() < window_len {
            continue;
        }
        for window in words.windows(window_len) {
            let phrase = window.join(" ");
            if lower_text.contains(&phrase) {
                bonus += 1.0;
            }
        }
    }

    bonus
}

/// Proximity boost tiers by miles; only active for postcode-style
/// requests against a practitioner with a known numeric distance
/// (§4.3).
pub fn proximity_boost(distance_miles: Option<f64>, is_postcode_request: bool) -> f64 {
    let Some(miles) = distance_miles else {
        return 1.0;
    };
    if !is_postcode_request {
        return 1.0;
    }
    if miles <= 1.0 {
        1.6
    } else if miles <= 2.0 {
        1.5
    } else if miles <= 3.0 {
        1.4
    } else if miles <= 5.0 {
        1.3
    } else if miles <= 8.0 {
        1.2
    } else if miles <= 12.0 {
        1.1
    } else if miles <= 18.0 {
        1.05
    } else {
        1.0
    }
}

/// Min-max normalize a vector of scores to [0,1]; constant vectors
/// normalize to 1.0 (§4.3). Idempotent: normalizing twice yields the
/// same vector (§8).
pub fn min_max_normalize(values: &[f64]) -> Vec<f64> {
    if values.is_empty() {
        return Vec::new();
    }
    let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if (max - min).abs() < f64::EPSILON {
        return vec![1.0; values.len()];
    }
    values.iter().map(|v| (v - min) / (max - min)).collect()
}

/// Options controlling optional semantic-score mixing (§4.3).
#[derive(Debug, Clone, Default)]
pub struct SemanticOptions {
    pub weight: f64,
    /// practitioner id -> semantic score in [0,1]
    pub scores_by_id: HashMap<String, f64>,
    /// practitioner name (lowercased) -> semantic score in [0,1]
    pub scores_by_name: HashMap<String, f64>,
}

impl SemanticOptions {
    fn lookup(&self, p: &Practitioner) -> f64 {
        if let Some(score) = self.scores_by_id.get(&p.id) {
            return score.clamp(0.0, 1.0);
        }
        let name_lower = p.name.to_lowercase();
        if let Some(score) = self.scores_by_name.get(&name_lower) {
            return score.clamp(0.0, 1.0);
        }
        // Fuzzy fallback: match on last-name containment.
        if let Some(last_name) = name_lower.split_whitespace().last() {
            for (name, score) in &self.scores_by_name {
                if name.contains(last_name) {
                    return score.clamp(0.0, 1.0);
                }
            }
        }
        0.0
    }
}

#[derive(Debug, Clone, Default)]
pub struct StageARequest {
    pub query: String,
    pub is_postcode_request: bool,
    pub top_n: usize,
    pub semantic: Option<SemanticOptions>,
}

/// Run Stage A BM25 retrieval over `practitioners`, returning exactly
/// `min(top_n, practitioners.len())` results, non-zero scores first,
/// in descending score order, with zero-scored items filling the
/// remainder in their original BM25 order (§4.3 zero-score policy).
pub fn run_stage_a(practitioners: &[&Practitioner], config: &RankingConfig, request: &StageARequest) -> Vec<ScoredResult> {
    if practitioners.is_empty() {
        return Vec::new();
    }

    let query_trimmed = request.query.trim();
    if query_trimmed.is_empty() {
        // §4.3 failure mode: empty query returns input order with
        // descending synthetic scores.
        return practitioners
            .iter()
            .enumerate()
            .map(|(idx, p)| {
                let synthetic = (practitioners.len() - idx) as f64;
                let mut result = ScoredResult::new(p, idx + 1, synthetic);
                result.score = synthetic;
                result
            })
            .collect();
    }

    let docs = index_corpus(practitioners, &config.field_weights);
    let df = document_frequencies(&docs);
    let n = docs.len();
    let avgdl = average_doc_len(&docs);
    let query_terms = tokenize(query_trimmed);
    let meaningful = meaningful_terms(&query_terms);

    let mut base_scores = Vec::with_capacity(docs.len());
    let mut results = Vec::with_capacity(docs.len());

    for (idx, doc) in docs.iter().enumerate() {
        let raw_bm25 = bm25_score_doc(doc, &query_terms, &df, n, avgdl, config.k1, config.b);
        let quality = quality_boost(doc.practitioner, &meaningful);
        let proximity = proximity_boost(doc.practitioner.distance, request.is_postcode_request);
        let exact_bonus = exact_phrase_bonus(query_trimmed, &doc.weighted_text);

        let base_bm25 = raw_bm25 * quality * proximity + exact_bonus;

        let semantic_raw = request
            .semantic
            .as_ref()
            .map(|s| s.lookup(doc.practitioner))
            .unwrap_or(0.0);

        base_scores.push(base_bm25);

        let mut result = ScoredResult::new(doc.practitioner, idx + 1, base_bm25);
        result.bm25_score = raw_bm25;
        result.quality_boost = quality;
        result.proximity_boost = proximity;
        result.exact_match_bonus = exact_bonus;
        result.semantic_score = semantic_raw;
        results.push(result);
    }

    let normalized_bm25 = min_max_normalize(&base_scores);
    let semantic_raw: Vec<f64> = results.iter().map(|r| r.semantic_score).collect();
    let has_semantic = request.semantic.is_some();
    let normalized_semantic = if has_semantic {
        min_max_normalize(&semantic_raw)
    } else {
        vec![0.0; results.len()]
    };

    let weight = request.semantic.as_ref().map(|s| s.weight).unwrap_or(0.0);

    for (idx, result) in results.iter_mut().enumerate() {
        result.normalized_bm25 = normalized_bm25[idx];
        result.normalized_semantic = normalized_semantic[idx];
        result.score = result.normalized_bm25 + result.normalized_semantic * weight;
    }

    sort_with_zero_filler(&mut results);

    let top_n = request.top_n.min(results.len());
    results.truncate(top_n);
    crate::diagnostics::assign_ranks(&mut results);
    results
}

/// Stable-sorts `results` so non-zero scored items come first in
/// descending score order, then zero-scored items preserving their
/// incoming (original BM25) order (§4.3 zero-score policy, §8).
pub(crate) fn sort_with_zero_filler(results: &mut Vec<ScoredResult>) {
    let original_order: HashMap<String, usize> = results
        .iter()
        .enumerate()
        .map(|(idx, r)| (r.practitioner_id.clone(), idx))
        .collect();

    results.sort_by(|a, b| {
        let a_zero = a.score == 0.0;
        let b_zero = b.score == 0.0;
        match (a_zero, b_zero) {
            (false, true) => std::cmp::Ordering::Less,
            (true, false) => std::cmp::Ordering::Greater,
            (false, false) => b
                .score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| original_order[&a.practitioner_id].cmp(&original_order[&b.practitioner_id])),
            (true, true) => original_order[&a.practitioner_id].cmp(&original_order[&b.practitioner_id]),
        }
    });
}
