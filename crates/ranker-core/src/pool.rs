//! Candidate Pool Builder (§4.6): a de-biased union of retrievers used
//! to generate offline ground-truth evaluation pools for benchmarking.
//! Not on the live request path.

use std::collections::HashSet;

use rand::seq::SliceRandom;
use rand::Rng;

use crate::bm25::{run_stage_a, StageARequest};
use crate::config::RankingConfig;
use crate::corpus::Practitioner;
use crate::rescoring::run_stage_b;
use crate::session::SessionContext;
use crate::text::{build_weighted_text, tokenize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolStrategy {
    RankingOnly,
    HybridBm25,
    HybridRandom,
    MultiSource,
}

impl std::str::FromStr for PoolStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ranking_only" => Ok(Self::RankingOnly),
            "hybrid_bm25" => Ok(Self::HybridBm25),
            "hybrid_random" => Ok(Self::HybridRandom),
            "multi_source" => Ok(Self::MultiSource),
            other => Err(format!("unknown candidate pool strategy: {other}")),
        }
    }
}

fn dedupe_by_id(ids: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    ids.into_iter().filter(|id| seen.insert(id.clone())).collect()
}

fn full_pipeline_ids(practitioners: &[&Practitioner], session: &SessionContext, config: &RankingConfig, top_n: usize) -> Vec<String> {
    let request = StageARequest {
        query: session.q_patient.clone(),
        is_postcode_request: false,
        top_n: practitioners.len().min(config.stage_a_top_n.max(top_n)),
        semantic: None,
    };
    let stage_a = run_stage_a(practitioners, config, &request);
    let stage_b = run_stage_b(stage_a, practitioners, session, config);
    stage_b.into_iter().take(top_n).map(|r| r.practitioner_id).collect()
}

fn bm25_only_ids(practitioners: &[&Practitioner], session: &SessionContext, config: &RankingConfig, top_n: usize) -> Vec<String> {
    let request = StageARequest {
        query: session.q_patient.clone(),
        is_postcode_request: false,
        top_n,
        semantic: None,
    };
    run_stage_a(practitioners, config, &request)
        .into_iter()
        .take(top_n)
        .map(|r| r.practitioner_id)
        .collect()
}

/// Keyword-overlap retrieval: count of query tokens present in a
/// simple practitioner-text bag (§4.6 multi_source sub-pool).
fn keyword_overlap_ids(practitioners: &[&Practitioner], session: &SessionContext, config: &RankingConfig, top_n: usize) -> Vec<String> {
    let query_tokens = tokenize(&session.q_patient);
    let mut scored: Vec<(String, usize)> = practitioners
        .iter()
        .map(|p| {
            let text = build_weighted_text(p, &config.field_weights).to_lowercase();
            let bag: HashSet<&str> = text.split_whitespace().collect();
            let overlap = query_tokens.iter().filter(|t| bag.contains(t.as_str())).count();
            (p.id.clone(), overlap)
        })
        .collect();
    scored.sort_by(|a, b| b.1.cmp(&a.1));
    scored.into_iter().take(top_n).map(|(id, _)| id).collect()
}

fn random_ids_excluding(practitioners: &[&Practitioner], excluded: &HashSet<String>, count: usize, rng: &mut impl Rng) -> Vec<String> {
    let mut candidates: Vec<&str> = practitioners
        .iter()
        .map(|p| p.id.as_str())
        .filter(|id| !excluded.contains(*id))
        .collect();
    candidates.shuffle(rng);
    candidates.into_iter().take(count).map(String::from).collect()
}

/// Produces the `ranking_only` sub-pool: top 30 from the full pipeline.
pub fn ranking_only_pool(practitioners: &[&Practitioner], session: &SessionContext, config: &RankingConfig) -> Vec<String> {
    dedupe_by_id(full_pipeline_ids(practitioners, session, config, 30))
}

/// Produces the `hybrid_bm25` sub-pool: top 20 pipeline union top 40
/// BM25-only, capped at 50.
pub fn hybrid_bm25_pool(practitioners: &[&Practitioner], session: &SessionContext, config: &RankingConfig) -> Vec<String> {
    let mut ids = full_pipeline_ids(practitioners, session, config, 20);
    ids.extend(bm25_only_ids(practitioners, session, config, 40));
    let mut deduped = dedupe_by_id(ids);
    deduped.truncate(50);
    deduped
}

/// Produces the `hybrid_random` sub-pool: top 20 pipeline union up to
/// 20 random practitioners not in the full-pipeline top 30, capped at
/// 45. `rng` must be injectable for reproducibility (§4.6).
pub fn hybrid_random_pool(practitioners: &[&Practitioner], session: &SessionContext, config: &RankingConfig, rng: &mut impl Rng) -> Vec<String> {
    let top30: HashSet<String> = full_pipeline_ids(practitioners, session, config, 30).into_iter().collect();
    let mut ids = full_pipeline_ids(practitioners, session, config, 20);
    ids.extend(random_ids_excluding(practitioners, &top30, 20, rng));
    let mut deduped = dedupe_by_id(ids);
    deduped.truncate(45);
    deduped
}

/// Produces the `multi_source` sub-pool: top 15 pipeline union top 20
/// BM25-only union top 15 keyword-overlap union 10 random, capped at
/// 55.
pub fn multi_source_pool(practitioners: &[&Practitioner], session: &SessionContext, config: &RankingConfig, rng: &mut impl Rng) -> Vec<String> {
    let mut ids = full_pipeline_ids(practitioners, session, config, 15);
    ids.extend(bm25_only_ids(practitioners, session, config, 20));
    ids.extend(keyword_overlap_ids(practitioners, session, config, 15));
    let already: HashSet<String> = ids.iter().cloned().collect();
    ids.extend(random_ids_excluding(practitioners, &already, 10, rng));
    let mut deduped = dedupe_by_id(ids);
    deduped.truncate(55);
    deduped
}

pub fn build_pool(
    strategy: PoolStrategy,
    practitioners: &[&Practitioner],
    session: &SessionContext,
    config: &RankingConfig,
    rng: &mut impl Rng,
) -> Vec<String> {
    match strategy {
        PoolStrategy::RankingOnly => ranking_only_pool(practitioners, session, config),
        PoolStrategy::HybridBm25 => hybrid_bm25_pool(practitioners, session, config),
        PoolStrategy::HybridRandom => hybrid_random_pool(practitioners, session, config, rng),
        PoolStrategy::MultiSource => multi_source_pool(practitioners, session, config, rng),
    }
}
