//! Score diagnostics: first-class fields on every scored result rather
//! than inline log statements (§9 "logging as diagnostics").

use serde::{Deserialize, Serialize};

use crate::corpus::Practitioner;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RescoringInfo {
    pub intent_matches: usize,
    pub anchor_matches: usize,
    pub negative_matches: usize,
    pub safe_lane_matches: usize,
    pub subspecialty_boost: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FitCategory {
    Excellent,
    Good,
    IllFit,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TerminationReason {
    TopKExcellent,
    MaxIterations,
    MaxProfilesReviewed,
    NoMoreCandidates,
    Cancelled,
}

/// One scored candidate with full per-component diagnostics (§3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredResult {
    pub practitioner_id: String,
    pub rank: usize,

    pub bm25_score: f64,
    pub quality_boost: f64,
    pub exact_match_bonus: f64,
    pub proximity_boost: f64,
    pub semantic_score: f64,

    pub base_bm25_score: f64,
    pub normalized_bm25: f64,
    pub normalized_semantic: f64,

    pub rescoring_info: RescoringInfo,

    pub score: f64,

    #[serde(default)]
    pub fit_category: Option<FitCategory>,
    #[serde(default)]
    pub evaluation_reason: Option<String>,
    #[serde(default)]
    pub iteration_found: Option<usize>,
}

impl ScoredResult {
    pub fn new(practitioner: &Practitioner, rank: usize, base_bm25_score: f64) -> Self {
        Self {
            practitioner_id: practitioner.id.clone(),
            rank,
            bm25_score: base_bm25_score,
            quality_boost: 1.0,
            exact_match_bonus: 0.0,
            proximity_boost: 1.0,
            semantic_score: 0.0,
            base_bm25_score,
            normalized_bm25: 0.0,
            normalized_semantic: 0.0,
            rescoring_info: RescoringInfo::default(),
            score: base_bm25_score,
            fit_category: None,
            evaluation_reason: None,
            iteration_found: None,
        }
    }
}

/// Assigns dense ranks 1..len in the order given (§3 invariant: "rank
/// is dense over the returned list starting at 1").
pub fn assign_ranks(results: &mut [ScoredResult]) {
    for (idx, result) in results.iter_mut().enumerate() {
        result.rank = idx + 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assign_ranks_is_dense_from_one() {
        let mut results = vec![
            ScoredResult::new(&dummy_practitioner("a"), 0, 1.0),
            ScoredResult::new(&dummy_practitioner("b"), 0, 0.5),
            ScoredResult::new(&dummy_practitioner("c"), 0, 0.1),
        ];
        assign_ranks(&mut results);
        let ranks: Vec<usize> = results.iter().map(|r| r.rank).collect();
        assert_eq!(ranks, vec![1, 2, 3]);
    }

    fn dummy_practitioner(id: &str) -> Practitioner {
        use crate::corpus::{ClinicalExpertise, Gender};
        Practitioner {
            id: id.into(),
            name: String::new(),
            title: String::new(),
            specialty: String::new(),
            subspecialties: vec![],
            description: String::new(),
            about: String::new(),
            clinical_expertise: ClinicalExpertise::Raw(String::new()),
            qualifications: String::new(),
            professional_memberships: String::new(),
            address_locality: String::new(),
            postal_code: String::new(),
            profile_url: String::new(),
            procedure_groups: vec![],
            insurance_providers: vec![],
            patient_age_group: vec![],
            languages: vec![],
            gender: Gender::Unknown,
            nhs_base: String::new(),
            nhs_posts: String::new(),
            rating_value: None,
            review_count: 0,
            years_experience: 0,
            verified: false,
            distance: None,
            blacklisted: false,
        }
    }
}
