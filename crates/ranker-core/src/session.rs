//! Per-request structured intent produced by query understanding.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Goal {
    DiagnosticWorkup,
    ProcedureIntervention,
    OngoingManagement,
    SecondOpinion,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Specificity {
    SymptomOnly,
    ConfirmedDiagnosis,
    NamedProcedure,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentData {
    pub goal: Goal,
    pub specificity: Specificity,
    pub confidence: f64,
    pub is_query_ambiguous: bool,
}

impl IntentData {
    /// The conservative fallback used when an LLM task fails (§4.1, §7).
    pub fn fallback() -> Self {
        Self {
            goal: Goal::DiagnosticWorkup,
            specificity: Specificity::SymptomOnly,
            confidence: 0.3,
            is_query_ambiguous: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LikelySubspecialty {
    pub name: String,
    pub confidence: f64,
}

/// Per-request structured intent consumed by ranking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionContext {
    pub q_patient: String,
    #[serde(default)]
    pub q_patient_original: Option<String>,
    pub intent_terms: Vec<String>,
    pub anchor_phrases: Vec<String>,
    pub safe_lane_terms: Vec<String>,
    pub likely_subspecialties: Vec<LikelySubspecialty>,
    pub negative_terms: Vec<String>,
    pub intent_data: IntentData,
    #[serde(default)]
    pub ideal_profile: Option<String>,
}

impl SessionContext {
    /// A well-formed empty context, returned when the input query is
    /// empty after trimming (§4.1: not an error).
    pub fn empty() -> Self {
        Self {
            q_patient: String::new(),
            q_patient_original: None,
            intent_terms: Vec::new(),
            anchor_phrases: Vec::new(),
            safe_lane_terms: Vec::new(),
            likely_subspecialties: Vec::new(),
            negative_terms: Vec::new(),
            intent_data: IntentData::fallback(),
            ideal_profile: None,
        }
    }

    /// Legacy single-stage fallback: all three §4.1 tasks failed, so the
    /// request proceeds as plain BM25 on the raw user query (§7).
    pub fn legacy_fallback(user_query: &str) -> Self {
        Self {
            q_patient: user_query.trim().to_string(),
            q_patient_original: Some(user_query.to_string()),
            intent_terms: Vec::new(),
            anchor_phrases: Vec::new(),
            safe_lane_terms: Vec::new(),
            likely_subspecialties: Vec::new(),
            negative_terms: Vec::new(),
            intent_data: IntentData::fallback(),
            ideal_profile: None,
        }
    }
}

/// Cap `likely_subspecialties`: keep confidence >= 0.4, dedupe by
/// case-insensitive name keeping the max confidence, sort descending,
/// cap at 3 (§4.1 merger rules).
pub fn finalize_subspecialties(raw: Vec<LikelySubspecialty>) -> Vec<LikelySubspecialty> {
    use std::collections::HashMap;

    let mut best: HashMap<String, LikelySubspecialty> = HashMap::new();
    for item in raw.into_iter().filter(|s| s.confidence >= 0.4) {
        let key = item.name.to_lowercase();
        match best.get(&key) {
            Some(existing) if existing.confidence >= item.confidence => {}
            _ => {
                best.insert(key, item);
            }
        }
    }
    let mut merged: Vec<LikelySubspecialty> = best.into_values().collect();
    merged.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    merged.truncate(3);
    merged
}

/// Case-insensitive dedup, order-preserving, first source wins (§4.1
/// "clinical first, deduped by case-insensitive equality").
pub fn dedupe_preserve_order(first: &[String], second: &[String]) -> Vec<String> {
    use std::collections::HashSet;
    let mut seen: HashSet<String> = HashSet::new();
    let mut out = Vec::new();
    for term in first.iter().chain(second.iter()) {
        let key = term.to_lowercase();
        if seen.insert(key) {
            out.push(term.clone());
        }
    }
    out
}
