//! Query Understanding (§4.1): three independent LLM tasks issued in
//! parallel, joined at a barrier, and merged deterministically into a
//! [`SessionContext`].

use std::sync::Arc;

use ranker_core::session::{dedupe_preserve_order, finalize_subspecialties, Goal, IntentData, LikelySubspecialty, SessionContext, Specificity};
use serde::Deserialize;

use crate::provider::{CompletionRequest, LlmProvider};

#[derive(Debug, Clone, Deserialize)]
struct InsightsResponse {
    #[serde(default)]
    symptoms: Vec<String>,
    #[serde(default)]
    preferences: Vec<String>,
    #[serde(default)]
    urgency: Option<String>,
    #[serde(default)]
    inferred_specialty: Option<String>,
    #[serde(default)]
    inferred_location: Option<String>,
    #[serde(default)]
    summary: String,
}

impl Default for InsightsResponse {
    fn default() -> Self {
        Self {
            symptoms: Vec::new(),
            preferences: Vec::new(),
            urgency: None,
            inferred_specialty: None,
            inferred_location: None,
            summary: String::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct GeneralIntentResponse {
    goal: Goal,
    specificity: Specificity,
    confidence: f64,
    #[serde(default)]
    expansion_terms: Vec<String>,
    #[serde(default)]
    negative_terms: Vec<String>,
    #[serde(default)]
    anchor_phrases: Vec<String>,
    #[serde(default)]
    likely_subspecialties: Vec<LikelySubspecialty>,
}

impl Default for GeneralIntentResponse {
    fn default() -> Self {
        Self {
            goal: Goal::DiagnosticWorkup,
            specificity: Specificity::SymptomOnly,
            confidence: 0.3,
            expansion_terms: Vec::new(),
            negative_terms: Vec::new(),
            anchor_phrases: Vec::new(),
            likely_subspecialties: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
struct ClinicalIntentResponse {
    #[serde(default)]
    primary_intent: String,
    #[serde(default)]
    expansion_terms: Vec<String>,
    #[serde(default)]
    negative_terms: Vec<String>,
    #[serde(default)]
    likely_subspecialties: Vec<LikelySubspecialty>,
}

const INSIGHTS_SYSTEM_PROMPT: &str = "You summarize a patient's conversation into symptoms, preferences, \
    urgency, an inferred specialty and location if evident, and a one-line summary. Respond with JSON only.";

const GENERAL_INTENT_SYSTEM_PROMPT: &str = "You classify a patient query into a goal \
    (diagnostic_workup, procedure_intervention, ongoing_management, second_opinion), a specificity \
    (symptom_only, confirmed_diagnosis, named_procedure), a confidence in [0,1], 6-10 expansion_terms, \
    negative_terms, explicitly-mentioned anchor_phrases, and 0-3 likely_subspecialties with confidence. \
    Respond with JSON only.";

const CLINICAL_INTENT_SYSTEM_PROMPT: &str = "You classify a patient query's primary clinical intent from a \
    closed tag set, and return 8-12 expansion_terms, 5-8 negative_terms, and 0-3 likely_subspecialties with \
    confidence. Respond with JSON only.";

async fn run_task<T: Default + for<'de> Deserialize<'de>>(provider: &dyn LlmProvider, system_prompt: &str, user_query: &str) -> T {
    let request = CompletionRequest::with_system(system_prompt, user_query).temperature(0.1);
    match provider.complete(&request).await {
        Ok(response) => serde_json::from_str(&response.content).unwrap_or_else(|err| {
            tracing::debug!(error = %err, "query understanding task returned unparseable JSON; using fallback");
            T::default()
        }),
        Err(err) => {
            tracing::debug!(error = %err, "query understanding task failed; using fallback");
            T::default()
        }
    }
}

fn is_ambiguous(confidence: f64, specificity: Specificity) -> bool {
    !(confidence >= 0.75 && matches!(specificity, Specificity::NamedProcedure | Specificity::ConfirmedDiagnosis))
}

fn first_n(terms: &[String], n: usize) -> Vec<String> {
    terms.iter().take(n).cloned().collect()
}

/// Runs the three §4.1 tasks in parallel and merges them into a
/// [`SessionContext`]. Returns [`SessionContext::empty`] when
/// `user_query` is blank after trimming (§4.1: not a failure).
pub async fn understand_query(provider: Arc<dyn LlmProvider>, user_query: &str) -> SessionContext {
    let q_patient = user_query.trim().to_string();
    if q_patient.is_empty() {
        return SessionContext::empty();
    }

    let insights_provider = Arc::clone(&provider);
    let general_provider = Arc::clone(&provider);
    let clinical_provider = Arc::clone(&provider);
    let insights_query = q_patient.clone();
    let general_query = q_patient.clone();
    let clinical_query = q_patient.clone();

    let (insights, general, clinical): (InsightsResponse, GeneralIntentResponse, ClinicalIntentResponse) = tokio::join!(
        run_task(insights_provider.as_ref(), INSIGHTS_SYSTEM_PROMPT, &insights_query),
        run_task(general_provider.as_ref(), GENERAL_INTENT_SYSTEM_PROMPT, &general_query),
        run_task(clinical_provider.as_ref(), CLINICAL_INTENT_SYSTEM_PROMPT, &clinical_query),
    );

    let is_query_ambiguous = is_ambiguous(general.confidence, general.specificity);

    let intent_terms = dedupe_preserve_order(&clinical.expansion_terms, &general.expansion_terms);
    let anchor_phrases = general.anchor_phrases.clone();
    let negative_terms = if is_query_ambiguous {
        Vec::new()
    } else {
        dedupe_preserve_order(&clinical.negative_terms, &general.negative_terms)
    };

    let mut raw_subspecialties = general.likely_subspecialties.clone();
    raw_subspecialties.extend(clinical.likely_subspecialties.clone());
    let likely_subspecialties = finalize_subspecialties(raw_subspecialties);

    let safe_lane_source = if !insights.symptoms.is_empty() { &insights.symptoms } else { &anchor_phrases };
    let safe_lane_terms = first_n(safe_lane_source, 4);

    SessionContext {
        q_patient,
        q_patient_original: Some(user_query.to_string()),
        intent_terms,
        anchor_phrases,
        safe_lane_terms,
        likely_subspecialties,
        negative_terms,
        intent_data: IntentData {
            goal: general.goal,
            specificity: general.specificity,
            confidence: general.confidence,
            is_query_ambiguous,
        },
        ideal_profile: if insights.summary.trim().is_empty() { None } else { Some(insights.summary) },
    }
}
