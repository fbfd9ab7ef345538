//! The external fit-evaluator LLM (§4.5 step 2): judges newly-seen
//! candidates as excellent / good / ill-fit with a brief reason,
//! implementing `ranker_core::controller::FitEvaluator`.

use std::sync::Arc;

use async_trait::async_trait;
use ranker_core::controller::{FitEvaluator, FitJudgement};
use ranker_core::diagnostics::{FitCategory, ScoredResult};
use serde::Deserialize;

use crate::provider::{CompletionRequest, LlmProvider};

const SYSTEM_PROMPT: &str = "You judge whether each candidate practitioner is a good fit for the patient's \
    query. For each candidate id, return a category of excellent, good, or ill-fit, and a brief one-sentence \
    reason. Respond with a JSON array only, one object per candidate: \
    [{\"practitioner_id\": \"...\", \"category\": \"excellent\"|\"good\"|\"ill-fit\", \"reason\": \"...\"}].";

#[derive(Debug, Deserialize)]
struct RawJudgement {
    practitioner_id: String,
    category: FitCategory,
    #[serde(default)]
    reason: String,
}

/// Wraps an [`LlmProvider`] to implement the V6 controller's fit-
/// evaluation boundary.
pub struct LlmFitEvaluator {
    provider: Arc<dyn LlmProvider>,
}

impl LlmFitEvaluator {
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self { provider }
    }

    fn build_prompt(query: &str, candidates: &[ScoredResult]) -> String {
        let listed: Vec<String> = candidates.iter().map(|c| format!("- id={} score={:.3}", c.practitioner_id, c.score)).collect();
        format!("Patient query: {query}\n\nCandidates:\n{}", listed.join("\n"))
    }
}

#[async_trait]
impl FitEvaluator for LlmFitEvaluator {
    async fn evaluate(&self, query: &str, candidates: &[ScoredResult]) -> Option<Vec<FitJudgement>> {
        if candidates.is_empty() {
            return Some(Vec::new());
        }

        let request = CompletionRequest::with_system(SYSTEM_PROMPT, Self::build_prompt(query, candidates)).temperature(0.0);

        let response = match self.provider.complete(&request).await {
            Ok(response) => response,
            Err(err) => {
                tracing::debug!(error = %err, "fit evaluator call failed; iteration proceeds without new labels");
                return None;
            }
        };

        match serde_json::from_str::<Vec<RawJudgement>>(&response.content) {
            Ok(raw) => Some(
                raw.into_iter()
                    .map(|r| FitJudgement {
                        practitioner_id: r.practitioner_id,
                        category: r.category,
                        reason: r.reason,
                    })
                    .collect(),
            ),
            Err(err) => {
                tracing::debug!(error = %err, "fit evaluator returned unparseable JSON; iteration proceeds without new labels");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stub::{AlwaysFailingProvider, StubLlmProvider};
    use ranker_core::corpus::{ClinicalExpertise, Gender, Practitioner};

    fn practitioner(id: &str) -> Practitioner {
        Practitioner {
            id: id.into(),
            name: "Dr Example".into(),
            title: "Dr".into(),
            specialty: "Cardiology".into(),
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

    #[tokio::test]
    async fn empty_candidates_short_circuit_without_a_call() {
        let stub = StubLlmProvider::new("[]");
        let evaluator = LlmFitEvaluator::new(Arc::new(stub));
        let result = evaluator.evaluate("query", &[]).await;
        assert_eq!(result, Some(Vec::new()));
    }

    #[tokio::test]
    async fn parses_judgements_from_provider_response() {
        let p = practitioner("p1");
        let candidate = ScoredResult::new(&p, 1, 1.0);
        let response = r#"[{"practitioner_id":"p1","category":"excellent","reason":"strong match"}]"#;
        let stub = StubLlmProvider::new(response);
        let evaluator = LlmFitEvaluator::new(Arc::new(stub));

        let result = evaluator.evaluate("query", std::slice::from_ref(&candidate)).await.unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].practitioner_id, "p1");
        assert_eq!(result[0].category, FitCategory::Excellent);
    }

    #[tokio::test]
    async fn provider_failure_returns_none() {
        let p = practitioner("p1");
        let candidate = ScoredResult::new(&p, 1, 1.0);
        let evaluator = LlmFitEvaluator::new(Arc::new(AlwaysFailingProvider));
        let result = evaluator.evaluate("query", std::slice::from_ref(&candidate)).await;
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn unparseable_response_returns_none() {
        let p = practitioner("p1");
        let candidate = ScoredResult::new(&p, 1, 1.0);
        let stub = StubLlmProvider::new("not json");
        let evaluator = LlmFitEvaluator::new(Arc::new(stub));
        let result = evaluator.evaluate("query", std::slice::from_ref(&candidate)).await;
        assert!(result.is_none());
    }
}
