//! Progressive Controller V6 (§4.5): a bounded state machine of
//! rank -> evaluate -> decide -> {terminate | refetch -> merge ->
//! evaluate -> decide}.

use std::collections::HashSet;

use async_trait::async_trait;

use crate::bm25::{run_stage_a, SemanticOptions, StageARequest};
use crate::config::{FetchStrategy, RankingConfig};
use crate::corpus::Practitioner;
use crate::diagnostics::{FitCategory, ScoredResult, TerminationReason};
use crate::rescoring::run_stage_b;
use crate::session::SessionContext;

/// A judged candidate returned by the fit evaluator for one practitioner.
#[derive(Debug, Clone, PartialEq)]
pub struct FitJudgement {
    pub practitioner_id: String,
    pub category: FitCategory,
    pub reason: String,
}

/// The external fit-evaluator LLM boundary (§6). Implemented in
/// `ranker-llm`; kept as a trait here so `ranker-core` has no
/// dependency on the LLM crate.
#[async_trait]
pub trait FitEvaluator: Send + Sync {
    /// Judge only the newly-seen candidates (never previously judged),
    /// to save cost (§4.5 step 2). Returns `None` on cancellation or
    /// total failure, in which case the iteration completes without
    /// new labels (§7).
    async fn evaluate(&self, query: &str, candidates: &[ScoredResult]) -> Option<Vec<FitJudgement>>;
}

#[derive(Debug, Clone)]
pub struct ProgressiveResult {
    pub results: Vec<ScoredResult>,
    pub iterations: usize,
    pub profiles_evaluated: usize,
    pub termination_reason: TerminationReason,
}

fn category_rank(cat: &FitCategory) -> u8 {
    match cat {
        FitCategory::Excellent => 0,
        FitCategory::Good => 1,
        FitCategory::IllFit => 2,
    }
}

/// Re-rank merged candidates by quality category (excellent > good >
/// ill-fit) then by score (§4.5 step 5).
fn sort_by_quality_then_score(results: &mut Vec<ScoredResult>) {
    results.sort_by(|a, b| {
        let a_rank = a.fit_category.as_ref().map(category_rank).unwrap_or(1);
        let b_rank = b.fit_category.as_ref().map(category_rank).unwrap_or(1);
        a_rank
            .cmp(&b_rank)
            .then_with(|| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal))
    });
}

fn top_k_all_excellent(results: &[ScoredResult], k: usize) -> bool {
    if results.len() < k {
        return false;
    }
    results[..k].iter().all(|r| r.fit_category == Some(FitCategory::Excellent))
}

/// Runs one full Stage A + optional Stage B pass producing a scored
/// list of length `top_n` (capped by available candidates).
fn rank_pass(
    practitioners: &[&Practitioner],
    session: &SessionContext,
    config: &RankingConfig,
    top_n: usize,
    semantic: Option<SemanticOptions>,
) -> Vec<ScoredResult> {
    let request = StageARequest {
        query: session.q_patient.clone(),
        is_postcode_request: false,
        top_n,
        semantic,
    };
    let stage_a = run_stage_a(practitioners, config, &request);
    if config.fetch_strategy == FetchStrategy::StageA {
        return stage_a;
    }
    run_stage_b(stage_a, practitioners, session, config)
}

/// Drives the V6 state machine to completion or cancellation.
///
/// `cancel_requested` is polled once per iteration boundary (§4.5
/// "cancellation at any suspension point"); a real caller wires this
/// to a cancellation token shared with the request's deadline.
pub async fn run_progressive<E: FitEvaluator + ?Sized>(
    practitioners: &[&Practitioner],
    session: &SessionContext,
    config: &RankingConfig,
    evaluator: &E,
    cancel_requested: impl Fn() -> bool,
) -> ProgressiveResult {
    let mut seen_ids: HashSet<String> = HashSet::new();
    let mut merged: Vec<ScoredResult> = Vec::new();
    let mut iterations = 0usize;
    let mut profiles_evaluated = 0usize;
    let mut current_top_n = config.target_shortlist_k.min(practitioners.len().max(1));

    loop {
        if cancel_requested() {
            return finish(merged, iterations, profiles_evaluated, TerminationReason::Cancelled);
        }

        iterations += 1;

        let pass = rank_pass(practitioners, session, config, current_top_n, None);
        let remaining_budget = config.max_profiles_reviewed.saturating_sub(profiles_evaluated);
        let mut new_candidates: Vec<ScoredResult> = pass
            .into_iter()
            .filter(|r| !seen_ids.contains(&r.practitioner_id))
            .collect();
        // Cap this iteration's batch so a single evaluate() call can
        // never push `profiles_evaluated` past `max_profiles_reviewed`
        // (§8 "V6 cap"); candidates beyond the budget are left unseen
        // for a future iteration, though termination follows either way.
        new_candidates.truncate(remaining_budget);

        for candidate in &new_candidates {
            seen_ids.insert(candidate.practitioner_id.clone());
        }

        let judgements = if new_candidates.is_empty() {
            Some(Vec::new())
        } else {
            evaluator.evaluate(&session.q_patient, &new_candidates).await
        };

        let mut newly_judged = new_candidates;
        if let Some(judgements) = &judgements {
            for judgement in judgements {
                if let Some(candidate) = newly_judged
                    .iter_mut()
                    .find(|c| c.practitioner_id == judgement.practitioner_id)
                {
                    candidate.fit_category = Some(judgement.category.clone());
                    candidate.evaluation_reason = Some(judgement.reason.clone());
                    candidate.iteration_found = Some(iterations);
                }
            }
            profiles_evaluated += judgements.len();
        }
        // `judgements.is_none()` means the evaluator failed entirely
        // for this iteration (§7: treated as LLMFailure) — the
        // iteration completes without new labels.

        merged.extend(newly_judged);
        sort_by_quality_then_score(&mut merged);

        if top_k_all_excellent(&merged, config.target_top_k) {
            return finish(merged, iterations, profiles_evaluated, TerminationReason::TopKExcellent);
        }
        if profiles_evaluated >= config.max_profiles_reviewed {
            return finish(merged, iterations, profiles_evaluated, TerminationReason::MaxProfilesReviewed);
        }
        if iterations >= config.max_iterations {
            return finish(merged, iterations, profiles_evaluated, TerminationReason::MaxIterations);
        }
        if seen_ids.len() >= practitioners.len() {
            return finish(merged, iterations, profiles_evaluated, TerminationReason::NoMoreCandidates);
        }

        current_top_n = (current_top_n + config.batch_size).min(practitioners.len());
    }
}

fn finish(
    mut results: Vec<ScoredResult>,
    iterations: usize,
    profiles_evaluated: usize,
    reason: TerminationReason,
) -> ProgressiveResult {
    crate::diagnostics::assign_ranks(&mut results);
    ProgressiveResult {
        results,
        iterations,
        profiles_evaluated,
        termination_reason: reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::{ClinicalExpertise, Gender};
    use crate::session::{Goal, IntentData, Specificity};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn practitioner(id: &str) -> Practitioner {
        Practitioner {
            id: id.into(),
            name: format!("Dr {id}"),
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

    fn session() -> SessionContext {
        SessionContext {
            q_patient: "cardiology".into(),
            q_patient_original: None,
            intent_terms: vec![],
            anchor_phrases: vec![],
            safe_lane_terms: vec![],
            likely_subspecialties: vec![],
            negative_terms: vec![],
            intent_data: IntentData {
                goal: Goal::DiagnosticWorkup,
                specificity: Specificity::SymptomOnly,
                confidence: 0.9,
                is_query_ambiguous: false,
            },
            ideal_profile: None,
        }
    }

    struct AllExcellentEvaluator;

    #[async_trait]
    impl FitEvaluator for AllExcellentEvaluator {
        async fn evaluate(&self, _query: &str, candidates: &[ScoredResult]) -> Option<Vec<FitJudgement>> {
            Some(
                candidates
                    .iter()
                    .map(|c| FitJudgement {
                        practitioner_id: c.practitioner_id.clone(),
                        category: FitCategory::Excellent,
                        reason: "good match".into(),
                    })
                    .collect(),
            )
        }
    }

    struct AllGoodEvaluator {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl FitEvaluator for AllGoodEvaluator {
        async fn evaluate(&self, _query: &str, candidates: &[ScoredResult]) -> Option<Vec<FitJudgement>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Some(
                candidates
                    .iter()
                    .map(|c| FitJudgement {
                        practitioner_id: c.practitioner_id.clone(),
                        category: FitCategory::Good,
                        reason: "acceptable".into(),
                    })
                    .collect(),
            )
        }
    }

    #[tokio::test]
    async fn terminates_on_top_k_excellent() {
        let docs: Vec<Practitioner> = (0..10).map(|i| practitioner(&format!("p{i}"))).collect();
        let refs: Vec<&Practitioner> = docs.iter().collect();
        let config = RankingConfig::default();
        let session = session();
        let evaluator = AllExcellentEvaluator;

        let result = run_progressive(&refs, &session, &config, &evaluator, || false).await;
        assert_eq!(result.iterations, 1);
        assert_eq!(result.termination_reason, TerminationReason::TopKExcellent);
    }

    #[tokio::test]
    async fn respects_max_iterations_and_max_profiles_cap() {
        let docs: Vec<Practitioner> = (0..100).map(|i| practitioner(&format!("p{i}"))).collect();
        let refs: Vec<&Practitioner> = docs.iter().collect();
        let mut config = RankingConfig::default();
        config.stage_a_top_n = 5;
        config.batch_size = 5;
        config.max_iterations = 5;
        config.max_profiles_reviewed = 30;
        let session = session();
        let evaluator = AllGoodEvaluator { calls: AtomicUsize::new(0) };

        let result = run_progressive(&refs, &session, &config, &evaluator, || false).await;
        assert!(result.iterations <= config.max_iterations);
        assert!(result.profiles_evaluated <= config.max_profiles_reviewed);
        assert!(matches!(
            result.termination_reason,
            TerminationReason::MaxIterations | TerminationReason::MaxProfilesReviewed
        ));
    }

    #[tokio::test]
    async fn never_exceeds_max_profiles_reviewed_even_mid_batch() {
        let docs: Vec<Practitioner> = (0..120).map(|i| practitioner(&format!("p{i}"))).collect();
        let refs: Vec<&Practitioner> = docs.iter().collect();
        let mut config = RankingConfig::default();
        config.max_profiles_reviewed = 30;
        let session = session();
        let evaluator = AllGoodEvaluator { calls: AtomicUsize::new(0) };

        let result = run_progressive(&refs, &session, &config, &evaluator, || false).await;
        assert_eq!(result.profiles_evaluated, 30);
        assert_eq!(result.termination_reason, TerminationReason::MaxProfilesReviewed);
    }

    #[tokio::test]
    async fn cancellation_returns_best_known_with_cancelled_reason() {
        let docs: Vec<Practitioner> = (0..10).map(|i| practitioner(&format!("p{i}"))).collect();
        let refs: Vec<&Practitioner> = docs.iter().collect();
        let config = RankingConfig::default();
        let session = session();
        let evaluator = AllGoodEvaluator { calls: AtomicUsize::new(0) };

        let result = run_progressive(&refs, &session, &config, &evaluator, || true).await;
        assert_eq!(result.termination_reason, TerminationReason::Cancelled);
    }
}
