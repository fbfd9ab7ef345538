//! Stage B: structured additive rescoring from intent terms, anchor
//! phrases, safe-lane terms, subspecialty confidence, and negative-term
//! penalties (§4.4). A pure function of Stage-A output and context.

use crate::config::RankingConfig;
use crate::corpus::Practitioner;
use crate::diagnostics::{RescoringInfo, ScoredResult};
use crate::session::SessionContext;
use crate::text::build_weighted_text;

fn count_substring_matches(haystack: &str, needles: &[String]) -> usize {
    needles.iter().filter(|n| !n.trim().is_empty() && haystack.contains(&n.to_lowercase())).count()
}

fn bidi_contains(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return false;
    }
    haystack.contains(needle) || needle.contains(haystack)
}

fn subspecialty_boost(p: &Practitioner, session: &SessionContext, config: &RankingConfig) -> f64 {
    let subspecialties: Vec<String> = p.subspecialties.iter().map(|s| s.to_lowercase()).collect();
    let mut total = 0.0;
    for likely in &session.likely_subspecialties {
        let name = likely.name.to_lowercase();
        if subspecialties.iter().any(|s| bidi_contains(s, &name)) {
            total += likely.confidence * config.subspecialty_factor;
        }
    }
    total.min(config.subspecialty_cap)
}

fn safe_lane_delta(matches: usize, config: &RankingConfig) -> f64 {
    match matches {
        0 => 0.0,
        1 => config.safe_lane_1,
        2 => config.safe_lane_2,
        _ => config.safe_lane_3_or_more,
    }
}

fn negative_delta(matches: usize, config: &RankingConfig) -> f64 {
    match matches {
        0 => 0.0,
        1 => config.negative_1,
        2 | 3 => config.negative_2,
        _ => config.negative_4,
    }
}

/// Computes the additive rescoring deltas for one candidate (§4.4).
pub fn compute_deltas(p: &Practitioner, session: &SessionContext, config: &RankingConfig) -> (f64, RescoringInfo) {
    let text = build_weighted_text(p, &config.field_weights).to_lowercase();

    let intent_matches = count_substring_matches(&text, &session.intent_terms);
    let intent_delta = intent_matches as f64 * config.intent_term_weight;

    let anchor_matches = count_substring_matches(&text, &session.anchor_phrases);
    let mut anchor_delta = anchor_matches as f64 * config.anchor_phrase_weight;
    if let Some(cap) = config.anchor_cap {
        anchor_delta = anchor_delta.min(cap);
    }

    let safe_lane_matches = count_substring_matches(&text, &session.safe_lane_terms);
    let safe_lane = safe_lane_delta(safe_lane_matches, config);

    let negative_matches = count_substring_matches(&text, &session.negative_terms);
    let negative = negative_delta(negative_matches, config);

    let subspecialty = subspecialty_boost(p, session, config);

    let delta = intent_delta + anchor_delta + safe_lane + negative + subspecialty;

    let info = RescoringInfo {
        intent_matches,
        anchor_matches,
        negative_matches,
        safe_lane_matches,
        subspecialty_boost: subspecialty,
    };

    (delta, info)
}

/// Runs Stage B over a Stage-A scored list: computes deltas, applies
/// the adaptive ambiguous-branch rule, re-sorts, and re-assigns ranks
/// (§4.4). `practitioners` must be aligned by id with `stage_a_results`.
pub fn run_stage_b(
    stage_a_results: Vec<ScoredResult>,
    practitioners: &[&Practitioner],
    session: &SessionContext,
    config: &RankingConfig,
) -> Vec<ScoredResult> {
    use std::collections::HashMap;
    let by_id: HashMap<&str, &Practitioner> = practitioners.iter().map(|p| (p.id.as_str(), *p)).collect();

    let mut results: Vec<ScoredResult> = stage_a_results
        .into_iter()
        .filter_map(|mut result| {
            let p = by_id.get(result.practitioner_id.as_str())?;
            let (delta, info) = compute_deltas(p, session, config);
            result.rescoring_info = info;

            result.score = if session.intent_data.is_query_ambiguous {
                delta.max(0.0)
            } else {
                (result.score + delta).max(0.0)
            };
            Some(result)
        })
        .collect();

    crate::bm25::sort_with_zero_filler(&mut results);
    crate::diagnostics::assign_ranks(&mut results);
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::{ClinicalExpertise, Gender};
    use crate::session::{IntentData, Goal, Specificity};

    fn practitioner(id: &str, subspecialties: Vec<&str>) -> Practitioner {
        Practitioner {
            id: id.into(),
            name: "Dr Example".into(),
            title: "Dr".into(),
            specialty: "Cardiology".into(),
            subspecialties: subspecialties.into_iter().map(String::from).collect(),
            description: String::new(),
            about: String::new(),
            clinical_expertise: ClinicalExpertise::Raw("electrophysiology catheter ablation".into()),
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

    fn session_with(intent_terms: Vec<&str>, ambiguous: bool) -> SessionContext {
        SessionContext {
            q_patient: "svt ablation".into(),
            q_patient_original: None,
            intent_terms: intent_terms.into_iter().map(String::from).collect(),
            anchor_phrases: vec![],
            safe_lane_terms: vec![],
            likely_subspecialties: vec![],
            negative_terms: vec![],
            intent_data: IntentData {
                goal: Goal::ProcedureIntervention,
                specificity: Specificity::NamedProcedure,
                confidence: 0.95,
                is_query_ambiguous: ambiguous,
            },
            ideal_profile: None,
        }
    }

    #[test]
    fn ambiguous_branch_ignores_bm25_contribution() {
        let p = practitioner("p1", vec!["Electrophysiology"]);
        let config = RankingConfig::default();
        let session = session_with(vec!["electrophysiology"], true);

        let mut stage_a = crate::diagnostics::ScoredResult::new(&p, 1, 10.0);
        stage_a.score = 10.0;

        let results = run_stage_b(vec![stage_a], &[&p], &session, &config);
        let (delta, _) = compute_deltas(&p, &session, &config);
        assert_eq!(results[0].score, delta.max(0.0));
    }

    #[test]
    fn unambiguous_branch_adds_delta_to_bm25() {
        let p = practitioner("p1", vec!["Electrophysiology"]);
        let config = RankingConfig::default();
        let session = session_with(vec!["electrophysiology"], false);

        let mut stage_a = crate::diagnostics::ScoredResult::new(&p, 1, 10.0);
        stage_a.score = 10.0;

        let results = run_stage_b(vec![stage_a], &[&p], &session, &config);
        let (delta, _) = compute_deltas(&p, &session, &config);
        assert_eq!(results[0].score, (10.0 + delta).max(0.0));
    }

    #[test]
    fn negative_penalty_tiers() {
        let config = RankingConfig::default();
        assert_eq!(negative_delta(0, &config), 0.0);
        assert_eq!(negative_delta(1, &config), config.negative_1);
        assert_eq!(negative_delta(2, &config), config.negative_2);
        assert_eq!(negative_delta(3, &config), config.negative_2);
        assert_eq!(negative_delta(4, &config), config.negative_4);
    }

    #[test]
    fn pass_through_when_no_signals() {
        let p = practitioner("p1", vec![]);
        let config = RankingConfig::default();
        let session = session_with(vec![], false);
        let (delta, info) = compute_deltas(&p, &session, &config);
        assert_eq!(delta, 0.0);
        assert_eq!(info.intent_matches, 0);
    }
}
