//! Core retrieval-and-ranking engine for medical practitioner search.
//!
//! ```text
//!  request
//!     |
//!     v
//!  hard filters  (§4.2 — blacklist, NHS mode, insurance, gender,
//!     |            specialty, location, age/language)
//!     v
//!  Stage A BM25   (§4.3 — weighted text, quality/exact/proximity
//!     |            boosts, optional semantic mixing)
//!     v
//!  Stage B rescoring (§4.4 — additive intent/anchor/safe-lane/
//!     |                negative/subspecialty deltas)
//!     v
//!  optional V6 progressive refinement (§4.5 — bounded LLM-judged
//!     |                                  deepening loop)
//!     v
//!  shortlist + diagnostics
//! ```
//!
//! This crate owns the data model, the hard-filter pipeline, both
//! ranking stages, the progressive controller's state machine, and the
//! benchmark candidate pool builder. It has no direct dependency on an
//! LLM client; `ranker-llm` supplies the `FitEvaluator` implementation
//! the controller calls through a trait object, and query understanding
//! (which produces the `SessionContext` this crate consumes) also lives
//! in `ranker-llm`.

pub mod bm25;
pub mod canon;
pub mod config;
pub mod controller;
pub mod corpus;
pub mod diagnostics;
pub mod errors;
pub mod filters;
pub mod pool;
pub mod rescoring;
pub mod session;
pub mod text;

pub use config::{RankingConfig, RankingVariant};
pub use corpus::{Corpus, Practitioner};
pub use diagnostics::ScoredResult;
pub use errors::{RankerError, Result};
pub use session::SessionContext;

use bm25::{run_stage_a, SemanticOptions, StageARequest};
use canon::InsurerAliasTable;
use corpus::Practitioner as PractitionerRecord;
use filters::{run_filters, FilterRequest};
use rescoring::run_stage_b;

/// Options for a single `/rank`-equivalent request (§6).
#[derive(Debug, Clone, Default)]
pub struct RankOptions {
    pub filters: FilterRequest,
    pub top_n: Option<usize>,
    pub semantic: Option<SemanticOptions>,
    pub apply_stage_b: bool,
    pub is_postcode_request: bool,
}

/// Top-level entry point: hard filters -> Stage A -> optional Stage B.
/// Progressive refinement (§4.5) is a separate call
/// ([`controller::run_progressive`]) since it needs an async
/// `FitEvaluator` from `ranker-llm`.
#[tracing::instrument(skip(corpus, session, config, options), fields(query = %session.q_patient))]
pub fn rank_shortlist(
    corpus: &Corpus,
    session: &SessionContext,
    config: &RankingConfig,
    insurer_table: &InsurerAliasTable,
    options: &RankOptions,
) -> Result<Vec<ScoredResult>> {
    if session.q_patient.trim().is_empty() && session.q_patient_original.is_none() {
        return Err(RankerError::InputError);
    }

    let filtered: Vec<&PractitionerRecord> = run_filters(corpus, &options.filters, insurer_table);
    if filtered.is_empty() {
        tracing::info!("hard filters produced no candidates; returning empty shortlist");
        return Ok(Vec::new());
    }

    let top_n = options.top_n.unwrap_or(config.stage_a_top_n).min(filtered.len());
    let request = StageARequest {
        query: session.q_patient.clone(),
        is_postcode_request: options.is_postcode_request,
        top_n,
        semantic: options.semantic.clone(),
    };
    let stage_a = run_stage_a(&filtered, config, &request);

    let final_results = if options.apply_stage_b {
        run_stage_b(stage_a, &filtered, session, config)
    } else {
        stage_a
    };

    Ok(final_results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::{ClinicalExpertise, Gender};
    use crate::session::{Goal, IntentData, Specificity};

    fn practitioner(id: &str) -> PractitionerRecord {
        PractitionerRecord {
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

    #[test]
    fn empty_query_is_input_error() {
        let corpus = Corpus::new(vec![practitioner("p1")]);
        let table = InsurerAliasTable::default();
        let mut ctx = session();
        ctx.q_patient = "   ".into();
        let result = rank_shortlist(&corpus, &ctx, &RankingConfig::default(), &table, &RankOptions::default());
        assert!(matches!(result, Err(RankerError::InputError)));
    }

    #[test]
    fn filter_empty_is_not_an_error() {
        let mut blacklisted = practitioner("p1");
        blacklisted.blacklisted = true;
        let corpus = Corpus::new(vec![blacklisted]);
        let table = InsurerAliasTable::default();
        let result = rank_shortlist(&corpus, &session(), &RankingConfig::default(), &table, &RankOptions::default());
        assert_eq!(result.unwrap(), Vec::new());
    }

    #[test]
    fn end_to_end_returns_ranked_shortlist() {
        let corpus = Corpus::new(vec![practitioner("p1"), practitioner("p2")]);
        let table = InsurerAliasTable::default();
        let result = rank_shortlist(&corpus, &session(), &RankingConfig::default(), &table, &RankOptions::default()).unwrap();
        assert_eq!(result.len(), 2);
        assert_eq!(result[0].rank, 1);
    }
}
