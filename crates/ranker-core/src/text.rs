//! Weighted searchable text construction and tokenization (§4.3).

use regex::Regex;
use std::sync::OnceLock;

use crate::config::FieldWeights;
use crate::corpus::{ClinicalExpertise, Practitioner};

fn non_word_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^\w]+").unwrap())
}

/// Lowercase; replace non-word characters with spaces; split on
/// whitespace; drop tokens of length <= 2 (§4.3 tokenization).
pub fn tokenize(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    let cleaned = non_word_re().replace_all(&lowered, " ");
    cleaned
        .split_whitespace()
        .filter(|t| t.len() > 2)
        .map(|t| t.to_string())
        .collect()
}

/// Detect whether `raw` contains recognized structured segments
/// (`Procedure:`, `Condition:`, `Clinical Interests:`), splitting into
/// three bags if so. Returns `None` if no segment label is detected, in
/// which case the raw string should be used whole (§3).
pub fn parse_clinical_expertise(raw: &str) -> ClinicalExpertise {
    let labels = ["procedure", "condition", "clinical interests"];
    let lower = raw.to_lowercase();
    let has_structure = labels.iter().any(|l| lower.contains(&format!("{l}:")));
    if !has_structure {
        return ClinicalExpertise::Raw(raw.to_string());
    }

    let mut procedures = Vec::new();
    let mut conditions = Vec::new();
    let mut interests = Vec::new();
    // The nearest preceding bag; malformed/unlabeled segments are
    // folded into it rather than dropped (DESIGN.md open-question
    // decision #4).
    let mut current: Option<&mut Vec<String>> = None;

    for segment in raw.split(';') {
        let trimmed = segment.trim();
        if trimmed.is_empty() {
            continue;
        }
        let lower_seg = trimmed.to_lowercase();
        if let Some(rest) = lower_seg.strip_prefix("procedure:") {
            let value = trimmed[(trimmed.len() - rest.len())..].trim().to_string();
            procedures.push(value);
            current = None;
        } else if let Some(rest) = lower_seg.strip_prefix("condition:") {
            let value = trimmed[(trimmed.len() - rest.len())..].trim().to_string();
            conditions.push(value);
            current = None;
        } else if let Some(rest) = lower_seg.strip_prefix("clinical interests:") {
            let value = trimmed[(trimmed.len() - rest.len())..].trim().to_string();
            interests.push(value);
            current = None;
        } else {
            // No recognized label on this segment: fold it onto the
            // most recently populated bag, defaulting to interests.
            match current.take() {
                Some(bag) => {
                    bag.push(trimmed.to_string());
                    current = Some(bag);
                }
                None => interests.push(trimmed.to_string()),
            }
        }
    }

    ClinicalExpertise::Structured {
        procedures,
        conditions,
        interests,
    }
}

fn repeat_field(buf: &mut String, value: &str, weight: f64) {
    if value.trim().is_empty() {
        return;
    }
    let reps = if weight > 1.0 {
        weight.round().max(1.0) as usize
    } else {
        1
    };
    for _ in 0..reps {
        buf.push(' ');
        buf.push_str(value);
    }
}

fn join_list(items: &[String]) -> String {
    items.join(" ")
}

/// Build the field-weighted searchable text blob for a practitioner
/// (§4.3). Used identically by Stage A (BM25) and Stage B (rescoring),
/// per §4.4 "same weighted blob, lowercased".
pub fn build_weighted_text(p: &Practitioner, weights: &FieldWeights) -> String {
    let mut buf = String::new();

    repeat_field(&mut buf, &p.name, weights.name);
    repeat_field(&mut buf, &p.title, weights.title);
    repeat_field(&mut buf, &p.specialty, weights.specialty);
    repeat_field(&mut buf, &join_list(&p.subspecialties), weights.specialty_description);
    repeat_field(&mut buf, &p.description, weights.description);
    repeat_field(&mut buf, &p.about, weights.about);
    repeat_field(&mut buf, &p.professional_memberships, weights.memberships);
    repeat_field(&mut buf, &p.address_locality, weights.address_locality);

    let procedure_names = join_list(
        &p.procedure_groups
            .iter()
            .map(|pg| pg.name.clone())
            .collect::<Vec<_>>(),
    );
    repeat_field(&mut buf, &procedure_names, weights.procedure_groups);

    let insurance_names = join_list(
        &p.insurance_providers
            .iter()
            .map(|ip| ip.canonical_name.clone())
            .collect::<Vec<_>>(),
    );
    repeat_field(&mut buf, &insurance_names, weights.insurance_providers);

    // clinical_expertise: structured bags at procedures x3,
    // conditions x3, clinical_interests x2, independent of
    // field_weights.clinical_expertise (which covers the unparsed/raw
    // case below).
    match &p.clinical_expertise {
        ClinicalExpertise::Structured {
            procedures,
            conditions,
            interests,
        } => {
            repeat_field(&mut buf, &join_list(procedures), 3.0);
            repeat_field(&mut buf, &join_list(conditions), 3.0);
            repeat_field(&mut buf, &join_list(interests), 2.0);
        }
        ClinicalExpertise::Raw(text) => {
            repeat_field(&mut buf, text, weights.clinical_expertise);
        }
    }

    buf.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::{Gender, InsuranceProvider, ProcedureGroup};

    fn blank_practitioner() -> Practitioner {
        Practitioner {
            id: "p1".into(),
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

    #[test]
    fn tokenize_drops_short_tokens_and_lowercases() {
        let toks = tokenize("Dr. Jane Doe, MD - SVT!");
        assert_eq!(toks, vec!["jane", "doe", "svt"]);
    }

    #[test]
    fn parse_clinical_expertise_detects_structured_segments() {
        let raw = "Procedure: Catheter Ablation; Condition: SVT; Clinical Interests: Arrhythmia";
        let parsed = parse_clinical_expertise(raw);
        match parsed {
            ClinicalExpertise::Structured {
                procedures,
                conditions,
                interests,
            } => {
                assert_eq!(procedures, vec!["Catheter Ablation"]);
                assert_eq!(conditions, vec!["SVT"]);
                assert_eq!(interests, vec!["Arrhythmia"]);
            }
            _ => panic!("expected structured variant"),
        }
    }

    #[test]
    fn parse_clinical_expertise_falls_back_to_raw() {
        let raw = "Arrhythmia, pacing, device implantation";
        let parsed = parse_clinical_expertise(raw);
        assert_eq!(parsed, ClinicalExpertise::Raw(raw.to_string()));
    }

    #[test]
    fn malformed_segment_folds_into_preceding_bag() {
        let raw = "Procedure: Ablation; extra detail here";
        let parsed = parse_clinical_expertise(raw);
        match parsed {
            ClinicalExpertise::Structured { procedures, .. } => {
                assert_eq!(procedures, vec!["Ablation", "extra detail here"]);
            }
            _ => panic!("expected structured variant"),
        }
    }

    #[test]
    fn empty_field_contributes_no_tokens() {
        let mut p = blank_practitioner();
        p.name = "Jane Doe".into();
        let weights = FieldWeights::default();
        let text = build_weighted_text(&p, &weights);
        assert_eq!(text.split_whitespace().count(), 2);
    }

    #[test]
    fn field_weight_repeats_content_rounded_times() {
        let mut p = blank_practitioner();
        p.specialty = "Cardiology".into(); // weight 2.5 -> rounds to 3 (round-half-away-from-zero on .5 in Rust rounds to 3)
        let weights = FieldWeights::default();
        let text = build_weighted_text(&p, &weights);
        let count = text.split_whitespace().filter(|w| *w == "Cardiology").count();
        assert_eq!(count, 3);
    }

    #[test]
    fn fractional_weight_field_appears_once() {
        let mut p = blank_practitioner();
        p.title = "Dr".into(); // weight 0.3 -> appears once
        let weights = FieldWeights::default();
        let text = build_weighted_text(&p, &weights);
        let count = text.split_whitespace().filter(|w| *w == "Dr").count();
        assert_eq!(count, 1);
    }

    #[test]
    fn structured_clinical_expertise_uses_bags_not_raw() {
        let mut p = blank_practitioner();
        p.clinical_expertise = ClinicalExpertise::Structured {
            procedures: vec!["Ablation".into()],
            conditions: vec![],
            interests: vec![],
        };
        let weights = FieldWeights::default();
        let text = build_weighted_text(&p, &weights);
        let count = text.split_whitespace().filter(|w| *w == "Ablation").count();
        assert_eq!(count, 3);
    }

    #[test]
    fn insurance_providers_weight_is_fractional_appears_once() {
        let mut p = blank_practitioner();
        p.insurance_providers = vec![InsuranceProvider {
            canonical_name: "Bupa".into(),
            raw_name: "Bupa Health".into(),
            insurer_id: None,
        }];
        let weights = FieldWeights::default();
        let text = build_weighted_text(&p, &weights);
        assert_eq!(text.split_whitespace().filter(|w| *w == "Bupa").count(), 1);
    }

    #[test]
    fn procedure_groups_weight_rounds_to_three() {
        let mut p = blank_practitioner();
        p.procedure_groups = vec![ProcedureGroup {
            name: "Ablation".into(),
            admission_count: 10,
        }];
        let weights = FieldWeights::default();
        let text = build_weighted_text(&p, &weights);
        assert_eq!(text.split_whitespace().filter(|w| *w == "Ablation").count(), 3);
    }
}
