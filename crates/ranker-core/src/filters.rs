//! The ordered hard-filter pipeline (§4.2). Each stage is a pure
//! function over a slice of practitioner references; the driver
//! short-circuits to empty as soon as any stage empties the set.

use regex::Regex;
use std::sync::OnceLock;

use crate::canon::InsurerAliasTable;
use crate::corpus::{Corpus, Gender, Practitioner};

fn alnum_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^a-z0-9\s]+").unwrap())
}

fn normalize(s: &str) -> String {
    alnum_re().replace_all(&s.to_lowercase(), " ").to_string()
}

fn bidi_substring(a: &str, b: &str) -> bool {
    let (a, b) = (a.to_lowercase(), b.to_lowercase());
    if a.is_empty() || b.is_empty() {
        return false;
    }
    a.contains(&b) || b.contains(&a)
}

#[derive(Debug, Clone, Default)]
pub struct GenderPreference(pub Option<PreferredGender>);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreferredGender {
    Male,
    Female,
}

/// Location request passed to the collaborator location filter (§6).
#[derive(Debug, Clone, Default)]
pub struct LocationRequest {
    pub city: Option<String>,
    pub postcode: Option<String>,
    pub radius_center: Option<(f64, f64)>,
    pub radius_miles: Option<f64>,
}

#[derive(Debug, Clone, Default)]
pub struct FilterRequest {
    pub nhs_mode: bool,
    pub insurance: Option<String>,
    pub gender: GenderPreference,
    pub specialty_query: Option<String>,
    pub location: Option<LocationRequest>,
    pub age_group: Option<String>,
    pub language: Option<String>,
    pub gender_explicit: Option<String>,
}

pub fn filter_blacklist(practitioners: &[&Practitioner]) -> Vec<&Practitioner> {
    practitioners.iter().copied().filter(|p| !p.blacklisted).collect()
}

pub fn filter_nhs_mode<'a>(practitioners: &[&'a Practitioner], enabled: bool) -> Vec<&'a Practitioner> {
    if !enabled {
        return practitioners.to_vec();
    }
    practitioners.iter().copied().filter(|p| p.has_nhs()).collect()
}

pub fn filter_insurance<'a>(
    practitioners: &[&'a Practitioner],
    requested: &str,
    table: &InsurerAliasTable,
) -> Vec<&'a Practitioner> {
    let canonical_request = table.canonical(requested).to_lowercase();
    practitioners
        .iter()
        .copied()
        .filter(|p| {
            p.insurance_providers.iter().any(|ip| {
                let canon = ip.canonical_name.to_lowercase();
                canon == canonical_request || bidi_substring(&canon, &canonical_request)
            })
        })
        .collect()
}

fn pronoun_counts(text: &str) -> (usize, usize) {
    let lower = text.to_lowercase();
    let male_markers = ["he ", "him ", "his ", " he,", " him,", " his,"];
    let female_markers = ["she ", "her ", "hers ", " she,", " her,", " hers,"];
    let count = |markers: &[&str]| markers.iter().map(|m| lower.matches(m).count()).sum();
    (count(&male_markers), count(&female_markers))
}

fn infer_gender(p: &Practitioner) -> Gender {
    if p.gender != Gender::Unknown {
        return p.gender;
    }
    let title = p.title.to_lowercase();
    if title.contains("mr") && !title.contains("mrs") {
        return Gender::Male;
    }
    if title.contains("mrs") || title.contains("ms") || title.contains("miss") {
        return Gender::Female;
    }
    let combined = format!("{} {} {}", p.description, p.about, clinical_text(p));
    let (male, female) = pronoun_counts(&combined);
    if male >= 2 && male > female {
        return Gender::Male;
    }
    if female >= 2 && female > male {
        return Gender::Female;
    }
    Gender::Unknown
}

fn clinical_text(p: &Practitioner) -> String {
    match &p.clinical_expertise {
        crate::corpus::ClinicalExpertise::Raw(text) => text.clone(),
        crate::corpus::ClinicalExpertise::Structured {
            procedures,
            conditions,
            interests,
        } => [procedures.join(" "), conditions.join(" "), interests.join(" ")].join(" "),
    }
}

/// Gender filter per §4.2 step 4: explicit field, then title
/// inference, then pronoun counting, then permissive unknown-include.
pub fn filter_gender<'a>(
    practitioners: &[&'a Practitioner],
    preference: Option<PreferredGender>,
) -> Vec<&'a Practitioner> {
    let Some(pref) = preference else {
        return practitioners.to_vec();
    };
    practitioners
        .iter()
        .copied()
        .filter(|p| match infer_gender(p) {
            Gender::Male => pref == PreferredGender::Male,
            Gender::Female => pref == PreferredGender::Female,
            Gender::Unknown => {
                tracing::debug!(
                    practitioner = %p.id,
                    "unknown gender permissively included under explicit gender preference"
                );
                true
            }
        })
        .collect()
}

pub fn filter_specialty<'a>(practitioners: &[&'a Practitioner], query: &str) -> Vec<&'a Practitioner> {
    let normalized_query = normalize(query);
    if normalized_query.trim().is_empty() {
        return practitioners.to_vec();
    }
    practitioners
        .iter()
        .copied()
        .filter(|p| {
            let haystacks = [
                normalize(&p.specialty),
                normalize(&p.subspecialties.join(" ")),
                normalize(&clinical_text(p)),
                normalize(&p.title),
            ];
            haystacks.iter().any(|h| bidi_substring(h, &normalized_query))
        })
        .collect()
}

pub fn filter_age_group<'a>(practitioners: &[&'a Practitioner], age_group: &str) -> Vec<&'a Practitioner> {
    let query = age_group.to_lowercase();
    let is_pediatric = query.contains("pediatric") || query.contains("paediatric");
    practitioners
        .iter()
        .copied()
        .filter(|p| {
            p.patient_age_group.iter().any(|ag| {
                let ag_lower = ag.to_lowercase();
                ag_lower.contains(&query)
                    || (is_pediatric && (ag_lower.contains("pediatric") || ag_lower.contains("paediatric")))
            })
        })
        .collect()
}

pub fn filter_language<'a>(practitioners: &[&'a Practitioner], language: &str) -> Vec<&'a Practitioner> {
    let query = language.to_lowercase();
    practitioners
        .iter()
        .copied()
        .filter(|p| p.languages.iter().any(|l| l.to_lowercase().contains(&query)))
        .collect()
}

/// Step 7's flat gender check: a case-insensitive substring match on the
/// explicit `gender` field, distinct from step 4's preference/inference
/// tiering in [`filter_gender`].
pub fn filter_gender_explicit_field<'a>(practitioners: &[&'a Practitioner], query: &str) -> Vec<&'a Practitioner> {
    let query = query.to_lowercase();
    practitioners
        .iter()
        .copied()
        .filter(|p| {
            let gender_str = match p.gender {
                Gender::Male => "male",
                Gender::Female => "female",
                Gender::Unknown => "unknown",
            };
            gender_str.contains(&query)
        })
        .collect()
}

/// Runs the ordered hard-filter pipeline. Short-circuits to an empty
/// vector as soon as any stage reduces the candidate set to zero
/// (§4.2: "no fallback to all").
pub fn run_filters<'a>(
    corpus: &'a Corpus,
    request: &FilterRequest,
    insurer_table: &InsurerAliasTable,
) -> Vec<&'a Practitioner> {
    let all: Vec<&Practitioner> = corpus.iter().collect();

    let after_blacklist = filter_blacklist(&all);
    if after_blacklist.is_empty() {
        return after_blacklist;
    }

    let after_nhs = filter_nhs_mode(&after_blacklist, request.nhs_mode);
    if after_nhs.is_empty() {
        return after_nhs;
    }

    let after_insurance = match &request.insurance {
        Some(insurer) => {
            let filtered = filter_insurance(&after_nhs, insurer, insurer_table);
            if filtered.is_empty() {
                return filtered;
            }
            filtered
        }
        None => after_nhs,
    };

    let after_gender = filter_gender(&after_insurance, request.gender.0);
    if after_gender.is_empty() {
        return after_gender;
    }

    let after_specialty = match &request.specialty_query {
        Some(q) => {
            let filtered = filter_specialty(&after_gender, q);
            if filtered.is_empty() {
                return filtered;
            }
            filtered
        }
        None => after_gender,
    };

    // Location filtering is a collaborator concern (§6); this crate
    // exposes the hook point but does not implement geocoding. Callers
    // that have already geocoded/filtered practitioners pass the
    // already-narrowed set back in via `after_specialty` unchanged when
    // no location collaborator is wired up.
    let after_location = after_specialty;

    let after_age = match &request.age_group {
        Some(ag) => {
            let filtered = filter_age_group(&after_location, ag);
            if filtered.is_empty() {
                return filtered;
            }
            filtered
        }
        None => after_location,
    };

    let after_language = match &request.language {
        Some(lang) => {
            let filtered = filter_language(&after_age, lang);
            if filtered.is_empty() {
                return filtered;
            }
            filtered
        }
        None => after_age,
    };

    match &request.gender_explicit {
        Some(query) => filter_gender_explicit_field(&after_language, query),
        None => after_language,
    }
}
