//! The practitioner record and the corpus that holds it.

use serde::{Deserialize, Serialize};

/// Either a structured `clinical_expertise` blob or a raw interest list.
///
/// Detection happens once, at parse time (see [`crate::text::parse_clinical_expertise`]);
/// only one variant is ever used for text building, never both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ClinicalExpertise {
    Structured {
        procedures: Vec<String>,
        conditions: Vec<String>,
        interests: Vec<String>,
    },
    Raw(String),
}

impl ClinicalExpertise {
    pub fn is_empty(&self) -> bool {
        match self {
            ClinicalExpertise::Structured {
                procedures,
                conditions,
                interests,
            } => procedures.is_empty() && conditions.is_empty() && interests.is_empty(),
            ClinicalExpertise::Raw(text) => text.trim().is_empty(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gender {
    Male,
    Female,
    Unknown,
}

impl Default for Gender {
    fn default() -> Self {
        Gender::Unknown
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcedureGroup {
    pub name: String,
    pub admission_count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsuranceProvider {
    pub canonical_name: String,
    pub raw_name: String,
    #[serde(default)]
    pub insurer_id: Option<String>,
}

/// An immutable practitioner record. Constructed by the corpus loader
/// (outside this crate) and never mutated after load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Practitioner {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub title: String,
    pub specialty: String,
    #[serde(default)]
    pub subspecialties: Vec<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub about: String,
    #[serde(default = "default_clinical_expertise")]
    pub clinical_expertise: ClinicalExpertise,
    #[serde(default)]
    pub qualifications: String,
    #[serde(default)]
    pub professional_memberships: String,
    #[serde(default)]
    pub address_locality: String,
    #[serde(default)]
    pub postal_code: String,
    #[serde(default)]
    pub profile_url: String,

    #[serde(default)]
    pub procedure_groups: Vec<ProcedureGroup>,
    #[serde(default)]
    pub insurance_providers: Vec<InsuranceProvider>,
    #[serde(default)]
    pub patient_age_group: Vec<String>,
    #[serde(default)]
    pub languages: Vec<String>,
    #[serde(default)]
    pub gender: Gender,
    #[serde(default)]
    pub nhs_base: String,
    #[serde(default)]
    pub nhs_posts: String,

    #[serde(default)]
    pub rating_value: Option<f64>,
    #[serde(default)]
    pub review_count: u32,
    #[serde(default)]
    pub years_experience: u32,
    #[serde(default)]
    pub verified: bool,
    #[serde(default)]
    pub distance: Option<f64>,

    #[serde(default)]
    pub blacklisted: bool,
}

fn default_clinical_expertise() -> ClinicalExpertise {
    ClinicalExpertise::Raw(String::new())
}

impl Practitioner {
    pub fn has_nhs(&self) -> bool {
        !self.nhs_base.trim().is_empty() || !self.nhs_posts.trim().is_empty()
    }
}

/// The in-memory, read-only corpus. Loaded once at startup by a
/// collaborator; the core only ever reads it.
#[derive(Debug, Clone, Default)]
pub struct Corpus {
    practitioners: Vec<Practitioner>,
}

impl Corpus {
    pub fn new(practitioners: Vec<Practitioner>) -> Self {
        Self { practitioners }
    }

    pub fn as_slice(&self) -> &[Practitioner] {
        &self.practitioners
    }

    pub fn len(&self) -> usize {
        self.practitioners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.practitioners.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Practitioner> {
        self.practitioners.iter()
    }
}
