//! `RankingConfig`: defaults, TOML file overrides, environment overrides,
//! and sanity validation, in the layered style the ambient stack calls
//! for (§10.3).

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::{RankerError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RankingVariant {
    Legacy,
    TwoStage,
    V5,
    V6,
}

impl Default for RankingVariant {
    fn default() -> Self {
        RankingVariant::TwoStage
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchStrategy {
    StageA,
    StageB,
}

impl Default for FetchStrategy {
    fn default() -> Self {
        FetchStrategy::StageB
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldWeights {
    pub clinical_expertise: f64,
    pub procedure_groups: f64,
    pub specialty: f64,
    pub specialty_description: f64,
    pub description: f64,
    pub about: f64,
    pub name: f64,
    pub memberships: f64,
    pub address_locality: f64,
    pub title: f64,
    pub insurance_providers: f64,
}

impl Default for FieldWeights {
    fn default() -> Self {
        Self {
            clinical_expertise: 3.0,
            procedure_groups: 2.8,
            specialty: 2.5,
            specialty_description: 2.0,
            description: 1.5,
            about: 1.0,
            name: 1.0,
            memberships: 0.8,
            address_locality: 0.5,
            title: 0.3,
            insurance_providers: 0.3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingConfig {
    // BM25
    pub k1: f64,
    pub b: f64,

    // Rescoring weights
    pub intent_term_weight: f64,
    pub anchor_phrase_weight: f64,
    pub anchor_cap: Option<f64>,
    pub negative_1: f64,
    pub negative_2: f64,
    pub negative_4: f64,
    pub subspecialty_factor: f64,
    pub subspecialty_cap: f64,
    pub safe_lane_1: f64,
    pub safe_lane_2: f64,
    pub safe_lane_3_or_more: f64,

    // Retrieval controls
    pub stage_a_top_n: usize,
    pub stage_a_intent_terms_cap: usize,
    pub intent_terms_in_bm25: bool,

    pub field_weights: FieldWeights,

    // Semantic mixing
    pub semantic_weight: f64,

    // Progressive controller (V6)
    pub target_shortlist_k: usize,
    pub target_top_k: usize,
    pub batch_size: usize,
    pub max_iterations: usize,
    pub max_profiles_reviewed: usize,
    pub fetch_strategy: FetchStrategy,

    // Variant selector
    pub variant: RankingVariant,

    // Candidate pool builder (§4.6), benchmark path only
    pub candidate_pool_strategy: String,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            k1: 1.5,
            b: 0.75,
            intent_term_weight: 0.3,
            anchor_phrase_weight: 0.5,
            anchor_cap: None,
            negative_1: -1.0,
            negative_2: -2.0,
            negative_4: -3.0,
            subspecialty_factor: 0.3,
            subspecialty_cap: 0.5,
            safe_lane_1: 1.0,
            safe_lane_2: 2.0,
            safe_lane_3_or_more: 3.0,
            stage_a_top_n: 100,
            stage_a_intent_terms_cap: 10,
            intent_terms_in_bm25: false,
            field_weights: FieldWeights::default(),
            semantic_weight: 0.3,
            target_shortlist_k: 12,
            target_top_k: 3,
            batch_size: 12,
            max_iterations: 5,
            max_profiles_reviewed: 30,
            fetch_strategy: FetchStrategy::default(),
            variant: RankingVariant::default(),
            candidate_pool_strategy: "hybrid_bm25".to_string(),
        }
    }
}

impl RankingConfig {
    /// A v2-style anchor-weighted config (§3: "v2: 0.25 with
    /// anchor_cap=0.75").
    pub fn v2_anchor_weighted() -> Self {
        Self {
            anchor_phrase_weight: 0.25,
            anchor_cap: Some(0.75),
            ..Self::default()
        }
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let cfg: Self = toml::from_str(raw)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    /// Load defaults, optionally overridden by a TOML file (path from
    /// `RANKER_CONFIG`), then environment variables, then validate.
    pub fn load() -> Result<Self> {
        let mut cfg = if let Ok(path) = std::env::var("RANKER_CONFIG") {
            Self::from_toml_file(Path::new(&path))?
        } else {
            Self::default()
        };
        cfg.apply_env_overrides();
        cfg.validate()?;
        Ok(cfg)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("CANDIDATE_POOL_STRATEGY") {
            self.candidate_pool_strategy = v;
        }
        if let Ok(v) = std::env::var("RANKER_STAGE_A_TOP_N") {
            if let Ok(n) = v.parse() {
                self.stage_a_top_n = n;
            }
        }
        if let Ok(v) = std::env::var("RANKER_TARGET_SHORTLIST_K") {
            if let Ok(n) = v.parse() {
                self.target_shortlist_k = n;
            }
        }
    }

    /// Reject values outside sanity bounds (§7 RankingConfigInvalid).
    pub fn validate(&self) -> Result<()> {
        if self.k1 <= 0.0 {
            return Err(RankerError::RankingConfigInvalid(format!(
                "k1 must be > 0, got {}",
                self.k1
            )));
        }
        if !(0.0..=1.0).contains(&self.b) {
            return Err(RankerError::RankingConfigInvalid(format!(
                "b must be in [0,1], got {}",
                self.b
            )));
        }
        if self.stage_a_top_n == 0 {
            return Err(RankerError::RankingConfigInvalid(
                "stage_a_top_n must be > 0".to_string(),
            ));
        }
        if self.subspecialty_cap < 0.0 {
            return Err(RankerError::RankingConfigInvalid(
                "subspecialty_cap must be >= 0".to_string(),
            ));
        }
        if self.max_iterations == 0 {
            return Err(RankerError::RankingConfigInvalid(
                "max_iterations must be > 0".to_string(),
            ));
        }
        if self.target_top_k == 0 {
            return Err(RankerError::RankingConfigInvalid(
                "target_top_k must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}
