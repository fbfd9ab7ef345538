pub mod bench;
pub mod rank;

use anyhow::{Context, Result};
use ranker_core::corpus::Practitioner;
use ranker_core::RankingConfig;
use std::path::Path;

/// Loads a JSON array of practitioner records from disk (the only
/// corpus format the CLI understands; a real service would load from
/// its own store instead).
pub fn load_corpus(path: &Path) -> Result<Vec<Practitioner>> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("reading corpus file {}", path.display()))?;
    let practitioners: Vec<Practitioner> = serde_json::from_str(&raw).with_context(|| format!("parsing corpus file {}", path.display()))?;
    Ok(practitioners)
}

/// Loads a `RankingConfig` from an explicit path, or falls back to
/// `RankingConfig::load` (env/default), the same layering `rank_shortlist`
/// callers use in production (§10.3).
pub fn load_config(path: Option<&Path>) -> Result<RankingConfig> {
    let config = match path {
        Some(path) => RankingConfig::from_toml_file(path).with_context(|| format!("loading config file {}", path.display()))?,
        None => RankingConfig::load().context("loading ranking config")?,
    };
    Ok(config)
}
