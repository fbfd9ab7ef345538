use std::path::Path;
use std::time::Instant;

use anyhow::Result;
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use rand::rngs::StdRng;
use rand::SeedableRng;
use ranker_core::corpus::Practitioner;
use ranker_core::pool::{build_pool, PoolStrategy};
use ranker_core::session::SessionContext;
use ranker_llm::create_llm_provider_from_env;

use super::{load_config, load_corpus};

pub async fn execute(corpus_path: &Path, query: &str, strategy: &str, seed: u64, config_path: Option<&Path>) -> Result<()> {
    let docs = load_corpus(corpus_path)?;
    let refs: Vec<&Practitioner> = docs.iter().collect();
    let config = load_config(config_path)?;
    let pool_strategy: PoolStrategy = strategy.parse().map_err(anyhow::Error::msg)?;

    let provider = create_llm_provider_from_env()?;
    let session: SessionContext = ranker_llm::understand_query(provider, query).await;

    let mut rng = StdRng::seed_from_u64(seed);
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}").unwrap());
    pb.set_message(format!("building pool ({strategy})..."));
    pb.enable_steady_tick(std::time::Duration::from_millis(100));

    let started = Instant::now();
    let pool = build_pool(pool_strategy, &refs, &session, &config, &mut rng);
    let elapsed = started.elapsed();

    pb.finish_and_clear();

    println!();
    println!("{} candidate pool built with strategy {}", "→".cyan(), strategy.yellow());
    println!("  corpus size:   {}", docs.len());
    println!("  pool size:     {}", pool.len());
    println!("  elapsed:       {:.2?}", elapsed);
    println!("  ambiguous:     {}", session.intent_data.is_query_ambiguous);
    println!();

    for (i, id) in pool.iter().take(20).enumerate() {
        println!("  {:<4} {}", format!("#{}", i + 1).dimmed(), id);
    }
    if pool.len() > 20 {
        println!("  {} {} more", "...".dimmed(), pool.len() - 20);
    }
    println!();

    Ok(())
}
