use std::path::Path;

use anyhow::Result;
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use ranker_core::bm25::{run_stage_a, StageARequest};
use ranker_core::controller::run_progressive;
use ranker_core::corpus::Practitioner;
use ranker_core::diagnostics::ScoredResult;
use ranker_core::rescoring::run_stage_b;
use ranker_core::session::SessionContext;
use ranker_llm::{create_llm_provider_from_env, understand_query, LlmFitEvaluator};

use super::{load_config, load_corpus};

pub async fn execute(
    corpus_path: &Path,
    query: &str,
    top_n: usize,
    postcode: bool,
    stage_a_only: bool,
    progressive: bool,
    config_path: Option<&Path>,
    format: &str,
) -> Result<()> {
    let docs = load_corpus(corpus_path)?;
    let refs: Vec<&Practitioner> = docs.iter().collect();
    let config = load_config(config_path)?;

    let provider = create_llm_provider_from_env()?;

    let spinner = new_spinner("Understanding query...");
    let session: SessionContext = understand_query(provider.clone(), query).await;
    spinner.finish_and_clear();

    let results = if progressive {
        let evaluator = LlmFitEvaluator::new(provider);
        let spinner = new_spinner("Running progressive refinement...");
        let run = run_progressive(&refs, &session, &config, &evaluator, || false).await;
        spinner.finish_and_clear();
        tracing::info!(
            iterations = run.iterations,
            profiles_evaluated = run.profiles_evaluated,
            reason = ?run.termination_reason,
            "progressive refinement terminated"
        );
        run.results
    } else {
        let request = StageARequest {
            query: session.q_patient.clone(),
            is_postcode_request: postcode,
            top_n: top_n.min(refs.len().max(1)),
            semantic: None,
        };
        let stage_a = run_stage_a(&refs, &config, &request);
        if stage_a_only {
            stage_a
        } else {
            run_stage_b(stage_a, &refs, &session, &config)
        }
    };

    let shown: Vec<&ScoredResult> = results.iter().take(top_n).collect();

    match format {
        "json" => print_json(&shown)?,
        _ => print_rich(&shown, &docs),
    }

    Ok(())
}

fn new_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}").unwrap());
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

fn print_json(results: &[&ScoredResult]) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(results)?);
    Ok(())
}

fn print_rich(results: &[&ScoredResult], docs: &[Practitioner]) {
    println!();
    println!("{} {} result(s)", "→".cyan(), results.len().to_string().yellow());
    println!();

    for r in results {
        let name = docs.iter().find(|d| d.id == r.practitioner_id).map(|d| d.name.as_str()).unwrap_or("unknown");
        let category = match &r.fit_category {
            Some(cat) => format!("{:?}", cat).green().to_string(),
            None => "-".dimmed().to_string(),
        };
        println!(
            "  {:<4} {:<24} {:<10.4} {}",
            format!("#{}", r.rank).bold(),
            name.cyan(),
            r.score,
            category
        );
    }
    println!();
}
