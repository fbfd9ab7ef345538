use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::*;

mod commands;

#[derive(Parser)]
#[command(name = "ranker")]
#[command(about = "Practitioner retrieval-and-ranking engine - local CLI", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rank a corpus against a single query
    ///
    /// Examples:
    ///   ranker rank corpus.json "SVT ablation" --top-n 10
    ///   ranker rank corpus.json "chest pain" --postcode --format json
    ///   ranker rank corpus.json "ablation" --progressive
    Rank {
        /// Path to a JSON file containing an array of practitioner records
        corpus: std::path::PathBuf,

        /// Patient query text
        query: String,

        /// Number of results to return
        #[arg(short = 'n', long, default_value = "10")]
        top_n: usize,

        /// Treat the query as a postcode/location search (enables proximity boost)
        #[arg(long)]
        postcode: bool,

        /// Skip Stage B rescoring and return raw Stage A order
        #[arg(long)]
        stage_a_only: bool,

        /// Drive the V6 progressive controller instead of a single pass
        #[arg(long)]
        progressive: bool,

        /// Path to a RankingConfig TOML file (default: built-in defaults)
        #[arg(short = 'c', long)]
        config: Option<std::path::PathBuf>,

        /// Output format (rich, json)
        #[arg(short = 'f', long, default_value = "rich")]
        format: String,
    },

    /// Build and time a Candidate Pool Builder benchmark run (offline ground-truth pools)
    ///
    /// Examples:
    ///   ranker bench corpus.json "ablation" --strategy hybrid_bm25
    ///   ranker bench corpus.json "chest pain" --strategy multi_source --seed 7
    Bench {
        /// Path to a JSON file containing an array of practitioner records
        corpus: std::path::PathBuf,

        /// Patient query text
        query: String,

        /// Candidate pool strategy (ranking_only, hybrid_bm25, hybrid_random, multi_source)
        #[arg(short = 's', long, default_value = "hybrid_bm25")]
        strategy: String,

        /// Seed for the strategies that sample randomly (hybrid_random, multi_source)
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Path to a RankingConfig TOML file (default: built-in defaults)
        #[arg(short = 'c', long)]
        config: Option<std::path::PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_env("RANKER_LOG").unwrap_or_else(|_| "warn".into()))
        .init();

    let result = match cli.command {
        Commands::Rank { corpus, query, top_n, postcode, stage_a_only, progressive, config, format } => {
            commands::rank::execute(&corpus, &query, top_n, postcode, stage_a_only, progressive, config.as_deref(), &format).await
        }
        Commands::Bench { corpus, query, strategy, seed, config } => {
            commands::bench::execute(&corpus, &query, &strategy, seed, config.as_deref()).await
        }
    };

    if let Err(e) = result {
        eprintln!("{} {}", "Error:".red().bold(), e);
        for cause in e.chain().skip(1) {
            eprintln!("  {} {}", "Caused by:".dimmed(), cause);
        }
        std::process::exit(1);
    }

    Ok(())
}
