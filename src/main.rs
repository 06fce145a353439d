//! POI Eval CLI
//!
//! Scores a candidate POI search engine against a reference engine.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use poi_eval::{
    config::Config,
    dataset::LoadOptions,
    evaluator::{Evaluator, EvaluatorOptions},
    judge::LlmJudge,
    llm::LlmClient,
    persistence::load_reports,
    report::ReportSummary,
};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// POI Eval - text-similarity metrics plus an LLM judge for POI search
#[derive(Parser)]
#[command(name = "poi-eval")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate every query in the input file
    Run {
        /// Merged results file (JSONL or JSON array)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Where to write the JSONL report
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Similarity threshold for a match, in [0, 1]
        #[arg(short, long)]
        threshold: Option<f64>,

        /// Truncate both result lists to this many items
        #[arg(long)]
        max_results: Option<usize>,

        /// Seconds between judge calls
        #[arg(long)]
        judge_delay: Option<f64>,

        /// Log list previews and coverage details
        #[arg(short, long)]
        verbose: bool,
    },

    /// Print aggregate figures for an existing report
    Summary {
        /// Path to the report file (defaults to the configured output)
        report: Option<PathBuf>,
    },

    /// Test LLM connection
    Test,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Config loading may warn about bad env values before the real
    // subscriber exists, so it runs under a warn-level one.
    let mut config = tracing::subscriber::with_default(stderr_subscriber("warn"), Config::load);
    if let (Ok(config), Commands::Run { verbose: true, .. }) = (&mut config, &cli.command) {
        config.eval.verbose = true;
    }
    init_tracing(config.as_ref().map_or("info", |c| c.eval.log_level()));

    if let Err(err) = run(cli, config).await {
        error!(error = %err, "command failed");
        for cause in err.chain().skip(1) {
            error!(cause = %cause, "caused by");
        }
        std::process::exit(1);
    }
}

async fn run(cli: Cli, config: poi_eval::Result<Config>) -> Result<()> {
    match cli.command {
        Commands::Run {
            input,
            output,
            threshold,
            max_results,
            judge_delay,
            verbose: _,
        } => {
            let mut config = config.context("Failed to load configuration")?;
            if let Some(input) = input {
                config.eval.input_path = input;
            }
            if let Some(output) = output {
                config.eval.output_path = output;
            }
            if let Some(threshold) = threshold {
                config.eval.similarity_threshold = threshold;
            }
            if max_results.is_some() {
                config.eval.max_results = max_results;
            }
            if let Some(delay) = judge_delay {
                config.eval.judge_delay_secs = delay;
            }
            cmd_run(config).await
        }
        Commands::Summary { report } => match report {
            Some(path) => cmd_summary(path),
            None => cmd_summary(
                config
                    .context("Failed to load configuration")?
                    .eval
                    .output_path,
            ),
        },
        Commands::Test => cmd_test(config.context("Failed to load configuration")?).await,
    }
}

fn stderr_subscriber(default_level: &'static str) -> impl tracing::Subscriber + Send + Sync {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish()
}

fn init_tracing(default_level: &'static str) {
    if let Err(e) = tracing::subscriber::set_global_default(stderr_subscriber(default_level)) {
        eprintln!("failed to install tracing subscriber: {}", e);
    }
}

async fn cmd_run(config: Config) -> Result<()> {
    config.validate().context("Invalid configuration")?;

    info!(
        model = %config.llm.model,
        threshold = config.eval.similarity_threshold,
        input = %config.eval.input_path.display(),
        output = %config.eval.output_path.display(),
        verbose = config.eval.verbose,
        "configuration loaded"
    );

    let start = Instant::now();

    let judge = LlmJudge::from_config(config.llm.clone()).with_top_k(config.eval.judge_top_k);
    let mut evaluator = Evaluator::new(Box::new(judge), EvaluatorOptions::from_config(&config.eval));

    let load_options = LoadOptions {
        malformed_tolerance: config.eval.malformed_tolerance,
        max_results: config.eval.max_results,
    };
    let run_summary = evaluator
        .run_file(&config.eval.input_path, &config.eval.output_path, load_options)
        .await
        .context("Evaluation failed")?;

    println!(
        "\nProcessed {} queries ({} skipped, {} judge errors) in {:.2?}",
        run_summary.processed,
        run_summary.skipped,
        run_summary.judge_errors,
        start.elapsed()
    );
    println!("Report saved to: {}", config.eval.output_path.display());

    let reports = load_reports(&config.eval.output_path).context("Failed to read back report")?;
    ReportSummary::from_reports(&reports).print();

    Ok(())
}

fn cmd_summary(path: PathBuf) -> Result<()> {
    let reports = load_reports(&path).context("Failed to load report")?;
    println!("Report: {}", path.display());
    ReportSummary::from_reports(&reports).print();

    Ok(())
}

async fn cmd_test(config: Config) -> Result<()> {
    println!("Testing LLM connection...\n");

    println!("Configuration:");
    println!("  API Base:  {}", config.llm.api_base);
    println!("  Model:     {}", config.llm.model);
    println!(
        "  API Key:   {}...",
        config.llm.api_key.chars().take(8).collect::<String>()
    );
    println!();

    if let Err(e) = config.validate() {
        println!("Configuration error: {}", e);
        return Ok(());
    }

    let client = LlmClient::new(config.llm);

    println!("Sending test request...");
    match client.test_connection().await {
        Ok(()) => println!("Connection successful!"),
        Err(e) => println!("Connection failed: {}", e),
    }

    Ok(())
}
