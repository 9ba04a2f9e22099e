//! # RankCentral CLI (`rankctl`)
//!
//! The `rankctl` binary drives document comparison runs from the command
//! line and hosts the HTTP API used by browser clients.
//!
//! ## Usage
//!
//! ```bash
//! rankctl --config ./config/rankcentral.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `rankctl init` | Create the SQLite database and run schema migrations |
//! | `rankctl criteria` | Print the default evaluation criteria |
//! | `rankctl compare <folder>` | Rank the PDFs in a folder and save a report |
//! | `rankctl reports` | List recent reports |
//! | `rankctl export <id>` | Write a report's CSV bundle to disk |
//! | `rankctl serve` | Start the HTTP API server |
//!
//! ## Examples
//!
//! ```bash
//! # Initialize the database
//! rankctl init --config ./config/rankcentral.toml
//!
//! # Rank a folder of PDFs with the default criteria
//! rankctl compare ./proposals --report-name "Q3 proposals"
//!
//! # Rank with free-form instructions instead of the rubric
//! rankctl compare ./proposals --prompt "Prefer concrete delivery timelines"
//!
//! # Export the newest report's CSVs
//! rankctl reports
//! rankctl export <report-id> --output ./q3-proposals.zip
//! ```

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::PathBuf;

use rankcentral::compare::ComparisonEngine;
use rankcentral::config;
use rankcentral::criteria::{self, CriteriaSet};
use rankcentral::db;
use rankcentral::extract;
use rankcentral::migrate;
use rankcentral::models::Criterion;
use rankcentral::ranking;
use rankcentral::report;
use rankcentral::server;
use rankcentral::store;

/// RankCentral CLI — pairwise document comparison and ranking with
/// LLM-evaluated, weighted criteria.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/rankcentral.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "rankctl",
    about = "RankCentral — rank documents by pairwise LLM comparison against weighted criteria",
    version,
    long_about = "RankCentral compares documents pairwise using an LLM, scoring each pair \
    against a weighted set of evaluation criteria, and ranks the full set with a merge sort \
    driven by those comparisons. Results are saved as reports with downloadable CSV bundles."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/rankcentral.toml`. Database, model, report,
    /// and server settings are read from this file.
    #[arg(long, global = true, default_value = "./config/rankcentral.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and the users and reports tables.
    /// This command is idempotent — running it multiple times is safe.
    Init,

    /// Print the default evaluation criteria.
    ///
    /// Shows each criterion's id, name, weight, and description. Use the
    /// output as a starting point for a `--criteria-file`.
    Criteria,

    /// Compare and rank the PDF documents in a folder.
    ///
    /// Extracts text from every `.pdf` file, ranks the documents by
    /// pairwise LLM comparison, saves a report, and prints the ranking.
    /// Requires the `OPENAI_API_KEY` environment variable.
    Compare {
        /// Folder containing the PDF documents to rank.
        folder: PathBuf,

        /// Free-form evaluation instructions. Replaces the criteria rubric
        /// with a single custom evaluation.
        #[arg(long)]
        prompt: Option<String>,

        /// Name for the saved report. Defaults to a timestamped name.
        #[arg(long)]
        report_name: Option<String>,

        /// TOML file with a `[[criteria]]` table per criterion, overriding
        /// the default set. Weights are normalized to sum to 100.
        #[arg(long)]
        criteria_file: Option<PathBuf>,
    },

    /// List recent reports, newest first.
    Reports,

    /// Write a report's CSV bundle to disk as a zip archive.
    Export {
        /// Report id (shown by `rankctl reports`).
        id: String,

        /// Output path for the zip archive. Defaults to `<report name>.zip`.
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Start the HTTP API server.
    ///
    /// Binds to the address configured in `[server].bind` and serves the
    /// comparison, criteria, report, and auth endpoints.
    Serve,
}

/// On-disk shape of a `--criteria-file`.
#[derive(Deserialize)]
struct CriteriaFile {
    criteria: Vec<Criterion>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // `criteria` needs no config
    if matches!(cli.command, Commands::Criteria) {
        print_criteria(&criteria::default_criteria());
        return Ok(());
    }

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            let pool = db::connect(&cfg).await?;
            migrate::run_migrations(&pool).await?;
            println!("Database initialized successfully.");
        }
        Commands::Criteria => unreachable!(),
        Commands::Compare {
            folder,
            prompt,
            report_name,
            criteria_file,
        } => {
            run_compare(&cfg, &folder, prompt, report_name, criteria_file).await?;
        }
        Commands::Reports => {
            run_reports(&cfg).await?;
        }
        Commands::Export { id, output } => {
            run_export(&cfg, &id, output).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}

fn print_criteria(criteria: &[Criterion]) {
    for c in criteria {
        println!("{}. {} ({}%)", c.id, c.name, c.weight);
        println!("   {}", c.description);
    }
}

/// Resolve the criteria for a run from `--prompt`, `--criteria-file`, or
/// the defaults, in that priority order.
fn resolve_criteria(
    prompt: &Option<String>,
    criteria_file: &Option<PathBuf>,
) -> Result<(Vec<Criterion>, String, Option<String>)> {
    if let Some(prompt) = prompt {
        if prompt.trim().is_empty() {
            bail!("--prompt must not be empty");
        }
        return Ok((
            vec![criteria::custom_prompt_criterion(prompt)],
            "prompt".to_string(),
            Some(prompt.clone()),
        ));
    }

    if let Some(path) = criteria_file {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read criteria file: {}", path.display()))?;
        let file: CriteriaFile = toml::from_str(&raw)
            .with_context(|| format!("failed to parse criteria file: {}", path.display()))?;
        if file.criteria.is_empty() {
            bail!("criteria file defines no criteria: {}", path.display());
        }
        criteria::validate_weights(&file.criteria)?;
        let set = CriteriaSet::new(file.criteria);
        return Ok((set.criteria().to_vec(), "criteria".to_string(), None));
    }

    Ok((criteria::default_criteria(), "criteria".to_string(), None))
}

async fn run_compare(
    cfg: &config::Config,
    folder: &PathBuf,
    prompt: Option<String>,
    report_name: Option<String>,
    criteria_file: Option<PathBuf>,
) -> Result<()> {
    let documents: BTreeMap<String, String> = extract::load_pdf_folder(folder)?;
    if documents.len() < 2 {
        bail!(
            "need at least two readable PDF documents in {}, found {}",
            folder.display(),
            documents.len()
        );
    }
    println!("Loaded {} documents from {}", documents.len(), folder.display());

    let (criteria_used, evaluation_method, custom_prompt) =
        resolve_criteria(&prompt, &criteria_file)?;
    println!("Evaluation method: {}", evaluation_method);
    if evaluation_method == "criteria" {
        print_criteria(&criteria_used);
    }

    let pool = db::connect(cfg).await?;
    migrate::run_migrations(&pool).await?;

    let mut engine =
        ComparisonEngine::new(documents, criteria_used.clone(), cfg.comparison.clone());
    let names = engine.document_names();
    let ranking = ranking::rank_documents(&mut engine, names.clone()).await?;
    let records = engine.into_records();

    println!("\nFinal ranking:");
    for (i, doc) in ranking.iter().enumerate() {
        println!("  {}. {}", i + 1, doc);
    }

    let report_name = report_name
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| report::default_report_name(chrono::Utc::now()));
    let csv_files = report::report_files(&names, &records);
    let report_id = store::save_report(
        &pool,
        store::NewReport {
            report_name: report_name.clone(),
            user_id: None,
            documents: names,
            records,
            ranking,
            criteria: criteria_used,
            evaluation_method,
            custom_prompt,
            csv_files,
        },
        cfg.reports.history_limit,
    )
    .await?;

    println!("\nSaved report '{}' ({})", report_name, report_id);
    println!("Export it with: rankctl export {}", report_id);

    Ok(())
}

async fn run_reports(cfg: &config::Config) -> Result<()> {
    let pool = db::connect(cfg).await?;
    migrate::run_migrations(&pool).await?;

    let reports = store::list_reports(&pool, None, cfg.reports.history_limit).await?;
    if reports.is_empty() {
        println!("No reports found.");
        return Ok(());
    }

    for summary in reports {
        println!("{}  {}", summary.id, summary.report_name);
        println!("    created:   {}", summary.created_at);
        println!("    documents: {}", summary.documents.join(", "));
        if let Some(top) = &summary.top_ranked {
            println!("    top:       {}", top);
        }
        println!(
            "    method:    {} ({} criteria)",
            summary.evaluation_method, summary.criteria_count
        );
    }

    Ok(())
}

async fn run_export(cfg: &config::Config, id: &str, output: Option<PathBuf>) -> Result<()> {
    let pool = db::connect(cfg).await?;
    migrate::run_migrations(&pool).await?;

    let Some(stored) = store::get_report(&pool, id).await? else {
        bail!("no report with id: {}", id);
    };

    let bytes = report::zip_report(&stored.csv_files)?;
    let path = output.unwrap_or_else(|| {
        PathBuf::from(format!("{}.zip", stored.report_name.replace(['/', '\\'], "_")))
    });
    std::fs::write(&path, &bytes)
        .with_context(|| format!("failed to write {}", path.display()))?;

    println!(
        "Exported report '{}' ({} files) to {}",
        stored.report_name,
        stored.csv_files.len(),
        path.display()
    );

    Ok(())
}
