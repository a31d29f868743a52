//! `ensemble`: run the draft, edit and judge pipeline from the command line.
//!
//! ## Commands
//!
//! - `run`: retrieve citations, then fan the brief out through all three phases
//! - `health`: check that the citation service answers
//! - `providers`: list configured providers and the phases they serve

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use cite_client::{CitationSearch, CiteClient};
use ensemble_core::{
    DocumentType, EnsembleConfig, Orchestrator, PhaseKind, PipelineError, PipelineProgress,
    PipelineRun, RunRequest, SourceDocument, StageStatus,
};
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "ensemble")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Multi-provider draft, edit and judge pipeline", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum DocKind {
    Article,
    CasebookSection,
}

impl From<DocKind> for DocumentType {
    fn from(kind: DocKind) -> Self {
        match kind {
            DocKind::Article => DocumentType::Article,
            DocKind::CasebookSection => DocumentType::CasebookSection,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline for one brief
    Run {
        /// Pipeline configuration (TOML)
        #[arg(short, long)]
        config: PathBuf,

        /// Topic of the document
        #[arg(short, long)]
        topic: String,

        /// Outline text, or a path to a file holding it
        #[arg(short, long)]
        outline: String,

        /// Reference documents handed to every drafter
        #[arg(short, long = "source")]
        sources: Vec<PathBuf>,

        #[arg(long, value_enum, default_value = "article")]
        document_type: DocKind,

        /// Intended readership
        #[arg(long)]
        audience: Option<String>,

        /// Target length in words
        #[arg(long)]
        target_length: Option<u32>,

        /// Print the whole run as JSON instead of a summary
        #[arg(long)]
        json: bool,
    },

    /// Check that the citation service answers
    Health {
        #[arg(short, long)]
        config: PathBuf,
    },

    /// List configured providers
    Providers {
        #[arg(short, long)]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    ensemble_core::init_tracing(cli.log_json, level);

    match cli.command {
        Commands::Run {
            config,
            topic,
            outline,
            sources,
            document_type,
            audience,
            target_length,
            json,
        } => {
            let mut request = RunRequest::new(topic, load_outline(&outline)?)
                .with_document_type(document_type.into());
            if let Some(audience) = audience {
                request = request.with_audience(audience);
            }
            if let Some(words) = target_length {
                request = request.with_target_length(words);
            }
            for path in &sources {
                request = request.with_source(load_source(path)?);
            }
            cmd_run(&config, &request, json).await
        }
        Commands::Health { config } => cmd_health(&config).await,
        Commands::Providers { config } => cmd_providers(&config),
    }
}

fn load_config(path: &Path) -> Result<EnsembleConfig> {
    EnsembleConfig::load(path)
        .with_context(|| format!("Failed to load configuration from {}", path.display()))
}

/// An outline argument naming an existing file is read from disk.
fn load_outline(arg: &str) -> Result<String> {
    let path = Path::new(arg);
    if path.is_file() {
        return std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read outline file {}", path.display()));
    }
    Ok(arg.to_string())
}

fn load_source(path: &Path) -> Result<SourceDocument> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read source {}", path.display()))?;
    let title = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    Ok(SourceDocument {
        path: path.display().to_string(),
        title,
        content,
    })
}

async fn cmd_run(config_path: &Path, request: &RunRequest, json: bool) -> Result<ExitCode> {
    let config = load_config(config_path)?;
    let registry = ensemble_llm::build_registry(&config).context("Failed to build providers")?;

    let mut orchestrator = Orchestrator::new(registry, config.executor()).with_progress(Arc::new(
        |event: PipelineProgress| {
            if event.status != StageStatus::Starting {
                info!(stage = %event.stage, status = ?event.status, "{}", event.message);
            }
        },
    ));
    if config.retrieval.enabled {
        let client = CiteClient::new(config.retrieval.cite.clone())
            .context("Failed to build citation client")?;
        orchestrator = orchestrator.with_retrieval(Arc::new(client), config.retrieval.cite.clone());
    }

    match orchestrator.run_with_plan(request, &config.pipeline_plan()).await {
        Ok(run) => {
            print_run(&run, json)?;
            Ok(ExitCode::SUCCESS)
        }
        Err(PipelineError::QuorumNotMet {
            phase,
            succeeded,
            required,
            run,
        }) => {
            print_run(&run, json)?;
            eprintln!("{phase} phase failed: {succeeded} of {required} required providers succeeded");
            Ok(ExitCode::FAILURE)
        }
        Err(e) => Err(e).context("Pipeline could not start"),
    }
}

fn print_run(run: &PipelineRun, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(run)?);
        return Ok(());
    }

    println!("Run {}", run.run_id);
    println!("  citations: {}", run.citation_results.len());
    for result in run.phase_results() {
        println!(
            "  {:<6} {}/{} succeeded (quorum {})",
            result.phase().to_string(),
            result.succeeded_count(),
            result.len(),
            result.quorum_min()
        );
        for (provider, kind, message) in result.failures() {
            println!("           {provider}: {kind}: {message}");
        }
    }
    for edit in run.candidate_edits() {
        println!("  edit by {}: {}", edit.0, edit.1.integrated_draft.title);
    }
    for ranking in run.ranking_summary() {
        let order: Vec<String> = ranking.order.iter().map(|p| p.to_string()).collect();
        println!("  {} ranks: {}", ranking.judge, order.join(" > "));
    }
    Ok(())
}

async fn cmd_health(config_path: &Path) -> Result<ExitCode> {
    let config = load_config(config_path)?;
    let cite = &config.retrieval.cite;
    let client = CiteClient::new(cite.clone()).context("Failed to build citation client")?;
    if client.health_check().await {
        println!("citation service at {} is healthy", cite.base_url);
        Ok(ExitCode::SUCCESS)
    } else {
        println!("citation service at {} is unreachable", cite.base_url);
        Ok(ExitCode::FAILURE)
    }
}

fn cmd_providers(config_path: &Path) -> Result<ExitCode> {
    let config = load_config(config_path)?;
    for spec in &config.providers {
        let phases: Vec<&str> = PhaseKind::ALL
            .into_iter()
            .filter(|phase| config.phase_plan(*phase).providers.contains(&spec.id))
            .map(PhaseKind::stage_name)
            .collect();
        println!(
            "{:<12} {:<10} {:<28} {}",
            spec.id.to_string(),
            spec.kind.to_string(),
            spec.model,
            phases.join(",")
        );
    }
    Ok(ExitCode::SUCCESS)
}
