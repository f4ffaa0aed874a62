//! CLI command definitions for lessonforge.
//!
//! Runs stage-2 requests read from JSON files against the LLM agents and the
//! SQLite block store, and lists what a run saved.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use crate::llm::{LiteLlmClient, LlmProvider};
use crate::pipeline::{
    PipelineConfig, Stage2Mode, Stage2Request, Stage2Result, Stage2Service, Stage2Summary,
};
use crate::question::CandidateQuestion;
use crate::storage::{BlockStore, MemoryBlockStore, SqliteBlockStore};

/// Lesson content generator: verified questions and edited text for course pages.
#[derive(Parser, Debug)]
#[command(name = "lessonforge")]
#[command(about = "Generate verified lesson questions from source text")]
#[command(version)]
#[command(
    long_about = "lessonforge runs the stage-2 lesson pipeline: it generates questions from source \
                  chunks, verifies them for cognitive level, difficulty and grounding, and saves \
                  the accepted ones as blocks.\n\nExample usage:\n  lessonforge generate \
                  --request request.json --db lessonforge.db"
)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,
}

/// Available CLI subcommands.
#[derive(clap::Subcommand, Debug)]
pub enum Commands {
    /// Generate and verify questions for one request.
    #[command(alias = "gen")]
    Generate(GenerateArgs),

    /// Edit a piece of lesson text.
    Edit(EditArgs),

    /// List the blocks saved by a pipeline run.
    Blocks(BlocksArgs),
}

/// Arguments for `lessonforge generate`.
#[derive(Parser, Debug)]
pub struct GenerateArgs {
    /// JSON file holding the stage-2 request.
    #[arg(short, long)]
    pub request: PathBuf,

    /// SQLite block store (overrides LESSONFORGE_DATABASE).
    #[arg(long)]
    pub db: Option<PathBuf>,

    /// Seed for the choice shuffler (overrides LESSONFORGE_SHUFFLE_SEED).
    #[arg(long)]
    pub seed: Option<u64>,

    /// LLM model for every agent.
    #[arg(short, long)]
    pub model: Option<String>,

    /// Do not save accepted questions.
    #[arg(long)]
    pub no_save: bool,

    /// Output the full result as JSON.
    #[arg(short, long)]
    pub json: bool,
}

/// Arguments for `lessonforge edit`.
#[derive(Parser, Debug)]
pub struct EditArgs {
    /// JSON file holding the stage-2 request. Must carry `text`.
    #[arg(short, long)]
    pub request: PathBuf,

    /// SQLite block store (overrides LESSONFORGE_DATABASE).
    #[arg(long)]
    pub db: Option<PathBuf>,

    /// LLM model for every agent.
    #[arg(short, long)]
    pub model: Option<String>,

    /// Do not save the edited paragraph.
    #[arg(long)]
    pub no_save: bool,

    /// Output the full result as JSON.
    #[arg(short, long)]
    pub json: bool,
}

/// Arguments for `lessonforge blocks`.
#[derive(Parser, Debug)]
pub struct BlocksArgs {
    /// Pipeline run id, e.g. run_20260101_120000_ab12cd34.
    #[arg(long)]
    pub run_id: String,

    /// SQLite block store (overrides LESSONFORGE_DATABASE).
    #[arg(long)]
    pub db: Option<PathBuf>,

    /// Output blocks as JSON.
    #[arg(short, long)]
    pub json: bool,
}

/// Parse CLI arguments.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Run the CLI by parsing arguments and executing the command.
pub async fn run() -> anyhow::Result<()> {
    run_with_cli(parse_cli()).await
}

/// Run the CLI with the parsed arguments.
pub async fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Generate(args) => run_generate_command(args).await,
        Commands::Edit(args) => run_edit_command(args).await,
        Commands::Blocks(args) => run_blocks_command(args).await,
    }
}

// ============================================================================
// Command implementations
// ============================================================================

async fn run_generate_command(args: GenerateArgs) -> anyhow::Result<()> {
    let mut config = load_config(args.model.as_deref(), args.db.as_deref())?;
    if args.seed.is_some() {
        config = config.with_shuffle_seed(args.seed);
    }

    let mut request = load_request(&args.request)?;
    request.mode = Stage2Mode::GenerateQuestions;
    if args.no_save {
        request.save_to_blocks = false;
    }

    let service = build_service(&config, request.save_to_blocks).await?;
    let result = service.run(&request).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_generation(&result);
    }
    Ok(())
}

async fn run_edit_command(args: EditArgs) -> anyhow::Result<()> {
    let config = load_config(args.model.as_deref(), args.db.as_deref())?;

    let mut request = load_request(&args.request)?;
    request.mode = Stage2Mode::EditText;
    if args.no_save {
        request.save_to_blocks = false;
    }

    let service = build_service(&config, request.save_to_blocks).await?;
    let result = service.run(&request).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_edit(&result);
    }
    Ok(())
}

async fn run_blocks_command(args: BlocksArgs) -> anyhow::Result<()> {
    let config = load_config(None, args.db.as_deref())?;
    let store = open_store(&config.database_path).await?;
    let blocks = store.find_by_run(&args.run_id).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&blocks)?);
        return Ok(());
    }
    if blocks.is_empty() {
        println!("No blocks found for run {}.", args.run_id);
        return Ok(());
    }

    println!("Run {}: {} blocks", args.run_id, blocks.len());
    for block in &blocks {
        let preview = block
            .content
            .pointer("/question/stem")
            .or_else(|| block.content.pointer("/question/instructions"))
            .or_else(|| block.content.get("text"))
            .and_then(|v| v.as_str())
            .unwrap_or("");
        println!(
            "  {} {:<9} {}",
            block.id,
            block.block_type.as_str(),
            crate::utils::preview(preview, 80)
        );
    }
    Ok(())
}

// ============================================================================
// Helpers
// ============================================================================

fn load_config(model: Option<&str>, db: Option<&Path>) -> anyhow::Result<PipelineConfig> {
    let mut config = PipelineConfig::from_env().context("Invalid LESSONFORGE_* configuration")?;
    if let Some(model) = model {
        config = config.with_model(model);
    }
    if let Some(db) = db {
        config = config.with_database_path(db);
    }
    config.validate()?;
    Ok(config)
}

fn load_request(path: &Path) -> anyhow::Result<Stage2Request> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read request file {}", path.display()))?;
    let request = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse request file {}", path.display()))?;
    Ok(request)
}

async fn open_store(path: &Path) -> anyhow::Result<SqliteBlockStore> {
    SqliteBlockStore::open(&path.to_string_lossy())
        .await
        .with_context(|| format!("Failed to open block store {}", path.display()))
}

async fn build_service(config: &PipelineConfig, persist: bool) -> anyhow::Result<Stage2Service> {
    let llm: Arc<dyn LlmProvider> = Arc::new(LiteLlmClient::from_env().map_err(|e| {
        anyhow::anyhow!(
            "Failed to initialize LLM client: {}. Please set LLM_API_BASE (and LLM_API_KEY if \
             the endpoint needs one).",
            e
        )
    })?);

    let store: Arc<dyn BlockStore> = if persist {
        info!(path = %config.database_path.display(), "Using SQLite block store");
        Arc::new(open_store(&config.database_path).await?)
    } else {
        Arc::new(MemoryBlockStore::new())
    };

    Ok(Stage2Service::from_config(llm, config, store))
}

fn print_generation(result: &Stage2Result) {
    let state = result
        .state
        .map(|s| s.to_string())
        .unwrap_or_else(|| "unknown".to_string());
    println!("✓ Question generation finished ({})", state);
    println!("  Run id:         {}", result.pipeline_run_id);
    println!("  Accepted:       {}", result.generated.len());
    println!("  Saved blocks:   {}", result.saved_blocks.len());

    if let Stage2Summary::Generation(summary) = &result.summary {
        println!("  Requested:      {}", summary.requested);
        println!(
            "  Attempts:       {}/{}",
            summary.attempts, summary.max_attempts
        );
        println!("  Skipped:        {}", summary.total_skipped());
        println!("  Rejected:       {}", summary.rejected_by_verifiers);
        if let Some(reason) = &summary.invalid_request {
            println!("  Invalid request: {}", reason);
        }
    }
    if let Some(err) = result.summary.persistence_error() {
        println!("  Save failed:    {}", err);
    }

    for (i, accepted) in result.generated.iter().enumerate() {
        println!();
        println!("{}. [{}] {}", i + 1, accepted.chunk_id, accepted.question.stem());
        match &accepted.question {
            CandidateQuestion::Mcq(mcq) => {
                for (j, choice) in mcq.choices.iter().enumerate() {
                    let marker = if j == mcq.correct_index { "*" } else { " " };
                    println!("   {} {}) {}", marker, j + 1, choice);
                }
            }
            CandidateQuestion::Open(open) => {
                println!("   Answer: {}", open.expected_answer);
            }
            CandidateQuestion::Matching(matching) => {
                for pair in &matching.pairs {
                    println!("   {} -> {}", pair.left(), pair.right());
                }
            }
        }
    }
}

fn print_edit(result: &Stage2Result) {
    println!("✓ Text edited");
    println!("  Run id:         {}", result.pipeline_run_id);
    println!("  Saved blocks:   {}", result.saved_blocks.len());
    if let Some(err) = result.summary.persistence_error() {
        println!("  Save failed:    {}", err);
    }
    if !result.changes_summary.is_empty() {
        println!("  Changes:");
        for change in &result.changes_summary {
            println!("    - {}", change);
        }
    }
    if let Some(text) = &result.edited_text {
        println!();
        println!("{}", text);
    }
}
