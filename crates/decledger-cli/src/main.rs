//! decledger - evidence-firewalled decision ledger CLI
//!
//! The `decledger` command turns a document into an auditable decision
//! ledger by running the six-stage analysis pipeline.
//!
//! ## Commands
//!
//! - `run`: Analyze a document (raw text or an uploaded file)
//! - `resume`: Re-run a case from a given stage, reusing cached outputs
//! - `show-stage`: Print the validated output of one stage
//! - `validate`: Check a stage output file against its contract, offline
//! - `score`: Compute the deterministic trace score of a ledger file, offline

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use decledger_core::scorer::{assess, TraceAssessment};
use decledger_core::telemetry::init_tracing;
use decledger_core::{
    parse_response, validate, DecisionLedger, DecisionPipeline, ParsedResponse, PipelineConfig,
    PipelineRequest, PipelineRun, RawUpload, ReasoningClient, StageId, StageStore,
};
use decledger_gateway::{GatewayConfig, HttpReasoningClient};
use decledger_state::SurrealStageStore;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "decledger")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Evidence-firewalled decision ledger", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Pipeline configuration file (TOML); DECLEDGER_* variables override it
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline for a case
    Run {
        /// Case identifier
        #[arg(long)]
        case: String,

        /// Plain-text document to analyze
        #[arg(long, conflicts_with = "document", required_unless_present = "document")]
        text_file: Option<PathBuf>,

        /// Binary document (PDF, DOCX, ...) to upload to the reasoning service
        #[arg(long)]
        document: Option<PathBuf>,

        /// Mime type of --document (guessed from the extension if omitted)
        #[arg(long, requires = "document")]
        mime: Option<String>,
    },

    /// Resume a case from a stage, reusing cached validated outputs
    Resume {
        /// Case identifier
        #[arg(long)]
        case: String,

        /// First stage to execute (1-6)
        #[arg(long)]
        from_stage: u8,

        /// Raw text, needed only when resuming from stage 1
        #[arg(long)]
        text_file: Option<PathBuf>,
    },

    /// Print the validated output of one stage
    ShowStage {
        /// Case identifier
        #[arg(long)]
        case: String,

        /// Stage number (1-6)
        #[arg(long)]
        stage: u8,
    },

    /// Check a stage output file against its contract
    Validate {
        /// Stage number (1-6)
        #[arg(long)]
        stage: u8,

        /// File holding the stage output (JSON, optionally fenced)
        file: PathBuf,
    },

    /// Compute the deterministic trace score of a ledger file
    Score {
        /// Ledger JSON file
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    init_tracing(cli.json, level);

    match cli.command {
        Commands::Validate { stage, file } => cmd_validate(stage, &file),
        Commands::Score { file } => cmd_score(&file),
        Commands::ShowStage { case, stage } => {
            let store = open_store().await?;
            cmd_show_stage(&store, &case, stage).await
        }
        Commands::Run {
            case,
            text_file,
            document,
            mime,
        } => {
            let request = match (text_file, document) {
                (Some(path), _) => PipelineRequest::from_text(&case, read_text(&path)?),
                (None, Some(path)) => {
                    PipelineRequest::from_upload(&case, read_upload(&path, mime.as_deref())?)
                }
                (None, None) => bail!("either --text-file or --document is required"),
            };
            let pipeline = build_pipeline(cli.config.as_deref()).await?;
            report(cmd_run(&pipeline, request).await?)
        }
        Commands::Resume {
            case,
            from_stage,
            text_file,
        } => {
            let mut request = PipelineRequest::resume(&case, from_stage);
            if let Some(path) = text_file {
                request = request.with_raw_text(read_text(&path)?);
            }
            let pipeline = build_pipeline(cli.config.as_deref()).await?;
            report(cmd_run(&pipeline, request).await?)
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    let config = match path {
        Some(path) => PipelineConfig::from_toml_file(path)
            .with_context(|| format!("Failed to load config file {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    config
        .with_env_overrides()
        .context("Invalid DECLEDGER_* environment override")
}

async fn open_store() -> Result<SurrealStageStore> {
    SurrealStageStore::from_env()
        .await
        .context("Failed to connect to decledger database")
}

async fn build_pipeline(config_path: Option<&Path>) -> Result<DecisionPipeline> {
    let config = load_config(config_path)?;
    let gateway = GatewayConfig::from_env().context("Invalid reasoning gateway configuration")?;
    info!(gateway = %gateway.base_url, model = %config.model, "using reasoning gateway");

    let client: Arc<dyn ReasoningClient> = Arc::new(
        HttpReasoningClient::new(gateway, config.model.clone())
            .context("Failed to create reasoning gateway client")?,
    );
    let store: Arc<dyn StageStore> = Arc::new(open_store().await?);
    Ok(DecisionPipeline::new(client, store, config))
}

fn read_text(path: &Path) -> Result<String> {
    std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read text file {}", path.display()))
}

fn read_upload(path: &Path, mime: Option<&str>) -> Result<RawUpload> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read document {}", path.display()))?;
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());
    let mime_type = mime.map(str::to_string).unwrap_or_else(|| guess_mime(path).to_string());
    Ok(RawUpload {
        bytes,
        mime_type,
        filename,
    })
}

fn guess_mime(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "pdf" => "application/pdf",
        "txt" => "text/plain",
        "md" => "text/markdown",
        "html" | "htm" => "text/html",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "doc" => "application/msword",
        "eml" => "message/rfc822",
        _ => "application/octet-stream",
    }
}

fn stage_arg(stage: u8) -> Result<StageId> {
    StageId::from_number(stage).with_context(|| format!("Unknown stage {stage}: expected 1-6"))
}

/// Run or resume the pipeline and return the finished run.
async fn cmd_run(pipeline: &DecisionPipeline, request: PipelineRequest) -> Result<PipelineRun> {
    info!(case_id = %request.case_id, "starting pipeline run");
    pipeline
        .run(request)
        .await
        .context("Pipeline request rejected")
}

/// Print the caller-facing summary; a run with failed stages exits non-zero.
fn report(run: PipelineRun) -> Result<()> {
    let summary = run.summary();
    println!("{}", serde_json::to_string_pretty(&summary)?);
    if !summary.overall_success {
        bail!(
            "pipeline run for case {} finished with {} failed stage(s)",
            summary.case_id,
            summary.stages_failed
        );
    }
    Ok(())
}

async fn cmd_show_stage(store: &dyn StageStore, case_id: &str, stage: u8) -> Result<()> {
    let stage = stage_arg(stage)?;
    let data = show_stage(store, case_id, stage).await?;
    println!("{}", serde_json::to_string_pretty(&data)?);
    Ok(())
}

async fn show_stage(
    store: &dyn StageStore,
    case_id: &str,
    stage: StageId,
) -> Result<serde_json::Value> {
    store
        .load_validated_stage(case_id, stage.number())
        .await
        .context("Failed to load stage result")?
        .with_context(|| format!("No validated output for stage {stage} of case {case_id}"))
}

fn cmd_validate(stage: u8, file: &Path) -> Result<()> {
    let stage = stage_arg(stage)?;
    let text = read_text(file)?;
    let errors = check_stage_output(stage, &text);
    if errors.is_empty() {
        println!("{}: valid for stage {}", file.display(), stage);
        return Ok(());
    }
    for error in &errors {
        println!("  {error}");
    }
    bail!(
        "{} violates the stage {} contract ({} error(s))",
        file.display(),
        stage,
        errors.len()
    )
}

/// Every problem with a candidate stage output, empty when it is valid.
fn check_stage_output(stage: StageId, text: &str) -> Vec<String> {
    let value = match parse_response(text) {
        ParsedResponse::Ok(value) => value,
        ParsedResponse::ParseFailed { reason, .. } => return vec![format!("$: {reason}")],
    };
    match validate(stage.number(), value) {
        Ok(_) => Vec::new(),
        Err(errors) => errors.iter().map(ToString::to_string).collect(),
    }
}

fn cmd_score(file: &Path) -> Result<()> {
    let assessment = score_file(file)?;
    println!("{}", serde_json::to_string_pretty(&assessment)?);
    Ok(())
}

fn score_file(file: &Path) -> Result<TraceAssessment> {
    let text = read_text(file)?;
    let ledger: DecisionLedger =
        serde_json::from_str(&text).context("Failed to parse ledger JSON")?;
    Ok(assess(&ledger, &ledger.score_rationale))
}
