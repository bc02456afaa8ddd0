//! Command-line interface.

use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::PipelineConfig;
use crate::docai::{DocumentAiClient, OperationHandle, ParsedDocument};
use crate::error::{PipelineError, PipelineResult};
use crate::pipeline::{BatchJob, CleanupReport, CleanupTargets, EntityRecord, Pipeline};
use crate::storage::{self, GcsUri};

#[derive(Debug, Parser)]
#[command(name = "docai-pipeline", version, about)]
pub struct Cli {
    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Write Prometheus-format counters here when the command finishes
    #[arg(long, global = true, env = "DOCAI_METRICS_FILE")]
    pub metrics_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Submit every document under an input prefix as batch jobs
    Process(ProcessArgs),
    /// Print flattened entities for every output record under a prefix
    Harvest(HarvestArgs),
    /// Archive inputs and delete intermediate output
    Cleanup(CleanupArgs),
    /// Process, harvest each job, print records, and optionally clean up
    Run(RunArgs),
}

#[derive(Debug, Args)]
pub struct ProcessArgs {
    /// Destination for Document AI output, e.g. gs://bucket/results
    #[arg(long)]
    pub output_uri: String,

    #[arg(long)]
    pub input_bucket: String,

    #[arg(long, default_value = "")]
    pub input_prefix: String,

    /// Documents per batch (defaults to the configured maximum)
    #[arg(long)]
    pub batch_size: Option<usize>,
}

#[derive(Debug, Args)]
pub struct HarvestArgs {
    #[arg(long)]
    pub output_bucket: String,

    #[arg(long)]
    pub output_directory: String,

    /// Only read the output of this operation (name or bare id)
    #[arg(long)]
    pub operation: Option<String>,
}

#[derive(Debug, Args)]
pub struct CleanupArgs {
    #[arg(long)]
    pub input_bucket: String,

    #[arg(long, default_value = "")]
    pub input_prefix: String,

    #[arg(long)]
    pub output_bucket: String,

    #[arg(long)]
    pub output_directory: String,

    #[arg(long)]
    pub archive_bucket: String,
}

#[derive(Debug, Args)]
pub struct RunArgs {
    #[command(flatten)]
    pub process: ProcessArgs,

    /// Archive inputs here and delete output once records are printed
    #[arg(long)]
    pub archive_bucket: Option<String>,
}

/// One line of `process` output
#[derive(Serialize)]
struct JobSummary<'a> {
    operation: &'a str,
    batch_index: usize,
    document_count: usize,
    output_prefix: String,
    submitted_at: chrono::DateTime<chrono::Utc>,
    completed_at: chrono::DateTime<chrono::Utc>,
}

impl<'a> From<&'a BatchJob> for JobSummary<'a> {
    fn from(job: &'a BatchJob) -> Self {
        Self {
            operation: &job.operation.name,
            batch_index: job.batch_index,
            document_count: job.document_count,
            output_prefix: job.output_prefix().to_string(),
            submitted_at: job.submitted_at,
            completed_at: job.completed_at,
        }
    }
}

/// One line of `harvest` output
#[derive(Serialize)]
struct DocumentRecord<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    uri: Option<&'a str>,
    entities: EntityRecord,
}

fn build_pipeline(config: PipelineConfig) -> PipelineResult<Pipeline> {
    let store = storage::from_config(&config.storage)?;
    let processor = Arc::new(DocumentAiClient::new(&config.processor)?);
    Ok(Pipeline::new(store, processor, config))
}

fn print_json_line(value: &impl Serialize) -> PipelineResult<()> {
    let line = serde_json::to_string(value).map_err(|e| PipelineError::Config {
        message: format!("Failed to serialize output: {}", e),
    })?;
    let mut stdout = std::io::stdout().lock();
    // A closed stdout (e.g. piped into `head`) is not worth failing the run over
    let _ = writeln!(stdout, "{}", line);
    Ok(())
}

fn print_documents(pipeline: &Pipeline, documents: &[ParsedDocument]) -> PipelineResult<()> {
    for document in documents {
        print_json_line(&DocumentRecord {
            uri: document.uri.as_deref(),
            entities: pipeline.flatten_entities(document),
        })?;
    }
    Ok(())
}

fn report_cleanup(report: &CleanupReport) -> PipelineResult<()> {
    print_json_line(report)?;
    if report.is_complete() {
        info!(
            archived = report.archived,
            deleted = report.deleted,
            already_absent = report.already_absent,
            "Cleanup complete"
        );
    } else {
        for failure in &report.failures {
            warn!(
                bucket = %failure.bucket,
                key = %failure.key,
                stage = ?failure.stage,
                error = %failure.error,
                "Cleanup left object behind, re-run cleanup to retry"
            );
        }
    }
    Ok(())
}

pub async fn run(cli: Cli, config: PipelineConfig) -> PipelineResult<()> {
    let pipeline = build_pipeline(config)?;

    match cli.command {
        Command::Process(args) => {
            let jobs = pipeline
                .run_batch_processing(
                    &args.output_uri,
                    &args.input_bucket,
                    &args.input_prefix,
                    args.batch_size,
                )
                .await?;
            for job in &jobs {
                print_json_line(&JobSummary::from(job))?;
            }
        }
        Command::Harvest(args) => {
            let documents = match &args.operation {
                Some(operation) => {
                    let output_root =
                        GcsUri::parse(&format!("gs://{}/{}", args.output_bucket, args.output_directory))?;
                    // Full operation names and bare ids share the same trailing id
                    pipeline
                        .harvest_operation(&output_root, &OperationHandle::new(operation.as_str()))
                        .await?
                }
                None => {
                    pipeline
                        .harvest_documents(&args.output_bucket, &args.output_directory)
                        .await?
                }
            };
            print_documents(&pipeline, &documents)?;
        }
        Command::Cleanup(args) => {
            let report = pipeline
                .cleanup(CleanupTargets {
                    input_bucket: &args.input_bucket,
                    input_prefix: &args.input_prefix,
                    output_bucket: &args.output_bucket,
                    output_directory: &args.output_directory,
                    archive_bucket: &args.archive_bucket,
                })
                .await?;
            report_cleanup(&report)?;
        }
        Command::Run(args) => {
            let process = args.process;
            let jobs = pipeline
                .run_batch_processing(
                    &process.output_uri,
                    &process.input_bucket,
                    &process.input_prefix,
                    process.batch_size,
                )
                .await?;

            for job in &jobs {
                let documents = pipeline
                    .harvest_operation(&job.output_root, &job.operation)
                    .await?;
                print_documents(&pipeline, &documents)?;
            }

            if let Some(archive_bucket) = &args.archive_bucket {
                let output_root = GcsUri::parse(&process.output_uri)?;
                let report = pipeline
                    .cleanup(CleanupTargets {
                        input_bucket: &process.input_bucket,
                        input_prefix: &process.input_prefix,
                        output_bucket: &output_root.bucket,
                        output_directory: &output_root.prefix,
                        archive_bucket,
                    })
                    .await?;
                report_cleanup(&report)?;
            }
        }
    }

    Ok(())
}
