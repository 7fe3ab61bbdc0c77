use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use batchline_core::app::{DrainEntry, SubmitReport};
use batchline_core::config::STATE_DIR_ENV;
use batchline_core::impls::AnthropicBatchClient;
use batchline_core::{Config, ControllerBuilder, EnqueueRequest, LifecycleController};

const DRAIN_PREVIEW_CHARS: usize = 100;
const LIST_PREVIEW_CHARS: usize = 60;

#[derive(Parser, Debug)]
#[command(name = "batchline")]
#[command(version)]
#[command(about = "Queue prompts locally and run them through the Message Batches API")]
#[command(propagate_version = true)]
struct Args {
    /// Directory holding batch_tasks/ and batch_results/
    #[arg(long, global = true, env = STATE_DIR_ENV)]
    state_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Queue a prompt for the next batch
    #[command(alias = "add")]
    Enqueue {
        /// Prompt text
        prompt: String,

        /// Custom task id (letters, digits, '-' and '_')
        #[arg(long)]
        id: Option<String>,

        /// Model alias (opus, sonnet, haiku) or full model id
        #[arg(long)]
        model: Option<String>,
    },

    /// Show queued tasks
    List,

    /// Submit every queued task as one batch
    Submit,

    /// Refresh the status of active batches
    #[command(alias = "status")]
    Poll,

    /// Archive results of finished batches
    #[command(alias = "results")]
    Drain,
}

impl Commands {
    fn needs_remote(&self) -> bool {
        matches!(self, Commands::Submit | Commands::Poll | Commands::Drain)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("batchline=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = Config::load(args.state_dir).context("failed to load configuration")?;
    let controller = build_controller(&config, args.command.needs_remote())?;

    match args.command {
        Commands::Enqueue { prompt, id, model } => {
            let mut request = EnqueueRequest::new(prompt);
            request.id = id;
            request.model = model;
            let report = controller.enqueue(request)?;
            println!("✓ queued {} ({})", report.task.id, report.task.params.model);
            println!("  {} task(s) pending", report.queue_depth);
        }
        Commands::List => list(&controller)?,
        Commands::Submit => submit(&controller).await?,
        Commands::Poll => poll(&controller).await?,
        Commands::Drain => drain(&controller).await?,
    }
    Ok(())
}

fn build_controller(config: &Config, needs_remote: bool) -> anyhow::Result<LifecycleController> {
    let mut builder = ControllerBuilder::from_config(config);
    if needs_remote {
        // Without a key the controller still runs; it reports a config error
        // only once a remote call is actually needed.
        match config.resolve_api_key() {
            Ok(key) => {
                let client = AnthropicBatchClient::new(&config.remote, key)?;
                builder = builder.client(Arc::new(client));
            }
            Err(e) => tracing::debug!(error = %e, "no API key available"),
        }
    }
    Ok(builder.build()?)
}

fn list(controller: &LifecycleController) -> anyhow::Result<()> {
    let tasks = controller.pending()?;
    if tasks.is_empty() {
        println!("no pending tasks");
        return Ok(());
    }
    println!("{} pending task(s):", tasks.len());
    for task in tasks {
        println!(
            "  {}  {}  {}",
            task.id,
            task.params.model,
            task.params.prompt_preview(LIST_PREVIEW_CHARS)
        );
    }
    Ok(())
}

async fn submit(controller: &LifecycleController) -> anyhow::Result<()> {
    match controller.submit().await.context("✗ submission failed")? {
        SubmitReport::NothingToSubmit => println!("nothing to submit"),
        SubmitReport::Submitted { batch } => {
            println!("✓ submitted batch {}", batch.batch_id());
            println!("  {} task(s), status {}", batch.member_task_ids().len(), batch.status());
        }
        SubmitReport::SubmittedQueueNotCleared { batch, error } => {
            println!("✓ submitted batch {}", batch.batch_id());
            println!("  {} task(s), status {}", batch.member_task_ids().len(), batch.status());
            anyhow::bail!(
                "✗ batch {} was submitted but its tasks could not be removed from the queue ({error}); \
                 remove them before the next submit",
                batch.batch_id()
            );
        }
    }
    Ok(())
}

async fn poll(controller: &LifecycleController) -> anyhow::Result<()> {
    let report = controller.poll_all().await?;
    if report.is_empty() {
        println!("no active batches");
        return Ok(());
    }
    for entry in &report.entries {
        match &entry.result {
            Ok(batch) => {
                let progress = batch
                    .request_counts()
                    .map(|c| format!("  {c}"))
                    .unwrap_or_default();
                println!("✓ {}  {}{}", batch.batch_id(), batch.status(), progress);
            }
            Err(e) => println!("✗ {}  {} ({e})", entry.batch_id, entry.previous),
        }
    }
    if report.ready() > 0 {
        println!("{} batch(es) ready to drain", report.ready());
    }
    Ok(())
}

async fn drain(controller: &LifecycleController) -> anyhow::Result<()> {
    let report = controller.drain_all().await?;
    if !report.had_terminal() {
        println!("no terminal batches");
    }
    for entry in &report.entries {
        match entry {
            DrainEntry::Drained {
                record, location, ..
            } => {
                println!(
                    "✓ {}  {} succeeded, {} errored -> {}",
                    record.batch_id,
                    record.succeeded(),
                    record.errored(),
                    location
                );
                for outcome in &record.outcomes {
                    let marker = if outcome.is_success() { "✓" } else { "✗" };
                    println!(
                        "    {marker} {}: {}",
                        outcome.task_id,
                        outcome.preview(DRAIN_PREVIEW_CHARS)
                    );
                }
            }
            DrainEntry::AlreadyArchived { batch_id, location } => {
                println!("✓ {batch_id}  already archived at {location}; removed from active list");
            }
            DrainEntry::NotReady { batch_id, status } => {
                println!("- {batch_id}  {status}, not ready");
            }
            DrainEntry::Failed { batch_id, error } => {
                println!("✗ {batch_id}  {error}; will retry on next drain");
            }
        }
    }
    Ok(())
}
