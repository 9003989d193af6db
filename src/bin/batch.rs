//! batch CLI: operator interface to the batch service.

use anyhow::Context as _;
use claimbatch::config::Config;
use claimbatch::config::schedule::load_schedules;
use claimbatch::control::JobControl;
use claimbatch::db::Db;
use claimbatch::external::HttpExternalApi;
use claimbatch::jobs::bundled_jobs;
use claimbatch::model::job::parse_params;
use claimbatch::model::{JobConfigUpdate, JobParams, WorkStatus};
use claimbatch::schedule::{DistributedScheduleLock, ScheduledJob, Scheduler};
use claimbatch::seed::seed_sample_items;
use claimbatch::store::{StepLogSink, WorkClaimStore};
use claimbatch::telemetry::{TelemetryConfig, init_telemetry};
use clap::{Parser, Subcommand};
use secrecy::ExposeSecret;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "batch", about = "Chunked batch processing over claimed work items")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the scheduler daemon
    Serve,
    /// Run a job now and wait for it
    Run {
        /// Job name (e.g. TRANSACTION_JOB)
        job: String,
        /// JSON object of run parameters
        #[arg(long)]
        params: Option<String>,
    },
    /// Job configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Insert sample work items into an empty table
    Seed,
    /// List work items
    Items {
        /// Filter by status (unset, claimed, completed, error)
        #[arg(long)]
        status: Option<String>,
        /// Maximum items to show
        #[arg(long, default_value_t = 50)]
        limit: i64,
    },
    /// Show recent step results
    Results {
        #[arg(long, default_value_t = 20)]
        limit: i64,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show a job's config
    Get { job: String },
    /// Create or replace a job's config
    Set {
        job: String,
        #[arg(long, action = clap::ArgAction::Set)]
        enabled: bool,
        /// JSON object stored as the parameter overlay
        #[arg(long)]
        params: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long, default_value = "CLI")]
        by: String,
    },
    /// Replace only a job's parameter overlay (empty string clears it)
    Params {
        job: String,
        params: String,
        #[arg(long, default_value = "CLI")]
        by: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = Config::from_env()?;
    let _guard = init_telemetry(TelemetryConfig::from_config(&config))?;

    let db = Arc::new(Db::connect(config.database_url.expose_secret()).await?);
    db.migrate().await?;

    match cli.command {
        Command::Serve => cmd_serve(&config, db).await,
        Command::Run { job, params } => cmd_run(&config, db, job, params).await,
        Command::Config { action } => cmd_config(&config, db, action).await,
        Command::Seed => {
            let inserted = seed_sample_items(db.as_ref()).await?;
            println!("Inserted {inserted} work item(s).");
            Ok(())
        }
        Command::Items { status, limit } => cmd_items(&db, status, limit).await,
        Command::Results { limit } => cmd_results(&db, limit).await,
    }
}

fn build_control(config: &Config, db: Arc<Db>) -> anyhow::Result<JobControl> {
    let api = Arc::new(HttpExternalApi::new(
        config.external_api_url.clone(),
        config.external_api_timeout,
    )?);
    let jobs = bundled_jobs(db.clone(), api);
    Ok(JobControl::with_jobs(
        jobs,
        db.clone(),
        db,
        config.schedule_enabled,
    ))
}

async fn cmd_serve(config: &Config, db: Arc<Db>) -> anyhow::Result<()> {
    let control = build_control(config, db.clone())?;

    let schedules = if config.schedule_file.exists() {
        load_schedules(&config.schedule_file)?
    } else {
        tracing::warn!(
            file = %config.schedule_file.display(),
            "no schedule file, nothing scheduled"
        );
        Vec::new()
    };

    let lock = DistributedScheduleLock::new(db, config.instance_id.clone());
    let mut scheduler = Scheduler::new(lock);
    for entry in &schedules {
        let gate = control
            .gate(&entry.job)
            .with_context(|| format!("schedule refers to unknown job {}", entry.job))?;
        scheduler.add(ScheduledJob {
            gate: Arc::clone(gate),
            interval: entry.interval(),
            lock: entry.lock_config()?,
            params: entry.params.clone(),
        });
    }

    let scheduler = Arc::new(scheduler);
    let sched = Arc::clone(&scheduler);
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        tracing::info!("shutdown requested");
        sched.shutdown();
    });

    scheduler.run().await;
    Ok(())
}

async fn cmd_run(
    config: &Config,
    db: Arc<Db>,
    job: String,
    params: Option<String>,
) -> anyhow::Result<()> {
    let control = build_control(config, db)?;
    let params = match params {
        Some(raw) => parse_params(&raw)?,
        None => JobParams::new(),
    };

    let outcome = control.trigger(&job, params).await?;
    println!("{job}: {}", outcome.label());
    Ok(())
}

async fn cmd_config(config: &Config, db: Arc<Db>, action: ConfigAction) -> anyhow::Result<()> {
    let control = build_control(config, db)?;

    let saved = match action {
        ConfigAction::Get { job } => control.get_config(&job).await?,
        ConfigAction::Set {
            job,
            enabled,
            params,
            description,
            by,
        } => {
            control
                .set_config(JobConfigUpdate {
                    job_name: job,
                    description,
                    enabled,
                    params,
                    updated_by: Some(by),
                })
                .await?
        }
        ConfigAction::Params { job, params, by } => {
            control.update_params(&job, Some(params), &by).await?
        }
    };

    println!("Job:         {}", saved.job_name);
    println!("Enabled:     {}", saved.enabled);
    println!(
        "Description: {}",
        saved.description.as_deref().unwrap_or("-")
    );
    println!("Params:      {}", saved.params.as_deref().unwrap_or("-"));
    println!(
        "Updated:     {} by {}",
        saved
            .updated_date
            .map(|d| d.to_string())
            .unwrap_or("-".to_string()),
        saved.updated_by.as_deref().unwrap_or("-")
    );
    Ok(())
}

async fn cmd_items(db: &Db, status: Option<String>, limit: i64) -> anyhow::Result<()> {
    let status_filter: Option<WorkStatus> = match status {
        Some(s) => Some(
            s.parse()
                .map_err(|_| anyhow::anyhow!("invalid status: {s}"))?,
        ),
        None => None,
    };

    let items = db.list(status_filter, limit).await?;

    if items.is_empty() {
        println!("No work items found.");
        return Ok(());
    }

    println!(
        "{:<8}  {:<8}  {:<20}  {:>12}  {:<10}  CREATED",
        "ID", "BRANCH", "NAME", "AMOUNT", "STATUS"
    );
    println!("{}", "-".repeat(84));

    for item in &items {
        let amount = item
            .amount
            .map(|a| format!("{a:.2}"))
            .unwrap_or("-".to_string());
        println!(
            "{:<8}  {:<8}  {:<20}  {:>12}  {:<10}  {}",
            item.id,
            item.branch,
            item.name,
            amount,
            item.status,
            item.created_at.format("%Y-%m-%d %H:%M")
        );
    }

    let finished = items.iter().filter(|i| i.status.is_terminal()).count();
    println!("\n{} item(s), {finished} finished", items.len());
    Ok(())
}

async fn cmd_results(db: &Db, limit: i64) -> anyhow::Result<()> {
    let results = db.recent_results(limit).await?;

    if results.is_empty() {
        println!("No step results found.");
        return Ok(());
    }

    println!(
        "{:<30}  {:<10}  {:>6}  {:>6}  {:>6}  {:>5}  STARTED",
        "STEP", "STATUS", "TOTAL", "RUN", "ERROR", "SKIP"
    );
    println!("{}", "-".repeat(96));

    for r in &results {
        println!(
            "{:<30}  {:<10}  {:>6}  {:>6}  {:>6}  {:>5}  {}",
            r.job_name,
            r.status.to_string(),
            r.total,
            r.row_run,
            r.row_error,
            r.skip_total,
            r.start_time.format("%Y-%m-%d %H:%M:%S")
        );
    }
    Ok(())
}
