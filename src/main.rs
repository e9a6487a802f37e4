use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use mapfarm::config::{DependentTable, FarmMode, OrchestratorConfig};
use mapfarm::farm::{FarmClient, LocalFarm, LsfFarm};
use mapfarm::methods::MethodRegistry;
use mapfarm::orchestrator::Orchestrator;
use mapfarm::store::{JobStatus, MappingTask, StatusStore};

#[derive(Parser, Debug)]
#[command(name = "mapfarm")]
#[command(version)]
#[command(about = "Orchestrates batches of sequence-alignment jobs on a compute farm")]
#[command(propagate_version = true)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Submit a mapping batch and wait for it to end
    Run {
        #[command(flatten)]
        common: CommonArgs,

        /// Mapping task as method=query_file:target_file (repeatable)
        #[arg(long = "task", value_name = "METHOD=QUERY:TARGET", required = true)]
        tasks: Vec<String>,
    },

    /// Clean up and resubmit every job the farm marked FAILED
    FixFailed {
        #[command(flatten)]
        common: CommonArgs,
    },

    /// List job records from the status store
    Jobs {
        /// Status database URL
        #[arg(long, default_value = "sqlite:mapfarm.db")]
        db: String,

        #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
        output: OutputFormat,
    },

    /// Record farm accounting for one job: its status and, optionally, the
    /// range of derived records it wrote
    SetStatus {
        /// Status database URL
        #[arg(long, default_value = "sqlite:mapfarm.db")]
        db: String,

        /// Job name the job was submitted under
        #[arg(long)]
        job_id: String,

        /// Array element index (0 for single jobs)
        #[arg(long, default_value_t = 0)]
        array_index: i64,

        /// SUBMITTED, RUNNING, SUCCESSFUL or FAILED
        #[arg(long, value_parser = parse_status)]
        status: JobStatus,

        /// First derived-record id the job wrote
        #[arg(long)]
        range_start: Option<i64>,

        /// Last derived-record id the job wrote
        #[arg(long)]
        range_end: Option<i64>,
    },
}

#[derive(clap::Args, Debug)]
struct CommonArgs {
    /// Working directory for sequence inputs and job output files
    #[arg(long)]
    root_dir: PathBuf,

    /// Status database URL
    #[arg(long, default_value = "sqlite:mapfarm.db")]
    db: String,

    /// Farm queue to submit to
    #[arg(long, default_value = "long")]
    queue: String,

    /// Farm-less mode: run jobs in-process instead of submitting to LSF
    #[arg(long)]
    local: bool,

    /// Downstream table recovery clears by id range, as table:key_column
    /// (repeatable)
    #[arg(long = "dependent-table", value_name = "TABLE:KEY_COLUMN")]
    dependent_tables: Vec<String>,

    /// Pause between submissions, in milliseconds
    #[arg(long, default_value_t = 1000)]
    submit_interval_ms: u64,
}

#[derive(ValueEnum, Clone, Debug)]
enum OutputFormat {
    Table,
    Json,
}

fn parse_task(spec: &str) -> Result<MappingTask, String> {
    let (method, files) = spec
        .split_once('=')
        .ok_or_else(|| format!("task {spec:?} is not method=query:target"))?;
    let (query, target) = files
        .split_once(':')
        .ok_or_else(|| format!("task {spec:?} is missing the query:target pair"))?;
    if method.is_empty() || query.is_empty() || target.is_empty() {
        return Err(format!("task {spec:?} has an empty component"));
    }
    Ok(MappingTask::new(method, query, target))
}

fn parse_status(text: &str) -> Result<JobStatus, String> {
    JobStatus::parse(text)
        .ok_or_else(|| format!("{text:?} is not SUBMITTED, RUNNING, SUCCESSFUL or FAILED"))
}

fn parse_dependent_table(spec: &str) -> Result<DependentTable, String> {
    let (table, key_column) = spec
        .split_once(':')
        .ok_or_else(|| format!("dependent table {spec:?} is not table:key_column"))?;
    Ok(DependentTable::new(table, key_column))
}

async fn build_orchestrator(common: &CommonArgs) -> Result<Orchestrator, Box<dyn std::error::Error>> {
    let dependent_tables = common
        .dependent_tables
        .iter()
        .map(|s| parse_dependent_table(s))
        .collect::<Result<Vec<_>, _>>()?;

    let config = OrchestratorConfig {
        root_dir: common.root_dir.clone(),
        queue: common.queue.clone(),
        farm_mode: if common.local {
            FarmMode::Local
        } else {
            FarmMode::Lsf
        },
        submit_interval: Duration::from_millis(common.submit_interval_ms),
        dependent_tables: dependent_tables.clone(),
    };

    let farm: Arc<dyn FarmClient> = match config.farm_mode {
        FarmMode::Lsf => Arc::new(LsfFarm::new()),
        FarmMode::Local => Arc::new(LocalFarm::new()),
    };
    let store = StatusStore::connect(&common.db, dependent_tables).await?;

    Ok(Orchestrator::new(
        config,
        MethodRegistry::with_default_methods(),
        farm,
        store,
    ))
}

async fn handle_run(common: CommonArgs, task_specs: Vec<String>) -> Result<(), Box<dyn std::error::Error>> {
    let tasks = task_specs
        .iter()
        .map(|s| parse_task(s))
        .collect::<Result<Vec<_>, _>>()?;

    let mut orchestrator = build_orchestrator(&common).await?;
    let total = orchestrator.run_mapping(&tasks).await?;
    println!("Submitted {total} mapping jobs; batch finished");
    Ok(())
}

async fn handle_fix_failed(common: CommonArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut orchestrator = build_orchestrator(&common).await?;
    let resubmitted = orchestrator.fix_failed_jobs().await?;
    println!("Resubmitted {resubmitted} failed jobs");
    Ok(())
}

async fn handle_jobs(db: String, output: OutputFormat) -> Result<(), Box<dyn std::error::Error>> {
    let store = StatusStore::connect(&db, Vec::new()).await?;
    let jobs = store.all_jobs().await?;

    match output {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&jobs)?);
        }
        OutputFormat::Table => {
            println!("{:<40} {:>5} {:<12} {:<12} RANGE", "JOB_ID", "IDX", "METHOD", "STATUS");
            println!("{}", "-".repeat(85));
            for job in &jobs {
                let range = match (job.range_start, job.range_end) {
                    (Some(s), Some(e)) => format!("[{s}, {e}]"),
                    (None, None) => "-".to_string(),
                    (s, e) => format!("INCONSISTENT ({s:?}, {e:?})"),
                };
                println!(
                    "{:<40} {:>5} {:<12} {:<12} {}",
                    job.job_id, job.array_index, job.method, job.status, range
                );
            }
            println!();
            println!("{} jobs", jobs.len());
        }
    }
    Ok(())
}

async fn handle_set_status(
    db: String,
    job_id: String,
    array_index: i64,
    status: JobStatus,
    range_start: Option<i64>,
    range_end: Option<i64>,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = StatusStore::connect(&db, Vec::new()).await?;
    if store.job(&job_id, array_index).await?.is_none() {
        return Err(format!("no job {job_id}[{array_index}] in the status store").into());
    }

    store.update_status(&job_id, array_index, status).await?;
    if range_start.is_some() || range_end.is_some() {
        store
            .set_affected_range(&job_id, array_index, range_start, range_end)
            .await?;
    }
    println!("{job_id}[{array_index}] marked {status}");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    match args.command {
        Commands::Run { common, tasks } => handle_run(common, tasks).await?,
        Commands::FixFailed { common } => handle_fix_failed(common).await?,
        Commands::Jobs { db, output } => handle_jobs(db, output).await?,
        Commands::SetStatus {
            db,
            job_id,
            array_index,
            status,
            range_start,
            range_end,
        } => handle_set_status(db, job_id, array_index, status, range_start, range_end).await?,
    }
    Ok(())
}
