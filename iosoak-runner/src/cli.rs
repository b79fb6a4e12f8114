use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use argh::FromArgs;
use iosoak_engine::buckets::AwsCliBuckets;
use iosoak_engine::capacity::{BoxedProbe, HttpCapacityProbe, resolve_capacity};
use iosoak_engine::command::{CommandRunner, ShellRunner};
use iosoak_engine::config::ObjectSize;
use iosoak_engine::plan::{ByteTargets, IterationPlan};
use iosoak_engine::report::LogFileScanner;
use iosoak_engine::{Scheduler, Services, WorkloadConfig, run_smoke};

use crate::config::Config;
use crate::{observability, summary};

/// Long running S3 soak workload driver.
#[derive(Debug, FromArgs)]
struct Args {
    /// path to the YAML configuration file
    #[argh(option, short = 'c')]
    pub config: Option<PathBuf>,

    #[argh(subcommand)]
    pub command: Command,
}

#[derive(Debug, FromArgs)]
#[argh(subcommand)]
enum Command {
    Run(RunCommand),
    Plan(PlanCommand),
    Smoke(SmokeCommand),
    Version(VersionCommand),
}

/// run the soak workload until the configured duration has passed
#[derive(Debug, FromArgs)]
#[argh(subcommand, name = "run")]
struct RunCommand {}

/// print the byte targets and sample counts without touching the object store
///
/// The capacity is still queried from the cluster if no total storage size is configured.
#[derive(Debug, FromArgs)]
#[argh(subcommand, name = "plan")]
struct PlanCommand {}

/// run a single validated write, read and delete cycle against a fresh bucket
#[derive(Debug, FromArgs)]
#[argh(subcommand, name = "smoke")]
struct SmokeCommand {}

/// print the iosoak version
#[derive(Default, Debug, FromArgs)]
#[argh(subcommand, name = "version")]
struct VersionCommand {}

/// Bootstrap the runtime and execute the CLI command.
pub fn execute() -> Result<()> {
    let args: Args = argh::from_env();

    // Special switch to just print the version and exit.
    if let Command::Version(_) = args.command {
        println!("{}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let config = Config::load(args.config.as_deref())?;

    // Sentry should be initialized before creating the async runtime.
    let _sentry_guard = observability::init_sentry(&config);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let _runtime_guard = runtime.enter();

    observability::init_tracing(&config);
    tracing::debug!(?config);

    let workload = config.workload;
    let result = runtime.block_on(async move {
        match args.command {
            Command::Run(RunCommand {}) => run(workload).await,
            Command::Plan(PlanCommand {}) => plan(workload).await,
            Command::Smoke(SmokeCommand {}) => smoke(workload).await,
            Command::Version(VersionCommand {}) => unreachable!(),
        }
    });

    if let Err(ref error) = result {
        tracing::error!("soak run failed: {error:#}");
    }

    result
}

fn services(config: &WorkloadConfig) -> Services {
    let runner: Arc<dyn CommandRunner> = Arc::new(ShellRunner);
    Services {
        buckets: Box::new(AwsCliBuckets::new(config, runner.clone())),
        scanner: Box::new(LogFileScanner),
        capacity: capacity_probe(config),
        runner,
    }
}

fn capacity_probe(config: &WorkloadConfig) -> Option<BoxedProbe> {
    config
        .capacity_url
        .as_ref()
        .map(|url| Box::new(HttpCapacityProbe::new(url)) as BoxedProbe)
}

async fn run(config: WorkloadConfig) -> Result<()> {
    let services = services(&config);
    let scheduler = Scheduler::init(config, services).await?;
    tracing::info!(bucket = %scheduler.state().bucket, "Starting soak run");

    let summary = scheduler.run().await?;
    summary::print_summary(&summary);
    Ok(())
}

async fn plan(config: WorkloadConfig) -> Result<()> {
    config.validate()?;

    let probe = capacity_probe(&config);
    let capacity = resolve_capacity(config.configured_capacity(), probe.as_deref()).await?;
    let targets = ByteTargets::plan(capacity, &config.percentages());

    let plan = match config.object_size {
        ObjectSize::Fixed(size) => Some(IterationPlan::compute(
            &targets,
            size.as_u64(),
            config.sessions,
        )?),
        ObjectSize::Range { .. } => None,
    };

    summary::print_plan(&targets, plan.as_ref());
    Ok(())
}

async fn smoke(config: WorkloadConfig) -> Result<()> {
    let services = services(&config);
    let summary = run_smoke(config, services).await?;
    summary::print_summary(&summary);
    Ok(())
}
