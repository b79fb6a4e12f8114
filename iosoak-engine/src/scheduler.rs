//! The iteration scheduler driving a soak run.
//!
//! A run goes through `INIT` once and then repeats iterations of `FILL → READ → DRAIN →
//! [CLEANUP] → CHECK_DEADLINE` until less than the configured minimum duration is left before the
//! deadline. Every phase is awaited before the next one starts, so there is exactly one external
//! invocation in flight at any time.

use std::sync::Arc;
use std::time::Duration;

use rand::SeedableRng;
use rand::rngs::SmallRng;
use tokio::time::Instant;

use crate::bench::{BenchInvoker, BenchRequest, OperationClass};
use crate::buckets::BoxedBuckets;
use crate::capacity::{BoxedProbe, resolve_capacity};
use crate::command::{CommandRunner, ShellCommand};
use crate::config::{ObjectSize, WorkloadConfig};
use crate::error::{ConfigError, SoakError, SoakResult};
use crate::ledger::StorageLedger;
use crate::metrics::RunSummary;
use crate::plan::{ByteTargets, IterationPlan};
use crate::report::BoxedScanner;

/// The external collaborators a [`Scheduler`] works with.
#[derive(Debug)]
pub struct Services {
    pub runner: Arc<dyn CommandRunner>,
    pub scanner: BoxedScanner,
    pub buckets: BoxedBuckets,
    /// Queried when no total storage size is configured.
    pub capacity: Option<BoxedProbe>,
}

/// Mutable state of a run.
#[derive(Clone, Debug)]
pub struct RunState {
    /// The current iteration, starting at `0`.
    pub iteration: u64,
    pub bucket: String,
    pub started: Instant,
    pub deadline: Instant,
}

impl RunState {
    pub fn new(bucket: String, duration: Duration) -> Self {
        let started = Instant::now();
        // Durations beyond what `Instant` can represent never end.
        let deadline = started
            .checked_add(duration)
            .unwrap_or_else(|| started + crate::config::DEFAULT_RUN_DURATION);

        Self {
            iteration: 0,
            bucket,
            started,
            deadline,
        }
    }

    /// Time left until the deadline, zero once it has passed.
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    /// Whether no further iteration may start.
    ///
    /// This is the case once less than `min_duration` is left, or the deadline has passed.
    pub fn should_stop(&self, min_duration: Duration) -> bool {
        let remaining = self.remaining();
        remaining.is_zero() || remaining < min_duration
    }

    pub fn bucket_url(&self) -> String {
        format!("s3://{}", self.bucket)
    }
}

#[derive(Debug, Default)]
struct Totals {
    iterations: u64,
    written: u64,
    read: u64,
    deleted: u64,
    cleanups: u64,
}

/// Drives the soak workload against one bucket.
#[derive(Debug)]
pub struct Scheduler {
    config: WorkloadConfig,
    targets: ByteTargets,
    ledger: StorageLedger,
    state: RunState,
    rng: SmallRng,
    invoker: BenchInvoker,
    buckets: BoxedBuckets,
    totals: Totals,
}

impl Scheduler {
    /// Prepares a run: resolves the capacity, plans the byte targets and creates the bucket.
    ///
    /// Configuration errors are reported before anything is created on the object store.
    pub async fn init(config: WorkloadConfig, services: Services) -> SoakResult<Self> {
        config.validate()?;

        let capacity =
            resolve_capacity(config.configured_capacity(), services.capacity.as_deref()).await?;
        let targets = ByteTargets::plan(capacity, &config.percentages());
        tracing::info!(?targets, "Planned byte targets");

        if let ObjectSize::Fixed(size) = config.object_size {
            IterationPlan::compute(&targets, size.as_u64(), config.sessions)?;
        }

        ensure_installed(services.runner.as_ref(), &config.bench_binary).await?;
        tokio::fs::create_dir_all(&config.log_dir).await?;

        let seed = config.seed.unwrap_or_else(rand::random);
        tracing::info!(seed, "Seeding object size generator");

        let bucket = config.bucket_name();
        services.buckets.create_bucket(&bucket).await?;

        let invoker = BenchInvoker::new(&config, &bucket, services.runner, services.scanner);
        let state = RunState::new(bucket, config.run_duration());

        Ok(Self {
            targets,
            ledger: StorageLedger::new(capacity),
            state,
            rng: SmallRng::seed_from_u64(seed),
            invoker,
            buckets: services.buckets,
            totals: Totals::default(),
            config,
        })
    }

    pub fn targets(&self) -> &ByteTargets {
        &self.targets
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    pub fn ledger(&self) -> &StorageLedger {
        &self.ledger
    }

    /// Runs iterations until the deadline and tears the bucket down.
    ///
    /// The first failing phase aborts the run; the bucket is left in place in that case.
    pub async fn run(mut self) -> SoakResult<RunSummary> {
        loop {
            let iteration = self.state.iteration;
            tracing::info!(iteration, "iteration {iteration} is started...");

            if let Err(err) = self.run_iteration().await {
                let bucket_url = self.state.bucket_url();
                tracing::error!(
                    error = &err as &dyn std::error::Error,
                    iteration,
                    bucket_url,
                    "iteration {iteration} failed, bucket url: {bucket_url}"
                );
                return Err(SoakError::Iteration {
                    iteration,
                    bucket_url,
                    cause: Box::new(err),
                });
            }
            self.totals.iterations += 1;

            if self.state.should_stop(self.config.min_duration) {
                self.buckets.delete_bucket(&self.state.bucket, true).await?;
                tracing::info!("Bucket operation execution completed successfully.");
                return Ok(self.into_summary());
            }

            tracing::info!(iteration, "iteration {iteration} is completed...");
            self.state.iteration += 1;
        }
    }

    async fn run_iteration(&mut self) -> SoakResult<()> {
        let object_size = self.config.object_size.pick(&mut self.rng);
        tracing::info!(object_size, "Single object size: {object_size} bytes");
        let plan = IterationPlan::compute(&self.targets, object_size, self.config.sessions)?;

        self.fill(&plan).await?;
        self.log_consumed("after write operations");

        self.read(&plan).await?;

        self.drain(&plan).await?;
        self.log_consumed("after delete operations");

        self.maybe_cleanup().await?;
        let after_iteration = format!("after iteration {}", self.state.iteration);
        self.log_consumed(&after_iteration);

        Ok(())
    }

    async fn fill(&mut self, plan: &IterationPlan) -> SoakResult<()> {
        let validate = self.config.validate_writes;
        let written = self
            .repeat_until_target(OperationClass::Write, plan, validate)
            .await?;
        self.totals.written += written;
        Ok(())
    }

    async fn read(&mut self, plan: &IterationPlan) -> SoakResult<()> {
        let read = self
            .repeat_until_target(OperationClass::Read, plan, true)
            .await?;
        self.totals.read += read;
        Ok(())
    }

    async fn drain(&mut self, plan: &IterationPlan) -> SoakResult<()> {
        let validate = self.config.validate_deletes;
        let deleted = self
            .repeat_until_target(OperationClass::Delete, plan, validate)
            .await?;
        self.totals.deleted += deleted;
        Ok(())
    }

    /// Invokes `operation` until the bytes covered reach its byte target.
    ///
    /// Returns the bytes covered. The ledger is updated after every successful invocation.
    async fn repeat_until_target(
        &mut self,
        operation: OperationClass,
        plan: &IterationPlan,
        validate: bool,
    ) -> SoakResult<u64> {
        let target = self.targets.for_operation(operation);
        let per_call = plan.bytes_per_call(operation);
        let mut covered = 0u64;

        while covered < target {
            self.invoker
                .run(BenchRequest {
                    operation,
                    object_size: plan.object_size,
                    samples: plan.samples(operation),
                    validate,
                    iteration: self.state.iteration,
                })
                .await?;

            match operation {
                OperationClass::Write => self.ledger.add(per_call),
                OperationClass::Delete => self.ledger.subtract(per_call),
                OperationClass::Read | OperationClass::Crud => (),
            }
            covered = covered.saturating_add(per_call);
        }

        Ok(covered)
    }

    async fn maybe_cleanup(&mut self) -> SoakResult<()> {
        if !self.ledger.reached(self.targets.cleanup) {
            return Ok(());
        }

        let bucket_url = self.state.bucket_url();
        tracing::info!(
            consumed = self.ledger.consumed(),
            cleanup_target = self.targets.cleanup,
            "Deleting all object from {bucket_url} as storage consumption reached limit {}%",
            self.config
                .cleanup_percentage
                .filter(|p| *p > 0)
                .unwrap_or(crate::plan::DEFAULT_CLEANUP_PERCENTAGE),
        );
        self.buckets
            .delete_objects(&self.state.bucket, &self.config.object_prefix)
            .await?;
        self.ledger.reset();
        self.totals.cleanups += 1;
        tracing::info!("Data cleanup completed...");

        Ok(())
    }

    fn log_consumed(&self, after: &str) {
        tracing::info!(
            consumed = self.ledger.consumed(),
            "Storage consumed {}% {after}.",
            self.ledger.percent_consumed() as i64,
        );
    }

    fn into_summary(self) -> RunSummary {
        RunSummary {
            bucket: self.state.bucket,
            iterations: self.totals.iterations,
            bytes_written: self.totals.written,
            bytes_read: self.totals.read,
            bytes_deleted: self.totals.deleted,
            cleanups: self.totals.cleanups,
            final_ledger: self.ledger.consumed(),
            elapsed: self.state.started.elapsed(),
            timings: self.invoker.into_timings(),
        }
    }
}

/// Runs a single validated write/read/delete cycle against a fresh bucket.
///
/// Each session handles one object. The bucket is removed afterwards.
pub async fn run_smoke(config: WorkloadConfig, services: Services) -> SoakResult<RunSummary> {
    config.validate()?;
    ensure_installed(services.runner.as_ref(), &config.bench_binary).await?;
    tokio::fs::create_dir_all(&config.log_dir).await?;

    let mut rng = SmallRng::seed_from_u64(config.seed.unwrap_or_else(rand::random));
    let object_size = config.object_size.pick(&mut rng);
    let samples = config.sessions as u64;

    let bucket = config.bucket_name();
    services.buckets.create_bucket(&bucket).await?;
    let state = RunState::new(bucket, Duration::ZERO);

    let mut invoker = BenchInvoker::new(&config, &state.bucket, services.runner, services.scanner);
    invoker
        .run(BenchRequest {
            operation: OperationClass::Crud,
            object_size,
            samples,
            validate: true,
            iteration: 0,
        })
        .await?;
    services.buckets.delete_bucket(&state.bucket, true).await?;

    let bytes = samples.saturating_mul(object_size);
    Ok(RunSummary {
        bucket: state.bucket,
        iterations: 1,
        bytes_written: bytes,
        bytes_read: bytes,
        bytes_deleted: bytes,
        cleanups: 0,
        final_ledger: 0,
        elapsed: state.started.elapsed(),
        timings: invoker.into_timings(),
    })
}

/// Fails with [`ConfigError::ToolMissing`] unless `tool` resolves to an executable.
pub async fn ensure_installed(runner: &dyn CommandRunner, tool: &str) -> SoakResult<()> {
    let command = ShellCommand::new("command").arg("-v").arg(tool);
    let output = runner.run(&command).await?;
    if !output.success() {
        return Err(ConfigError::ToolMissing {
            tool: tool.to_owned(),
        }
        .into());
    }
    Ok(())
}
