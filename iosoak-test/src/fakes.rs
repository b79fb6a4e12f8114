//! Recording fakes of the scheduler's external collaborators.
//!
//! All fakes are cheap to clone and share their state between clones, so a test can keep a handle
//! to inspect what the scheduler did after handing the fake over:
//!
//! ```
//! use iosoak_test::fakes::RecordingRunner;
//!
//! let runner = RecordingRunner::default().fail_when("-skipWrite", 1, "read failed");
//! let handle = runner.clone();
//! // pass `runner` to the scheduler...
//! assert!(handle.bench_commands().is_empty());
//! ```

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use iosoak_engine::SoakResult;
use iosoak_engine::buckets::BucketOps;
use iosoak_engine::capacity::CapacityProbe;
use iosoak_engine::command::{CommandOutput, CommandRunner, ShellCommand};
use iosoak_engine::error::ConfigError;
use iosoak_engine::report::ReportScanner;
use iosoak_engine::scheduler::Services;

/// Bundles the given fakes into [`Services`].
pub fn services(
    runner: &RecordingRunner,
    scanner: &RecordingScanner,
    buckets: &RecordingBuckets,
    capacity: Option<FixedCapacity>,
) -> Services {
    Services {
        runner: Arc::new(runner.clone()),
        scanner: Box::new(scanner.clone()),
        buckets: Box::new(buckets.clone()),
        capacity: capacity.map(|probe| Box::new(probe) as _),
    }
}

#[derive(Debug, Default)]
struct RunnerState {
    scripts: Vec<String>,
    failures: Vec<(String, CommandOutput)>,
    latency: Duration,
}

/// A [`CommandRunner`] that records scripts instead of executing them.
///
/// Every command succeeds unless it matches a failure registered with
/// [`fail_when`](Self::fail_when).
#[derive(Clone, Debug, Default)]
pub struct RecordingRunner {
    state: Arc<Mutex<RunnerState>>,
}

impl RecordingRunner {
    /// Makes every command containing `needle` exit with `code` and `output`.
    pub fn fail_when(self, needle: &str, code: i32, output: &str) -> Self {
        self.state.lock().unwrap().failures.push((
            needle.to_owned(),
            CommandOutput {
                code: Some(code),
                output: output.to_owned(),
            },
        ));
        self
    }

    /// Makes every command take `latency` to complete.
    ///
    /// Combined with a paused Tokio clock, this lets a run pass its deadline after a known number
    /// of iterations.
    pub fn with_latency(self, latency: Duration) -> Self {
        self.state.lock().unwrap().latency = latency;
        self
    }

    /// All scripts run so far, in order.
    pub fn scripts(&self) -> Vec<String> {
        self.state.lock().unwrap().scripts.clone()
    }

    /// Scripts run so far, excluding tool lookups.
    pub fn bench_commands(&self) -> Vec<String> {
        self.scripts()
            .into_iter()
            .filter(|script| !script.starts_with("command -v"))
            .collect()
    }

    /// Benchmark commands carrying the given flag.
    pub fn commands_with(&self, flag: &str) -> Vec<String> {
        self.bench_commands()
            .into_iter()
            .filter(|script| script.split(' ').any(|word| word == flag))
            .collect()
    }
}

#[async_trait::async_trait]
impl CommandRunner for RecordingRunner {
    async fn run(&self, command: &ShellCommand) -> SoakResult<CommandOutput> {
        let latency = self.state.lock().unwrap().latency;
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let script = command.script();
        let mut state = self.state.lock().unwrap();

        let output = state
            .failures
            .iter()
            .find(|(needle, _)| script.contains(needle.as_str()))
            .map(|(_, output)| output.clone())
            .unwrap_or(CommandOutput {
                code: Some(0),
                output: String::new(),
            });

        state.scripts.push(script);
        Ok(output)
    }
}

#[derive(Debug, Default)]
struct ScannerState {
    scans: usize,
    failure: Option<(usize, Vec<String>)>,
}

/// A [`ReportScanner`] that reports markers on a chosen scan.
#[derive(Clone, Debug, Default)]
pub struct RecordingScanner {
    state: Arc<Mutex<ScannerState>>,
}

impl RecordingScanner {
    /// Reports `markers` on the scan with the given zero-based index.
    pub fn fail_on_scan(self, index: usize, markers: &[&str]) -> Self {
        self.state.lock().unwrap().failure =
            Some((index, markers.iter().map(|m| (*m).to_owned()).collect()));
        self
    }

    /// Number of scans performed so far.
    pub fn scans(&self) -> usize {
        self.state.lock().unwrap().scans
    }
}

#[async_trait::async_trait]
impl ReportScanner for RecordingScanner {
    async fn prepare(&self, _report: &Path, _log: &Path) -> SoakResult<u64> {
        Ok(0)
    }

    async fn scan(&self, _report: &Path, _log: &Path, _offset: u64) -> SoakResult<Vec<String>> {
        let mut state = self.state.lock().unwrap();
        let index = state.scans;
        state.scans += 1;

        Ok(match &state.failure {
            Some((failing, markers)) if *failing == index => markers.clone(),
            _ => Vec::new(),
        })
    }
}

/// A bucket helper call recorded by [`RecordingBuckets`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BucketCall {
    Create(String),
    Delete { bucket: String, force: bool },
    DeleteObjects { bucket: String, prefix: String },
}

/// [`BucketOps`] that only records calls.
#[derive(Clone, Debug, Default)]
pub struct RecordingBuckets {
    calls: Arc<Mutex<Vec<BucketCall>>>,
}

impl RecordingBuckets {
    pub fn calls(&self) -> Vec<BucketCall> {
        self.calls.lock().unwrap().clone()
    }

    /// The number of recorded prefix deletions.
    pub fn cleanups(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, BucketCall::DeleteObjects { .. }))
            .count()
    }

    fn record(&self, call: BucketCall) -> SoakResult<()> {
        self.calls.lock().unwrap().push(call);
        Ok(())
    }
}

#[async_trait::async_trait]
impl BucketOps for RecordingBuckets {
    async fn create_bucket(&self, bucket: &str) -> SoakResult<()> {
        self.record(BucketCall::Create(bucket.to_owned()))
    }

    async fn delete_bucket(&self, bucket: &str, force: bool) -> SoakResult<()> {
        self.record(BucketCall::Delete {
            bucket: bucket.to_owned(),
            force,
        })
    }

    async fn delete_objects(&self, bucket: &str, prefix: &str) -> SoakResult<()> {
        self.record(BucketCall::DeleteObjects {
            bucket: bucket.to_owned(),
            prefix: prefix.to_owned(),
        })
    }
}

/// A [`CapacityProbe`] answering with a fixed value, or failing for `None`.
#[derive(Clone, Copy, Debug)]
pub struct FixedCapacity(pub Option<u64>);

#[async_trait::async_trait]
impl CapacityProbe for FixedCapacity {
    async fn total_capacity(&self) -> SoakResult<u64> {
        self.0.ok_or_else(|| {
            ConfigError::CapacityQuery {
                context: "cluster status unavailable".into(),
                cause: "no response".into(),
            }
            .into()
        })
    }
}
