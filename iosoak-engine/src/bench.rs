//! Invocation of the external `s3bench` load generator.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use secrecy::{ExposeSecret, SecretBox};

use crate::command::{CommandRunner, ShellCommand, run_checked};
use crate::config::{ConfigSecret, WorkloadConfig};
use crate::error::{SoakError, SoakResult};
use crate::metrics::OperationTimings;
use crate::report::BoxedScanner;

/// The kind of work a single benchmark invocation performs.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum OperationClass {
    /// Upload objects.
    Write,
    /// Download objects.
    Read,
    /// Remove objects.
    Delete,
    /// Upload, download, validate and remove objects in one invocation.
    Crud,
}

impl OperationClass {
    /// The `s3bench` flags selecting this operation.
    pub fn flags(self, validate: bool) -> &'static [&'static str] {
        match (self, validate) {
            (OperationClass::Write, false) => &["-skipRead", "-skipCleanup"],
            (OperationClass::Write, true) => &["-skipRead", "-skipCleanup", "-validate"],
            (OperationClass::Read, false) => &["-skipWrite", "-skipCleanup"],
            (OperationClass::Read, true) => &["-skipWrite", "-skipCleanup", "-validate"],
            (OperationClass::Delete, false) => &["-skipWrite", "-skipRead"],
            (OperationClass::Delete, true) => &["-skipWrite", "-skipRead", "-validate"],
            (OperationClass::Crud, _) => &["-validate"],
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OperationClass::Write => "write",
            OperationClass::Read => "read",
            OperationClass::Delete => "delete",
            OperationClass::Crud => "crud",
        }
    }
}

impl fmt::Display for OperationClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single benchmark request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BenchRequest {
    pub operation: OperationClass,
    pub object_size: u64,
    pub samples: u64,
    pub validate: bool,
    /// Iteration number appended to the object name prefix.
    pub iteration: u64,
}

/// Builds `s3bench` command lines and checks their outcome.
#[derive(Debug)]
pub struct BenchInvoker {
    binary: String,
    access_key: String,
    secret_key: SecretBox<ConfigSecret>,
    endpoint: String,
    bucket: String,
    sessions: usize,
    skip_ssl_verification: bool,
    region: String,
    object_prefix: String,
    report: PathBuf,
    log: PathBuf,
    label: String,

    runner: Arc<dyn CommandRunner>,
    scanner: BoxedScanner,
    timings: OperationTimings,
}

impl BenchInvoker {
    pub fn new(
        config: &WorkloadConfig,
        bucket: &str,
        runner: Arc<dyn CommandRunner>,
        scanner: BoxedScanner,
    ) -> Self {
        Self {
            binary: config.bench_binary.clone(),
            access_key: config.access_key.clone(),
            secret_key: config.secret_key.clone(),
            endpoint: config.endpoint_url(),
            bucket: bucket.to_owned(),
            sessions: config.sessions,
            skip_ssl_verification: config.skip_ssl_verification,
            region: config.region.clone(),
            object_prefix: config.object_prefix.clone(),
            report: config.report_path(),
            log: config.log_path(),
            label: config.test_id.clone(),

            runner,
            scanner,
            timings: OperationTimings::default(),
        }
    }

    /// The command line for the given request.
    pub fn command(&self, request: &BenchRequest) -> ShellCommand {
        let skip_ssl = if self.skip_ssl_verification {
            "True"
        } else {
            "False"
        };

        let mut command = ShellCommand::new(&self.binary)
            .flag("-accessKey", &self.access_key)
            .secret_flag("-accessSecret", self.secret_key.expose_secret().as_str())
            .flag("-endpoint", &self.endpoint)
            .flag("-bucket", &self.bucket)
            .flag("-numClients", self.sessions)
            .flag("-skipSSLCertVerification", skip_ssl)
            .flag(
                "-objectNamePrefix",
                format_args!("{}{}", self.object_prefix, request.iteration),
            )
            .flag("-numSamples", request.samples)
            .flag("-objectSize", format_args!("{}b", request.object_size))
            .arg("-region")
            .arg(&self.region);

        for flag in request.operation.flags(request.validate) {
            command = command.arg(flag);
        }

        command
            .arg("-o")
            .arg(self.report.display())
            .arg("-label")
            .arg(&self.label)
            .append_output_to(&self.log)
    }

    /// Runs the benchmark and fails if it exits unsuccessfully or reports errors.
    pub async fn run(&mut self, request: BenchRequest) -> SoakResult<()> {
        tracing::info!(
            operation = %request.operation,
            object_size = request.object_size,
            samples = request.samples,
            validate = request.validate,
            "Single object size: {}, Number of samples: {}",
            request.object_size,
            request.samples,
        );

        let command = self.command(&request);
        let log_offset = self.scanner.prepare(&self.report, &self.log).await?;
        let start = Instant::now();
        run_checked(self.runner.as_ref(), &command).await?;

        let markers = self
            .scanner
            .scan(&self.report, &self.log, log_offset)
            .await?;
        if !markers.is_empty() {
            return Err(SoakError::Validation {
                command: command.redacted(),
                details: markers.join("\n"),
            });
        }

        self.timings.record(request.operation, start.elapsed());
        tracing::info!(operation = %request.operation, "{} completed", request.operation);
        Ok(())
    }

    pub fn into_timings(self) -> OperationTimings {
        self.timings
    }
}
