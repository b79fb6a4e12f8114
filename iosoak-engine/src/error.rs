use thiserror::Error;

use crate::bench::OperationClass;

/// Result type for all soak workload operations.
pub type SoakResult<T, E = SoakError> = std::result::Result<T, E>;

/// Errors that abort a soak run.
///
/// There is no retry policy: every variant is fatal for the run that produced it.
#[derive(Debug, Error)]
pub enum SoakError {
    /// The workload is misconfigured. Detected before any IO against the object store.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// An external command exited unsuccessfully.
    #[error("failed to execute `{command}` (exit code {code:?}), response: {output}")]
    Execution {
        /// The command line, with secrets redacted.
        command: String,
        /// The exit code, `None` if the process was terminated by a signal.
        code: Option<i32>,
        /// Combined stdout and stderr captured from the process.
        output: String,
    },

    /// The benchmark exited cleanly but its report or log contains error markers.
    #[error("observed failures for `{command}`, response: {details}")]
    Validation {
        /// The command line, with secrets redacted.
        command: String,
        /// The markers found in the report or log.
        details: String,
    },

    /// An I/O error, e.g. while spawning a process or reading the report.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// A phase of an iteration failed.
    #[error("iteration {iteration} failed, bucket url: {bucket_url}")]
    Iteration {
        /// The iteration that was running.
        iteration: u64,
        /// The `s3://` URL of the run's bucket.
        bucket_url: String,
        /// The underlying failure.
        #[source]
        cause: Box<SoakError>,
    },
}

/// Invalid or unsatisfiable workload configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A byte target yields fewer objects than there are sessions.
    #[error(
        "number of samples '{samples}' for {operation} should be greater/equal to number of sessions '{sessions}'"
    )]
    InsufficientSamples {
        operation: OperationClass,
        samples: u64,
        sessions: usize,
    },

    #[error("object size must be greater than zero")]
    ZeroObjectSize,

    #[error("object size range [{start}, {end}) is empty")]
    EmptySizeRange { start: u64, end: u64 },

    #[error("{name} percentage must be within 0..=100, got {value}")]
    PercentageOutOfRange { name: &'static str, value: u8 },

    #[error("at least one session is required")]
    NoSessions,

    #[error("endpoint must not be empty")]
    EmptyEndpoint,

    /// No total storage size was configured and there is nothing to query it from.
    #[error("total storage size is not configured and no capacity service is available")]
    CapacityUnknown,

    /// The capacity service could not be queried.
    #[error("failed to get storage details: {context}")]
    CapacityQuery {
        context: String,
        #[source]
        cause: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A required external tool is not installed.
    #[error("{tool} tool is not installed")]
    ToolMissing { tool: String },
}
