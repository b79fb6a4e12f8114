//! Per-run workload configuration.
//!
//! A [`WorkloadConfig`] is immutable once a run starts. It is deserialized by the runner from YAML
//! and environment variables, but can just as well be constructed in code:
//!
//! ```
//! use bytesize::ByteSize;
//! use iosoak_engine::config::{ObjectSize, WorkloadConfig};
//!
//! let config = WorkloadConfig {
//!     endpoint: "http://localhost:9000".into(),
//!     object_size: ObjectSize::Fixed(ByteSize::kib(64)),
//!     sessions: 4,
//!     write_percentage: Some(20),
//!     ..Default::default()
//! };
//! assert!(config.validate().is_ok());
//! ```

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use bytesize::ByteSize;
use rand::Rng;
use secrecy::{CloneableSecret, SecretBox, SerializableSecret, zeroize::Zeroize};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, SoakResult};
use crate::plan::Percentages;

const MAX_BUCKET_NAME_LEN: usize = 63;

/// How long a run lasts when no duration is configured.
pub const DEFAULT_RUN_DURATION: Duration = Duration::from_secs(100 * 24 * 60 * 60);

/// Newtype around `String` that protects against accidental logging of secrets.
///
/// Use with [`secrecy::SecretBox`].
#[derive(Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ConfigSecret(String);

impl ConfigSecret {
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl From<&str> for ConfigSecret {
    fn from(str: &str) -> Self {
        ConfigSecret(str.to_string())
    }
}

impl fmt::Debug for ConfigSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        write!(f, "[redacted]")
    }
}

impl CloneableSecret for ConfigSecret {}
impl SerializableSecret for ConfigSecret {}
impl Zeroize for ConfigSecret {
    fn zeroize(&mut self) {
        self.0.zeroize();
    }
}

/// Size of the objects written, read and deleted by the benchmark.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq)]
#[serde(untagged)]
pub enum ObjectSize {
    /// Every iteration uses the same object size.
    Fixed(ByteSize),
    /// Every iteration picks a size uniformly from `[start, end)`.
    Range { start: ByteSize, end: ByteSize },
}

impl ObjectSize {
    /// Picks the object size for the next iteration.
    pub fn pick<R: Rng + ?Sized>(&self, rng: &mut R) -> u64 {
        match *self {
            ObjectSize::Fixed(size) => size.as_u64(),
            ObjectSize::Range { start, end } => rng.random_range(start.as_u64()..end.as_u64()),
        }
    }

    fn validate(&self) -> SoakResult<(), ConfigError> {
        match *self {
            ObjectSize::Fixed(size) if size.as_u64() == 0 => Err(ConfigError::ZeroObjectSize),
            ObjectSize::Fixed(_) => Ok(()),
            ObjectSize::Range { start, end } => {
                let (start, end) = (start.as_u64(), end.as_u64());
                if start >= end {
                    Err(ConfigError::EmptySizeRange { start, end })
                } else if start == 0 {
                    Err(ConfigError::ZeroObjectSize)
                } else {
                    Ok(())
                }
            }
        }
    }
}

/// Configuration of a single soak run.
#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct WorkloadConfig {
    /// S3 endpoint, with or without scheme. See [`WorkloadConfig::endpoint_url`].
    pub endpoint: String,
    /// Whether a scheme-less endpoint is reached over `https`.
    pub use_ssl: bool,
    /// Passed to the benchmark and bucket tools to skip certificate verification.
    pub skip_ssl_verification: bool,
    pub access_key: String,
    pub secret_key: SecretBox<ConfigSecret>,
    pub region: String,

    pub object_size: ObjectSize,
    /// Seed of the generator picking ranged object sizes. Random if unset.
    pub seed: Option<u64>,
    /// Number of concurrent benchmark clients.
    pub sessions: usize,

    pub write_percentage: Option<u8>,
    pub read_percentage: Option<u8>,
    pub delete_percentage: Option<u8>,
    /// Ledger percentage at which every object of the run is deleted. Defaults to 90%.
    pub cleanup_percentage: Option<u8>,
    /// Total usable capacity. Queried from `capacity_url` when unset or zero.
    pub total_storage_size: Option<ByteSize>,
    /// URL of the cluster status service reporting the total capacity.
    pub capacity_url: Option<String>,

    /// Total run duration. Defaults to [`DEFAULT_RUN_DURATION`].
    #[serde(with = "humantime_serde")]
    pub duration: Option<Duration>,
    /// No new iteration starts when less than this is left until the deadline.
    #[serde(with = "humantime_serde")]
    pub min_duration: Duration,

    /// Identifies the run in report file names and benchmark labels.
    pub test_id: String,
    /// Directory receiving the benchmark reports and logs.
    pub log_dir: PathBuf,
    /// Object name prefix; the iteration number is appended per iteration.
    pub object_prefix: String,
    /// Prefix of the generated bucket name.
    pub bucket_prefix: String,

    pub validate_writes: bool,
    pub validate_deletes: bool,

    /// Path or name of the `s3bench` executable.
    pub bench_binary: String,
    /// Path or name of the `aws` CLI used for bucket management.
    pub aws_binary: String,
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:9000".into(),
            use_ssl: true,
            skip_ssl_verification: true,
            access_key: String::new(),
            secret_key: SecretBox::new(Box::default()),
            region: "us-east-1".into(),

            object_size: ObjectSize::Fixed(ByteSize::mib(1)),
            seed: None,
            sessions: 1,

            write_percentage: None,
            read_percentage: None,
            delete_percentage: None,
            cleanup_percentage: None,
            total_storage_size: None,
            capacity_url: None,

            duration: None,
            min_duration: Duration::from_secs(5 * 60),

            test_id: "iosoak".into(),
            log_dir: PathBuf::from("logs"),
            object_prefix: "s3mix_object_ops_iter".into(),
            bucket_prefix: "s3mix-bucket".into(),

            validate_writes: false,
            validate_deletes: false,

            bench_binary: "s3bench".into(),
            aws_binary: "aws".into(),
        }
    }
}

impl WorkloadConfig {
    /// Checks everything that can be checked without talking to the cluster.
    pub fn validate(&self) -> SoakResult<(), ConfigError> {
        if self.sessions == 0 {
            return Err(ConfigError::NoSessions);
        }
        if self.endpoint.trim().is_empty() {
            return Err(ConfigError::EmptyEndpoint);
        }
        self.object_size.validate()?;

        let percentages = [
            ("write", self.write_percentage),
            ("read", self.read_percentage),
            ("delete", self.delete_percentage),
            ("cleanup", self.cleanup_percentage),
        ];
        for (name, value) in percentages {
            if let Some(value) = value.filter(|v| *v > 100) {
                return Err(ConfigError::PercentageOutOfRange { name, value });
            }
        }

        Ok(())
    }

    pub fn percentages(&self) -> Percentages {
        Percentages {
            write: self.write_percentage,
            read: self.read_percentage,
            delete: self.delete_percentage,
            cleanup: self.cleanup_percentage,
        }
    }

    /// The configured capacity in bytes, `0` if it has to be queried.
    pub fn configured_capacity(&self) -> u64 {
        self.total_storage_size.map_or(0, |size| size.as_u64())
    }

    /// The endpoint with a scheme, derived from `use_ssl` if missing.
    pub fn endpoint_url(&self) -> String {
        let endpoint = self.endpoint.trim().trim_end_matches('/');
        if endpoint.contains("://") {
            endpoint.to_owned()
        } else if self.use_ssl {
            format!("https://{endpoint}")
        } else {
            format!("http://{endpoint}")
        }
    }

    pub fn run_duration(&self) -> Duration {
        self.duration.unwrap_or(DEFAULT_RUN_DURATION)
    }

    /// A fresh bucket name of the form `<bucket_prefix>-<test_id>-<uuid>`.
    ///
    /// The test id is lowercased, characters not allowed in bucket names become `-`, and it is
    /// shortened so the name stays within 63 characters.
    pub fn bucket_name(&self) -> String {
        let uuid = uuid::Uuid::now_v7().simple().to_string();
        let room = MAX_BUCKET_NAME_LEN.saturating_sub(self.bucket_prefix.len() + uuid.len() + 2);

        let test_id: String = self
            .test_id
            .chars()
            .map(|c| match c.to_ascii_lowercase() {
                c @ ('a'..='z' | '0'..='9') => c,
                _ => '-',
            })
            .take(room)
            .collect();
        let test_id = test_id.trim_matches('-');

        if test_id.is_empty() {
            format!("{}-{uuid}", self.bucket_prefix)
        } else {
            format!("{}-{test_id}-{uuid}", self.bucket_prefix)
        }
    }

    pub fn report_path(&self) -> PathBuf {
        self.log_dir
            .join(format!("{}_mix_s3io_operations_report.log", self.test_id))
    }

    pub fn log_path(&self) -> PathBuf {
        self.log_dir
            .join(format!("{}_mix_s3io_operations.log", self.test_id))
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    use super::*;

    #[test]
    fn default_config_is_valid() {
        WorkloadConfig::default().validate().unwrap();
    }

    #[test]
    fn rejects_invalid_values() {
        let config = WorkloadConfig {
            sessions: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::NoSessions)));

        let config = WorkloadConfig {
            read_percentage: Some(101),
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::PercentageOutOfRange {
                name: "read",
                value: 101
            })
        ));

        let config = WorkloadConfig {
            object_size: ObjectSize::Range {
                start: ByteSize::kib(4),
                end: ByteSize::kib(4),
            },
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::EmptySizeRange { .. })
        ));

        let config = WorkloadConfig {
            object_size: ObjectSize::Fixed(ByteSize::b(0)),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::ZeroObjectSize)));
    }

    #[test]
    fn ranged_sizes_are_reproducible() {
        let size = ObjectSize::Range {
            start: ByteSize::b(100),
            end: ByteSize::b(200),
        };

        let mut first = SmallRng::seed_from_u64(42);
        let mut second = SmallRng::seed_from_u64(42);
        let a: Vec<_> = (0..32).map(|_| size.pick(&mut first)).collect();
        let b: Vec<_> = (0..32).map(|_| size.pick(&mut second)).collect();

        assert_eq!(a, b);
        assert!(a.iter().all(|s| (100..200).contains(s)));
    }

    #[test]
    fn endpoint_scheme_follows_tls_flag() {
        let mut config = WorkloadConfig {
            endpoint: "s3.example.com/".into(),
            ..Default::default()
        };
        assert_eq!(config.endpoint_url(), "https://s3.example.com");

        config.use_ssl = false;
        assert_eq!(config.endpoint_url(), "http://s3.example.com");

        config.endpoint = "https://other.example.com".into();
        assert_eq!(config.endpoint_url(), "https://other.example.com");
    }

    #[test]
    fn secret_is_redacted() {
        let config = WorkloadConfig {
            secret_key: SecretBox::new(Box::new("hunter2".into())),
            ..Default::default()
        };
        let debug = format!("{config:?}");
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn bucket_name_carries_test_id() {
        let config = WorkloadConfig {
            test_id: "Nightly_Soak 42".into(),
            ..Default::default()
        };
        let name = config.bucket_name();
        assert!(name.starts_with("s3mix-bucket-nightly-soak-42-"), "{name}");
        assert_eq!(name.len(), "s3mix-bucket-nightly-soak-42-".len() + 32);
        assert_ne!(name, config.bucket_name());

        let config = WorkloadConfig {
            test_id: "a-very-long-test-identifier-that-does-not-fit".into(),
            ..Default::default()
        };
        let name = config.bucket_name();
        assert!(name.len() <= 63, "{name}");
        assert!(name.starts_with("s3mix-bucket-a-very-long-test-"), "{name}");

        let config = WorkloadConfig {
            test_id: "__".into(),
            ..Default::default()
        };
        let name = config.bucket_name();
        assert_eq!(name.len(), "s3mix-bucket-".len() + 32);
    }

    #[test]
    fn report_paths_use_test_id() {
        let config = WorkloadConfig {
            test_id: "TEST-1".into(),
            log_dir: PathBuf::from("/tmp/soak"),
            ..Default::default()
        };
        assert_eq!(
            config.report_path(),
            PathBuf::from("/tmp/soak/TEST-1_mix_s3io_operations_report.log")
        );
        assert_eq!(
            config.log_path(),
            PathBuf::from("/tmp/soak/TEST-1_mix_s3io_operations.log")
        );
    }
}
