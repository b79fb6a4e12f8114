//! Configuration for the soak runner.
//!
//! Configuration can be loaded from multiple sources with the following precedence (highest to
//! lowest):
//!
//! 1. Environment variables (prefixed with `IOSOAK__`)
//! 2. YAML configuration file (specified via `-c` or `--config` flag)
//! 3. Defaults
//!
//! # Environment Variables
//!
//! Environment variables use `IOSOAK__` as a prefix and double underscores (`__`) to denote nested
//! configuration structures. For example:
//!
//! - `IOSOAK__WORKLOAD__ENDPOINT=http://10.0.0.1:9000` sets the S3 endpoint
//! - `IOSOAK__WORKLOAD__SESSIONS=16` sets the number of benchmark clients
//! - `IOSOAK__LOGGING__FORMAT=json` switches to JSON logs
//!
//! # YAML Configuration File
//!
//! ```yaml
//! workload:
//!   endpoint: http://10.0.0.1:9000
//!   access_key: AKIAEXAMPLE
//!   secret_key: example
//!   sessions: 16
//!   object_size:
//!     start: 4KiB
//!     end: 1MiB
//!   write_percentage: 20
//!   read_percentage: 20
//!   delete_percentage: 10
//!   total_storage_size: 10TiB
//!   duration: 3days
//!
//! logging:
//!   level: debug
//! ```

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use anyhow::Result;
use figment::providers::{Env, Format, Serialized, Yaml};
use iosoak_engine::config::{ConfigSecret, WorkloadConfig};
use secrecy::SecretBox;
use serde::{Deserialize, Serialize};
use tracing::level_filters::LevelFilter;

/// Environment variable prefix for all configuration options.
const ENV_PREFIX: &str = "IOSOAK__";

/// [Sentry](https://sentry.io/) error reporting configuration.
///
/// Sentry is disabled unless a DSN is provided. Once enabled, failed runs are reported as events
/// and informational logs are forwarded as Sentry logs.
#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Sentry {
    /// Sentry DSN (Data Source Name).
    ///
    /// # Environment Variable
    ///
    /// `IOSOAK__SENTRY__DSN`
    pub dsn: Option<SecretBox<ConfigSecret>>,

    /// Environment name, e.g. `"staging"`.
    pub environment: Option<Cow<'static, str>>,

    /// Name of the host running the soak test.
    pub server_name: Option<Cow<'static, str>>,

    /// Error event sample rate, between `0.0` and `1.0`. Defaults to `1.0`.
    pub sample_rate: f32,

    /// Performance trace sample rate, between `0.0` and `1.0`. Defaults to `0.0`.
    pub traces_sample_rate: f32,

    /// Enables debug output of the Sentry SDK.
    pub debug: bool,

    /// Additional tags attached to all events, e.g. the cluster under test.
    pub tags: BTreeMap<String, String>,
}

impl Sentry {
    pub fn is_enabled(&self) -> bool {
        self.dsn.is_some()
    }
}

impl Default for Sentry {
    fn default() -> Self {
        Self {
            dsn: None,
            environment: None,
            server_name: None,
            sample_rate: 1.0,
            traces_sample_rate: 0.0,
            debug: false,
            tags: BTreeMap::new(),
        }
    }
}

/// Output format of the log messages on stderr.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// `pretty` on a terminal, `simplified` otherwise.
    Auto,

    /// Multi-line output with colors.
    Pretty,

    /// Compact single-line output.
    Simplified,

    /// Newline-delimited JSON.
    Json,
}

#[derive(Clone, Debug)]
pub struct FormatParseError(String);

impl fmt::Display for FormatParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            r#"error parsing "{}" as format: expected one of "auto", "pretty", "simplified", "json""#,
            self.0
        )
    }
}

impl std::str::FromStr for LogFormat {
    type Err = FormatParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let result = match s {
            "" => LogFormat::Auto,
            s if s.eq_ignore_ascii_case("auto") => LogFormat::Auto,
            s if s.eq_ignore_ascii_case("pretty") => LogFormat::Pretty,
            s if s.eq_ignore_ascii_case("simplified") => LogFormat::Simplified,
            s if s.eq_ignore_ascii_case("json") => LogFormat::Json,
            s => return Err(FormatParseError(s.into())),
        };

        Ok(result)
    }
}

impl std::error::Error for FormatParseError {}

mod display_fromstr {
    pub fn serialize<T, S>(value: &T, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
        T: std::fmt::Display,
    {
        serializer.collect_str(&value)
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<T, D::Error>
    where
        D: serde::Deserializer<'de>,
        T: std::str::FromStr,
        <T as std::str::FromStr>::Err: std::fmt::Display,
    {
        use serde::Deserialize;
        let s = <std::borrow::Cow<'de, str>>::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Logging configuration.
#[derive(Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Logging {
    /// Minimum level of log messages. Overridden by `RUST_LOG`.
    ///
    /// # Environment Variable
    ///
    /// `IOSOAK__LOGGING__LEVEL`
    #[serde(with = "display_fromstr")]
    pub level: LevelFilter,

    /// # Environment Variable
    ///
    /// `IOSOAK__LOGGING__FORMAT`
    #[serde(with = "display_fromstr")]
    pub format: LogFormat,
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LogFormat::Auto => "auto",
            LogFormat::Pretty => "pretty",
            LogFormat::Simplified => "simplified",
            LogFormat::Json => "json",
        })
    }
}

impl Default for Logging {
    fn default() -> Self {
        Self {
            level: LevelFilter::INFO,
            format: LogFormat::Auto,
        }
    }
}

/// Runner configuration.
#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// The soak workload. See [`WorkloadConfig`] for all fields.
    pub workload: WorkloadConfig,

    pub logging: Logging,

    pub sentry: Sentry,
}

impl Config {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = figment::Figment::from(Serialized::defaults(Config::default()));
        if let Some(path) = path {
            figment = figment.merge(Yaml::file(path));
        }
        let config = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::time::Duration;

    use bytesize::ByteSize;
    use iosoak_engine::config::ObjectSize;
    use secrecy::ExposeSecret;

    use super::*;

    #[test]
    fn defaults() {
        figment::Jail::expect_with(|_jail| {
            let config = Config::load(None).unwrap();

            assert_eq!(config.workload.region, "us-east-1");
            assert_eq!(config.workload.sessions, 1);
            assert_eq!(config.workload.min_duration, Duration::from_secs(300));
            assert_eq!(config.workload.duration, None);
            assert_eq!(
                config.workload.object_size,
                ObjectSize::Fixed(ByteSize::mib(1))
            );
            assert_eq!(config.logging.level, LevelFilter::INFO);
            assert_eq!(config.logging.format, LogFormat::Auto);
            assert!(!config.sentry.is_enabled());

            Ok(())
        });
    }

    #[test]
    fn configurable_via_env() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("IOSOAK__WORKLOAD__ENDPOINT", "http://10.0.0.1:9000");
            jail.set_env("IOSOAK__WORKLOAD__SECRET_KEY", "s3cr3t");
            jail.set_env("IOSOAK__WORKLOAD__SESSIONS", "16");
            jail.set_env("IOSOAK__WORKLOAD__WRITE_PERCENTAGE", "20");
            jail.set_env("IOSOAK__WORKLOAD__OBJECT_SIZE", "4KiB");
            jail.set_env("IOSOAK__WORKLOAD__DURATION", "2h");
            jail.set_env("IOSOAK__WORKLOAD__SEED", "42");
            jail.set_env("IOSOAK__LOGGING__LEVEL", "debug");
            jail.set_env("IOSOAK__LOGGING__FORMAT", "json");
            jail.set_env("IOSOAK__SENTRY__DSN", "abcde");
            jail.set_env("IOSOAK__SENTRY__TAGS__CLUSTER", "lab-3");

            let config = Config::load(None).unwrap();

            let workload = &dbg!(&config).workload;
            assert_eq!(workload.endpoint, "http://10.0.0.1:9000");
            assert_eq!(workload.secret_key.expose_secret().as_str(), "s3cr3t");
            assert_eq!(workload.sessions, 16);
            assert_eq!(workload.write_percentage, Some(20));
            assert_eq!(workload.object_size, ObjectSize::Fixed(ByteSize::kib(4)));
            assert_eq!(workload.duration, Some(Duration::from_secs(2 * 60 * 60)));
            assert_eq!(workload.seed, Some(42));

            assert_eq!(config.logging.level, LevelFilter::DEBUG);
            assert_eq!(config.logging.format, LogFormat::Json);
            assert!(config.sentry.is_enabled());
            assert_eq!(
                config.sentry.tags,
                [("cluster".into(), "lab-3".into())].into()
            );

            Ok(())
        });
    }

    #[test]
    fn configurable_via_yaml() {
        let mut tempfile = tempfile::NamedTempFile::new().unwrap();
        tempfile
            .write_all(
                br#"
            workload:
                endpoint: s3.example.com
                use_ssl: false
                access_key: AKIAEXAMPLE
                sessions: 8
                object_size:
                    start: 1KiB
                    end: 1MiB
                read_percentage: 10
                delete_percentage: 5
                cleanup_percentage: 80
                total_storage_size: 10TiB
                min_duration: 10m
            sentry:
                dsn: abcde
                environment: staging
            "#,
            )
            .unwrap();

        figment::Jail::expect_with(|_jail| {
            let config = Config::load(Some(tempfile.path())).unwrap();

            let workload = &dbg!(&config).workload;
            assert_eq!(workload.endpoint_url(), "http://s3.example.com");
            assert_eq!(workload.access_key, "AKIAEXAMPLE");
            assert_eq!(workload.sessions, 8);
            assert_eq!(
                workload.object_size,
                ObjectSize::Range {
                    start: ByteSize::kib(1),
                    end: ByteSize::mib(1),
                }
            );
            assert_eq!(workload.read_percentage, Some(10));
            assert_eq!(workload.delete_percentage, Some(5));
            assert_eq!(workload.cleanup_percentage, Some(80));
            assert_eq!(workload.total_storage_size, Some(ByteSize::tib(10)));
            assert_eq!(workload.min_duration, Duration::from_secs(600));

            assert_eq!(config.sentry.dsn.unwrap().expose_secret().as_str(), "abcde");
            assert_eq!(config.sentry.environment.as_deref(), Some("staging"));

            Ok(())
        });
    }

    #[test]
    fn env_overrides_yaml() {
        let mut tempfile = tempfile::NamedTempFile::new().unwrap();
        tempfile
            .write_all(
                br#"
            workload:
                sessions: 8
                test_id: from-yaml
            "#,
            )
            .unwrap();

        figment::Jail::expect_with(|jail| {
            jail.set_env("IOSOAK__WORKLOAD__SESSIONS", "32");

            let config = Config::load(Some(tempfile.path())).unwrap();

            // Env should overwrite the yaml config
            assert_eq!(config.workload.sessions, 32);
            assert_eq!(config.workload.test_id, "from-yaml");

            Ok(())
        });
    }

    #[test]
    fn parses_log_formats() {
        assert_eq!("".parse::<LogFormat>().unwrap(), LogFormat::Auto);
        assert_eq!("PRETTY".parse::<LogFormat>().unwrap(), LogFormat::Pretty);
        assert_eq!(
            "simplified".parse::<LogFormat>().unwrap(),
            LogFormat::Simplified
        );
        assert!("xml".parse::<LogFormat>().is_err());
    }
}
