//! Resolution of the total usable storage capacity.

use std::fmt;

use serde::Deserialize;

use crate::error::{ConfigError, SoakResult};

/// A type-erased [`CapacityProbe`] instance.
pub type BoxedProbe = Box<dyn CapacityProbe>;

/// Queries the cluster for its total usable capacity.
#[async_trait::async_trait]
pub trait CapacityProbe: fmt::Debug + Send + Sync + 'static {
    /// Returns the total capacity in bytes.
    async fn total_capacity(&self) -> SoakResult<u64>;
}

/// Returns `configured` unless it is zero, in which case the probe is queried.
pub async fn resolve_capacity(configured: u64, probe: Option<&dyn CapacityProbe>) -> SoakResult<u64> {
    if configured != 0 {
        return Ok(configured);
    }

    let probe = probe.ok_or(ConfigError::CapacityUnknown)?;
    let capacity = probe.total_capacity().await?;
    tracing::info!(capacity, ?probe, "Fetched total storage capacity");
    Ok(capacity)
}

#[derive(Debug, Deserialize)]
struct StorageStatus {
    total_capacity: u64,
}

/// Reads the capacity from a cluster status endpoint.
///
/// The endpoint must answer a `GET` request with a JSON object carrying a `total_capacity` field
/// in bytes.
#[derive(Debug)]
pub struct HttpCapacityProbe {
    url: String,
    client: reqwest::Client,
}

impl HttpCapacityProbe {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait::async_trait]
impl CapacityProbe for HttpCapacityProbe {
    async fn total_capacity(&self) -> SoakResult<u64> {
        let query = |context: &str, cause: reqwest::Error| ConfigError::CapacityQuery {
            context: format!("{context} {}", self.url),
            cause: Box::new(cause),
        };

        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|err| query("failed to query", err))?;

        let status: StorageStatus = response
            .json()
            .await
            .map_err(|err| query("invalid storage status from", err))?;

        Ok(status.total_capacity)
    }
}

#[cfg(test)]
mod tests {
    use crate::error::SoakError;

    use super::*;

    #[derive(Debug)]
    struct Fixed(Option<u64>);

    #[async_trait::async_trait]
    impl CapacityProbe for Fixed {
        async fn total_capacity(&self) -> SoakResult<u64> {
            self.0.ok_or_else(|| {
                ConfigError::CapacityQuery {
                    context: "cluster unhealthy".into(),
                    cause: "no quorum".into(),
                }
                .into()
            })
        }
    }

    #[tokio::test]
    async fn configured_value_wins() {
        let probe = Fixed(Some(5));
        assert_eq!(resolve_capacity(1000, Some(&probe)).await.unwrap(), 1000);
        assert_eq!(resolve_capacity(1000, None).await.unwrap(), 1000);
    }

    #[tokio::test]
    async fn zero_queries_the_probe() {
        let probe = Fixed(Some(4096));
        assert_eq!(resolve_capacity(0, Some(&probe)).await.unwrap(), 4096);
    }

    #[tokio::test]
    async fn failed_query_is_fatal() {
        let err = resolve_capacity(0, Some(&Fixed(None))).await.unwrap_err();
        assert!(matches!(
            err,
            SoakError::Config(ConfigError::CapacityQuery { .. })
        ));

        let err = resolve_capacity(0, None).await.unwrap_err();
        assert!(matches!(err, SoakError::Config(ConfigError::CapacityUnknown)));
    }

    #[test]
    fn parses_storage_status() {
        let status: StorageStatus = serde_json::from_str(
            r#"{"total_capacity": 10995116277760, "used_capacity": 42, "nodes": 3}"#,
        )
        .unwrap();
        assert_eq!(status.total_capacity, 10 << 40);
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_a_query_error() {
        let probe = HttpCapacityProbe::new("http://127.0.0.1:1/status");
        let err = probe.total_capacity().await.unwrap_err();
        assert!(matches!(
            err,
            SoakError::Config(ConfigError::CapacityQuery { .. })
        ));
    }
}
