//! Scanning of benchmark reports and logs for failures.
//!
//! `s3bench` may exit successfully while still recording per-object failures, so every invocation
//! is followed by a scan of its report and log.

use std::fmt;
use std::io::ErrorKind;
use std::path::Path;

use crate::error::SoakResult;

/// Maximum number of markers collected from a single scan.
const MAX_MARKERS: usize = 10;

const ERRORS_COUNT: &str = "Errors Count";

/// A type-erased [`ReportScanner`] instance.
pub type BoxedScanner = Box<dyn ReportScanner>;

/// Inspects the artifacts of a benchmark invocation.
#[async_trait::async_trait]
pub trait ReportScanner: fmt::Debug + Send + Sync + 'static {
    /// Readies the artifacts for the next invocation.
    ///
    /// Returns the position in the log from which [`scan`](Self::scan) reads output of that
    /// invocation.
    async fn prepare(&self, report: &Path, log: &Path) -> SoakResult<u64>;

    /// Returns the error markers found in the report and in the log past `log_offset`, empty if
    /// there are none.
    async fn scan(&self, report: &Path, log: &Path, log_offset: u64) -> SoakResult<Vec<String>>;
}

/// Scans report and log files line by line.
///
/// The report is removed before every invocation and the log is only read from where it ended
/// before the invocation, so leftovers of earlier invocations or runs are never scanned.
///
/// A line is a marker if it carries a non-zero `Errors Count`, starts with `error`, or contains an
/// `error:` message or a `panic:`. A missing report is a marker as well.
#[derive(Debug, Default)]
pub struct LogFileScanner;

#[async_trait::async_trait]
impl ReportScanner for LogFileScanner {
    async fn prepare(&self, report: &Path, log: &Path) -> SoakResult<u64> {
        match tokio::fs::remove_file(report).await {
            Ok(()) => tracing::debug!(report = %report.display(), "removed previous report"),
            Err(err) if err.kind() == ErrorKind::NotFound => (),
            Err(err) => return Err(err.into()),
        }

        match tokio::fs::metadata(log).await {
            Ok(metadata) => Ok(metadata.len()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(0),
            Err(err) => Err(err.into()),
        }
    }

    async fn scan(&self, report: &Path, log: &Path, log_offset: u64) -> SoakResult<Vec<String>> {
        let mut markers = match tokio::fs::read_to_string(report).await {
            Ok(contents) => find_markers(&contents),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                vec![format!("report {} was not written", report.display())]
            }
            Err(err) => return Err(err.into()),
        };

        match tokio::fs::read(log).await {
            Ok(contents) => {
                // A log that shrank was rotated or truncated and is read from the start.
                let start = usize::try_from(log_offset)
                    .ok()
                    .filter(|start| *start <= contents.len())
                    .unwrap_or(0);
                markers.extend(find_markers(&String::from_utf8_lossy(&contents[start..])));
            }
            Err(err) if err.kind() == ErrorKind::NotFound => (),
            Err(err) => return Err(err.into()),
        }

        markers.truncate(MAX_MARKERS);
        Ok(markers)
    }
}

/// Collects the marker lines of the given report or log contents.
pub fn find_markers(contents: &str) -> Vec<String> {
    contents
        .lines()
        .filter(|line| is_marker(line))
        .map(|line| line.trim().to_owned())
        .take(MAX_MARKERS)
        .collect()
}

fn is_marker(line: &str) -> bool {
    if let Some(index) = line.find(ERRORS_COUNT) {
        let count: String = line[index + ERRORS_COUNT.len()..]
            .chars()
            .skip_while(|c| !c.is_ascii_digit())
            .take_while(char::is_ascii_digit)
            .collect();
        return count.parse::<u64>().is_ok_and(|count| count > 0);
    }

    let line = line.trim().to_ascii_lowercase();
    line.starts_with("error") || line.contains(" error:") || line.contains("panic:")
}
