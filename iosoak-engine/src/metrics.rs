//! Statistics collected over a soak run.

use std::fmt;
use std::time::Duration;

use sketches_ddsketch::DDSketch;

use crate::bench::OperationClass;

/// Invocation latencies per operation class, in seconds.
#[derive(Default)]
pub struct OperationTimings {
    pub write: DDSketch,
    pub read: DDSketch,
    pub delete: DDSketch,
    pub crud: DDSketch,
}

impl OperationTimings {
    pub fn record(&mut self, operation: OperationClass, elapsed: Duration) {
        self.sketch_mut(operation).add(elapsed.as_secs_f64());
    }

    pub fn sketch(&self, operation: OperationClass) -> &DDSketch {
        match operation {
            OperationClass::Write => &self.write,
            OperationClass::Read => &self.read,
            OperationClass::Delete => &self.delete,
            OperationClass::Crud => &self.crud,
        }
    }

    fn sketch_mut(&mut self, operation: OperationClass) -> &mut DDSketch {
        match operation {
            OperationClass::Write => &mut self.write,
            OperationClass::Read => &mut self.read,
            OperationClass::Delete => &mut self.delete,
            OperationClass::Crud => &mut self.crud,
        }
    }
}

impl fmt::Debug for OperationTimings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationTimings")
            .field("write", &self.write.count())
            .field("read", &self.read.count())
            .field("delete", &self.delete.count())
            .field("crud", &self.crud.count())
            .finish()
    }
}

/// Outcome of a soak run that reached its deadline.
#[derive(Debug)]
pub struct RunSummary {
    pub bucket: String,
    /// Number of completed iterations.
    pub iterations: u64,
    pub bytes_written: u64,
    pub bytes_read: u64,
    pub bytes_deleted: u64,
    /// Number of times all objects were purged.
    pub cleanups: u64,
    /// Ledger value when the run ended.
    pub final_ledger: i64,
    pub elapsed: Duration,
    pub timings: OperationTimings,
}

impl RunSummary {
    /// Bytes covered by an operation class over the whole run.
    pub fn bytes(&self, operation: OperationClass) -> u64 {
        match operation {
            OperationClass::Write | OperationClass::Crud => self.bytes_written,
            OperationClass::Read => self.bytes_read,
            OperationClass::Delete => self.bytes_deleted,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_per_operation() {
        let mut timings = OperationTimings::default();
        timings.record(OperationClass::Write, Duration::from_millis(10));
        timings.record(OperationClass::Write, Duration::from_millis(30));
        timings.record(OperationClass::Delete, Duration::from_millis(5));

        assert_eq!(timings.sketch(OperationClass::Write).count(), 2);
        assert_eq!(timings.sketch(OperationClass::Read).count(), 0);
        assert_eq!(timings.sketch(OperationClass::Delete).count(), 1);
        assert_eq!(
            format!("{timings:?}"),
            "OperationTimings { write: 2, read: 0, delete: 1, crud: 0 }"
        );
    }
}
