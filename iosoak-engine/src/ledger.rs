/// Running estimate of the bytes stored in the run's bucket.
///
/// Deletes are scheduled by byte target rather than by what actually exists, so the ledger may go
/// negative. It is never clamped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StorageLedger {
    total_capacity: u64,
    consumed: i64,
}

impl StorageLedger {
    pub fn new(total_capacity: u64) -> Self {
        Self {
            total_capacity,
            consumed: 0,
        }
    }

    pub fn add(&mut self, bytes: u64) {
        self.consumed = self.consumed.saturating_add_unsigned(bytes);
    }

    pub fn subtract(&mut self, bytes: u64) {
        self.consumed = self.consumed.saturating_sub_unsigned(bytes);
    }

    pub fn reset(&mut self) {
        self.consumed = 0;
    }

    pub fn consumed(&self) -> i64 {
        self.consumed
    }

    /// Whether the ledger reached the given byte threshold.
    pub fn reached(&self, threshold: u64) -> bool {
        i128::from(self.consumed) >= i128::from(threshold)
    }

    /// Consumed bytes as a percentage of the total capacity.
    pub fn percent_consumed(&self) -> f64 {
        if self.total_capacity == 0 {
            return 0.0;
        }
        self.consumed as f64 / self.total_capacity as f64 * 100.0
    }
}
