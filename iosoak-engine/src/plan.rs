//! Conversion of capacity percentages into byte targets and object counts.

use crate::bench::OperationClass;
use crate::error::{ConfigError, SoakError, SoakResult};

/// Share of the total capacity at which all data is purged when no cleanup percentage is set.
pub const DEFAULT_CLEANUP_PERCENTAGE: u8 = 90;

/// Percentages of the total capacity per operation class.
///
/// `None` and `Some(0)` both mean "unset".
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Percentages {
    pub write: Option<u8>,
    pub read: Option<u8>,
    pub delete: Option<u8>,
    pub cleanup: Option<u8>,
}

/// Byte targets of a run, computed once from the total capacity.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ByteTargets {
    pub total: u64,
    pub write: u64,
    pub read: u64,
    pub delete: u64,
    /// Ledger value at which all objects are purged.
    pub cleanup: u64,
}

impl ByteTargets {
    /// Plans the byte targets for the given capacity.
    ///
    /// An unset write, read or delete percentage targets the full capacity.
    pub fn plan(total: u64, percentages: &Percentages) -> Self {
        let target = |pct: Option<u8>| match pct.filter(|p| *p > 0) {
            Some(pct) => percent_of(total, pct),
            None => total,
        };

        let cleanup = percentages
            .cleanup
            .filter(|p| *p > 0)
            .unwrap_or(DEFAULT_CLEANUP_PERCENTAGE);

        Self {
            total,
            write: target(percentages.write),
            read: target(percentages.read),
            delete: target(percentages.delete),
            cleanup: percent_of(total, cleanup),
        }
    }

    /// The byte target of a scheduled operation class.
    pub fn for_operation(&self, operation: OperationClass) -> u64 {
        match operation {
            OperationClass::Write => self.write,
            OperationClass::Read => self.read,
            OperationClass::Delete => self.delete,
            OperationClass::Crud => self.write,
        }
    }
}

/// `floor(total * pct / 100)`.
fn percent_of(total: u64, pct: u8) -> u64 {
    (u128::from(total) * u128::from(pct) / 100) as u64
}

/// Number of objects of `object_size` bytes needed to cover `byte_target`.
///
/// Rounds up when the target is not an exact multiple of the object size, so the target is always
/// reachable with whole objects. Fails when fewer objects than `sessions` would be used.
pub fn samples_for(
    operation: OperationClass,
    byte_target: u64,
    object_size: u64,
    sessions: usize,
) -> SoakResult<u64> {
    if object_size == 0 {
        return Err(ConfigError::ZeroObjectSize.into());
    }

    let whole = byte_target / object_size;
    let samples = if byte_target % object_size != 0 {
        whole + 1
    } else {
        whole
    };

    if samples < sessions as u64 {
        return Err(ConfigError::InsufficientSamples {
            operation,
            samples,
            sessions,
        }
        .into());
    }

    Ok(samples)
}

/// Object size and object counts of one iteration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IterationPlan {
    pub object_size: u64,
    pub write_samples: u64,
    pub read_samples: u64,
    pub delete_samples: u64,
}

impl IterationPlan {
    pub fn compute(targets: &ByteTargets, object_size: u64, sessions: usize) -> SoakResult<Self> {
        let samples = |operation: OperationClass| {
            let samples = samples_for(
                operation,
                targets.for_operation(operation),
                object_size,
                sessions,
            )?;
            tracing::info!(
                %operation,
                samples,
                "Number of samples '{samples}' will be used for {operation} operation"
            );
            Ok::<_, SoakError>(samples)
        };

        Ok(Self {
            object_size,
            write_samples: samples(OperationClass::Write)?,
            read_samples: samples(OperationClass::Read)?,
            delete_samples: samples(OperationClass::Delete)?,
        })
    }

    /// Samples per invocation for a scheduled operation class.
    pub fn samples(&self, operation: OperationClass) -> u64 {
        match operation {
            OperationClass::Write | OperationClass::Crud => self.write_samples,
            OperationClass::Read => self.read_samples,
            OperationClass::Delete => self.delete_samples,
        }
    }

    /// Bytes covered by a single invocation of the given operation class.
    pub fn bytes_per_call(&self, operation: OperationClass) -> u64 {
        self.samples(operation).saturating_mul(self.object_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn planner_uses_percentages_and_defaults() {
        let percentages = Percentages {
            write: Some(20),
            ..Default::default()
        };
        let targets = ByteTargets::plan(1000, &percentages);

        assert_eq!(targets.write, 200);
        assert_eq!(targets.read, 1000);
        assert_eq!(targets.delete, 1000);
        assert_eq!(targets.cleanup, 900);
    }

    #[test]
    fn planner_treats_zero_as_unset() {
        let percentages = Percentages {
            write: Some(0),
            cleanup: Some(0),
            ..Default::default()
        };
        let targets = ByteTargets::plan(1000, &percentages);

        assert_eq!(targets.write, 1000);
        assert_eq!(targets.cleanup, 900);
    }

    #[test]
    fn planner_floors_fractions() {
        let percentages = Percentages {
            read: Some(33),
            cleanup: Some(75),
            ..Default::default()
        };
        let targets = ByteTargets::plan(1001, &percentages);

        assert_eq!(targets.read, 330);
        assert_eq!(targets.cleanup, 750);
    }

    #[test]
    fn planner_handles_huge_capacities() {
        let percentages = Percentages {
            write: Some(50),
            ..Default::default()
        };
        let targets = ByteTargets::plan(u64::MAX, &percentages);
        assert_eq!(targets.write, u64::MAX / 2);
    }

    #[test]
    fn samples_round_up_only_with_remainder() {
        let samples = |target, size| samples_for(OperationClass::Write, target, size, 1).unwrap();

        assert_eq!(samples(5000, 100), 50);
        assert_eq!(samples(5001, 100), 51);
        assert_eq!(samples(5099, 100), 51);
        assert_eq!(samples(99, 100), 1);
        assert_eq!(samples(7, 3), 3);
        assert_eq!(samples(9, 3), 3);
    }

    #[test]
    fn samples_must_cover_sessions() {
        let err = samples_for(OperationClass::Read, 300, 100, 4).unwrap_err();
        assert!(matches!(
            err,
            SoakError::Config(ConfigError::InsufficientSamples {
                operation: OperationClass::Read,
                samples: 3,
                sessions: 4,
            })
        ));

        assert_eq!(samples_for(OperationClass::Read, 400, 100, 4).unwrap(), 4);
    }

    #[test]
    fn iteration_plan_checks_every_class() {
        let targets = ByteTargets::plan(
            10_000,
            &Percentages {
                write: Some(50),
                read: Some(10),
                delete: Some(1),
                ..Default::default()
            },
        );

        let plan = IterationPlan::compute(&targets, 100, 2);
        assert!(matches!(
            plan,
            Err(SoakError::Config(ConfigError::InsufficientSamples {
                operation: OperationClass::Delete,
                samples: 1,
                ..
            }))
        ));

        let plan = IterationPlan::compute(&targets, 100, 1).unwrap();
        assert_eq!(plan.write_samples, 50);
        assert_eq!(plan.read_samples, 10);
        assert_eq!(plan.delete_samples, 1);
        assert_eq!(plan.bytes_per_call(OperationClass::Write), 5000);
    }
}
