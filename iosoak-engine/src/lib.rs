//! The engine of the IO soak workload driver.
//!
//! A soak run repeatedly fills an S3 bucket up to a share of the cluster capacity, reads the data
//! back with validation, deletes a share of it again and purges everything once the estimated
//! usage crosses a threshold. The actual IO is performed by the external `s3bench` tool; this crate
//! decides how many objects of which size every invocation covers and when the run ends.
//!
//! The entry point is [`Scheduler`], which is initialized from a [`WorkloadConfig`] and a set of
//! [`Services`] implementing the external collaborators.
#![warn(missing_debug_implementations)]

pub mod bench;
pub mod buckets;
pub mod capacity;
pub mod command;
pub mod config;
pub mod error;
pub mod ledger;
pub mod metrics;
pub mod plan;
pub mod report;
pub mod scheduler;

pub use crate::config::WorkloadConfig;
pub use crate::error::{ConfigError, SoakError, SoakResult};
pub use crate::metrics::RunSummary;
pub use crate::scheduler::{Scheduler, Services, run_smoke};
