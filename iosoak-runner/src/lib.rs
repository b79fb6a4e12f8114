//! The `iosoak` command line runner.
//!
//! Loads the configuration, sets up logging and error reporting and drives the soak workload
//! implemented in [`iosoak_engine`].

pub mod cli;
pub mod config;
pub mod observability;
pub mod summary;
