//! Test utilities for the IO soak workload driver.
//!
//! This crate provides in-memory fakes for every external collaborator of the scheduler, along
//! with tracing setup for tests. See the modules for all available utilities.

pub mod fakes;
pub mod tracing;
