//! Test utilities for the variable load generator.
//!
//! See the modules for all available utilities.

pub mod tracing;
