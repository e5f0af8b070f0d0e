//! A load generator that drives a storage backend with a time-varying stream of writes.
//!
//! Every [`Workload`] follows a *demand curve*: the cumulative number of operations it should
//! have issued after a given time. The default curve is a sum of sinusoidal components built by
//! the [`DemandBuilder`](params::DemandBuilder) from a parameter string such as
//! `cnt=3 amp=500-1000 period=30-60 shift=0-1 supp=1`.
//!
//! The pacing scheduler recomputes the demand on every tick and starts whatever is due, while
//! never exceeding a workload's concurrency limit. When the backend cannot keep up and the
//! backlog grows too large, the excess operations are skipped rather than issued late.
#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

pub mod backend;
pub mod clock;
pub mod config;
pub mod coordinator;
pub mod demand;
pub mod dispatch;
pub mod error;
pub mod observability;
pub mod pacing;
pub mod params;
pub mod report;
pub mod workload;

pub use crate::coordinator::{Coordinator, run};
pub use crate::demand::{Demand, DemandFunction, SineComponent};
pub use crate::workload::Workload;
