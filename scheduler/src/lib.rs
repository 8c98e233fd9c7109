//! A polling trigger scheduler for a workflow orchestration platform.
//!
//! The scheduler owns three things only (spec section 3): a per-trigger
//! last-admission timestamp, a per-trigger in-flight marker, and the tick
//! cadence that drives selection. Flows, trigger kinds, persistence, the
//! outbound execution queue, and condition evaluation are all collaborators
//! it is handed at construction — see [`traits`].

pub mod domain;
pub mod error;
pub mod memory;
pub(crate) mod metrics;
mod sched;
pub mod traits;

pub use metrics::describe as describe_metrics;
pub use sched::{FatalHandler, Scheduler, SchedulerDeps};
