//! External collaborators the scheduler depends on, specified only at their
//! interface (spec section 1, "Out of scope") — flow catalog source,
//! condition evaluation, the two persistent stores, the run context
//! factory, the outbound queue, and the clock.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::{
    Execution,
    Flow,
    RunContext,
    TriggerDeclaration,
    TriggerRecord,
    TriggerUid,
};
use crate::error::{QueueError, StoreError};

/// Current set of flows with their triggers. Called once per tick; must be
/// a cheap O(#flows) read (spec section 6).
#[async_trait]
pub trait FlowCatalog: Send + Sync {
    async fn flows(&self) -> Vec<Arc<Flow>>;
}

/// Pure decision of whether a trigger is eligible for its flow right now
/// (spec section 4.H, gate 2).
pub trait ConditionEvaluator: Send + Sync {
    fn is_valid(&self, trigger: &TriggerDeclaration, flow: &Flow) -> bool;
}

/// Persists and retrieves the last-fire record per trigger (spec section
/// 4.B). `save` must be durable before the caller considers the fire
/// "committed" (spec section 4.I).
#[async_trait]
pub trait TriggerStateStore: Send + Sync {
    async fn find_last(
        &self,
        uid: &TriggerUid,
    ) -> Result<Option<TriggerRecord>, StoreError>;

    async fn save(&self, record: TriggerRecord) -> Result<(), StoreError>;
}

/// Looks up a prior execution by id and reports its terminal status (spec
/// section 4.H, gate 5).
#[async_trait]
pub trait ExecutionStateStore: Send + Sync {
    async fn find_by_id(
        &self,
        execution_id: &str,
    ) -> Result<Option<Execution>, StoreError>;
}

/// Builds the per-evaluation run context; not cached, since triggers may
/// consume flow-derived state (spec section 4.F).
pub trait RunContextFactory: Send + Sync {
    fn of(&self, flow: &Arc<Flow>, trigger: &TriggerDeclaration) -> RunContext;
}

/// The outbound execution queue. Asynchronous, best-effort-at-least-once
/// upstream of the scheduler's commit (spec section 6).
#[async_trait]
pub trait ExecutionQueue: Send + Sync {
    async fn emit(&self, execution: Execution) -> Result<(), QueueError>;
}

/// Monotonic wall clock, injectable for test (spec section 4.A).
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The system clock.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
