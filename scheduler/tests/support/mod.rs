//! In-memory fakes for the scheduler's collaborators, used only by the
//! scenario tests in this directory.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use scheduler::domain::{
    Execution,
    ExecutionState,
    Flow,
    PollingTrigger,
    RunContext,
    TriggerContext,
    TriggerDeclaration,
    TriggerRecord,
    TriggerUid,
};
use scheduler::error::{EvaluateError, QueueError, StoreError};
pub use scheduler::memory::{
    AlwaysValid,
    InMemoryExecutionQueue as RecordingQueue,
    InMemoryExecutionStore,
    InMemoryTriggerStore,
    PassthroughRunContextFactory,
};
use scheduler::traits::{Clock, ExecutionQueue, ExecutionStateStore, FlowCatalog, TriggerStateStore};

/// A clock whose `now()` is set explicitly by the test, rather than
/// advancing on its own.
pub struct FakeClock {
    now: Mutex<DateTime<Utc>>,
}

impl FakeClock {
    pub fn new(start: DateTime<Utc>) -> Arc<Self> {
        Arc::new(Self {
            now: Mutex::new(start),
        })
    }

    pub fn set(&self, value: DateTime<Utc>) {
        *self.now.lock().unwrap() = value;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += by;
    }
}

impl Clock for FakeClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

/// A single-flow catalog that never changes after construction. Real
/// catalogs are expected to reflect edits between ticks; these tests only
/// ever exercise a fixed set of flows.
pub struct StaticCatalog {
    flows: Vec<Arc<Flow>>,
}

impl StaticCatalog {
    pub fn new(flows: Vec<Arc<Flow>>) -> Arc<Self> {
        Arc::new(Self { flows })
    }
}

#[async_trait]
impl FlowCatalog for StaticCatalog {
    async fn flows(&self) -> Vec<Arc<Flow>> {
        self.flows.clone()
    }
}

/// A queue whose every `emit` fails, for exercising the crash-between-save-
/// and-emit boundary.
pub struct FailingQueue;

#[async_trait]
impl ExecutionQueue for FailingQueue {
    async fn emit(&self, _execution: Execution) -> Result<(), QueueError> {
        Err(QueueError::Backend(anyhow::anyhow!("queue unavailable")))
    }
}

/// A trigger-record store whose every `find_last` fails, for exercising the
/// gate-5 fail-closed path on a store outage.
pub struct FailingTriggerStore;

#[async_trait]
impl TriggerStateStore for FailingTriggerStore {
    async fn find_last(&self, _uid: &TriggerUid) -> Result<Option<TriggerRecord>, StoreError> {
        Err(StoreError::Backend(anyhow::anyhow!("trigger store unreachable")))
    }

    async fn save(&self, record: TriggerRecord) -> Result<(), StoreError> {
        let _ = record;
        Err(StoreError::Backend(anyhow::anyhow!("trigger store unreachable")))
    }
}

/// An execution-state store whose every `find_by_id` fails, for exercising
/// the gate-5 fail-closed path on a store outage.
pub struct FailingExecutionStore;

#[async_trait]
impl ExecutionStateStore for FailingExecutionStore {
    async fn find_by_id(&self, _execution_id: &str) -> Result<Option<Execution>, StoreError> {
        Err(StoreError::Backend(anyhow::anyhow!("execution store unreachable")))
    }
}

/// A polling trigger that fires on every admitted evaluation, producing a
/// fresh execution id each time. `next_date` always returns the reference
/// instant so the fallback path in gate 5 is deterministic in tests.
pub struct AlwaysFires {
    pub interval: Duration,
    pub fallback_date: DateTime<Utc>,
    counter: AtomicI64,
}

impl AlwaysFires {
    pub fn new(interval: Duration, fallback_date: DateTime<Utc>) -> Arc<Self> {
        Arc::new(Self {
            interval,
            fallback_date,
            counter: AtomicI64::new(0),
        })
    }
}

#[async_trait]
impl PollingTrigger for AlwaysFires {
    fn interval(&self) -> Duration {
        self.interval
    }

    fn next_date(&self, _last_trigger: Option<&TriggerRecord>) -> DateTime<Utc> {
        self.fallback_date
    }

    async fn evaluate(
        &self,
        _run_context: RunContext,
        trigger_context: TriggerContext,
    ) -> Result<Option<Execution>, EvaluateError> {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        Ok(Some(Execution {
            id: format!("{}-{n}", trigger_context.trigger_id),
            namespace: trigger_context.namespace,
            flow_id: trigger_context.flow_id,
            state: ExecutionState::running("started"),
        }))
    }
}

/// A polling trigger that never fires.
pub struct NeverFires {
    pub interval: Duration,
    pub fallback_date: DateTime<Utc>,
}

#[async_trait]
impl PollingTrigger for NeverFires {
    fn interval(&self) -> Duration {
        self.interval
    }

    fn next_date(&self, _last_trigger: Option<&TriggerRecord>) -> DateTime<Utc> {
        self.fallback_date
    }

    async fn evaluate(
        &self,
        _run_context: RunContext,
        _trigger_context: TriggerContext,
    ) -> Result<Option<Execution>, EvaluateError> {
        Ok(None)
    }
}

/// A polling trigger whose `evaluate` always fails.
pub struct AlwaysFails {
    pub interval: Duration,
    pub fallback_date: DateTime<Utc>,
}

#[async_trait]
impl PollingTrigger for AlwaysFails {
    fn interval(&self) -> Duration {
        self.interval
    }

    fn next_date(&self, _last_trigger: Option<&TriggerRecord>) -> DateTime<Utc> {
        self.fallback_date
    }

    async fn evaluate(
        &self,
        _run_context: RunContext,
        trigger_context: TriggerContext,
    ) -> Result<Option<Execution>, EvaluateError> {
        Err(EvaluateError::new(
            trigger_context.uid(),
            anyhow::anyhow!("upstream poll failed"),
        ))
    }
}

pub fn flow(namespace: &str, id: &str, revision: i64, triggers: Vec<TriggerDeclaration>) -> Arc<Flow> {
    Arc::new(Flow {
        namespace: namespace.to_owned(),
        id: id.to_owned(),
        revision,
        triggers,
    })
}

pub fn declaration(id: &str, polling: Arc<dyn PollingTrigger>) -> TriggerDeclaration {
    TriggerDeclaration {
        id: id.to_owned(),
        polling: Some(polling),
    }
}
