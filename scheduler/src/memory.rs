//! In-memory reference implementations of every collaborator trait in
//! [`crate::traits`]. These exist so the crate is runnable and testable
//! without a real flow source, persistence layer, or execution queue behind
//! it — an embedder replaces whichever of these it needs a durable or
//! networked counterpart for.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::domain::{
    Execution,
    ExecutionState,
    Flow,
    RunContext,
    TriggerDeclaration,
    TriggerRecord,
    TriggerUid,
};
use crate::error::{QueueError, StoreError};
use crate::traits::{ConditionEvaluator, ExecutionQueue, ExecutionStateStore, FlowCatalog, RunContextFactory, TriggerStateStore};

/// A flow catalog whose contents are set by the embedder and otherwise
/// static between ticks. Real catalogs are expected to reflect edits made
/// through whatever system owns flow definitions; this one only reflects
/// calls to [`InMemoryFlowCatalog::set`].
#[derive(Default)]
pub struct InMemoryFlowCatalog {
    flows: Mutex<Vec<Arc<Flow>>>,
}

impl InMemoryFlowCatalog {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set(&self, flows: Vec<Arc<Flow>>) {
        *self.flows.lock().unwrap() = flows;
    }
}

#[async_trait]
impl FlowCatalog for InMemoryFlowCatalog {
    async fn flows(&self) -> Vec<Arc<Flow>> {
        self.flows.lock().unwrap().clone()
    }
}

/// Admits every trigger unconditionally. A real condition evaluator would
/// consult the flow's declared state or the trigger's own predicate; this
/// stand-in never gates on condition.
pub struct AlwaysValid;

impl ConditionEvaluator for AlwaysValid {
    fn is_valid(&self, _trigger: &TriggerDeclaration, _flow: &Flow) -> bool {
        true
    }
}

/// A trigger-record store backed by a process-local map. Records do not
/// survive a restart.
#[derive(Default)]
pub struct InMemoryTriggerStore {
    records: Mutex<HashMap<TriggerUid, TriggerRecord>>,
}

impl InMemoryTriggerStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn get(&self, uid: &TriggerUid) -> Option<TriggerRecord> {
        self.records.lock().unwrap().get(uid).cloned()
    }
}

#[async_trait]
impl TriggerStateStore for InMemoryTriggerStore {
    async fn find_last(&self, uid: &TriggerUid) -> Result<Option<TriggerRecord>, StoreError> {
        Ok(self.records.lock().unwrap().get(uid).cloned())
    }

    async fn save(&self, record: TriggerRecord) -> Result<(), StoreError> {
        self.records.lock().unwrap().insert(record.uid(), record);
        Ok(())
    }
}

/// An execution-state store backed by a process-local map. An embedder
/// whose executions run elsewhere (a queue consumer, a workflow engine)
/// would instead query that system's own state directly.
#[derive(Default)]
pub struct InMemoryExecutionStore {
    executions: Mutex<HashMap<String, Execution>>,
}

impl InMemoryExecutionStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn insert(&self, execution: Execution) {
        self.executions
            .lock()
            .unwrap()
            .insert(execution.id.clone(), execution);
    }

    pub fn set_state(&self, id: &str, state: ExecutionState) {
        if let Some(execution) = self.executions.lock().unwrap().get_mut(id) {
            execution.state = state;
        }
    }
}

#[async_trait]
impl ExecutionStateStore for InMemoryExecutionStore {
    async fn find_by_id(&self, execution_id: &str) -> Result<Option<Execution>, StoreError> {
        Ok(self.executions.lock().unwrap().get(execution_id).cloned())
    }
}

/// Hands every trigger a [`RunContext`] holding only its own flow and id.
pub struct PassthroughRunContextFactory;

impl RunContextFactory for PassthroughRunContextFactory {
    fn of(&self, flow: &Arc<Flow>, trigger: &TriggerDeclaration) -> RunContext {
        RunContext {
            flow: Arc::clone(flow),
            trigger_id: trigger.id.clone(),
        }
    }
}

/// Accumulates emitted executions in memory rather than forwarding them
/// anywhere; an embedder replaces this with whatever transport the real
/// execution queue uses.
#[derive(Default)]
pub struct InMemoryExecutionQueue {
    emitted: Mutex<Vec<Execution>>,
}

impl InMemoryExecutionQueue {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn drain(&self) -> Vec<Execution> {
        std::mem::take(&mut self.emitted.lock().unwrap())
    }

    pub fn emitted(&self) -> Vec<Execution> {
        self.emitted.lock().unwrap().clone()
    }
}

#[async_trait]
impl ExecutionQueue for InMemoryExecutionQueue {
    async fn emit(&self, execution: Execution) -> Result<(), QueueError> {
        self.emitted.lock().unwrap().push(execution);
        Ok(())
    }
}
