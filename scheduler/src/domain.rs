//! Value types shared across the scheduler. Flows and triggers are opaque to
//! the core (spec section 3): the core only ever reads `namespace`, `id`,
//! `revision`, and the trigger's own `interval`/`next_date`/`evaluate`
//! behavior through [`PollingTrigger`].

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::EvaluateError;

/// Stable trigger identity. Flow revision is deliberately excluded so
/// records survive flow edits (spec section 3).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TriggerUid {
    pub namespace: String,
    pub flow_id: String,
    pub trigger_id: String,
}

impl std::fmt::Display for TriggerUid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.namespace, self.flow_id, self.trigger_id)
    }
}

/// The value passed to a polling trigger's `evaluate`. Its `uid` excludes
/// flow revision; `date` is the tick's truncated-to-the-second instant.
#[derive(Debug, Clone)]
pub struct TriggerContext {
    pub namespace: String,
    pub flow_id: String,
    pub flow_revision: i64,
    pub trigger_id: String,
    pub date: DateTime<Utc>,
}

impl TriggerContext {
    pub fn uid(&self) -> TriggerUid {
        TriggerUid {
            namespace: self.namespace.clone(),
            flow_id: self.flow_id.clone(),
            trigger_id: self.trigger_id.clone(),
        }
    }
}

/// The durable per-trigger snapshot of the most recent admission or fire.
/// Keyed by `(namespace, flow_id, trigger_id)`; at most one record per key,
/// `save` upserts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerRecord {
    pub namespace: String,
    pub flow_id: String,
    pub flow_revision: i64,
    pub trigger_id: String,
    pub date: DateTime<Utc>,
    pub execution_id: Option<String>,
}

impl TriggerRecord {
    pub fn uid(&self) -> TriggerUid {
        TriggerUid {
            namespace: self.namespace.clone(),
            flow_id: self.flow_id.clone(),
            trigger_id: self.trigger_id.clone(),
        }
    }
}

/// An execution state from which no further transitions occur is terminal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionState {
    pub name: String,
    pub terminal: bool,
}

impl ExecutionState {
    pub fn terminal(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            terminal: true,
        }
    }

    pub fn running(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            terminal: false,
        }
    }
}

/// The outbound unit a firing evaluation produces. Opaque beyond these
/// fields from the core's perspective.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Execution {
    pub id: String,
    pub namespace: String,
    pub flow_id: String,
    pub state: ExecutionState,
}

/// Per-evaluation context a trigger's `evaluate` may consult; constructed
/// fresh for every evaluation rather than cached, since triggers may
/// consume flow-derived state (spec section 4.F).
#[derive(Clone)]
pub struct RunContext {
    pub flow: Arc<Flow>,
    pub trigger_id: String,
}

/// A polling trigger's declaration: the minimum poll spacing plus the two
/// functions the core calls on it. `next_date` is pure; `evaluate` may be
/// expensive or fail.
#[async_trait]
pub trait PollingTrigger: Send + Sync {
    /// Minimum spacing between admitted evaluations.
    fn interval(&self) -> Duration;

    /// Next firing instant, optionally consulting the last fire record.
    fn next_date(&self, last_trigger: Option<&TriggerRecord>) -> DateTime<Utc>;

    /// Returns `Some(execution)` to fire, `None` for "not yet".
    async fn evaluate(
        &self,
        run_context: RunContext,
        trigger_context: TriggerContext,
    ) -> Result<Option<Execution>, EvaluateError>;
}

/// A declared trigger within a flow. Not every trigger is a polling trigger
/// (spec section 3) — `polling` is `None` for the rest, and such triggers
/// are filtered out at gate 1 of the eligibility filter.
#[derive(Clone)]
pub struct TriggerDeclaration {
    pub id: String,
    pub polling: Option<Arc<dyn PollingTrigger>>,
}

/// A flow: opaque beyond `namespace`/`id`/`revision` and its ordered
/// triggers (spec section 3).
pub struct Flow {
    pub namespace: String,
    pub id: String,
    pub revision: i64,
    pub triggers: Vec<TriggerDeclaration>,
}

impl Flow {
    pub fn uid_for(&self, trigger_id: &str) -> TriggerUid {
        TriggerUid {
            namespace: self.namespace.clone(),
            flow_id: self.id.clone(),
            trigger_id: trigger_id.to_owned(),
        }
    }
}
