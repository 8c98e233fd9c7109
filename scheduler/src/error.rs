use thiserror::Error;

use crate::domain::TriggerUid;

/// An `evaluate()` call may fail for any reason the trigger kind defines;
/// the core only needs to know that it failed (spec section 7: "Trigger
/// `evaluate` threw").
#[derive(Error, Debug)]
#[error("evaluate failed for trigger '{uid}': {source}")]
pub struct EvaluateError {
    pub uid: TriggerUid,
    #[source]
    pub source: anyhow::Error,
}

impl EvaluateError {
    pub fn new(uid: TriggerUid, source: anyhow::Error) -> Self {
        Self { uid, source }
    }
}

/// Failure from the trigger state store or the execution state store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store operation failed: {0}")]
    Backend(#[from] anyhow::Error),
}

/// Failure emitting an execution onto the outbound queue.
#[derive(Error, Debug)]
pub enum QueueError {
    #[error("execution queue emit failed: {0}")]
    Backend(#[from] anyhow::Error),
}
