//! The five-gate eligibility filter (spec section 4.H). Gates 1 and 2 need
//! no shared state and are checked by the driver before it ever touches the
//! lock; gates 3 through 5 live here because they read or write
//! [`SchedulerState`] or the two stores.

use chrono::{DateTime, Duration, Utc};
use tracing::warn;

use super::state::SchedulerState;
use crate::domain::{PollingTrigger, TriggerRecord, TriggerUid};
use crate::traits::{ExecutionStateStore, TriggerStateStore};

/// Gate 3: has at least `interval` elapsed since the last admission? Updates
/// `last_evaluate[uid]` to `now` whenever the gate itself passes, independent
/// of gates 4 and 5 (spec section 4.H: "on admission through this gate,
/// `lastEvaluate[uid]` is updated to now").
pub(super) fn passes_interval_gate(
    state: &mut SchedulerState,
    uid: &TriggerUid,
    interval: Duration,
    now: DateTime<Utc>,
) -> bool {
    let passed = match state.last_evaluate.get(uid) {
        None => true,
        Some(last) => *last + interval < now,
    };
    if passed {
        state.last_evaluate.insert(uid.clone(), now);
    }
    passed
}

/// Gate 4: no evaluation for `uid` currently in flight.
pub(super) fn passes_running_gate(state: &SchedulerState, uid: &TriggerUid) -> bool {
    !state.evaluate_running.contains_key(uid)
}

/// Gate 5: the trigger's last recorded execution, if any, must be terminal.
/// Absence of a prior trigger record is synthesized via the trigger's own
/// `next_date(None)`, per the last-trigger fallback (spec section 4.B). A
/// trigger-store error is *not* treated as "no record" — that would silently
/// drop whatever `executionId` the real record carries and admit a uid whose
/// prior execution might still be running, violating invariant 4. Instead it
/// blocks, the same as an execution-store error just below.
pub(super) async fn passes_prior_execution_gate(
    trigger_store: &dyn TriggerStateStore,
    execution_store: &dyn ExecutionStateStore,
    uid: &TriggerUid,
    polling: &dyn PollingTrigger,
    now: DateTime<Utc>,
) -> bool {
    let last = match trigger_store.find_last(uid).await {
        Ok(Some(record)) => record,
        Ok(None) => synthesize_fallback(uid, polling, now),
        Err(error) => {
            warn!(%uid, %error, "trigger store lookup failed; blocking");
            return false;
        }
    };

    let Some(execution_id) = last.execution_id else {
        return true;
    };

    match execution_store.find_by_id(&execution_id).await {
        Ok(Some(execution)) => execution.state.terminal,
        Ok(None) => {
            warn!(
                %uid,
                execution_id,
                "prior execution referenced by trigger record not found; \
                 blocking until resolved"
            );
            false
        }
        Err(error) => {
            warn!(%uid, execution_id, %error, "execution store lookup failed; blocking");
            false
        }
    }
}

fn synthesize_fallback(
    uid: &TriggerUid,
    polling: &dyn PollingTrigger,
    now: DateTime<Utc>,
) -> TriggerRecord {
    let next = polling.next_date(None);
    TriggerRecord {
        namespace: uid.namespace.clone(),
        flow_id: uid.flow_id.clone(),
        flow_revision: 0,
        trigger_id: uid.trigger_id.clone(),
        date: next.min(now),
        execution_id: None,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;
    use chrono::Duration;

    use super::*;
    use crate::domain::{Execution, ExecutionState, RunContext, TriggerContext};
    use crate::error::{EvaluateError, StoreError};

    fn uid() -> TriggerUid {
        TriggerUid {
            namespace: "ns".into(),
            flow_id: "flow".into(),
            trigger_id: "trig".into(),
        }
    }

    #[test]
    fn interval_gate_passes_when_never_evaluated() {
        let mut state = SchedulerState::default();
        let now = Utc::now();
        assert!(passes_interval_gate(
            &mut state,
            &uid(),
            Duration::seconds(30),
            now
        ));
        assert_eq!(state.last_evaluate[&uid()], now);
    }

    #[test]
    fn interval_gate_blocks_before_interval_elapses() {
        let mut state = SchedulerState::default();
        let t0 = Utc::now();
        assert!(passes_interval_gate(&mut state, &uid(), Duration::seconds(30), t0));

        let t1 = t0 + Duration::seconds(10);
        assert!(!passes_interval_gate(&mut state, &uid(), Duration::seconds(30), t1));
        // Blocked admission must not move lastEvaluate forward.
        assert_eq!(state.last_evaluate[&uid()], t0);
    }

    #[test]
    fn interval_gate_is_strict_inequality_at_the_boundary() {
        let mut state = SchedulerState::default();
        let t0 = Utc::now();
        assert!(passes_interval_gate(&mut state, &uid(), Duration::seconds(30), t0));

        let boundary = t0 + Duration::seconds(30);
        assert!(!passes_interval_gate(&mut state, &uid(), Duration::seconds(30), boundary));

        let past_boundary = boundary + Duration::nanoseconds(1);
        assert!(passes_interval_gate(
            &mut state,
            &uid(),
            Duration::seconds(30),
            past_boundary
        ));
    }

    #[test]
    fn running_gate_blocks_while_in_flight() {
        let mut state = SchedulerState::default();
        assert!(passes_running_gate(&state, &uid()));
        state.evaluate_running.insert(uid(), Utc::now());
        assert!(!passes_running_gate(&state, &uid()));
    }

    struct FixedPolling {
        fallback: DateTime<Utc>,
    }

    #[async_trait]
    impl PollingTrigger for FixedPolling {
        fn interval(&self) -> Duration {
            Duration::seconds(30)
        }

        fn next_date(&self, _last_trigger: Option<&TriggerRecord>) -> DateTime<Utc> {
            self.fallback
        }

        async fn evaluate(
            &self,
            _run_context: RunContext,
            _trigger_context: TriggerContext,
        ) -> Result<Option<Execution>, EvaluateError> {
            Ok(None)
        }
    }

    struct EmptyTriggerStore;

    #[async_trait]
    impl TriggerStateStore for EmptyTriggerStore {
        async fn find_last(
            &self,
            _uid: &TriggerUid,
        ) -> Result<Option<TriggerRecord>, StoreError> {
            Ok(None)
        }

        async fn save(&self, _record: TriggerRecord) -> Result<(), StoreError> {
            Ok(())
        }
    }

    struct RecordedTriggerStore(TriggerRecord);

    #[async_trait]
    impl TriggerStateStore for RecordedTriggerStore {
        async fn find_last(
            &self,
            _uid: &TriggerUid,
        ) -> Result<Option<TriggerRecord>, StoreError> {
            Ok(Some(self.0.clone()))
        }

        async fn save(&self, _record: TriggerRecord) -> Result<(), StoreError> {
            Ok(())
        }
    }

    struct StatusExecutionStore {
        terminal: bool,
        queried: AtomicBool,
    }

    #[async_trait]
    impl ExecutionStateStore for StatusExecutionStore {
        async fn find_by_id(
            &self,
            _execution_id: &str,
        ) -> Result<Option<Execution>, StoreError> {
            self.queried.store(true, Ordering::SeqCst);
            Ok(Some(Execution {
                id: "exec-1".into(),
                namespace: "ns".into(),
                flow_id: "flow".into(),
                state: if self.terminal {
                    ExecutionState::terminal("done")
                } else {
                    ExecutionState::running("running")
                },
            }))
        }
    }

    #[tokio::test]
    async fn prior_execution_gate_admits_when_no_record_exists() {
        let trigger_store = EmptyTriggerStore;
        let execution_store = StatusExecutionStore {
            terminal: false,
            queried: AtomicBool::new(false),
        };
        let polling = FixedPolling { fallback: Utc::now() };

        assert!(
            passes_prior_execution_gate(
                &trigger_store,
                &execution_store,
                &uid(),
                &polling,
                Utc::now()
            )
            .await
        );
        // No execution id to look up; the execution store must not be touched.
        assert!(!execution_store.queried.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn prior_execution_gate_blocks_while_running() {
        let trigger_store = RecordedTriggerStore(TriggerRecord {
            namespace: "ns".into(),
            flow_id: "flow".into(),
            flow_revision: 1,
            trigger_id: "trig".into(),
            date: Utc::now(),
            execution_id: Some("exec-1".into()),
        });
        let execution_store = StatusExecutionStore {
            terminal: false,
            queried: AtomicBool::new(false),
        };
        let polling = FixedPolling { fallback: Utc::now() };

        assert!(
            !passes_prior_execution_gate(
                &trigger_store,
                &execution_store,
                &uid(),
                &polling,
                Utc::now()
            )
            .await
        );
    }

    #[tokio::test]
    async fn prior_execution_gate_admits_once_terminal() {
        let trigger_store = RecordedTriggerStore(TriggerRecord {
            namespace: "ns".into(),
            flow_id: "flow".into(),
            flow_revision: 1,
            trigger_id: "trig".into(),
            date: Utc::now(),
            execution_id: Some("exec-1".into()),
        });
        let execution_store = StatusExecutionStore {
            terminal: true,
            queried: AtomicBool::new(false),
        };
        let polling = FixedPolling { fallback: Utc::now() };

        assert!(
            passes_prior_execution_gate(
                &trigger_store,
                &execution_store,
                &uid(),
                &polling,
                Utc::now()
            )
            .await
        );
    }

    struct MissingExecutionStore;

    #[async_trait]
    impl ExecutionStateStore for MissingExecutionStore {
        async fn find_by_id(
            &self,
            _execution_id: &str,
        ) -> Result<Option<Execution>, StoreError> {
            Ok(None)
        }
    }

    #[tokio::test]
    async fn prior_execution_gate_blocks_when_execution_missing() {
        let trigger_store = RecordedTriggerStore(TriggerRecord {
            namespace: "ns".into(),
            flow_id: "flow".into(),
            flow_revision: 1,
            trigger_id: "trig".into(),
            date: Utc::now(),
            execution_id: Some("exec-missing".into()),
        });
        let execution_store = MissingExecutionStore;
        let polling = FixedPolling { fallback: Utc::now() };

        assert!(
            !passes_prior_execution_gate(
                &trigger_store,
                &execution_store,
                &uid(),
                &polling,
                Utc::now()
            )
            .await
        );
    }

    struct FailingTriggerStore;

    #[async_trait]
    impl TriggerStateStore for FailingTriggerStore {
        async fn find_last(
            &self,
            _uid: &TriggerUid,
        ) -> Result<Option<TriggerRecord>, StoreError> {
            Err(StoreError::Backend(anyhow::anyhow!("trigger store unreachable")))
        }

        async fn save(&self, _record: TriggerRecord) -> Result<(), StoreError> {
            Ok(())
        }
    }

    struct FailingExecutionStore;

    #[async_trait]
    impl ExecutionStateStore for FailingExecutionStore {
        async fn find_by_id(
            &self,
            _execution_id: &str,
        ) -> Result<Option<Execution>, StoreError> {
            Err(StoreError::Backend(anyhow::anyhow!("execution store unreachable")))
        }
    }

    /// A trigger-store error must block rather than fall back to "no record",
    /// since that fallback always has `execution_id: None` and would admit a
    /// uid whose real last record may reference a still-running execution.
    #[tokio::test]
    async fn prior_execution_gate_blocks_on_trigger_store_error() {
        let trigger_store = FailingTriggerStore;
        let execution_store = StatusExecutionStore {
            terminal: false,
            queried: AtomicBool::new(false),
        };
        let polling = FixedPolling { fallback: Utc::now() };

        assert!(
            !passes_prior_execution_gate(
                &trigger_store,
                &execution_store,
                &uid(),
                &polling,
                Utc::now()
            )
            .await
        );
        // The gate must fail closed before ever consulting the execution store.
        assert!(!execution_store.queried.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn prior_execution_gate_blocks_on_execution_store_error() {
        let trigger_store = RecordedTriggerStore(TriggerRecord {
            namespace: "ns".into(),
            flow_id: "flow".into(),
            flow_revision: 1,
            trigger_id: "trig".into(),
            date: Utc::now(),
            execution_id: Some("exec-1".into()),
        });
        let execution_store = FailingExecutionStore;
        let polling = FixedPolling { fallback: Utc::now() };

        assert!(
            !passes_prior_execution_gate(
                &trigger_store,
                &execution_store,
                &uid(),
                &polling,
                Utc::now()
            )
            .await
        );
    }
}
