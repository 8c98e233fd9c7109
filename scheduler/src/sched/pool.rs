//! The evaluation pool and result handler (spec sections 4.F and 4.I). Each
//! admitted trigger runs its `evaluate()` in its own detached task, so a
//! panic inside one trigger's evaluation can never take down the tick driver
//! or any other trigger's evaluation (spec section 7).

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use super::Scheduler;
use crate::domain::{
    Execution,
    Flow,
    PollingTrigger,
    TriggerContext,
    TriggerDeclaration,
    TriggerRecord,
    TriggerUid,
};
use crate::error::EvaluateError;
use crate::metrics;

impl Scheduler {
    pub(super) fn spawn_evaluation(
        self: &Arc<Self>,
        flow: Arc<Flow>,
        decl: TriggerDeclaration,
        polling: Arc<dyn PollingTrigger>,
        uid: TriggerUid,
        date: DateTime<Utc>,
    ) {
        let scheduler = Arc::clone(self);
        tokio::spawn(async move {
            scheduler
                .run_evaluation(flow, decl, polling, uid, date)
                .await;
        });
    }

    #[tracing::instrument(skip_all, fields(trigger = %uid))]
    async fn run_evaluation(
        self: Arc<Self>,
        flow: Arc<Flow>,
        decl: TriggerDeclaration,
        polling: Arc<dyn PollingTrigger>,
        uid: TriggerUid,
        date: DateTime<Utc>,
    ) {
        let run_context = self.run_context_factory.of(&flow, &decl);
        let trigger_context = TriggerContext {
            namespace: uid.namespace.clone(),
            flow_id: uid.flow_id.clone(),
            flow_revision: flow.revision,
            trigger_id: uid.trigger_id.clone(),
            date,
        };

        let started = Instant::now();
        let result = polling.evaluate(run_context, trigger_context.clone()).await;
        metrics::record_evaluate_duration(&uid, started.elapsed().as_secs_f64());

        match result {
            Ok(Some(execution)) => self.handle_fire(uid, trigger_context, execution).await,
            Ok(None) => self.handle_no_fire(uid).await,
            Err(error) => self.handle_failure(uid, trigger_context, error).await,
        }
    }

    /// Clears the running slot for `uid`. Its absence is an internal-state
    /// violation: it means a second release raced the first, or the slot was
    /// never set. Either way it is fatal to this task only, never to the
    /// driver (spec section 7).
    async fn release_running(&self, uid: &TriggerUid) {
        let existed = {
            let mut state = self.state.lock().await;
            state.release_running(uid)
        };
        metrics::set_running_gauge(uid, 0.0);
        assert!(existed, "releasing an unheld evaluation slot for trigger '{uid}'");
    }

    async fn handle_fire(&self, uid: TriggerUid, ctx: TriggerContext, execution: Execution) {
        self.release_running(&uid).await;
        metrics::increment_trigger_count(&uid);
        info!(
            execution_id = %execution.id,
            date = %ctx.date,
            "trigger fired"
        );

        let record = TriggerRecord {
            namespace: ctx.namespace.clone(),
            flow_id: ctx.flow_id.clone(),
            flow_revision: ctx.flow_revision,
            trigger_id: ctx.trigger_id.clone(),
            date: ctx.date,
            execution_id: Some(execution.id.clone()),
        };

        // Persist before emit: a crash between the two loses at most a queue
        // entry, never leaves a dangling reference an eligibility check would
        // trust (spec section 4.I).
        if let Err(error) = self.trigger_store.save(record).await {
            warn!(%error, "failed to persist trigger record; execution not emitted");
            return;
        }

        if let Err(error) = self.execution_queue.emit(execution).await {
            warn!(%error, "failed to emit execution after persisting trigger record");
        }
    }

    async fn handle_no_fire(&self, uid: TriggerUid) {
        self.release_running(&uid).await;
        debug!(trigger = %uid, "evaluate returned no execution");
    }

    async fn handle_failure(&self, uid: TriggerUid, ctx: TriggerContext, error: EvaluateError) {
        self.release_running(&uid).await;
        warn!(date = %ctx.date, %error, "evaluate failed");
    }
}
