//! The tick driver (spec section 4.G): fixed-rate, roughly once per second,
//! aligned to wall-clock arrival rather than accumulated sleep. A tick that
//! overruns its period never stacks a backlog — at most one pending tick is
//! ever owed, and the next deadline is reset relative to completion time.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant as StdInstant;

use futures::FutureExt;
use lib::timeutil::truncate_to_second;
use tokio::time::Instant as TokioInstant;
use tracing::{error, info};

use super::eligibility;
use super::Scheduler;
use crate::metrics;

impl Scheduler {
    pub(super) async fn run_driver(self: &Arc<Self>, shutdown: &mut lib::shutdown::Shutdown) {
        let period = self.tick_period;
        let mut next_deadline = TokioInstant::now() + period;

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    info!("tick driver stopping on close request");
                    return;
                }
                _ = tokio::time::sleep_until(next_deadline) => {}
            }

            let scheduler = self.clone();
            if AssertUnwindSafe(scheduler.tick())
                .catch_unwind()
                .await
                .is_err()
            {
                error!("tick panicked; driver continues with the next tick");
            }

            let now = TokioInstant::now();
            next_deadline = if now > next_deadline {
                now + period
            } else {
                next_deadline + period
            };
        }
    }

    /// A single tick's selection and dispatch phase (spec section 4.G-H).
    ///
    /// The coarse lock is held only for the synchronous gates (3 and 4) and
    /// again, briefly, to record the running-set insert right before
    /// dispatch — never across gate 5's store round-trips. Holding it across
    /// an `.await` into the injected trigger/execution stores would block
    /// `pool.rs`'s `release_running()` (same lock) for the whole selection
    /// phase, the asyncio-lock-scope mistake `event_scheduler.rs` calls out
    /// in its own comments ("We can't hold the lock in async scope").
    #[tracing::instrument(skip_all)]
    async fn tick(self: Arc<Self>) {
        let tick_started = StdInstant::now();
        let now = truncate_to_second(self.clock.now());
        let flows = self.flow_catalog.flows().await;

        // Phase 1 (gates 1-4, synchronous): collect every trigger that is a
        // polling trigger, condition-valid, past its interval, and not
        // already running. No store I/O happens under the lock.
        let mut candidates = Vec::new();
        {
            let mut state = self.state.lock().await;
            for flow in &flows {
                for decl in &flow.triggers {
                    let Some(polling) = decl.polling.clone() else {
                        continue; // gate 1: not a polling trigger
                    };
                    if !self.condition_evaluator.is_valid(decl, flow) {
                        continue; // gate 2
                    }

                    let uid = flow.uid_for(&decl.id);
                    if !eligibility::passes_interval_gate(
                        &mut state,
                        &uid,
                        polling.interval(),
                        now,
                    ) {
                        continue; // gate 3
                    }
                    if !eligibility::passes_running_gate(&state, &uid) {
                        continue; // gate 4
                    }

                    candidates.push((Arc::clone(flow), decl.clone(), polling, uid));
                }
            }
        }

        // Phase 2 (gate 5, lock-free): every candidate's store round-trip
        // runs concurrently rather than one-at-a-time — with N candidates
        // admitted through gates 1-4, a sequential await here would scale
        // tick latency linearly with N against a real networked store.
        let checks = candidates.into_iter().map(|(flow, decl, polling, uid)| {
            let trigger_store = Arc::clone(&self.trigger_store);
            let execution_store = Arc::clone(&self.execution_store);
            async move {
                let admitted = eligibility::passes_prior_execution_gate(
                    trigger_store.as_ref(),
                    execution_store.as_ref(),
                    &uid,
                    polling.as_ref(),
                    now,
                )
                .await;
                (admitted, flow, decl, polling, uid)
            }
        });
        let admitted: Vec<_> = futures::future::join_all(checks)
            .await
            .into_iter()
            .filter_map(|(admitted, flow, decl, polling, uid)| {
                admitted.then_some((flow, decl, polling, uid)) // gate 5
            })
            .collect();

        // Phase 3: re-acquire the lock only long enough to record the
        // running-set insert immediately before dispatch, keeping the
        // "running-gate check + insert" pair atomic against concurrent
        // result handlers (spec section 9) without holding the lock across
        // phase 2's awaits.
        {
            let mut state = self.state.lock().await;
            for (_, _, _, uid) in &admitted {
                state.evaluate_running.insert(uid.clone(), now);
                metrics::set_running_gauge(uid, 1.0);
            }
        }

        for (flow, decl, polling, uid) in admitted {
            self.spawn_evaluation(flow, decl, polling, uid, now);
        }

        let lag = tick_started.elapsed().as_secs_f64();
        metrics::record_tick_lag(lag);
        if lag > TICK_LAG_WARN_SECS {
            tracing::warn!(
                lag_seconds = lag,
                "tick selection phase lagged past {TICK_LAG_WARN_SECS}s; triggers may be \
                 evaluated less often than their interval implies"
            );
        }
    }
}

/// Past this, a tick's selection phase is eating meaningfully into the next
/// tick's period; worth a warn rather than only the histogram.
const TICK_LAG_WARN_SECS: f64 = 0.5;
