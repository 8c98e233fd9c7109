//! The scheduler core (spec sections 4 through 7): a fixed-rate tick driver,
//! the five-gate eligibility filter, a single-flight evaluation pool, and a
//! lifecycle that exits the process if the driver ever dies unexpectedly.

mod driver;
mod eligibility;
mod lifecycle;
mod pool;
mod state;

use std::sync::Arc;
use std::time::Duration as StdDuration;

use tokio::sync::Mutex;

use lifecycle::DriverHandle;
use state::SchedulerState;

use crate::traits::{
    Clock,
    ConditionEvaluator,
    ExecutionQueue,
    ExecutionStateStore,
    FlowCatalog,
    RunContextFactory,
    TriggerStateStore,
};

/// Invoked by the watchdog when the tick driver terminates without having
/// been asked to (spec section 4.K: "this is fatal to the process"). Tests
/// override it to observe the call instead of exiting.
pub type FatalHandler = Arc<dyn Fn() + Send + Sync>;

fn default_fatal_handler() -> FatalHandler {
    Arc::new(|| {
        tracing::error!("scheduler tick driver terminated unexpectedly; exiting process");
        std::process::exit(1);
    })
}

/// The scheduler. Owns no flow or trigger definitions itself — those, the
/// two stores, the outbound queue, and the clock are all injected
/// collaborators (spec section 1).
pub struct Scheduler {
    flow_catalog: Arc<dyn FlowCatalog>,
    condition_evaluator: Arc<dyn ConditionEvaluator>,
    trigger_store: Arc<dyn TriggerStateStore>,
    execution_store: Arc<dyn ExecutionStateStore>,
    run_context_factory: Arc<dyn RunContextFactory>,
    execution_queue: Arc<dyn ExecutionQueue>,
    clock: Arc<dyn Clock>,
    state: Mutex<SchedulerState>,
    tick_period: StdDuration,
    fatal_handler: FatalHandler,
    driver_handle: Mutex<Option<DriverHandle>>,
}

/// Everything the scheduler needs injected. Constructed explicitly (spec's
/// "out of scope" collaborators, section 1) rather than discovered, so the
/// binary crate is the only place that decides their concrete kinds.
pub struct SchedulerDeps {
    pub flow_catalog: Arc<dyn FlowCatalog>,
    pub condition_evaluator: Arc<dyn ConditionEvaluator>,
    pub trigger_store: Arc<dyn TriggerStateStore>,
    pub execution_store: Arc<dyn ExecutionStateStore>,
    pub run_context_factory: Arc<dyn RunContextFactory>,
    pub execution_queue: Arc<dyn ExecutionQueue>,
    pub clock: Arc<dyn Clock>,
}

impl Scheduler {
    pub fn new(deps: SchedulerDeps, tick_period: StdDuration) -> Arc<Self> {
        Arc::new(Self {
            flow_catalog: deps.flow_catalog,
            condition_evaluator: deps.condition_evaluator,
            trigger_store: deps.trigger_store,
            execution_store: deps.execution_store,
            run_context_factory: deps.run_context_factory,
            execution_queue: deps.execution_queue,
            clock: deps.clock,
            state: Mutex::new(SchedulerState::default()),
            tick_period,
            fatal_handler: default_fatal_handler(),
            driver_handle: Mutex::new(None),
        })
    }

    /// Overrides the fatal handler invoked when the tick driver dies without
    /// a close request. Intended for tests.
    pub fn with_fatal_handler(mut self: Arc<Self>, handler: FatalHandler) -> Arc<Self> {
        Arc::get_mut(&mut self)
            .expect("with_fatal_handler must be called before start() clones the Arc")
            .fatal_handler = handler;
        self
    }
}
