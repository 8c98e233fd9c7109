//! Metric names and label conventions for the scheduler.
//!
//! Metric descriptions are registered once by the embedder at startup via
//! [`describe`] — a library should not re-register global metric metadata
//! on every construction.

use metrics::{
    counter,
    describe_counter,
    describe_gauge,
    describe_histogram,
    gauge,
    histogram,
    Unit,
};

use crate::domain::TriggerUid;

pub const EVALUATE_DURATION: &str = "scheduler.evaluate.duration";
pub const EVALUATE_RUNNING_COUNT: &str = "scheduler.evaluate.running.count";
pub const TRIGGER_COUNT: &str = "scheduler.trigger.count";
/// Not in the core metric contract; an additive observability signal for how
/// far a tick's selection phase lagged behind its nominal second.
pub const TICK_LAG: &str = "scheduler.tick.lag";

pub fn describe() {
    describe_histogram!(
        EVALUATE_DURATION,
        Unit::Seconds,
        "Duration of a single trigger evaluate() call"
    );
    describe_gauge!(
        EVALUATE_RUNNING_COUNT,
        Unit::Count,
        "Whether a trigger currently has an evaluation in flight (0 or 1)"
    );
    describe_counter!(
        TRIGGER_COUNT,
        Unit::Count,
        "Number of executions fired per trigger"
    );
    describe_histogram!(
        TICK_LAG,
        Unit::Seconds,
        "How far a tick's selection phase lagged behind its nominal second"
    );
}

fn tags(uid: &TriggerUid) -> [(&'static str, String); 3] {
    [
        ("namespace", uid.namespace.clone()),
        ("flow_id", uid.flow_id.clone()),
        ("trigger_id", uid.trigger_id.clone()),
    ]
}

pub(crate) fn record_evaluate_duration(uid: &TriggerUid, seconds: f64) {
    histogram!(EVALUATE_DURATION, seconds, &tags(uid));
}

pub(crate) fn set_running_gauge(uid: &TriggerUid, value: f64) {
    gauge!(EVALUATE_RUNNING_COUNT, value, &tags(uid));
}

pub(crate) fn increment_trigger_count(uid: &TriggerUid) {
    counter!(TRIGGER_COUNT, 1, &tags(uid));
}

pub(crate) fn record_tick_lag(seconds: f64) {
    histogram!(TICK_LAG, seconds);
}
