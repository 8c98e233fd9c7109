use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::domain::TriggerUid;

/// The three in-memory maps the scheduler owns exclusively (spec section
/// 3). All reads and writes, plus the selection phase that consults them,
/// occur under a single per-scheduler lock (spec section 5) — deliberately
/// coarse, since selection is O(#triggers) per second and uncontended.
///
/// No entries are ever pruned on flow removal; memory grows with the set
/// of distinct triggers ever seen (spec section 9).
#[derive(Default)]
pub(crate) struct SchedulerState {
    /// Wall time of the most recent *eligibility admission through gate 3*
    /// (not fire) — see [`super::eligibility`].
    pub(crate) last_evaluate: HashMap<TriggerUid, DateTime<Utc>>,
    /// Presence implies an evaluation is in flight; value is its start time.
    pub(crate) evaluate_running: HashMap<TriggerUid, DateTime<Utc>>,
}

impl SchedulerState {
    /// Removes `uid` from the running set. Returns `false` if it was not
    /// present — an internal-state violation the caller must treat as fatal
    /// to the enclosing task, not the whole driver (spec section 7).
    pub(crate) fn release_running(&mut self, uid: &TriggerUid) -> bool {
        self.evaluate_running.remove(uid).is_some()
    }
}
