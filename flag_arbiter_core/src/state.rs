use std::collections::BTreeMap;

use crate::model::{FlagId, Timestamp};

/// `flag_id -> state` view handed to observers and the reflector.
pub type FlagSnapshot = BTreeMap<FlagId, bool>;

/// One observed transition. Observation only: nothing downstream of a tick
/// reacts to these by touching the external resource.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FlagChange {
    pub flag_id: FlagId,
    pub old_state: bool,
    pub new_state: bool,
    pub at: Timestamp,
}

/// Outcome of one stabilization tick.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TickReport {
    /// Transitions in commit order (lower flags of a pass, then its uppers).
    pub changes: Vec<FlagChange>,
    pub passes: usize,
    /// `false` when the pass cap was hit; the partial result is kept.
    pub converged: bool,
    /// Pending transitions consumed this tick.
    pub fired: usize,
    /// Pending transitions newly scheduled this tick.
    pub scheduled: usize,
}

impl TickReport {
    #[inline]
    pub fn is_quiet(&self) -> bool {
        self.changes.is_empty()
    }

    /// Net effect per flag over the tick: `(old at tick start, new at tick end)`,
    /// omitting flags that ended where they started.
    pub fn net_changes(&self) -> BTreeMap<&str, (bool, bool)> {
        let mut net: BTreeMap<&str, (bool, bool)> = BTreeMap::new();
        for ch in &self.changes {
            net.entry(ch.flag_id.as_str())
                .and_modify(|e| e.1 = ch.new_state)
                .or_insert((ch.old_state, ch.new_state));
        }
        net.retain(|_, (old, new)| old != new);
        net
    }
}
