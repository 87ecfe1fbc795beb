//! Resource reflector.
//!
//! Reads stabilized flag state and turns it into calls on the external
//! resource. Nothing here feeds back into flag state.
//!
//! - Upper flags: only the winner matters. When the winner changes, its
//!   `on_actions` run; when no upper flag is active, the default actions run.
//!   An upper flag switching off never triggers its own `off_actions`.
//! - Lower flags: edge-triggered against the reflector's previous snapshot.
//! - Every keyed call goes through an applied-value cache so repeated
//!   requests for the same value are not re-sent. Snapshots are never cached.

use std::collections::HashMap;

use flag_arbiter_core::{select_winner, Action, ActionKind, Flag, FlagGraph, FlagId, FlagSnapshot};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, error, info, warn};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResourceCall {
    SwitchExclusiveResource { name: String },
    StartExclusiveOperation,
    StopExclusiveOperation,
    SnapshotOperation,
    SetSubitemEnabled { resource: String, item_id: i64, enabled: bool },
    SetFilterEnabled { source: String, filter: String, enabled: bool },
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ResourceKey {
    ExclusiveResource,
    Operation,
    Subitem(String, i64),
    Filter(String, String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AppliedValue {
    Name(String),
    Enabled(bool),
}

impl ResourceCall {
    pub fn verb(&self) -> &'static str {
        match self {
            ResourceCall::SwitchExclusiveResource { .. } => "switch_exclusive_resource",
            ResourceCall::StartExclusiveOperation => "start_exclusive_operation",
            ResourceCall::StopExclusiveOperation => "stop_exclusive_operation",
            ResourceCall::SnapshotOperation => "snapshot_operation",
            ResourceCall::SetSubitemEnabled { .. } => "set_subitem_enabled",
            ResourceCall::SetFilterEnabled { .. } => "set_filter_enabled",
        }
    }

    /// Arguments as a JSON object, for hosts that dispatch by verb name.
    pub fn args(&self) -> Value {
        match self {
            ResourceCall::SwitchExclusiveResource { name } => json!({ "name": name }),
            ResourceCall::StartExclusiveOperation
            | ResourceCall::StopExclusiveOperation
            | ResourceCall::SnapshotOperation => json!({}),
            ResourceCall::SetSubitemEnabled {
                resource,
                item_id,
                enabled,
            } => json!({ "resource": resource, "item_id": item_id, "enabled": enabled }),
            ResourceCall::SetFilterEnabled {
                source,
                filter,
                enabled,
            } => json!({ "source": source, "filter": filter, "enabled": enabled }),
        }
    }

    /// Cache slot and value. `None` for calls that must always be sent.
    pub fn cache_entry(&self) -> Option<(ResourceKey, AppliedValue)> {
        Some(match self {
            ResourceCall::SwitchExclusiveResource { name } => {
                (ResourceKey::ExclusiveResource, AppliedValue::Name(name.clone()))
            }
            ResourceCall::StartExclusiveOperation => (ResourceKey::Operation, AppliedValue::Enabled(true)),
            ResourceCall::StopExclusiveOperation => (ResourceKey::Operation, AppliedValue::Enabled(false)),
            ResourceCall::SnapshotOperation => return None,
            ResourceCall::SetSubitemEnabled {
                resource,
                item_id,
                enabled,
            } => (
                ResourceKey::Subitem(resource.clone(), *item_id),
                AppliedValue::Enabled(*enabled),
            ),
            ResourceCall::SetFilterEnabled {
                source,
                filter,
                enabled,
            } => (
                ResourceKey::Filter(source.clone(), filter.clone()),
                AppliedValue::Enabled(*enabled),
            ),
        })
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ControllerError {
    #[error("{verb} failed: {message}")]
    Failed { verb: &'static str, message: String },
    #[error("resource controller unavailable")]
    Unavailable,
}

/// The external resource. Implementations should make each verb idempotent.
pub trait ResourceController {
    fn call(&mut self, call: &ResourceCall) -> Result<(), ControllerError>;
}

/// Controller that only logs. Used by the CLI when no real resource is wired.
#[derive(Debug, Default)]
pub struct LoggingController {
    pub calls: usize,
}

impl ResourceController for LoggingController {
    fn call(&mut self, call: &ResourceCall) -> Result<(), ControllerError> {
        self.calls += 1;
        info!(verb = call.verb(), args = %call.args(), "resource call");
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub sent: usize,
    /// Dropped by the applied-value cache.
    pub skipped: usize,
    pub failed: usize,
}

impl std::ops::AddAssign for DispatchStats {
    fn add_assign(&mut self, rhs: Self) {
        self.sent += rhs.sent;
        self.skipped += rhs.skipped;
        self.failed += rhs.failed;
    }
}

#[derive(Debug, Default)]
pub struct StateReflector {
    default_actions: Vec<Action>,
    applied_winner: Option<FlagId>,
    previous: FlagSnapshot,
    applied: HashMap<ResourceKey, AppliedValue>,
}

impl StateReflector {
    pub fn new(default_actions: Vec<Action>) -> Self {
        Self {
            default_actions,
            ..Self::default()
        }
    }

    pub fn applied_winner(&self) -> Option<&str> {
        self.applied_winner.as_deref()
    }

    pub fn set_default_actions(&mut self, actions: Vec<Action>) {
        self.default_actions = actions;
    }

    /// Forget what has been applied, e.g. after the controller reconnects.
    /// The next reflection re-sends everything it plans.
    pub fn forget_applied(&mut self) {
        self.applied.clear();
    }

    /// Decide the calls implied by `graph` and advance the reflector's own
    /// view (applied winner, previous snapshot). Nothing is sent.
    pub fn plan(&mut self, graph: &FlagGraph) -> Vec<ResourceCall> {
        let mut calls = Vec::new();

        let winner = select_winner(graph.iter());
        let winner_id = winner.map(|w| w.id.clone());
        if winner_id != self.applied_winner {
            match winner {
                Some(w) => {
                    info!(
                        from = self.applied_winner.as_deref().unwrap_or("-"),
                        to = w.id.as_str(),
                        "winner changed"
                    );
                    for action in &w.on_actions {
                        upper_call(action, &w.id, &mut calls);
                    }
                }
                None => {
                    info!(
                        from = self.applied_winner.as_deref().unwrap_or("-"),
                        defaults = self.default_actions.len(),
                        "no active upper flag; applying defaults"
                    );
                    for action in &self.default_actions {
                        upper_call(action, "<default>", &mut calls);
                    }
                }
            }
            self.applied_winner = winner_id;
        }

        for flag in graph.lowers() {
            let was = self.previous.get(&flag.id).copied().unwrap_or(false);
            if flag.state == was {
                continue;
            }
            let actions = if flag.state {
                &flag.on_actions
            } else {
                &flag.off_actions
            };
            for action in actions {
                lower_call(action, flag, &mut calls);
            }
        }

        self.previous = graph.snapshot();
        calls
    }

    /// Send planned calls. Failures are logged and counted; a failed call
    /// leaves the cache untouched so a later identical request is retried
    /// only when it is planned again.
    pub fn dispatch<C: ResourceController + ?Sized>(
        &mut self,
        calls: Vec<ResourceCall>,
        controller: &mut C,
    ) -> DispatchStats {
        let mut stats = DispatchStats::default();
        for call in calls {
            let entry = call.cache_entry();
            if let Some((key, value)) = &entry {
                if self.applied.get(key) == Some(value) {
                    debug!(verb = call.verb(), "already applied; skipped");
                    stats.skipped += 1;
                    continue;
                }
            }
            match controller.call(&call) {
                Ok(()) => {
                    stats.sent += 1;
                    if let Some((key, value)) = entry {
                        self.applied.insert(key, value);
                    }
                }
                Err(e) => {
                    stats.failed += 1;
                    error!(verb = call.verb(), error = %e, "resource call failed");
                }
            }
        }
        stats
    }

    pub fn reflect<C: ResourceController + ?Sized>(&mut self, graph: &FlagGraph, controller: &mut C) -> DispatchStats {
        let calls = self.plan(graph);
        self.dispatch(calls, controller)
    }
}

fn upper_call(action: &Action, owner: &str, out: &mut Vec<ResourceCall>) {
    match &action.kind {
        ActionKind::None => {}
        ActionKind::SwitchResource { name: Some(name) } => {
            out.push(ResourceCall::SwitchExclusiveResource { name: name.clone() })
        }
        ActionKind::SwitchResource { name: None } => {
            debug!(flag = owner, "switch_resource without a name skipped")
        }
        ActionKind::StartOperation => out.push(ResourceCall::StartExclusiveOperation),
        ActionKind::StopOperation => out.push(ResourceCall::StopExclusiveOperation),
        ActionKind::SnapshotOperation => out.push(ResourceCall::SnapshotOperation),
        ActionKind::Unknown { kind, .. } => debug!(flag = owner, kind = kind.as_str(), "unknown action ignored"),
        other => warn!(
            flag = owner,
            action = %other.wire_name(),
            "sub-item action on an upper flag skipped"
        ),
    }
}

fn lower_call(action: &Action, flag: &Flag, out: &mut Vec<ResourceCall>) {
    let active = flag.state;
    match &action.kind {
        ActionKind::None => {}
        ActionKind::ShowSubitem {
            resource: Some(resource),
            item_id: Some(item_id),
            invert,
        } => out.push(ResourceCall::SetSubitemEnabled {
            resource: resource.clone(),
            item_id: *item_id,
            enabled: active != *invert,
        }),
        ActionKind::HideSubitem {
            resource: Some(resource),
            item_id: Some(item_id),
            invert,
        } => out.push(ResourceCall::SetSubitemEnabled {
            resource: resource.clone(),
            item_id: *item_id,
            enabled: active == *invert,
        }),
        ActionKind::EnableFilter {
            source: Some(source),
            filter: Some(filter),
        } => out.push(ResourceCall::SetFilterEnabled {
            source: source.clone(),
            filter: filter.clone(),
            enabled: true,
        }),
        ActionKind::DisableFilter {
            source: Some(source),
            filter: Some(filter),
        } => out.push(ResourceCall::SetFilterEnabled {
            source: source.clone(),
            filter: filter.clone(),
            enabled: false,
        }),
        ActionKind::ShowSubitem { .. }
        | ActionKind::HideSubitem { .. }
        | ActionKind::EnableFilter { .. }
        | ActionKind::DisableFilter { .. } => debug!(
            flag = flag.id.as_str(),
            action = %action.wire_name(),
            "action with missing params skipped"
        ),
        ActionKind::Unknown { kind, .. } => debug!(flag = flag.id.as_str(), kind = kind.as_str(), "unknown action ignored"),
        other => warn!(
            flag = flag.id.as_str(),
            action = %other.wire_name(),
            "exclusive action on a lower flag skipped"
        ),
    }
}
