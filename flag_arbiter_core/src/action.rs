//! Actions stored on flags.
//!
//! The core never runs these. The reflector turns them into resource calls.
//! Missing parameters are represented as `None` so a half-configured action
//! still round-trips; the reflector skips it.
//!
//! An action read from a document remembers its `type` and `params` as
//! written. Saving an unedited action writes them back untouched, so keys
//! this build does not read and values it cannot parse are not lost.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::condition::{lookup, overlay, str_param};
use crate::model::Params;

const NAME: &[&str] = &["name", "scene_name"];
const RESOURCE: &[&str] = &["resource", "scene_name"];
const ITEM_ID: &[&str] = &["item_id"];
const INVERT: &[&str] = &["invert"];
const SOURCE: &[&str] = &["source", "source_name"];
const FILTER: &[&str] = &["filter", "filter_name"];

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(from = "ActionRecord", into = "ActionRecord")]
pub struct Action {
    pub kind: ActionKind,
    wire: Option<ActionRecord>,
}

impl PartialEq for Action {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
    }
}

impl From<ActionKind> for Action {
    fn from(kind: ActionKind) -> Self {
        Action { kind, wire: None }
    }
}

impl Action {
    pub fn none() -> Self {
        ActionKind::None.into()
    }

    pub fn switch_resource(name: impl Into<String>) -> Self {
        ActionKind::SwitchResource {
            name: Some(name.into()),
        }
        .into()
    }

    pub fn start_operation() -> Self {
        ActionKind::StartOperation.into()
    }

    pub fn stop_operation() -> Self {
        ActionKind::StopOperation.into()
    }

    pub fn snapshot_operation() -> Self {
        ActionKind::SnapshotOperation.into()
    }

    pub fn show_subitem(resource: impl Into<String>, item_id: i64) -> Self {
        ActionKind::ShowSubitem {
            resource: Some(resource.into()),
            item_id: Some(item_id),
            invert: false,
        }
        .into()
    }

    pub fn hide_subitem(resource: impl Into<String>, item_id: i64) -> Self {
        ActionKind::HideSubitem {
            resource: Some(resource.into()),
            item_id: Some(item_id),
            invert: false,
        }
        .into()
    }

    pub fn enable_filter(source: impl Into<String>, filter: impl Into<String>) -> Self {
        ActionKind::EnableFilter {
            source: Some(source.into()),
            filter: Some(filter.into()),
        }
        .into()
    }

    pub fn disable_filter(source: impl Into<String>, filter: impl Into<String>) -> Self {
        ActionKind::DisableFilter {
            source: Some(source.into()),
            filter: Some(filter.into()),
        }
        .into()
    }

    pub fn wire_name(&self) -> Cow<'_, str> {
        self.kind.wire_name()
    }

    pub fn is_exclusive(&self) -> bool {
        self.kind.is_exclusive()
    }

    pub fn is_subitem(&self) -> bool {
        self.kind.is_subitem()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ActionKind {
    None,
    /// Upper only: make `name` the exclusive resource.
    SwitchResource { name: Option<String> },
    /// Upper only.
    StartOperation,
    /// Upper only.
    StopOperation,
    /// Upper only. Never deduplicated.
    SnapshotOperation,
    /// Lower only: sub-item visible while the flag is on (inverted by `invert`).
    ShowSubitem {
        resource: Option<String>,
        item_id: Option<i64>,
        invert: bool,
    },
    /// Lower only: sub-item hidden while the flag is on (inverted by `invert`).
    HideSubitem {
        resource: Option<String>,
        item_id: Option<i64>,
        invert: bool,
    },
    /// Lower only.
    EnableFilter {
        source: Option<String>,
        filter: Option<String>,
    },
    /// Lower only.
    DisableFilter {
        source: Option<String>,
        filter: Option<String>,
    },
    Unknown { kind: String, params: Params },
}

impl ActionKind {
    pub fn wire_name(&self) -> Cow<'_, str> {
        Cow::Borrowed(match self {
            ActionKind::None => "none",
            ActionKind::SwitchResource { .. } => "switch_resource",
            ActionKind::StartOperation => "start_operation",
            ActionKind::StopOperation => "stop_operation",
            ActionKind::SnapshotOperation => "snapshot_operation",
            ActionKind::ShowSubitem { .. } => "show_subitem",
            ActionKind::HideSubitem { .. } => "hide_subitem",
            ActionKind::EnableFilter { .. } => "enable_filter",
            ActionKind::DisableFilter { .. } => "disable_filter",
            ActionKind::Unknown { kind, .. } => kind.as_str(),
        })
    }

    /// Verbs that control the exclusive resource and so belong to upper flags.
    pub fn is_exclusive(&self) -> bool {
        matches!(
            self,
            ActionKind::SwitchResource { .. }
                | ActionKind::StartOperation
                | ActionKind::StopOperation
                | ActionKind::SnapshotOperation
        )
    }

    /// Verbs that touch non-exclusive sub-items and so belong to lower flags.
    pub fn is_subitem(&self) -> bool {
        matches!(
            self,
            ActionKind::ShowSubitem { .. }
                | ActionKind::HideSubitem { .. }
                | ActionKind::EnableFilter { .. }
                | ActionKind::DisableFilter { .. }
        )
    }

    /// Reads both the snake_case names and the labels older documents use.
    fn parse(kind: &str, p: &Params) -> Self {
        match kind {
            "none" | "" | "아무 것도 하지 않기" => ActionKind::None,
            "switch_resource" | "장면 전환" => ActionKind::SwitchResource {
                name: str_param(p, NAME),
            },
            "start_operation" | "녹화 시작" => ActionKind::StartOperation,
            "stop_operation" | "녹화 중지" => ActionKind::StopOperation,
            "snapshot_operation" | "버퍼 저장" => ActionKind::SnapshotOperation,
            "show_subitem" | "소스 표시" => ActionKind::ShowSubitem {
                resource: str_param(p, RESOURCE),
                item_id: item_id(p),
                invert: bool_param(p, INVERT),
            },
            "hide_subitem" | "소스 숨김" => ActionKind::HideSubitem {
                resource: str_param(p, RESOURCE),
                item_id: item_id(p),
                invert: bool_param(p, INVERT),
            },
            "enable_filter" | "필터 활성화" => ActionKind::EnableFilter {
                source: str_param(p, SOURCE),
                filter: str_param(p, FILTER),
            },
            "disable_filter" | "필터 비활성화" => ActionKind::DisableFilter {
                source: str_param(p, SOURCE),
                filter: str_param(p, FILTER),
            },
            other => ActionKind::Unknown {
                kind: other.to_string(),
                params: p.clone(),
            },
        }
    }

    /// Parameter keys this kind reads, canonical spelling first.
    fn owned_keys(&self) -> &'static [&'static [&'static str]] {
        match self {
            ActionKind::SwitchResource { .. } => &[NAME],
            ActionKind::ShowSubitem { .. } | ActionKind::HideSubitem { .. } => {
                &[RESOURCE, ITEM_ID, INVERT]
            }
            ActionKind::EnableFilter { .. } | ActionKind::DisableFilter { .. } => &[SOURCE, FILTER],
            ActionKind::None
            | ActionKind::StartOperation
            | ActionKind::StopOperation
            | ActionKind::SnapshotOperation
            | ActionKind::Unknown { .. } => &[],
        }
    }

    fn to_params(&self) -> Params {
        let mut params = Params::new();
        match self {
            ActionKind::SwitchResource { name } => put_str(&mut params, "name", name),
            ActionKind::ShowSubitem {
                resource,
                item_id,
                invert,
            }
            | ActionKind::HideSubitem {
                resource,
                item_id,
                invert,
            } => {
                put_str(&mut params, "resource", resource);
                if let Some(id) = item_id {
                    params.insert("item_id".into(), Value::from(*id));
                }
                if *invert {
                    params.insert("invert".into(), Value::Bool(true));
                }
            }
            ActionKind::EnableFilter { source, filter }
            | ActionKind::DisableFilter { source, filter } => {
                put_str(&mut params, "source", source);
                put_str(&mut params, "filter", filter);
            }
            ActionKind::Unknown { params: raw, .. } => params = raw.clone(),
            ActionKind::None
            | ActionKind::StartOperation
            | ActionKind::StopOperation
            | ActionKind::SnapshotOperation => {}
        }
        params
    }
}

/// On-disk form of an action.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionRecord {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub params: Params,
}

impl From<ActionRecord> for Action {
    fn from(rec: ActionRecord) -> Self {
        let kind = ActionKind::parse(&rec.kind, &rec.params);
        if let ActionKind::Unknown { kind: name, .. } = &kind {
            warn!(kind = name.as_str(), "unknown action kind; it will be a no-op");
        }
        Action {
            kind,
            wire: Some(rec),
        }
    }
}

impl From<Action> for ActionRecord {
    fn from(a: Action) -> Self {
        let Action { kind, wire } = a;
        let Some(rec) = wire else {
            return ActionRecord {
                kind: kind.wire_name().into_owned(),
                params: kind.to_params(),
            };
        };
        let stored = ActionKind::parse(&rec.kind, &rec.params);
        if stored == kind {
            return rec;
        }
        let name = if stored.wire_name() == kind.wire_name() {
            rec.kind
        } else {
            kind.wire_name().into_owned()
        };
        let params = match &kind {
            ActionKind::Unknown { params, .. } => params.clone(),
            _ => {
                let owned: Vec<&[&str]> = stored
                    .owned_keys()
                    .iter()
                    .chain(kind.owned_keys())
                    .copied()
                    .collect();
                overlay(rec.params, &owned, kind.to_params())
            }
        };
        ActionRecord { kind: name, params }
    }
}

/// Integer ids, or strings holding one.
fn item_id(params: &Params) -> Option<i64> {
    match lookup(params, ITEM_ID)? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn bool_param(params: &Params, keys: &[&str]) -> bool {
    lookup(params, keys).and_then(Value::as_bool).unwrap_or(false)
}

fn put_str(params: &mut Params, key: &str, value: &Option<String>) {
    if let Some(v) = value {
        params.insert(key.into(), Value::String(v.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn subitem_action_round_trips() {
        let raw = json!({ "type": "hide_subitem", "params": { "resource": "Main", "item_id": 7, "invert": true } });
        let a: Action = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(
            a.kind,
            ActionKind::HideSubitem {
                resource: Some("Main".into()),
                item_id: Some(7),
                invert: true
            }
        );
        assert_eq!(serde_json::to_value(&a).unwrap(), raw);
    }

    #[test]
    fn missing_params_stay_missing() {
        let a: Action = serde_json::from_value(json!({ "type": "switch_resource", "params": {} })).unwrap();
        assert_eq!(a.kind, ActionKind::SwitchResource { name: None });
    }

    #[test]
    fn verb_families_are_disjoint() {
        assert!(Action::start_operation().is_exclusive());
        assert!(!Action::start_operation().is_subitem());
        assert!(Action::enable_filter("cam", "blur").is_subitem());
        assert!(!Action::none().is_exclusive() && !Action::none().is_subitem());
    }

    #[test]
    fn labelled_actions_read_legacy_param_names() {
        let a: Action = serde_json::from_value(json!({
            "type": "필터 비활성화",
            "params": { "source_name": "Cam", "filter_name": "Red" }
        }))
        .unwrap();
        assert_eq!(a, Action::disable_filter("Cam", "Red"));

        let b: Action = serde_json::from_value(json!({
            "type": "소스 숨김",
            "params": { "scene_name": "Main", "item_id": "12" }
        }))
        .unwrap();
        assert_eq!(b, Action::hide_subitem("Main", 12));
        assert_eq!(
            serde_json::to_value(&b).unwrap()["params"]["item_id"],
            json!("12")
        );
    }

    #[test]
    fn edited_action_keeps_spelling_and_extra_keys() {
        let mut a: Action = serde_json::from_value(json!({
            "type": "장면 전환",
            "params": { "scene_name": "Quake", "transition": "fade" }
        }))
        .unwrap();
        a.kind = ActionKind::SwitchResource {
            name: Some("Tsunami".into()),
        };
        assert_eq!(
            serde_json::to_value(&a).unwrap(),
            json!({
                "type": "장면 전환",
                "params": { "scene_name": "Tsunami", "transition": "fade" }
            })
        );

        a.kind = ActionKind::StopOperation;
        assert_eq!(
            serde_json::to_value(&a).unwrap(),
            json!({ "type": "stop_operation", "params": { "transition": "fade" } })
        );
    }
}
