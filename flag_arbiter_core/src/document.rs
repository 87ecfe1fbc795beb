//! Persisted flag document.
//!
//! The JSON file is self-describing: it carries every upper flag's priority
//! (explicit `null` included), state and last change time, so the winner can
//! be recomputed from the document alone.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::action::Action;
use crate::condition::Condition;
use crate::graph::FlagGraph;
use crate::model::{Flag, FlagId, FlagKind, FlagRole, Timestamp};

pub const DOCUMENT_VERSION: &str = "2.0";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub winner_decision_rules: BTreeMap<String, String>,
}

fn default_version() -> String {
    DOCUMENT_VERSION.to_string()
}

impl Default for DocumentMetadata {
    fn default() -> Self {
        let rules = [
            ("priority_rule", "lower number wins (1 < 2 < 3 ...)"),
            ("null_priority_rule", "null priority ranks below every numeric priority"),
            ("tie_breaker_rule", "equal priority: most recently changed flag wins"),
            ("final_tie_breaker_rule", "still tied: smallest flag id wins"),
        ];
        Self {
            version: default_version(),
            winner_decision_rules: rules
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }
}

/// One flag as stored on disk.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FlagRecord {
    #[serde(default)]
    pub id: FlagId,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default = "default_kind")]
    pub kind: String,
    /// Legacy field; overrides `type` when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_upper: Option<bool>,
    #[serde(default)]
    pub priority: Option<i64>,
    #[serde(default)]
    pub last_state_change_time: Option<Timestamp>,
    #[serde(default)]
    pub state: bool,
    #[serde(default)]
    pub on_actions: Vec<Action>,
    #[serde(default)]
    pub off_actions: Vec<Action>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linked_lower_flags: Option<Vec<FlagId>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_conditions: Option<Vec<Condition>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub off_conditions: Option<Vec<Condition>>,
}

fn default_kind() -> String {
    "upper".to_string()
}

impl FlagRecord {
    /// Resolved kind. Anything other than `"upper"` is a lower flag.
    pub fn flag_kind(&self) -> FlagKind {
        match self.is_upper {
            Some(true) => FlagKind::Upper,
            Some(false) => FlagKind::Lower,
            None if self.kind == "upper" => FlagKind::Upper,
            None => FlagKind::Lower,
        }
    }

    pub fn into_flag(self) -> Flag {
        let role = match self.flag_kind() {
            FlagKind::Upper => FlagRole::Upper {
                priority: self.priority,
                linked_lower_ids: self.linked_lower_flags.unwrap_or_default(),
            },
            FlagKind::Lower => FlagRole::Lower {
                on_conditions: self.on_conditions.unwrap_or_default(),
                off_conditions: self.off_conditions.unwrap_or_default(),
            },
        };
        Flag {
            id: self.id,
            name: self.name,
            state: self.state,
            last_change_time: self.last_state_change_time,
            on_actions: self.on_actions,
            off_actions: self.off_actions,
            role,
        }
    }
}

impl From<&Flag> for FlagRecord {
    fn from(f: &Flag) -> Self {
        let mut rec = FlagRecord {
            id: f.id.clone(),
            name: f.name.clone(),
            kind: String::new(),
            is_upper: None,
            priority: f.priority(),
            last_state_change_time: f.last_change_time,
            state: f.state,
            on_actions: f.on_actions.clone(),
            off_actions: f.off_actions.clone(),
            linked_lower_flags: None,
            on_conditions: None,
            off_conditions: None,
        };
        match &f.role {
            FlagRole::Upper {
                linked_lower_ids, ..
            } => {
                rec.kind = "upper".into();
                rec.linked_lower_flags = Some(linked_lower_ids.clone());
            }
            FlagRole::Lower {
                on_conditions,
                off_conditions,
            } => {
                rec.kind = "lower".into();
                rec.on_conditions = Some(on_conditions.clone());
                rec.off_conditions = Some(off_conditions.clone());
            }
        }
        rec
    }
}

/// Outcome of `FlagDocument::merge_into`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ImportReport {
    /// Records inserted, replacements included.
    pub applied: usize,
    /// Ids that replaced an existing flag, in document order.
    pub replaced: Vec<FlagId>,
    /// Records the graph rejected (e.g. empty id).
    pub skipped: usize,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FlagDocument {
    #[serde(default)]
    pub metadata: DocumentMetadata,
    #[serde(default)]
    pub upper_flags: Vec<FlagRecord>,
    #[serde(default)]
    pub lower_flags: Vec<FlagRecord>,
}

impl FlagDocument {
    pub fn from_graph(graph: &FlagGraph) -> Self {
        Self {
            metadata: DocumentMetadata::default(),
            upper_flags: graph.uppers().map(FlagRecord::from).collect(),
            lower_flags: graph.lowers().map(FlagRecord::from).collect(),
        }
    }

    /// Build a graph. See `merge_into`.
    pub fn into_graph(self) -> FlagGraph {
        let mut graph = FlagGraph::new();
        self.merge_into(&mut graph);
        graph
    }

    /// Insert every record into `graph`. The record's own kind decides the
    /// role, not the list it sits in. A record replaces any flag with the same
    /// id, including one from earlier in this document; records the graph
    /// rejects are skipped with a warning.
    pub fn merge_into(self, graph: &mut FlagGraph) -> ImportReport {
        let mut report = ImportReport::default();
        for rec in self.upper_flags.into_iter().chain(self.lower_flags) {
            let flag = rec.into_flag();
            let id = flag.id.clone();
            match graph.insert(flag) {
                Ok(Some(_)) => {
                    debug!(flag = id.as_str(), "flag replaced by document record");
                    report.applied += 1;
                    report.replaced.push(id);
                }
                Ok(None) => report.applied += 1,
                Err(e) => {
                    warn!(flag = id.as_str(), error = %e, "flag record skipped");
                    report.skipped += 1;
                }
            }
        }
        report
    }

    pub fn len(&self) -> usize {
        self.upper_flags.len() + self.lower_flags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn from_json(s: &str) -> serde_json::Result<Self> {
        serde_json::from_str(s)
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn null_priority_is_written_explicitly() {
        let g: FlagGraph = [Flag::upper("u", "U")].into_iter().collect();
        let v = serde_json::to_value(FlagDocument::from_graph(&g)).unwrap();
        assert_eq!(v["upper_flags"][0]["priority"], serde_json::Value::Null);
        assert_eq!(v["upper_flags"][0]["type"], "upper");
        assert!(v["upper_flags"][0].get("on_conditions").is_none());
        assert_eq!(v["metadata"]["version"], DOCUMENT_VERSION);
    }

    #[test]
    fn legacy_is_upper_overrides_type() {
        let doc: FlagDocument = serde_json::from_value(json!({
            "upper_flags": [],
            "lower_flags": [{ "id": "x", "name": "X", "type": "lower", "is_upper": true, "priority": 4 }]
        }))
        .unwrap();
        let g = doc.into_graph();
        let x = g.get("x").unwrap();
        assert!(x.is_upper());
        assert_eq!(x.priority(), Some(4));
    }

    #[test]
    fn missing_type_defaults_to_upper_and_unknown_to_lower() {
        let doc: FlagDocument = serde_json::from_value(json!({
            "upper_flags": [{ "id": "a" }],
            "lower_flags": [{ "id": "b", "type": "sideways" }]
        }))
        .unwrap();
        let g = doc.into_graph();
        assert!(g.get("a").unwrap().is_upper());
        assert!(g.get("b").unwrap().is_lower());
    }

    #[test]
    fn lower_priority_is_dropped() {
        let rec: FlagRecord = serde_json::from_value(json!({ "id": "l", "type": "lower", "priority": 3 })).unwrap();
        assert_eq!(rec.into_flag().priority(), None);
    }

    #[test]
    fn empty_ids_are_skipped() {
        let doc: FlagDocument = serde_json::from_value(json!({ "lower_flags": [{ "type": "lower" }] })).unwrap();
        assert!(doc.into_graph().is_empty());
    }

    #[test]
    fn merge_reports_replacements_and_skips() {
        let mut g: FlagGraph = [Flag::upper("a", "old"), Flag::upper("keep", "K")].into_iter().collect();
        let doc: FlagDocument = serde_json::from_value(json!({
            "upper_flags": [{ "id": "a", "name": "new" }, { "id": "" }],
            "lower_flags": [{ "id": "b", "type": "lower" }, { "id": "b", "type": "lower", "name": "again" }]
        }))
        .unwrap();
        let report = doc.merge_into(&mut g);
        assert_eq!(
            report,
            ImportReport {
                applied: 3,
                replaced: vec!["a".to_string(), "b".to_string()],
                skipped: 1,
            }
        );
        assert_eq!(g.get("a").unwrap().name, "new");
        assert_eq!(g.get("b").unwrap().name, "again");
        assert!(g.get("keep").is_some());
    }
}
