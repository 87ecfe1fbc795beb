//! Adapter layer: turn upstream bulletins into categorized facts.
//!
//! Parsing vendor wire formats happens upstream. By the time a bulletin gets
//! here it is already a typed record; this module only decides which fact
//! category it becomes and what the payload carries.

use std::collections::HashSet;

use flag_arbiter_core::{category, Params};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

/// An early-warning bulletin for one event.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EewBulletin {
    pub event_id: String,
    pub serial_no: Option<u32>,
    pub is_final: bool,
    pub is_warning: bool,
    pub is_canceled: bool,
    /// Intensity label such as `"5-"`, if the upstream feed has one.
    pub max_intensity: Option<String>,
    pub source: String,
}

/// Follow-up report: `sokuhou`, `epicenter` or `detail`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportBulletin {
    pub event_id: String,
    pub report_type: String,
    pub source: String,
    pub is_update_epicenter: bool,
    pub has_tsunami: bool,
    pub has_lpgm: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TsunamiBulletin {
    pub event_id: String,
    pub is_canceled: bool,
    pub source: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Bulletin {
    Eew(EewBulletin),
    Report(ReportBulletin),
    Tsunami(TsunamiBulletin),
}

/// A fact without a timestamp; the supervisor stamps it on insertion.
#[derive(Clone, Debug, PartialEq)]
pub struct FactDraft {
    pub category: &'static str,
    pub payload: Params,
}

/// Map one bulletin into zero or more facts.
pub trait FactBuilder {
    fn build(&mut self, bulletin: &Bulletin) -> Vec<FactDraft>;
}

/// Stock builder. Remembers which event ids it has seen so the first
/// early-warning bulletin of an event can be reported as new.
#[derive(Clone, Debug, Default)]
pub struct BulletinAdapter {
    seen: HashSet<String>,
}

impl BulletinAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_seen(&self, event_id: &str) -> bool {
        self.seen.contains(event_id)
    }

    /// Drop an event id, e.g. once the event is closed upstream.
    pub fn forget_event(&mut self, event_id: &str) -> bool {
        self.seen.remove(event_id)
    }

    pub fn seen_len(&self) -> usize {
        self.seen.len()
    }

    fn eew(&mut self, b: &EewBulletin) -> FactDraft {
        let is_new = self.seen.insert(b.event_id.clone());
        // Cancellation beats finality beats warning beats first sighting.
        let category = if b.is_canceled {
            category::EEW_CANCELED
        } else if b.is_final {
            category::EEW_FINAL
        } else if b.is_warning {
            category::EEW_WARNING
        } else if is_new {
            category::EEW_STARTED
        } else {
            category::EEW_UPDATED
        };

        let mut payload = Params::new();
        payload.insert("event_id".into(), Value::from(b.event_id.clone()));
        payload.insert("is_new".into(), Value::Bool(is_new));
        payload.insert("is_warning".into(), Value::Bool(b.is_warning));
        payload.insert("is_canceled".into(), Value::Bool(b.is_canceled));
        payload.insert("is_final".into(), Value::Bool(b.is_final));
        payload.insert("source".into(), Value::from(b.source.clone()));
        payload.insert(
            "max_intensity".into(),
            b.max_intensity.clone().map_or(Value::Null, Value::from),
        );
        if let Some(n) = b.serial_no {
            payload.insert("serial_no".into(), Value::from(n));
        }
        FactDraft { category, payload }
    }

    fn report(&mut self, b: &ReportBulletin) -> Option<FactDraft> {
        // Reports and tsunami bulletins open the event too.
        self.seen.insert(b.event_id.clone());
        let category = match b.report_type.as_str() {
            "sokuhou" => category::SOKUHOU_RECEIVED,
            "epicenter" => category::EPICENTER_RECEIVED,
            "detail" => category::DETAIL_RECEIVED,
            other => {
                debug!(report_type = other, event = b.event_id.as_str(), "report type has no fact category");
                return None;
            }
        };
        let mut payload = Params::new();
        payload.insert("event_id".into(), Value::from(b.event_id.clone()));
        payload.insert("report_type".into(), Value::from(b.report_type.clone()));
        payload.insert("is_update_epicenter".into(), Value::Bool(b.is_update_epicenter));
        payload.insert("has_tsunami".into(), Value::Bool(b.has_tsunami));
        payload.insert("has_lpgm".into(), Value::Bool(b.has_lpgm));
        payload.insert("source".into(), Value::from(b.source.clone()));
        Some(FactDraft { category, payload })
    }

    fn tsunami(&mut self, b: &TsunamiBulletin) -> FactDraft {
        self.seen.insert(b.event_id.clone());
        let category = if b.is_canceled {
            category::TSUNAMI_CANCELED
        } else {
            category::TSUNAMI_RECEIVED
        };
        let mut payload = Params::new();
        payload.insert("event_id".into(), Value::from(b.event_id.clone()));
        payload.insert("is_canceled".into(), Value::Bool(b.is_canceled));
        payload.insert("source".into(), Value::from(b.source.clone()));
        FactDraft { category, payload }
    }
}

impl FactBuilder for BulletinAdapter {
    fn build(&mut self, bulletin: &Bulletin) -> Vec<FactDraft> {
        match bulletin {
            Bulletin::Eew(b) => vec![self.eew(b)],
            Bulletin::Report(b) => self.report(b).into_iter().collect(),
            Bulletin::Tsunami(b) => vec![self.tsunami(b)],
        }
    }
}

/// Build facts for a batch of bulletins, in order.
pub fn build_fact_batch<B: FactBuilder>(builder: &mut B, bulletins: &[Bulletin]) -> Vec<FactDraft> {
    let mut out = Vec::new();
    for b in bulletins {
        out.extend(builder.build(b));
    }
    out
}
