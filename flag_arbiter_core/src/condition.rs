//! Conditions: typed predicates attached to lower flags.
//!
//! On disk a condition is `{ "type": .., "params": {..}, "delay": secs }`.
//! In memory the `type` + `params` pair becomes a `ConditionKind` variant with
//! typed fields. The record as written is kept alongside, so a document
//! survives a load/save cycle even when this build does not understand every
//! entry, key or value. Older documents spell kinds, parameter names and
//! intensity filters with display labels; those are read as aliases.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::facts::Fact;
use crate::model::{FlagId, Params};

/// Fact categories produced by the early-warning / report adapters.
pub mod category {
    pub const EEW_STARTED: &str = "EEW_STARTED";
    pub const EEW_UPDATED: &str = "EEW_UPDATED";
    pub const EEW_FINAL: &str = "EEW_FINAL";
    pub const EEW_CANCELED: &str = "EEW_CANCELED";
    pub const EEW_WARNING: &str = "EEW_WARNING";
    pub const DETAIL_RECEIVED: &str = "DETAIL_RECEIVED";
    pub const SOKUHOU_RECEIVED: &str = "SOKUHOU_RECEIVED";
    pub const EPICENTER_RECEIVED: &str = "EPICENTER_RECEIVED";
    pub const TSUNAMI_RECEIVED: &str = "TSUNAMI_RECEIVED";
    pub const TSUNAMI_CANCELED: &str = "TSUNAMI_CANCELED";
}

const FLAG_ID: &[&str] = &["flag_id"];
const CATEGORIES: &[&str] = &["categories"];
const QUIET_SECONDS: &[&str] = &["quiet_seconds"];
const TERMINAL_CATEGORIES: &[&str] = &["terminal_categories"];
const ANNOUNCEMENT_TYPES: &[&str] = &["announcement_types"];
const INTENSITY_FILTER: &[&str] = &["intensity_filter"];

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(from = "ConditionRecord", into = "ConditionRecord")]
pub struct Condition {
    pub kind: ConditionKind,
    /// Non-negative; `0.0` means the condition acts within the same tick.
    pub delay_seconds: f64,
    /// `type` and `params` as read.
    wire: Option<(String, Params)>,
}

impl PartialEq for Condition {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && self.delay_seconds == other.delay_seconds
    }
}

impl Condition {
    pub fn new(kind: ConditionKind) -> Self {
        Self {
            kind,
            delay_seconds: 0.0,
            wire: None,
        }
    }

    pub fn with_delay(mut self, seconds: f64) -> Self {
        self.delay_seconds = non_negative(seconds);
        self
    }

    pub fn flag_on(flag_id: impl Into<FlagId>) -> Self {
        Self::new(ConditionKind::FlagOn {
            flag_id: Some(flag_id.into()),
        })
    }

    pub fn flag_off(flag_id: impl Into<FlagId>) -> Self {
        Self::new(ConditionKind::FlagOff {
            flag_id: Some(flag_id.into()),
        })
    }

    pub fn fact(trigger: FactTrigger) -> Self {
        Self::new(ConditionKind::Fact {
            trigger,
            filter: AnnouncementFilter::default(),
        })
    }

    pub fn fact_filtered(trigger: FactTrigger, filter: AnnouncementFilter) -> Self {
        Self::new(ConditionKind::Fact { trigger, filter })
    }

    pub fn quiescence(rule: QuiescenceRule) -> Self {
        Self::new(ConditionKind::Quiescence(rule))
    }

    #[inline]
    pub fn is_delayed(&self) -> bool {
        self.delay_seconds > 0.0
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ConditionKind {
    /// True while the referenced flag is on.
    FlagOn { flag_id: Option<FlagId> },
    /// True while the referenced flag exists and is off.
    FlagOff { flag_id: Option<FlagId> },
    /// Matches the newest fact of the trigger's category.
    Fact {
        trigger: FactTrigger,
        filter: AnnouncementFilter,
    },
    Quiescence(QuiescenceRule),
    /// Never satisfied.
    Unknown { kind: String, params: Params },
}

impl ConditionKind {
    pub fn wire_name(&self) -> Cow<'_, str> {
        match self {
            ConditionKind::FlagOn { .. } => Cow::Borrowed("flag_on"),
            ConditionKind::FlagOff { .. } => Cow::Borrowed("flag_off"),
            ConditionKind::Fact { trigger, .. } => Cow::Borrowed(trigger.wire_name()),
            ConditionKind::Quiescence(_) => Cow::Borrowed("quiescence"),
            ConditionKind::Unknown { kind, .. } => Cow::Borrowed(kind.as_str()),
        }
    }

    pub fn from_wire(kind: &str, params: &Params) -> Self {
        let parsed = Self::parse(kind, params);
        if let ConditionKind::Unknown { kind, .. } = &parsed {
            warn!(kind = kind.as_str(), "unknown condition kind; it will never be satisfied");
        }
        if let ConditionKind::Fact { filter, .. } = &parsed {
            if filter.min_intensity.is_none() {
                if let Some(raw) = lookup(params, INTENSITY_FILTER).and_then(Value::as_str) {
                    if !is_no_filter(raw) {
                        warn!(filter = raw, "unrecognised intensity filter ignored");
                    }
                }
            }
        }
        parsed
    }

    fn parse(kind: &str, params: &Params) -> Self {
        match kind {
            "flag_on" | "다른 플래그 켜짐" => ConditionKind::FlagOn {
                flag_id: str_param(params, FLAG_ID),
            },
            "flag_off" | "다른 플래그 꺼짐" => ConditionKind::FlagOff {
                flag_id: str_param(params, FLAG_ID),
            },
            "quiescence" => ConditionKind::Quiescence(QuiescenceRule {
                categories: str_list(params, CATEGORIES),
                quiet_seconds: non_negative(
                    lookup(params, QUIET_SECONDS)
                        .and_then(Value::as_f64)
                        .unwrap_or(0.0),
                ),
                terminal_categories: str_list(params, TERMINAL_CATEGORIES),
            }),
            other => match FactTrigger::from_wire(other) {
                Some(trigger) => ConditionKind::Fact {
                    trigger,
                    filter: AnnouncementFilter::from_params(params),
                },
                None => ConditionKind::Unknown {
                    kind: other.to_string(),
                    params: params.clone(),
                },
            },
        }
    }

    /// Parameter keys this kind reads, canonical spelling first.
    fn owned_keys(&self) -> &'static [&'static [&'static str]] {
        match self {
            ConditionKind::FlagOn { .. } | ConditionKind::FlagOff { .. } => &[FLAG_ID],
            ConditionKind::Fact { .. } => &[ANNOUNCEMENT_TYPES, INTENSITY_FILTER],
            ConditionKind::Quiescence(_) => &[CATEGORIES, QUIET_SECONDS, TERMINAL_CATEGORIES],
            ConditionKind::Unknown { .. } => &[],
        }
    }

    fn to_params(&self) -> Params {
        let mut p = Params::new();
        match self {
            ConditionKind::FlagOn { flag_id } | ConditionKind::FlagOff { flag_id } => {
                if let Some(id) = flag_id {
                    p.insert("flag_id".into(), Value::String(id.clone()));
                }
            }
            ConditionKind::Fact { filter, .. } => filter.write_params(&mut p),
            ConditionKind::Quiescence(rule) => {
                p.insert("categories".into(), string_array(&rule.categories));
                p.insert("quiet_seconds".into(), Value::from(rule.quiet_seconds));
                p.insert(
                    "terminal_categories".into(),
                    string_array(&rule.terminal_categories),
                );
            }
            ConditionKind::Unknown { params, .. } => p = params.clone(),
        }
        p
    }
}

/// Fact-occurrence condition kinds. Each reads exactly one category and
/// optionally gates on a boolean payload field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FactTrigger {
    EewNew,
    EewUpdate,
    EewPreciseSource,
    EewFinal,
    EewCancel,
    EewWarningNew,
    EewWarningUpdate,
    EewWarningCancel,
    EewWarningLevel,
    EewIntensityRise,
    EewIntensityFall,
    DetailReceived,
    SokuhouReceived,
    EpicenterReceived,
    TsunamiIssued,
    TsunamiCanceled,
}

impl FactTrigger {
    pub const ALL: [FactTrigger; 16] = [
        FactTrigger::EewNew,
        FactTrigger::EewUpdate,
        FactTrigger::EewPreciseSource,
        FactTrigger::EewFinal,
        FactTrigger::EewCancel,
        FactTrigger::EewWarningNew,
        FactTrigger::EewWarningUpdate,
        FactTrigger::EewWarningCancel,
        FactTrigger::EewWarningLevel,
        FactTrigger::EewIntensityRise,
        FactTrigger::EewIntensityFall,
        FactTrigger::DetailReceived,
        FactTrigger::SokuhouReceived,
        FactTrigger::EpicenterReceived,
        FactTrigger::TsunamiIssued,
        FactTrigger::TsunamiCanceled,
    ];

    pub fn wire_name(self) -> &'static str {
        match self {
            FactTrigger::EewNew => "eew_new",
            FactTrigger::EewUpdate => "eew_update",
            FactTrigger::EewPreciseSource => "eew_precise_source",
            FactTrigger::EewFinal => "eew_final",
            FactTrigger::EewCancel => "eew_cancel",
            FactTrigger::EewWarningNew => "eew_warning_new",
            FactTrigger::EewWarningUpdate => "eew_warning_update",
            FactTrigger::EewWarningCancel => "eew_warning_cancel",
            FactTrigger::EewWarningLevel => "eew_warning_level",
            FactTrigger::EewIntensityRise => "eew_intensity_rise",
            FactTrigger::EewIntensityFall => "eew_intensity_fall",
            FactTrigger::DetailReceived => "detail_received",
            FactTrigger::SokuhouReceived => "sokuhou_received",
            FactTrigger::EpicenterReceived => "epicenter_received",
            FactTrigger::TsunamiIssued => "tsunami_issued",
            FactTrigger::TsunamiCanceled => "tsunami_canceled",
        }
    }

    /// Display label used by older documents.
    pub fn label(self) -> &'static str {
        match self {
            FactTrigger::EewNew => "EEW 신규 발표",
            FactTrigger::EewUpdate => "EEW 속보 발표",
            FactTrigger::EewPreciseSource => "EEW 더 정밀한 정보 소스",
            FactTrigger::EewFinal => "EEW 최종보",
            FactTrigger::EewCancel => "EEW 취소보",
            FactTrigger::EewWarningNew => "EEW 경보 신규 발표",
            FactTrigger::EewWarningUpdate => "EEW 경보 속보 발표",
            FactTrigger::EewWarningCancel => "EEW 경보 취소",
            FactTrigger::EewWarningLevel => "EEW 경보 레벨 도달",
            FactTrigger::EewIntensityRise => "EEW 예상 최대 진도 상승",
            FactTrigger::EewIntensityFall => "EEW 예상 최대 진도 하강",
            FactTrigger::DetailReceived => "진원진도정보 수신",
            FactTrigger::SokuhouReceived => "진도속보 수신",
            FactTrigger::EpicenterReceived => "진원정보 수신",
            FactTrigger::TsunamiIssued => "해일정보 발표",
            FactTrigger::TsunamiCanceled => "해일정보 취소",
        }
    }

    /// Accepts the wire name or the display label.
    pub fn from_wire(s: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.wire_name() == s || t.label() == s)
    }

    pub fn category(self) -> &'static str {
        use FactTrigger::*;
        match self {
            EewNew => category::EEW_STARTED,
            EewUpdate | EewPreciseSource | EewIntensityRise | EewIntensityFall => {
                category::EEW_UPDATED
            }
            EewFinal => category::EEW_FINAL,
            EewCancel | EewWarningCancel => category::EEW_CANCELED,
            EewWarningNew | EewWarningUpdate | EewWarningLevel => category::EEW_WARNING,
            DetailReceived => category::DETAIL_RECEIVED,
            SokuhouReceived => category::SOKUHOU_RECEIVED,
            EpicenterReceived => category::EPICENTER_RECEIVED,
            TsunamiIssued => category::TSUNAMI_RECEIVED,
            TsunamiCanceled => category::TSUNAMI_CANCELED,
        }
    }

    /// Payload gate applied to the newest fact before any filter.
    pub fn gate(self, fact: &Fact) -> bool {
        use FactTrigger::*;
        match self {
            EewNew => fact.flag("is_new"),
            EewUpdate => !fact.flag("is_new"),
            EewFinal => fact.flag("is_final"),
            EewCancel | TsunamiCanceled => fact.flag("is_canceled"),
            EewWarningNew => fact.flag("is_warning") && fact.flag("is_new"),
            EewWarningUpdate => fact.flag("is_warning") && !fact.flag("is_new"),
            EewWarningCancel | EewWarningLevel => fact.flag("is_warning"),
            TsunamiIssued => !fact.flag("is_canceled"),
            EewPreciseSource | EewIntensityRise | EewIntensityFall | DetailReceived
            | SokuhouReceived | EpicenterReceived => true,
        }
    }

    /// Announcement label used by `AnnouncementFilter`. Kinds without a label
    /// ignore filters entirely.
    pub fn announcement(self) -> Option<Announcement> {
        use FactTrigger::*;
        Some(match self {
            EewNew => Announcement::New,
            EewUpdate => Announcement::Update,
            EewPreciseSource => Announcement::PreciseSource,
            EewFinal => Announcement::Final,
            EewCancel => Announcement::Cancel,
            EewWarningNew => Announcement::WarningNew,
            EewWarningUpdate => Announcement::WarningUpdate,
            EewWarningCancel => Announcement::WarningCancel,
            EewWarningLevel => Announcement::WarningLevel,
            EewIntensityRise => Announcement::IntensityRise,
            EewIntensityFall => Announcement::IntensityFall,
            DetailReceived | SokuhouReceived | EpicenterReceived | TsunamiIssued
            | TsunamiCanceled => return None,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Announcement {
    New,
    Update,
    PreciseSource,
    Final,
    Cancel,
    WarningNew,
    WarningUpdate,
    WarningCancel,
    WarningLevel,
    IntensityRise,
    IntensityFall,
    /// Label not known to this build; never matches a trigger.
    Other(String),
}

impl Announcement {
    pub fn label(&self) -> &str {
        match self {
            Announcement::New => "new",
            Announcement::Update => "update",
            Announcement::PreciseSource => "precise_source",
            Announcement::Final => "final",
            Announcement::Cancel => "cancel",
            Announcement::WarningNew => "warning_new",
            Announcement::WarningUpdate => "warning_update",
            Announcement::WarningCancel => "warning_cancel",
            Announcement::WarningLevel => "warning_level",
            Announcement::IntensityRise => "intensity_rise",
            Announcement::IntensityFall => "intensity_fall",
            Announcement::Other(s) => s,
        }
    }
}

impl From<String> for Announcement {
    fn from(s: String) -> Self {
        match s.as_str() {
            "new" => Announcement::New,
            "update" => Announcement::Update,
            "precise_source" => Announcement::PreciseSource,
            "final" => Announcement::Final,
            "cancel" => Announcement::Cancel,
            "warning_new" => Announcement::WarningNew,
            "warning_update" => Announcement::WarningUpdate,
            "warning_cancel" => Announcement::WarningCancel,
            "warning_level" => Announcement::WarningLevel,
            "intensity_rise" => Announcement::IntensityRise,
            "intensity_fall" => Announcement::IntensityFall,
            "신규 발표" => Announcement::New,
            "속보 발표" => Announcement::Update,
            "더 정밀한 정보 소스" => Announcement::PreciseSource,
            "최종보" => Announcement::Final,
            "취소보" => Announcement::Cancel,
            "경보 신규 발표" => Announcement::WarningNew,
            "경보 속보 발표" => Announcement::WarningUpdate,
            "경보 취소" => Announcement::WarningCancel,
            "경보 레벨 도달" => Announcement::WarningLevel,
            "예상 최대 진도 상승" => Announcement::IntensityRise,
            "예상 최대 진도 하강" => Announcement::IntensityFall,
            _ => Announcement::Other(s),
        }
    }
}

impl From<Announcement> for String {
    fn from(a: Announcement) -> Self {
        match a {
            Announcement::Other(s) => s,
            known => known.label().to_string(),
        }
    }
}

/// Seismic intensity classes. `5-`/`5+` and `6-`/`6+` share an ordinal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Intensity {
    One,
    Two,
    Three,
    Four,
    FiveLower,
    FiveUpper,
    SixLower,
    SixUpper,
    Seven,
}

impl Intensity {
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s.trim() {
            "1" => Intensity::One,
            "2" => Intensity::Two,
            "3" => Intensity::Three,
            "4" => Intensity::Four,
            "5-" => Intensity::FiveLower,
            "5+" => Intensity::FiveUpper,
            "6-" => Intensity::SixLower,
            "6+" => Intensity::SixUpper,
            "7" => Intensity::Seven,
            _ => return None,
        })
    }

    /// Threshold as written in an `intensity_filter`: a class (`5-`) or a
    /// display label (`진도 5약 이상`).
    pub fn parse_threshold(s: &str) -> Option<Self> {
        Self::parse(s).or_else(|| {
            Some(match s.trim() {
                "진도 1 이상" => Intensity::One,
                "진도 2 이상" => Intensity::Two,
                "진도 3 이상" => Intensity::Three,
                "진도 4 이상" => Intensity::Four,
                "진도 5약 이상" => Intensity::FiveLower,
                "진도 5강 이상" => Intensity::FiveUpper,
                "진도 6약 이상" => Intensity::SixLower,
                "진도 6강 이상" => Intensity::SixUpper,
                "진도 7" | "진도 7 이상" => Intensity::Seven,
                _ => return None,
            })
        })
    }

    pub fn label(self) -> &'static str {
        match self {
            Intensity::One => "1",
            Intensity::Two => "2",
            Intensity::Three => "3",
            Intensity::Four => "4",
            Intensity::FiveLower => "5-",
            Intensity::FiveUpper => "5+",
            Intensity::SixLower => "6-",
            Intensity::SixUpper => "6+",
            Intensity::Seven => "7",
        }
    }

    pub fn rank(self) -> u8 {
        match self {
            Intensity::One => 1,
            Intensity::Two => 2,
            Intensity::Three => 3,
            Intensity::Four => 4,
            Intensity::FiveLower | Intensity::FiveUpper => 5,
            Intensity::SixLower | Intensity::SixUpper => 6,
            Intensity::Seven => 7,
        }
    }

    /// Ordinal of a payload value; missing or unrecognised values rank 0.
    pub fn rank_of(value: Option<&Value>) -> u8 {
        match value {
            Some(Value::String(s)) => Intensity::parse(s).map_or(0, Intensity::rank),
            Some(Value::Number(n)) => n
                .as_i64()
                .filter(|v| (1..=7).contains(v))
                .map_or(0, |v| v as u8),
            _ => 0,
        }
    }
}

/// Announcement-kind and intensity filters for fact conditions.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AnnouncementFilter {
    /// Empty admits every announcement.
    pub announcements: Vec<Announcement>,
    pub min_intensity: Option<Intensity>,
}

impl AnnouncementFilter {
    pub fn announcements(mut self, list: impl IntoIterator<Item = Announcement>) -> Self {
        self.announcements = list.into_iter().collect();
        self
    }

    pub fn min_intensity(mut self, i: Intensity) -> Self {
        self.min_intensity = Some(i);
        self
    }

    pub fn admits(&self, label: &Announcement, fact: &Fact) -> bool {
        if !self.announcements.is_empty() && !self.announcements.contains(label) {
            return false;
        }
        match self.min_intensity {
            Some(min) => Intensity::rank_of(fact.payload.get("max_intensity")) >= min.rank(),
            None => true,
        }
    }

    /// An intensity filter that cannot be read is dropped; the raw value
    /// still survives on the condition's record.
    pub fn from_params(params: &Params) -> Self {
        let announcements = str_list(params, ANNOUNCEMENT_TYPES)
            .into_iter()
            .map(Announcement::from)
            .collect();
        let min_intensity = match lookup(params, INTENSITY_FILTER).and_then(Value::as_str) {
            None => None,
            Some(s) if is_no_filter(s) => None,
            Some(s) => Intensity::parse_threshold(s),
        };
        Self {
            announcements,
            min_intensity,
        }
    }

    fn write_params(&self, p: &mut Params) {
        if !self.announcements.is_empty() {
            let labels = self
                .announcements
                .iter()
                .map(|a| Value::String(a.label().to_string()))
                .collect();
            p.insert("announcement_types".into(), Value::Array(labels));
        }
        if let Some(i) = self.min_intensity {
            p.insert("intensity_filter".into(), Value::String(i.label().to_string()));
        }
    }
}

/// "No further reports" detection.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct QuiescenceRule {
    /// Categories whose silence is measured. Empty watches every category.
    pub categories: Vec<String>,
    pub quiet_seconds: f64,
    /// A fact here at or after the last watched fact cancels the rule.
    pub terminal_categories: Vec<String>,
}

/// On-disk form of a condition.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ConditionRecord {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub params: Params,
    #[serde(default)]
    pub delay: f64,
}

impl From<ConditionRecord> for Condition {
    fn from(rec: ConditionRecord) -> Self {
        Condition {
            kind: ConditionKind::from_wire(&rec.kind, &rec.params),
            delay_seconds: non_negative(rec.delay),
            wire: Some((rec.kind, rec.params)),
        }
    }
}

impl From<Condition> for ConditionRecord {
    fn from(c: Condition) -> Self {
        let Condition {
            kind,
            delay_seconds: delay,
            wire,
        } = c;
        let Some((name, written)) = wire else {
            return ConditionRecord {
                kind: kind.wire_name().into_owned(),
                params: kind.to_params(),
                delay,
            };
        };
        let stored = ConditionKind::parse(&name, &written);
        if stored == kind {
            return ConditionRecord {
                kind: name,
                params: written,
                delay,
            };
        }
        let name = if stored.wire_name() == kind.wire_name() {
            name
        } else {
            kind.wire_name().into_owned()
        };
        let params = match &kind {
            ConditionKind::Unknown { params, .. } => params.clone(),
            _ => {
                let owned: Vec<&[&str]> = stored
                    .owned_keys()
                    .iter()
                    .chain(kind.owned_keys())
                    .copied()
                    .collect();
                overlay(written, &owned, kind.to_params())
            }
        };
        ConditionRecord {
            kind: name,
            params,
            delay,
        }
    }
}

#[inline]
fn non_negative(x: f64) -> f64 {
    if x.is_finite() && x > 0.0 {
        x
    } else {
        0.0
    }
}

fn is_no_filter(s: &str) -> bool {
    matches!(s.trim(), "" | "none" | "필터 없음")
}

/// First key of `keys` present in `params`.
pub(crate) fn lookup<'a>(params: &'a Params, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|k| params.get(*k))
}

pub(crate) fn str_param(params: &Params, keys: &[&str]) -> Option<String> {
    lookup(params, keys)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Rewrites the keys in `owned` from `canonical`, leaving every other stored
/// key alone. A key already spelled with an alias keeps that spelling.
pub(crate) fn overlay(mut stored: Params, owned: &[&[&str]], canonical: Params) -> Params {
    let spelled: Vec<(&str, &str)> = owned
        .iter()
        .filter_map(|keys| {
            let used = keys.iter().find(|k| stored.contains_key(**k))?;
            Some((keys[0], *used))
        })
        .collect();
    for key in owned.iter().flat_map(|keys| keys.iter()) {
        stored.remove(*key);
    }
    for (key, value) in canonical {
        let key = spelled
            .iter()
            .find(|(c, _)| *c == key)
            .map_or(key.clone(), |(_, used)| used.to_string());
        stored.insert(key, value);
    }
    stored
}

fn str_list(params: &Params, keys: &[&str]) -> Vec<String> {
    lookup(params, keys)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn string_array(items: &[String]) -> Value {
    Value::Array(items.iter().cloned().map(Value::String).collect())
}
