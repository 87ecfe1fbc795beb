//! Condition evaluation. Pure: reads the fact store and a graph snapshot,
//! never mutates either.

use tracing::debug;

use crate::condition::{AnnouncementFilter, Condition, ConditionKind, FactTrigger, QuiescenceRule};
use crate::facts::FactStore;
use crate::graph::FlagGraph;
use crate::model::Timestamp;

#[derive(Clone, Copy, Debug)]
pub struct EvalContext<'a> {
    pub graph: &'a FlagGraph,
    pub facts: &'a FactStore,
    pub now: Timestamp,
}

impl<'a> EvalContext<'a> {
    pub fn new(graph: &'a FlagGraph, facts: &'a FactStore, now: Timestamp) -> Self {
        Self { graph, facts, now }
    }
}

pub fn evaluate(condition: &Condition, ctx: &EvalContext<'_>) -> bool {
    match &condition.kind {
        ConditionKind::FlagOn { flag_id } => flag_id
            .as_deref()
            .and_then(|id| ctx.graph.get(id))
            .is_some_and(|f| f.state),
        ConditionKind::FlagOff { flag_id } => flag_id
            .as_deref()
            .and_then(|id| ctx.graph.get(id))
            .is_some_and(|f| !f.state),
        ConditionKind::Fact { trigger, filter } => fact_matches(*trigger, filter, ctx.facts),
        ConditionKind::Quiescence(rule) => quiescent(rule, ctx.facts, ctx.now),
        ConditionKind::Unknown { kind, .. } => {
            debug!(kind = kind.as_str(), "unknown condition kind evaluated as false");
            false
        }
    }
}

/// First satisfied condition in declaration order.
pub fn first_satisfied<'c>(conditions: &'c [Condition], ctx: &EvalContext<'_>) -> Option<&'c Condition> {
    conditions.iter().find(|c| evaluate(c, ctx))
}

fn fact_matches(trigger: FactTrigger, filter: &AnnouncementFilter, facts: &FactStore) -> bool {
    let Some(fact) = facts.latest(trigger.category()) else {
        return false;
    };
    if !trigger.gate(fact) {
        return false;
    }
    match trigger.announcement() {
        Some(label) => filter.admits(&label, fact),
        None => true,
    }
}

fn quiescent(rule: &QuiescenceRule, facts: &FactStore, now: Timestamp) -> bool {
    let last = if rule.categories.is_empty() {
        facts.last_time_any()
    } else {
        rule.categories
            .iter()
            .filter_map(|c| facts.last_time(c))
            .max_by(f64::total_cmp)
    };
    let Some(last) = last else {
        return false;
    };
    if now - last < rule.quiet_seconds {
        return false;
    }
    !rule
        .terminal_categories
        .iter()
        .filter_map(|c| facts.last_time(c))
        .any(|t| t >= last)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::{Announcement, Intensity};
    use crate::facts::Fact;
    use crate::model::{Flag, Params};
    use serde_json::json;

    fn payload(v: serde_json::Value) -> Params {
        v.as_object().cloned().unwrap_or_default()
    }

    fn store_with(facts: &[(&str, serde_json::Value, f64)]) -> FactStore {
        let mut s = FactStore::default();
        for (cat, p, ts) in facts {
            s.push(Fact::new(*cat, payload(p.clone()), *ts));
        }
        s
    }

    #[test]
    fn flag_reference_reads_state_and_absent_is_false() {
        let mut g: FlagGraph = [Flag::lower("a", "A")].into_iter().collect();
        let facts = FactStore::default();
        g.commit("a", true, 1.0);
        let ctx = EvalContext::new(&g, &facts, 2.0);
        assert!(evaluate(&Condition::flag_on("a"), &ctx));
        assert!(!evaluate(&Condition::flag_off("a"), &ctx));
        assert!(!evaluate(&Condition::flag_on("missing"), &ctx));
        assert!(!evaluate(&Condition::flag_off("missing"), &ctx));
        assert!(!evaluate(&Condition::new(ConditionKind::FlagOn { flag_id: None }), &ctx));
    }

    #[test]
    fn only_newest_fact_is_consulted() {
        let g = FlagGraph::new();
        let facts = store_with(&[
            ("EEW_STARTED", json!({ "is_new": true }), 1.0),
            ("EEW_STARTED", json!({ "is_new": false }), 2.0),
        ]);
        let ctx = EvalContext::new(&g, &facts, 3.0);
        assert!(!evaluate(&Condition::fact(FactTrigger::EewNew), &ctx));
    }

    #[test]
    fn announcement_and_intensity_filters() {
        let g = FlagGraph::new();
        let facts = store_with(&[("EEW_WARNING", json!({ "is_warning": true, "is_new": true, "max_intensity": "5+" }), 1.0)]);
        let ctx = EvalContext::new(&g, &facts, 1.0);

        let strong = AnnouncementFilter::default().min_intensity(Intensity::FiveLower);
        assert!(evaluate(&Condition::fact_filtered(FactTrigger::EewWarningNew, strong), &ctx));

        let too_strong = AnnouncementFilter::default().min_intensity(Intensity::SixLower);
        assert!(!evaluate(&Condition::fact_filtered(FactTrigger::EewWarningNew, too_strong), &ctx));

        let wrong_label = AnnouncementFilter::default().announcements([Announcement::Final]);
        assert!(!evaluate(&Condition::fact_filtered(FactTrigger::EewWarningNew, wrong_label), &ctx));

        // Warning-level has its own label, so a list without it rejects.
        let only_new = AnnouncementFilter::default().announcements([Announcement::WarningNew]);
        assert!(!evaluate(&Condition::fact_filtered(FactTrigger::EewWarningLevel, only_new), &ctx));
    }

    #[test]
    fn report_kinds_ignore_payload() {
        let g = FlagGraph::new();
        let facts = store_with(&[("DETAIL_RECEIVED", json!({}), 1.0)]);
        let ctx = EvalContext::new(&g, &facts, 1.0);
        assert!(evaluate(&Condition::fact(FactTrigger::DetailReceived), &ctx));
        assert!(!evaluate(&Condition::fact(FactTrigger::SokuhouReceived), &ctx));
    }

    #[test]
    fn tsunami_gates_on_cancellation() {
        let g = FlagGraph::new();
        let facts = store_with(&[
            ("TSUNAMI_RECEIVED", json!({ "is_canceled": false }), 1.0),
            ("TSUNAMI_CANCELED", json!({ "is_canceled": true }), 2.0),
        ]);
        let ctx = EvalContext::new(&g, &facts, 3.0);
        assert!(evaluate(&Condition::fact(FactTrigger::TsunamiIssued), &ctx));
        assert!(evaluate(&Condition::fact(FactTrigger::TsunamiCanceled), &ctx));
    }

    #[test]
    fn quiescence_waits_and_respects_terminal_facts() {
        let g = FlagGraph::new();
        let rule = QuiescenceRule {
            categories: vec!["EEW_UPDATED".into()],
            quiet_seconds: 60.0,
            terminal_categories: vec!["EEW_FINAL".into()],
        };
        let cond = Condition::quiescence(rule);

        let facts = store_with(&[("EEW_UPDATED", json!({}), 100.0)]);
        assert!(!evaluate(&cond, &EvalContext::new(&g, &facts, 159.0)));
        assert!(evaluate(&cond, &EvalContext::new(&g, &facts, 160.0)));

        let facts = store_with(&[
            ("EEW_UPDATED", json!({}), 100.0),
            ("EEW_FINAL", json!({ "is_final": true }), 120.0),
        ]);
        assert!(!evaluate(&cond, &EvalContext::new(&g, &facts, 500.0)));

        let empty = FactStore::default();
        assert!(!evaluate(&cond, &EvalContext::new(&g, &empty, 500.0)));
    }

    #[test]
    fn unknown_kind_is_never_satisfied() {
        let g = FlagGraph::new();
        let facts = FactStore::default();
        let c = Condition::new(ConditionKind::Unknown {
            kind: "moon".into(),
            params: Params::new(),
        });
        assert!(!evaluate(&c, &EvalContext::new(&g, &facts, 0.0)));
    }
}
