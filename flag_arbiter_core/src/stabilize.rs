//! Stabilization engine: drives the flag graph to a fixed point once per tick.
//!
//! Each pass is evaluate-then-commit:
//! 1. scan every lower flag's on/off conditions against the current snapshot,
//!    handing delayed conditions to the scheduler;
//! 2. add pending transitions that came due at the start of the tick;
//! 3. resolve votes per flag (off beats on);
//! 4. commit the lower flags;
//! 5. recompute every upper flag as an OR over its linked lower flags.
//!
//! Passes repeat until one changes nothing or the pass cap is reached.

use std::collections::BTreeMap;

use tracing::{debug, info, warn};

use crate::cfg::EngineCfg;
use crate::evaluate::{first_satisfied, EvalContext};
use crate::facts::FactStore;
use crate::graph::FlagGraph;
use crate::model::{FlagId, Timestamp};
use crate::scheduler::{DelayScheduler, PendingTransition};
use crate::state::{FlagChange, TickReport};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct Votes {
    on: bool,
    off: bool,
}

impl Votes {
    /// Off wins when both directions are requested in the same pass.
    #[inline]
    fn resolve(self) -> Option<bool> {
        if self.off {
            Some(false)
        } else if self.on {
            Some(true)
        } else {
            None
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct StabilizationEngine {
    cfg: EngineCfg,
    scheduler: DelayScheduler,
}

impl StabilizationEngine {
    pub fn new(cfg: EngineCfg) -> Self {
        Self {
            cfg,
            scheduler: DelayScheduler::new(),
        }
    }

    pub fn cfg(&self) -> &EngineCfg {
        &self.cfg
    }

    pub fn scheduler(&self) -> &DelayScheduler {
        &self.scheduler
    }

    /// Drop pending transitions for a flag that left the graph.
    pub fn forget(&mut self, flag_id: &str) -> usize {
        self.scheduler.forget(flag_id)
    }

    pub fn reset(&mut self) {
        self.scheduler.clear();
    }

    pub fn tick(&mut self, graph: &mut FlagGraph, facts: &FactStore, now: Timestamp) -> TickReport {
        let mut report = TickReport::default();
        let mut due = self.scheduler.drain_ready(now);
        report.fired = due.len();

        let max_passes = self.cfg.max_passes.max(1);
        for pass in 0..max_passes {
            report.passes = pass + 1;

            let mut votes = self.scan_lowers(graph, facts, now, &mut report);
            fold_due(&mut votes, std::mem::take(&mut due), graph);

            let mut changed = false;
            for (id, v) in votes {
                if let Some(target) = v.resolve() {
                    if let Some(ch) = graph.commit(&id, target, now) {
                        log_change(&ch);
                        report.changes.push(ch);
                        changed = true;
                    }
                }
            }

            for ch in aggregate_uppers(graph, now) {
                log_change(&ch);
                report.changes.push(ch);
                changed = true;
            }

            if !changed {
                report.converged = true;
                break;
            }
        }

        if !report.converged {
            warn!(
                passes = report.passes,
                changes = report.changes.len(),
                "flag graph did not stabilize; keeping partial state (check for condition cycles)"
            );
        }
        report
    }

    /// Phase one: read-only scan. The graph is not touched; only the
    /// scheduler may gain entries.
    fn scan_lowers(
        &mut self,
        graph: &FlagGraph,
        facts: &FactStore,
        now: Timestamp,
        report: &mut TickReport,
    ) -> BTreeMap<FlagId, Votes> {
        let ctx = EvalContext::new(graph, facts, now);
        let mut votes = BTreeMap::new();

        for flag in graph.lowers() {
            let mut v = Votes::default();
            for (conditions, target) in [(flag.on_conditions(), true), (flag.off_conditions(), false)] {
                let Some(cond) = first_satisfied(conditions, &ctx) else {
                    continue;
                };
                if cond.is_delayed() {
                    if self.scheduler.schedule(&flag.id, target, cond.delay_seconds, now) {
                        report.scheduled += 1;
                        debug!(
                            flag = flag.id.as_str(),
                            target,
                            delay = cond.delay_seconds,
                            "transition scheduled"
                        );
                    }
                } else if target {
                    v.on = true;
                } else {
                    v.off = true;
                }
            }
            if v != Votes::default() {
                votes.insert(flag.id.clone(), v);
            }
        }
        votes
    }
}

/// Due transitions vote like zero-delay conditions. Entries for flags that are
/// gone or no longer lower flags are dropped.
fn fold_due(votes: &mut BTreeMap<FlagId, Votes>, due: Vec<PendingTransition>, graph: &FlagGraph) {
    for p in due {
        if !graph.get(&p.flag_id).is_some_and(|f| f.is_lower()) {
            continue;
        }
        let v = votes.entry(p.flag_id).or_default();
        if p.target_state {
            v.on = true;
        } else {
            v.off = true;
        }
    }
}

fn aggregate_uppers(graph: &mut FlagGraph, now: Timestamp) -> Vec<FlagChange> {
    let targets: Vec<(FlagId, bool)> = graph
        .uppers()
        .map(|u| (u.id.clone(), graph.aggregate(u)))
        .collect();
    targets
        .into_iter()
        .filter_map(|(id, target)| graph.commit(&id, target, now))
        .collect()
}

#[inline]
fn log_change(ch: &FlagChange) {
    info!(flag = ch.flag_id.as_str(), from = ch.old_state, to = ch.new_state, "flag transition");
}
