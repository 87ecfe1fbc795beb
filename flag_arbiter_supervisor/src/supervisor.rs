//! Flag supervisor.
//!
//! The outside-world facing owner of one flag graph:
//! - serializes fact insertion (any thread may push facts)
//! - drives stabilization ticks and fans the resulting changes out to observers
//! - runs the reflector against a copy of the stabilized graph
//! - exposes configuration edits and document persistence
//!
//! The supervisor does not own a clock or a loop; `runtime::run` (or a host)
//! decides when `tick` and `reflect` happen.

use std::path::Path;
use std::sync::mpsc;
use std::sync::{Mutex, MutexGuard};
use std::time::{SystemTime, UNIX_EPOCH};

use flag_arbiter_core::{
    select_winner, Action, Fact, FactStore, Flag, FlagChange, FlagDocument, FlagGraph, FlagId,
    FlagSnapshot, Params, PendingTransition, StabilizationEngine, TickReport, Timestamp,
};
use tracing::{debug, info};

use crate::adapter::{build_fact_batch, Bulletin, FactBuilder};
use crate::error::{Result, SupervisorError};
use crate::reflector::{DispatchStats, ResourceController, StateReflector};
use crate::settings::SupervisorCfg;
use crate::store;

/// Counters returned by restore operations.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RestoreStats {
    /// Flags taken from the document.
    pub applied: usize,
    /// Flags that replaced one with the same id.
    pub overwritten: usize,
    /// Records the graph rejected (e.g. empty id).
    pub skipped: usize,
}

#[derive(Debug)]
struct EngineState {
    graph: FlagGraph,
    engine: StabilizationEngine,
}

/// Current wall clock as Unix seconds.
pub fn now_ts() -> Timestamp {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

#[derive(Debug)]
pub struct FlagSupervisor {
    cfg: SupervisorCfg,
    facts: Mutex<FactStore>,
    // Lock order: `facts` is never held while taking `core`.
    core: Mutex<EngineState>,
    reflector: Mutex<StateReflector>,
    observers: Mutex<Vec<mpsc::Sender<FlagChange>>>,
}

impl FlagSupervisor {
    pub fn new(cfg: SupervisorCfg) -> Self {
        Self::with_graph(cfg, FlagGraph::new())
    }

    pub fn with_graph(cfg: SupervisorCfg, graph: FlagGraph) -> Self {
        let engine = StabilizationEngine::new(cfg.engine.clone());
        let reflector = StateReflector::new(cfg.default_actions.clone());
        Self {
            facts: Mutex::new(FactStore::with_limits(
                cfg.engine.fact_capacity,
                cfg.engine.max_fact_categories,
            )),
            core: Mutex::new(EngineState { graph, engine }),
            reflector: Mutex::new(reflector),
            observers: Mutex::new(Vec::new()),
            cfg,
        }
    }

    /// Load the configured flag document, falling back to an empty graph.
    pub fn boot(cfg: SupervisorCfg) -> Self {
        let graph = match &cfg.flags_path {
            Some(path) => store::load_graph_or_empty(path),
            None => FlagGraph::new(),
        };
        info!(flags = graph.len(), "flag supervisor booted");
        Self::with_graph(cfg, graph)
    }

    pub fn cfg(&self) -> &SupervisorCfg {
        &self.cfg
    }

    fn core(&self) -> MutexGuard<'_, EngineState> {
        self.core.lock().expect("flag supervisor core mutex poisoned")
    }

    fn facts(&self) -> MutexGuard<'_, FactStore> {
        self.facts.lock().expect("flag supervisor fact mutex poisoned")
    }

    fn reflector(&self) -> MutexGuard<'_, StateReflector> {
        self.reflector
            .lock()
            .expect("flag supervisor reflector mutex poisoned")
    }

    // ---- ingestion -------------------------------------------------------

    pub fn push_fact(&self, fact: Fact) {
        debug!(category = fact.category.as_str(), ts = fact.timestamp, "fact recorded");
        self.facts().push(fact);
    }

    /// Record a fact stamped with the current time. Evaluation waits for the
    /// next tick.
    pub fn trigger_event(&self, category: impl Into<String>, payload: Params) {
        self.trigger_event_at(category, payload, now_ts());
    }

    pub fn trigger_event_at(&self, category: impl Into<String>, payload: Params, timestamp: Timestamp) {
        self.push_fact(Fact::new(category, payload, timestamp));
    }

    /// Run bulletins through `builder` and record the resulting facts.
    /// Returns how many facts were recorded.
    pub fn ingest<B: FactBuilder>(&self, builder: &mut B, bulletins: &[Bulletin]) -> usize {
        self.ingest_at(builder, bulletins, now_ts())
    }

    pub fn ingest_at<B: FactBuilder>(&self, builder: &mut B, bulletins: &[Bulletin], timestamp: Timestamp) -> usize {
        let drafts = build_fact_batch(builder, bulletins);
        let n = drafts.len();
        let mut facts = self.facts();
        for d in drafts {
            facts.push(Fact::new(d.category, d.payload, timestamp));
        }
        n
    }

    pub fn facts_snapshot(&self) -> FactStore {
        self.facts().clone()
    }

    // ---- ticks -----------------------------------------------------------

    pub fn tick(&self) -> TickReport {
        self.tick_at(now_ts())
    }

    /// One stabilization tick at `now`. Changes are sent to subscribers after
    /// the graph lock is released.
    pub fn tick_at(&self, now: Timestamp) -> TickReport {
        let facts = self.facts_snapshot();
        let report = {
            let mut core = self.core();
            let EngineState { graph, engine } = &mut *core;
            engine.tick(graph, &facts, now)
        };
        if !report.changes.is_empty() {
            self.notify(&report.changes);
        }
        report
    }

    /// Apply the current flag state to `controller`.
    pub fn reflect<C: ResourceController + ?Sized>(&self, controller: &mut C) -> DispatchStats {
        let graph = self.core().graph.clone();
        self.reflector().reflect(&graph, controller)
    }

    pub fn forget_applied(&self) {
        self.reflector().forget_applied();
    }

    /// Replace the actions run when the winner becomes "none". Used from the
    /// next such change on.
    pub fn set_default_actions(&self, actions: Vec<Action>) {
        info!(count = actions.len(), "default actions replaced");
        self.reflector().set_default_actions(actions);
    }

    // ---- observation -----------------------------------------------------

    pub fn flag_snapshot(&self) -> FlagSnapshot {
        self.core().graph.snapshot()
    }

    pub fn flag_state(&self, id: &str) -> Option<bool> {
        self.core().graph.get(id).map(|f| f.state)
    }

    pub fn winner(&self) -> Option<FlagId> {
        let core = self.core();
        select_winner(core.graph.iter()).map(|f| f.id.clone())
    }

    pub fn applied_winner(&self) -> Option<FlagId> {
        self.reflector().applied_winner().map(str::to_string)
    }

    pub fn pending(&self) -> Vec<PendingTransition> {
        self.core().engine.scheduler().entries()
    }

    /// Receive every future `FlagChange`. Observation only; a dropped
    /// receiver is pruned on the next send.
    pub fn subscribe(&self) -> mpsc::Receiver<FlagChange> {
        let (tx, rx) = mpsc::channel();
        self.observers
            .lock()
            .expect("flag supervisor observer mutex poisoned")
            .push(tx);
        rx
    }

    fn notify(&self, changes: &[FlagChange]) {
        let mut observers = self
            .observers
            .lock()
            .expect("flag supervisor observer mutex poisoned");
        observers.retain(|tx| changes.iter().all(|c| tx.send(c.clone()).is_ok()));
    }

    // ---- configuration surface --------------------------------------------

    pub fn graph(&self) -> FlagGraph {
        self.core().graph.clone()
    }

    /// Add or replace a flag. Pending transitions of a replaced flag are dropped.
    pub fn upsert_flag(&self, flag: Flag) -> Result<Option<Flag>> {
        let mut core = self.core();
        let id = flag.id.clone();
        let replaced = core.graph.insert(flag)?;
        if replaced.is_some() {
            core.engine.forget(&id);
        }
        Ok(replaced)
    }

    /// Remove a flag, unlink it from every upper flag and drop its pending
    /// transitions.
    pub fn remove_flag(&self, id: &str) -> Option<Flag> {
        let mut core = self.core();
        let removed = core.graph.remove(id)?;
        core.engine.forget(id);
        Some(removed)
    }

    pub fn link(&self, upper: &str, lower: &str) -> Result<bool> {
        Ok(self.core().graph.link(upper, lower)?)
    }

    pub fn unlink(&self, upper: &str, lower: &str) -> Result<bool> {
        Ok(self.core().graph.unlink(upper, lower)?)
    }

    pub fn set_priority(&self, upper: &str, priority: Option<i64>) -> Result<()> {
        Ok(self.core().graph.set_priority(upper, priority)?)
    }

    // ---- persistence -----------------------------------------------------

    /// Export the graph as a document. No IO.
    pub fn document(&self) -> FlagDocument {
        FlagDocument::from_graph(&self.core().graph)
    }

    /// Replace the whole graph with the document's flags. Pending transitions
    /// are discarded.
    pub fn restore(&self, doc: FlagDocument) -> RestoreStats {
        let mut core = self.core();
        core.graph = FlagGraph::new();
        core.engine.reset();
        import(&mut core, doc)
    }

    /// Merge the document into the current graph. Flags with the same id are
    /// replaced (and lose their pending transitions); others are kept.
    pub fn restore_merge(&self, doc: FlagDocument) -> RestoreStats {
        let mut core = self.core();
        import(&mut core, doc)
    }

    /// Write the document to the configured path.
    pub fn save(&self) -> Result<()> {
        let path = self
            .cfg
            .flags_path
            .as_deref()
            .ok_or(SupervisorError::NoDocumentPath)?;
        self.save_to(path)
    }

    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let doc = self.document();
        store::save_document(path.as_ref(), &doc)?;
        info!(path = %path.as_ref().display(), flags = doc.len(), "flag document saved");
        Ok(())
    }
}

fn import(core: &mut EngineState, doc: FlagDocument) -> RestoreStats {
    let report = doc.merge_into(&mut core.graph);
    for id in &report.replaced {
        core.engine.forget(id);
    }
    RestoreStats {
        applied: report.applied,
        overwritten: report.replaced.len(),
        skipped: report.skipped,
    }
}
