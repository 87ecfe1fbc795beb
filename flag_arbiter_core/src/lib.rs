pub mod model;
pub mod condition;
pub mod action;

pub mod facts;
pub mod graph;
pub mod evaluate;
pub mod scheduler;
pub mod stabilize;
pub mod winner;
pub mod document;
pub mod cfg;
pub mod state;

pub use model::{Flag, FlagId, FlagKind, FlagRole, Params, Timestamp};
pub use condition::{category, Announcement, AnnouncementFilter, Condition, ConditionKind, FactTrigger, Intensity, QuiescenceRule};
pub use action::{Action, ActionKind};

pub use facts::{Fact, FactStore, DEFAULT_FACT_CAPACITY, DEFAULT_MAX_CATEGORIES};
pub use graph::{FlagGraph, GraphError};
pub use evaluate::{evaluate, first_satisfied, EvalContext};
pub use scheduler::{DelayScheduler, PendingTransition};
pub use stabilize::StabilizationEngine;
pub use winner::{compare_candidates, ranked_uppers, select_winner};
pub use document::{DocumentMetadata, FlagDocument, FlagRecord, ImportReport, DOCUMENT_VERSION};
pub use cfg::EngineCfg;
pub use state::{FlagChange, FlagSnapshot, TickReport};
