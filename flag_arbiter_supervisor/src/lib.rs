//! flag_arbiter_supervisor
//!
//! Outside-world facing orchestration layer for `flag_arbiter_core`.
//!
//! Responsibilities:
//! - turn upstream bulletins into facts via adapters
//! - own the flag graph and serialize fact insertion
//! - drive stabilization ticks and publish flag changes
//! - reflect the winner and lower-flag edges onto a resource controller
//! - load/save the flag document and process settings
//!
//! The core stays pure; clocks, files and the async loop live here.

pub mod adapter;
pub mod error;
pub mod logging;
pub mod reflector;
pub mod runtime;
pub mod settings;
pub mod store;
pub mod supervisor;

pub use adapter::{
    build_fact_batch,
    Bulletin,
    BulletinAdapter,
    EewBulletin,
    FactBuilder,
    FactDraft,
    ReportBulletin,
    TsunamiBulletin,
};

pub use error::SupervisorError;
pub use logging::{init_logging, LogCfg, LogFormat};
pub use reflector::{
    AppliedValue,
    ControllerError,
    DispatchStats,
    LoggingController,
    ResourceCall,
    ResourceController,
    ResourceKey,
    StateReflector,
};
pub use runtime::{run, RunStats};
pub use settings::SupervisorCfg;
pub use store::{load_document, load_graph_or_empty, save_document};
pub use supervisor::{now_ts, FlagSupervisor, RestoreStats};
