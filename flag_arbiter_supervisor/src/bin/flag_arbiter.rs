//! flag-arbiter
//!
//! Reads newline-delimited JSON from stdin and drives the flag graph.
//! Each line is either a raw fact or a bulletin:
//!
//!   {"category": "EEW_STARTED", "payload": {"is_new": true}}
//!   {"kind": "eew", "event_id": "2024-01", "max_intensity": "5-"}
//!
//! Resource calls are logged instead of sent anywhere.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use flag_arbiter_core::{Params, Timestamp};
use flag_arbiter_supervisor::{
    init_logging, run, Bulletin, BulletinAdapter, FlagSupervisor, LoggingController, SupervisorCfg,
};
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "flag-arbiter")]
#[command(about = "Derive and arbitrate state flags from a stream of facts")]
struct Cli {
    /// Settings file (JSON). Defaults apply when omitted.
    #[arg(short, long)]
    settings: Option<PathBuf>,

    /// Flag document; overrides `flags_path` from the settings.
    #[arg(short, long)]
    flags: Option<PathBuf>,

    /// Log filter directive, e.g. `debug` or `flag_arbiter_core=debug`.
    #[arg(long)]
    log_filter: Option<String>,

    /// Write the flag document back on exit.
    #[arg(long)]
    save_on_exit: bool,

    /// Keep ticking this long after stdin closes, so delayed transitions can fire.
    #[arg(long, default_value = "0")]
    linger_ms: u64,
}

#[derive(Deserialize)]
struct FactLine {
    category: String,
    #[serde(default)]
    payload: Params,
    timestamp: Option<Timestamp>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum InputLine {
    Bulletin(Bulletin),
    Fact(FactLine),
}

fn handle_line(sup: &FlagSupervisor, adapter: &mut BulletinAdapter, line: &str) {
    let line = line.trim();
    if line.is_empty() {
        return;
    }
    match serde_json::from_str::<InputLine>(line) {
        Ok(InputLine::Bulletin(b)) => {
            sup.ingest(adapter, std::slice::from_ref(&b));
        }
        Ok(InputLine::Fact(f)) => match f.timestamp {
            Some(ts) => sup.trigger_event_at(f.category, f.payload, ts),
            None => sup.trigger_event(f.category, f.payload),
        },
        Err(e) => warn!(error = %e, "input line ignored"),
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let cli = Cli::parse();

    let mut cfg = match &cli.settings {
        Some(path) => SupervisorCfg::load(path)?,
        None => SupervisorCfg::default(),
    };
    if let Some(flags) = cli.flags {
        cfg.flags_path = Some(flags);
    }
    init_logging(&cfg.log, cli.log_filter.as_deref())?;

    let save_on_exit = cli.save_on_exit || cfg.save_on_shutdown;
    let linger = Duration::from_millis(cli.linger_ms);
    let sup = FlagSupervisor::boot(cfg);
    let mut controller = LoggingController::default();
    let (tx, rx) = watch::channel(false);

    let feeder = async {
        let mut adapter = BulletinAdapter::new();
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut interrupt = std::pin::pin!(tokio::signal::ctrl_c());
        loop {
            tokio::select! {
                _ = &mut interrupt => {
                    info!("interrupted");
                    break;
                }
                line = lines.next_line() => match line {
                    Ok(Some(line)) => handle_line(&sup, &mut adapter, &line),
                    Ok(None) => {
                        info!(linger_ms = linger.as_millis() as u64, "input closed");
                        tokio::select! {
                            _ = &mut interrupt => info!("interrupted"),
                            _ = tokio::time::sleep(linger) => {}
                        }
                        break;
                    }
                    Err(e) => {
                        error!(error = %e, "stdin read failed");
                        break;
                    }
                },
            }
        }
        let _ = tx.send(true);
    };

    let (stats, ()) = tokio::join!(run(&sup, &mut controller, rx), feeder);
    info!(
        ticks = stats.ticks,
        transitions = stats.transitions,
        calls = controller.calls,
        "done"
    );

    if save_on_exit {
        sup.save()?;
    }
    Ok(())
}
