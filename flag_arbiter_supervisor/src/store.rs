//! Flag document file IO.

use std::path::Path;

use flag_arbiter_core::{FlagDocument, FlagGraph};
use tracing::{info, warn};

use crate::error::{Result, SupervisorError};

pub fn load_document(path: impl AsRef<Path>) -> Result<FlagDocument> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|e| SupervisorError::io(path, e))?;
    Ok(FlagDocument::from_json(&text)?)
}

/// Write via a sibling temp file and rename, so a crash never leaves a
/// truncated document behind.
pub fn save_document(path: impl AsRef<Path>, doc: &FlagDocument) -> Result<()> {
    let path = path.as_ref();
    let text = doc.to_json_pretty()?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, text).map_err(|e| SupervisorError::io(&tmp, e))?;
    std::fs::rename(&tmp, path).map_err(|e| SupervisorError::io(path, e))?;
    Ok(())
}

/// Boot-time load. A missing or unreadable document yields an empty graph so
/// the timers still run.
pub fn load_graph_or_empty(path: impl AsRef<Path>) -> FlagGraph {
    let path = path.as_ref();
    if !path.exists() {
        info!(path = %path.display(), "no flag document; starting with an empty graph");
        return FlagGraph::new();
    }
    match load_document(path) {
        Ok(doc) => {
            let graph = doc.into_graph();
            info!(path = %path.display(), flags = graph.len(), "flag document loaded");
            graph
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "flag document unusable; starting with an empty graph");
            FlagGraph::new()
        }
    }
}
