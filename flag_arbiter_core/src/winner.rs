//! Winner arbitration over active upper flags.
//!
//! Ordering, best first:
//! - explicit priority before no priority, lower number first;
//! - most recent `last_change_time` first (never-changed sorts oldest);
//! - flag id, ascending, so the result is total and stable.

use std::cmp::Ordering;

use crate::graph::FlagGraph;
use crate::model::Flag;

/// Compare two upper flags for arbitration; `Less` means `a` wins.
pub fn compare_candidates(a: &Flag, b: &Flag) -> Ordering {
    let pa = a.priority();
    let pb = b.priority();
    pa.is_none()
        .cmp(&pb.is_none())
        .then_with(|| pa.cmp(&pb))
        .then_with(|| recency(b).total_cmp(&recency(a)))
        .then_with(|| a.id.cmp(&b.id))
}

#[inline]
fn recency(f: &Flag) -> f64 {
    f.last_change_time.unwrap_or(f64::NEG_INFINITY)
}

/// The single active upper flag allowed to drive exclusive resources.
///
/// Inactive flags and lower flags in the input are ignored, so any iterator
/// over a graph's flags can be passed directly.
pub fn select_winner<'a>(flags: impl IntoIterator<Item = &'a Flag>) -> Option<&'a Flag> {
    flags
        .into_iter()
        .filter(|f| f.is_upper() && f.state)
        .min_by(|a, b| compare_candidates(a, b))
}

/// Every active upper flag, best first.
pub fn ranked_uppers(graph: &FlagGraph) -> Vec<&Flag> {
    let mut out: Vec<&Flag> = graph.active_uppers().collect();
    out.sort_by(|a, b| compare_candidates(a, b));
    out
}
