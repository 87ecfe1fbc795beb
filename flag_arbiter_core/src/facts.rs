use std::collections::{HashMap, VecDeque};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use tracing::warn;

use crate::model::{Params, Timestamp};

pub const DEFAULT_FACT_CAPACITY: usize = 10;
/// Facts may be pushed under any category name, so the number of rings is
/// bounded as well as their depth.
pub const DEFAULT_MAX_CATEGORIES: usize = 64;

/// An externally reported, timestamped event.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Fact {
    pub category: String,
    #[serde(default)]
    pub payload: Params,
    pub timestamp: Timestamp,
}

impl Fact {
    pub fn new(category: impl Into<String>, payload: Params, timestamp: Timestamp) -> Self {
        Fact {
            category: category.into(),
            payload,
            timestamp,
        }
    }

    /// Boolean payload field; anything but `true` reads as `false`.
    #[inline]
    pub fn flag(&self, key: &str) -> bool {
        self.payload.get(key).and_then(Value::as_bool).unwrap_or(false)
    }
}

/// Per-category ring buffers. Only the newest fact of a category is ever
/// consulted by conditions; the rest are kept for inspection.
///
/// At most `max_categories` rings exist. A fact for a new category beyond
/// that evicts the ring whose newest fact is oldest.
#[derive(Clone, Debug)]
pub struct FactStore {
    capacity: usize,
    max_categories: usize,
    buffers: HashMap<String, VecDeque<Fact>>,
}

impl Default for FactStore {
    fn default() -> Self {
        Self::new(DEFAULT_FACT_CAPACITY)
    }
}

impl FactStore {
    pub fn new(capacity: usize) -> Self {
        Self::with_limits(capacity, DEFAULT_MAX_CATEGORIES)
    }

    pub fn with_limits(capacity: usize, max_categories: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            max_categories: max_categories.max(1),
            buffers: HashMap::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn max_categories(&self) -> usize {
        self.max_categories
    }

    /// Append; the oldest entry of the category drops once the buffer is full.
    pub fn push(&mut self, fact: Fact) {
        if !self.buffers.contains_key(&fact.category) && self.buffers.len() >= self.max_categories {
            self.evict_stalest(&fact.category);
        }
        let cap = self.capacity;
        let buf = self
            .buffers
            .entry(fact.category.clone())
            .or_insert_with(|| VecDeque::with_capacity(cap));
        if buf.len() >= cap {
            buf.pop_front();
        }
        buf.push_back(fact);
    }

    pub fn latest(&self, category: &str) -> Option<&Fact> {
        self.buffers.get(category).and_then(VecDeque::back)
    }

    pub fn last_time(&self, category: &str) -> Option<Timestamp> {
        self.latest(category).map(|f| f.timestamp)
    }

    /// Newest timestamp across every category.
    pub fn last_time_any(&self) -> Option<Timestamp> {
        self.buffers
            .values()
            .filter_map(|b| b.back().map(|f| f.timestamp))
            .max_by(f64::total_cmp)
    }

    /// Oldest first.
    pub fn recent(&self, category: &str) -> impl Iterator<Item = &Fact> {
        self.buffers.get(category).into_iter().flatten()
    }

    /// Number of categories currently held.
    pub fn category_count(&self) -> usize {
        self.buffers.len()
    }

    fn evict_stalest(&mut self, incoming: &str) {
        let stalest = self
            .buffers
            .iter()
            .map(|(cat, buf)| (cat, buf.back().map_or(f64::NEG_INFINITY, |f| f.timestamp)))
            .min_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(b.0)))
            .map(|(cat, _)| cat.clone());
        if let Some(cat) = stalest {
            warn!(
                evicted = cat.as_str(),
                incoming,
                limit = self.max_categories,
                "fact category limit reached"
            );
            self.buffers.remove(&cat);
        }
    }

    pub fn len(&self, category: &str) -> usize {
        self.buffers.get(category).map_or(0, VecDeque::len)
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.values().all(VecDeque::is_empty)
    }

    pub fn clear(&mut self) {
        self.buffers.clear();
    }
}
