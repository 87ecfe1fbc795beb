use serde::{Deserialize, Serialize};

use crate::facts::{DEFAULT_FACT_CAPACITY, DEFAULT_MAX_CATEGORIES};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineCfg {
    /// Fixed-point pass cap per tick. Well-formed graphs settle in two.
    pub max_passes: usize,
    /// Ring depth per fact category.
    pub fact_capacity: usize,
    /// Distinct fact categories kept before the stalest one is evicted.
    pub max_fact_categories: usize,
}

impl Default for EngineCfg {
    fn default() -> Self {
        Self {
            max_passes: 100,
            fact_capacity: DEFAULT_FACT_CAPACITY,
            max_fact_categories: DEFAULT_MAX_CATEGORIES,
        }
    }
}
