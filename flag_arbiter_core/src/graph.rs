//! Owned flag arena.
//!
//! Flags are keyed by id in a `BTreeMap`, so every walk over the graph (and
//! therefore every tick and every arbitration) visits flags in the same order.

use std::collections::BTreeMap;

use thiserror::Error;

use crate::model::{Flag, FlagId, FlagRole, Timestamp};
use crate::state::{FlagChange, FlagSnapshot};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("flag id must not be empty")]
    EmptyId,
    #[error("unknown flag: {0}")]
    UnknownFlag(FlagId),
    #[error("flag {0} is not an upper flag")]
    NotUpper(FlagId),
    #[error("flag {0} is not a lower flag")]
    NotLower(FlagId),
    #[error("flag {0} cannot aggregate itself")]
    SelfLink(FlagId),
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct FlagGraph {
    flags: BTreeMap<FlagId, Flag>,
}

impl FlagGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a flag. Returns the replaced flag, if any.
    pub fn insert(&mut self, flag: Flag) -> Result<Option<Flag>, GraphError> {
        if flag.id.is_empty() {
            return Err(GraphError::EmptyId);
        }
        if flag.linked_lower_ids().iter().any(|l| *l == flag.id) {
            return Err(GraphError::SelfLink(flag.id));
        }
        Ok(self.flags.insert(flag.id.clone(), flag))
    }

    /// Remove a flag and drop it from every upper flag's links.
    pub fn remove(&mut self, id: &str) -> Option<Flag> {
        let removed = self.flags.remove(id)?;
        for flag in self.flags.values_mut() {
            if let FlagRole::Upper {
                linked_lower_ids, ..
            } = &mut flag.role
            {
                linked_lower_ids.retain(|l| l != id);
            }
        }
        Some(removed)
    }

    /// Link `lower` under `upper`. Returns `false` if it was already linked.
    ///
    /// The aggregation relation is one layer deep: only lower flags can be
    /// linked, and only under upper flags.
    pub fn link(&mut self, upper: &str, lower: &str) -> Result<bool, GraphError> {
        if upper == lower {
            return Err(GraphError::SelfLink(upper.to_string()));
        }
        match self.flags.get(lower) {
            None => return Err(GraphError::UnknownFlag(lower.to_string())),
            Some(f) if !f.is_lower() => return Err(GraphError::NotLower(lower.to_string())),
            Some(_) => {}
        }
        let links = self.upper_links_mut(upper)?;
        if links.iter().any(|l| l == lower) {
            return Ok(false);
        }
        links.push(lower.to_string());
        Ok(true)
    }

    /// Returns `false` if the pair was not linked.
    pub fn unlink(&mut self, upper: &str, lower: &str) -> Result<bool, GraphError> {
        let links = self.upper_links_mut(upper)?;
        let before = links.len();
        links.retain(|l| l != lower);
        Ok(links.len() != before)
    }

    pub fn set_priority(&mut self, upper: &str, p: Option<i64>) -> Result<(), GraphError> {
        match self.flags.get_mut(upper).map(|f| &mut f.role) {
            Some(FlagRole::Upper { priority, .. }) => {
                *priority = p;
                Ok(())
            }
            Some(FlagRole::Lower { .. }) => Err(GraphError::NotUpper(upper.to_string())),
            None => Err(GraphError::UnknownFlag(upper.to_string())),
        }
    }

    fn upper_links_mut(&mut self, upper: &str) -> Result<&mut Vec<FlagId>, GraphError> {
        match self.flags.get_mut(upper).map(|f| &mut f.role) {
            Some(FlagRole::Upper {
                linked_lower_ids, ..
            }) => Ok(linked_lower_ids),
            Some(FlagRole::Lower { .. }) => Err(GraphError::NotUpper(upper.to_string())),
            None => Err(GraphError::UnknownFlag(upper.to_string())),
        }
    }

    pub fn get(&self, id: &str) -> Option<&Flag> {
        self.flags.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.flags.contains_key(id)
    }

    /// State of a flag; unknown ids read as off.
    #[inline]
    pub fn state_of(&self, id: &str) -> bool {
        self.flags.get(id).is_some_and(|f| f.state)
    }

    pub fn len(&self) -> usize {
        self.flags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Flag> {
        self.flags.values()
    }

    pub fn uppers(&self) -> impl Iterator<Item = &Flag> {
        self.flags.values().filter(|f| f.is_upper())
    }

    pub fn lowers(&self) -> impl Iterator<Item = &Flag> {
        self.flags.values().filter(|f| f.is_lower())
    }

    pub fn active_uppers(&self) -> impl Iterator<Item = &Flag> {
        self.uppers().filter(|f| f.state)
    }

    /// OR over the upper flag's linked lower flags. Dangling ids and ids that
    /// do not name a lower flag are ignored; no links means off.
    pub fn aggregate(&self, upper: &Flag) -> bool {
        upper
            .linked_lower_ids()
            .iter()
            .filter_map(|id| self.flags.get(id))
            .any(|f| f.is_lower() && f.state)
    }

    pub fn snapshot(&self) -> FlagSnapshot {
        self.flags
            .iter()
            .map(|(id, f)| (id.clone(), f.state))
            .collect()
    }

    /// Apply a resolved value; yields a change record only on a real transition.
    pub(crate) fn commit(&mut self, id: &str, new_state: bool, now: Timestamp) -> Option<FlagChange> {
        let flag = self.flags.get_mut(id)?;
        let old_state = flag.state;
        flag.transition(new_state, now).then(|| FlagChange {
            flag_id: flag.id.clone(),
            old_state,
            new_state,
            at: now,
        })
    }
}

impl FromIterator<Flag> for FlagGraph {
    /// Flags with invalid ids are dropped.
    fn from_iter<I: IntoIterator<Item = Flag>>(iter: I) -> Self {
        let mut g = FlagGraph::new();
        for flag in iter {
            let _ = g.insert(flag);
        }
        g
    }
}
