//! Flag entities.
//!
//! A flag is a boolean state variable. It never executes anything itself:
//! `on_actions`/`off_actions` are stored here and interpreted only by the
//! reflector in the supervisor crate.

use serde::{Deserialize, Serialize};

use crate::action::Action;
use crate::condition::Condition;

pub type FlagId = String;

/// Seconds since the Unix epoch.
pub type Timestamp = f64;

/// Free-form parameter / payload map.
pub type Params = serde_json::Map<String, serde_json::Value>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlagKind {
    Upper,
    Lower,
}

/// Kind-specific part of a flag. Upper flags aggregate lower flags and compete
/// for the shared resource; lower flags are driven by conditions.
#[derive(Clone, Debug, PartialEq)]
pub enum FlagRole {
    Upper {
        /// Lower number wins. `None` ranks below every explicit priority.
        priority: Option<i64>,
        linked_lower_ids: Vec<FlagId>,
    },
    Lower {
        on_conditions: Vec<Condition>,
        off_conditions: Vec<Condition>,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub struct Flag {
    pub id: FlagId,
    pub name: String,
    pub state: bool,
    /// Set only when `state` actually flips.
    pub last_change_time: Option<Timestamp>,
    pub on_actions: Vec<Action>,
    pub off_actions: Vec<Action>,
    pub role: FlagRole,
}

impl Flag {
    pub fn upper(id: impl Into<FlagId>, name: impl Into<String>) -> Self {
        Self::with_role(
            id,
            name,
            FlagRole::Upper {
                priority: None,
                linked_lower_ids: Vec::new(),
            },
        )
    }

    pub fn lower(id: impl Into<FlagId>, name: impl Into<String>) -> Self {
        Self::with_role(
            id,
            name,
            FlagRole::Lower {
                on_conditions: Vec::new(),
                off_conditions: Vec::new(),
            },
        )
    }

    fn with_role(id: impl Into<FlagId>, name: impl Into<String>, role: FlagRole) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            state: false,
            last_change_time: None,
            on_actions: Vec::new(),
            off_actions: Vec::new(),
            role,
        }
    }

    pub fn kind(&self) -> FlagKind {
        match self.role {
            FlagRole::Upper { .. } => FlagKind::Upper,
            FlagRole::Lower { .. } => FlagKind::Lower,
        }
    }

    #[inline]
    pub fn is_upper(&self) -> bool {
        matches!(self.role, FlagRole::Upper { .. })
    }

    #[inline]
    pub fn is_lower(&self) -> bool {
        matches!(self.role, FlagRole::Lower { .. })
    }

    /// Always `None` for lower flags.
    pub fn priority(&self) -> Option<i64> {
        match &self.role {
            FlagRole::Upper { priority, .. } => *priority,
            FlagRole::Lower { .. } => None,
        }
    }

    pub fn linked_lower_ids(&self) -> &[FlagId] {
        match &self.role {
            FlagRole::Upper {
                linked_lower_ids, ..
            } => linked_lower_ids,
            FlagRole::Lower { .. } => &[],
        }
    }

    pub fn on_conditions(&self) -> &[Condition] {
        match &self.role {
            FlagRole::Lower { on_conditions, .. } => on_conditions,
            FlagRole::Upper { .. } => &[],
        }
    }

    pub fn off_conditions(&self) -> &[Condition] {
        match &self.role {
            FlagRole::Lower { off_conditions, .. } => off_conditions,
            FlagRole::Upper { .. } => &[],
        }
    }

    // Builders. Role-specific builders are ignored on the other role.

    pub fn with_priority(mut self, p: Option<i64>) -> Self {
        if let FlagRole::Upper { priority, .. } = &mut self.role {
            *priority = p;
        }
        self
    }

    pub fn with_link(mut self, lower_id: impl Into<FlagId>) -> Self {
        if let FlagRole::Upper {
            linked_lower_ids, ..
        } = &mut self.role
        {
            linked_lower_ids.push(lower_id.into());
        }
        self
    }

    pub fn with_on_condition(mut self, c: Condition) -> Self {
        if let FlagRole::Lower { on_conditions, .. } = &mut self.role {
            on_conditions.push(c);
        }
        self
    }

    pub fn with_off_condition(mut self, c: Condition) -> Self {
        if let FlagRole::Lower { off_conditions, .. } = &mut self.role {
            off_conditions.push(c);
        }
        self
    }

    pub fn with_on_action(mut self, a: Action) -> Self {
        self.on_actions.push(a);
        self
    }

    pub fn with_off_action(mut self, a: Action) -> Self {
        self.off_actions.push(a);
        self
    }

    /// Seed engine-owned state, e.g. when restoring from a document.
    pub fn with_state(mut self, state: bool, last_change_time: Option<Timestamp>) -> Self {
        self.state = state;
        self.last_change_time = last_change_time;
        self
    }

    /// Apply a resolved value. Returns `true` only on an actual transition;
    /// re-affirming the current value leaves `last_change_time` untouched.
    #[inline]
    pub(crate) fn transition(&mut self, new_state: bool, now: Timestamp) -> bool {
        if self.state == new_state {
            return false;
        }
        self.state = new_state;
        self.last_change_time = Some(now);
        true
    }
}
