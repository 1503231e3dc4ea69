//! Change records emitted after a successful write.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::vp_id::VpId;

/// What happened to an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeAction {
    Create,
    Edit,
    Delete,
}

impl fmt::Display for ChangeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangeAction::Create => write!(f, "create"),
            ChangeAction::Edit => write!(f, "edit"),
            ChangeAction::Delete => write!(f, "delete"),
        }
    }
}

/// Net effect of a write, reported at term granularity.
///
/// Taxonomy writes are always reported as an `edit` of the owning term,
/// whether the taxonomy itself was created, edited or deleted. Consumers
/// that need the taxonomy-level action must track it from their input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeInfo {
    pub action: ChangeAction,
    pub term_vp_id: VpId,
    pub term_name: Option<String>,
    /// The `taxonomy` value of the record that changed, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub taxonomy: Option<String>,
}

impl ChangeInfo {
    /// A taxonomy-level change, reported as an edit of its term.
    pub fn taxonomy_change(
        term_vp_id: VpId,
        term_name: Option<String>,
        taxonomy: Option<String>,
    ) -> Self {
        Self {
            action: ChangeAction::Edit,
            term_vp_id,
            term_name,
            taxonomy,
        }
    }

    /// A change to the term's own fields.
    pub fn term_change(action: ChangeAction, term_vp_id: VpId, term_name: Option<String>) -> Self {
        Self {
            action,
            term_vp_id,
            term_name,
            taxonomy: None,
        }
    }
}

impl fmt::Display for ChangeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "term/{}/{}", self.action, self.term_vp_id)
    }
}
