//! Event categories modules can hook into

use serde::{Deserialize, Serialize};
use std::fmt;

/// Events emitted by the engine while proposing changesets.
///
/// Hooks receive the changeset that triggered the event and may extend it
/// before it is collected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventCategory {
    /// A changeset was derived from a policy difference
    PolicyUpdate,
    /// A user account is about to be created
    UserAdded,
    /// A user account is about to be modified
    UserModified,
    /// A user account is about to be deleted
    UserRemoved,
    /// A group is about to be created
    GroupAdded,
    /// A group is about to be deleted
    GroupRemoved,
}

impl fmt::Display for EventCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PolicyUpdate => write!(f, "policy-update"),
            Self::UserAdded => write!(f, "user-added"),
            Self::UserModified => write!(f, "user-modified"),
            Self::UserRemoved => write!(f, "user-removed"),
            Self::GroupAdded => write!(f, "group-added"),
            Self::GroupRemoved => write!(f, "group-removed"),
        }
    }
}

impl EventCategory {
    /// Parse an event category from its display name
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "policy-update" => Some(Self::PolicyUpdate),
            "user-added" => Some(Self::UserAdded),
            "user-modified" => Some(Self::UserModified),
            "user-removed" => Some(Self::UserRemoved),
            "group-added" => Some(Self::GroupAdded),
            "group-removed" => Some(Self::GroupRemoved),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_and_parse_agree() {
        for event in [
            EventCategory::PolicyUpdate,
            EventCategory::UserAdded,
            EventCategory::UserModified,
            EventCategory::UserRemoved,
            EventCategory::GroupAdded,
            EventCategory::GroupRemoved,
        ] {
            assert_eq!(EventCategory::parse(&event.to_string()), Some(event));
        }
        assert_eq!(EventCategory::parse("pre-sync"), None);
    }
}
