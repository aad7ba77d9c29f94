//! Core types for the notice registry.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Value stored under a composite key.
///
/// The subscription table only holds `Subscribers`, the alias table only
/// holds `Alias`. Both share one on-disk format.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TableValue {
    /// Ordered, duplicate-free subscriber identities.
    Subscribers(Vec<String>),
    /// Canonical subject an alias points at.
    Alias(String),
}

impl TableValue {
    /// Subscriber list, if this is a subscription entry.
    pub fn as_subscribers(&self) -> Option<&[String]> {
        match self {
            TableValue::Subscribers(list) => Some(list),
            TableValue::Alias(_) => None,
        }
    }

    /// Alias target, if this is an alias entry.
    pub fn as_alias(&self) -> Option<&str> {
        match self {
            TableValue::Alias(target) => Some(target),
            TableValue::Subscribers(_) => None,
        }
    }

    /// True for an empty subscriber list or an empty alias target.
    pub fn is_empty(&self) -> bool {
        match self {
            TableValue::Subscribers(list) => list.is_empty(),
            TableValue::Alias(target) => target.is_empty(),
        }
    }
}

/// Outcome of a subscribe call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubscribeOutcome {
    Added,
    AlreadyJoined,
}

/// Outcome of an unsubscribe call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnsubscribeOutcome {
    Removed,
    /// Nobody ever subscribed to the subject in this realm.
    NoSuchSubject,
    /// The subject exists but the actor is not on it.
    NotSubscribed,
}

/// Outcome of a membership query.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QueryOutcome {
    Known { subscribed: bool },
    Unknown,
}

/// Outcome of defining an alias.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DefineOutcome {
    Defined,
    /// The alias already points somewhere; remove it first.
    AlreadyExists { target: String },
    /// Other aliases point at this name, so it cannot become an alias itself.
    IsTarget { aliased_by: String },
}

/// Outcome of removing an entry by name.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RemoveOutcome {
    Removed,
    NotFound,
}

/// Outcome of renaming a subject.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RenameOutcome {
    Renamed,
    NotFound,
}

/// Subscribers to ping for a subject.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NoticeOutcome {
    Notice {
        /// Canonical subject after alias resolution.
        subject: String,
        subscribers: Vec<String>,
    },
    Unknown {
        subject: String,
    },
}

/// An alias and the subject it refers to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AliasEntry {
    pub alias: String,
    pub target: String,
}

/// One subscription entry, as listed by the debug dump.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DumpEntry {
    pub realm: String,
    pub subject: String,
    pub subscribers: Vec<String>,
}

/// Classes of expensive operations gated by the admission controller.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OperationClass {
    ListSubjects,
    ListAliases,
    UnsubscribeAll,
    MyNotices,
}

impl OperationClass {
    /// Listing classes use the long cooldown, per-actor scans the short one.
    pub fn is_listing(self) -> bool {
        matches!(self, OperationClass::ListSubjects | OperationClass::ListAliases)
    }
}

impl fmt::Display for OperationClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OperationClass::ListSubjects => "list_subjects",
            OperationClass::ListAliases => "list_aliases",
            OperationClass::UnsubscribeAll => "unsubscribe_all",
            OperationClass::MyNotices => "my_notices",
        };
        f.write_str(name)
    }
}

/// Result of a cooldown-gated operation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Gated<T> {
    Ready(T),
    OnCooldown { retry_after: Duration },
}

impl<T> Gated<T> {
    /// The value, if the call was admitted.
    pub fn ready(self) -> Option<T> {
        match self {
            Gated::Ready(value) => Some(value),
            Gated::OnCooldown { .. } => None,
        }
    }

    pub fn is_on_cooldown(&self) -> bool {
        matches!(self, Gated::OnCooldown { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_value_accessors() {
        let subs = TableValue::Subscribers(vec!["@bob".to_string()]);
        assert_eq!(subs.as_subscribers(), Some(&["@bob".to_string()][..]));
        assert_eq!(subs.as_alias(), None);
        assert!(!subs.is_empty());

        let alias = TableValue::Alias(String::new());
        assert_eq!(alias.as_alias(), Some(""));
        assert!(alias.is_empty());
    }

    #[test]
    fn test_gated_ready() {
        let ok: Gated<u32> = Gated::Ready(3);
        assert!(!ok.is_on_cooldown());
        assert_eq!(ok.ready(), Some(3));

        let wait: Gated<u32> = Gated::OnCooldown {
            retry_after: Duration::from_secs(5),
        };
        assert!(wait.is_on_cooldown());
        assert_eq!(wait.ready(), None);
    }

    #[test]
    fn test_operation_class_display() {
        assert_eq!(OperationClass::MyNotices.to_string(), "my_notices");
        assert!(OperationClass::ListAliases.is_listing());
        assert!(!OperationClass::UnsubscribeAll.is_listing());
    }
}
