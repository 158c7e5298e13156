//! Notification data types and set fingerprinting.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// A single forum notification as reported by the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationItem {
    /// Opaque id, unique per notification.
    pub id: String,
    /// Human-readable message.
    #[serde(default)]
    pub message: String,
    /// Whether the operator has already read it.
    #[serde(default)]
    pub is_read: bool,
    /// Link to the notification target.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Creation time as sent by the API.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    /// Number of grouped events folded into this notification.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_count: Option<u32>,
}

impl NotificationItem {
    /// Create an unread item with only an id and message.
    #[must_use]
    pub fn unread(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            message: message.into(),
            is_read: false,
            url: None,
            created_at: None,
            batch_count: None,
        }
    }

    /// Set the link target.
    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Set the creation time.
    #[must_use]
    pub fn with_created_at(mut self, created_at: impl Into<String>) -> Self {
        self.created_at = Some(created_at.into());
        self
    }

    /// Mark the item as read.
    #[must_use]
    pub fn read(mut self) -> Self {
        self.is_read = true;
        self
    }
}

/// The unread-notification snapshot produced by one poll.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationSet {
    /// Unread count as reported by the API.
    pub unread_count: u64,
    /// Items in the order the API returned them, read ones included.
    pub items: Vec<NotificationItem>,
}

impl NotificationSet {
    #[must_use]
    pub fn new(unread_count: u64, items: Vec<NotificationItem>) -> Self {
        Self {
            unread_count,
            items,
        }
    }

    /// Build a set whose count matches its unread items.
    #[must_use]
    pub fn from_items(items: Vec<NotificationItem>) -> Self {
        let unread_count = items.iter().filter(|i| !i.is_read).count() as u64;
        Self::new(unread_count, items)
    }

    /// Items not yet read, in source order.
    pub fn unread(&self) -> impl Iterator<Item = &NotificationItem> {
        self.items.iter().filter(|item| !item.is_read)
    }

    /// Fingerprint of the unread id set.
    #[must_use]
    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint::from_ids(self.unread().map(|item| item.id.as_str()))
    }

    /// Whether the reported count and the listed unread items disagree.
    #[must_use]
    pub fn count_mismatch(&self) -> Option<usize> {
        let listed = self.unread().count();
        (listed as u64 != self.unread_count).then_some(listed)
    }
}

/// Order-independent identity of an unread id set.
///
/// Ids are deduplicated, sorted lexicographically and joined with commas, so
/// `[b, a, c]` and `[c, b, a]` produce the same value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn from_ids<'a>(ids: impl IntoIterator<Item = &'a str>) -> Self {
        let sorted: BTreeSet<&str> = ids.into_iter().collect();
        Self(sorted.into_iter().collect::<Vec<_>>().join(","))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether a previously stored value identifies the same set.
    #[must_use]
    pub fn matches(&self, stored: Option<&str>) -> bool {
        stored == Some(self.0.as_str())
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
