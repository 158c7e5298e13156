//! Dispatch gate: decides what a cycle does with a fresh snapshot.

use std::fmt;

use crate::notification::{Fingerprint, NotificationSet};

/// Outcome of evaluating a snapshot against the stored fingerprint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Nothing unread: drop any stored fingerprint.
    Clear,
    /// Same unread set as last emailed.
    Suppress { fingerprint: Fingerprint },
    /// New unread set: send, then store `fingerprint`.
    Send { fingerprint: Fingerprint },
}

impl Decision {
    #[must_use]
    pub const fn state(&self) -> GateState {
        match self {
            Self::Clear => GateState::Clearing,
            Self::Suppress { .. } => GateState::Suppressed,
            Self::Send { .. } => GateState::Sending,
        }
    }
}

/// Gate lifecycle within one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Idle,
    Evaluating,
    Suppressed,
    Sending,
    Clearing,
}

impl fmt::Display for GateState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::Evaluating => "evaluating",
            Self::Suppressed => "suppressed",
            Self::Sending => "sending",
            Self::Clearing => "clearing",
        })
    }
}

/// Whether the snapshot reports anything unread at all.
///
/// The API's `unreadCount` is authoritative for this; the listed items only
/// decide which set is unread.
#[must_use]
pub fn needs_clearing(set: &NotificationSet) -> bool {
    set.unread_count == 0
}

/// Compare a non-empty snapshot against the last emailed fingerprint.
#[must_use]
pub fn evaluate(set: &NotificationSet, last_notified: Option<&str>) -> Decision {
    if needs_clearing(set) {
        return Decision::Clear;
    }

    let fingerprint = set.fingerprint();
    if fingerprint.matches(last_notified) {
        Decision::Suppress { fingerprint }
    } else {
        Decision::Send { fingerprint }
    }
}
