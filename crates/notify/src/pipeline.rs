//! Notification pipeline - one fetch, gate, compose, send, record cycle.

use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::digest::DigestComposer;
use crate::error::CycleError;
use crate::gate::{self, Decision, GateState};
use crate::notification::{Fingerprint, NotificationSet};
use crate::source::NotificationSource;
use crate::store::AlertStateStore;
use crate::transport::{EmailTransport, DEFAULT_FROM, DEFAULT_TO};

/// Addressing for digest emails.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub from: String,
    pub to: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            from: DEFAULT_FROM.to_string(),
            to: DEFAULT_TO.to_string(),
        }
    }
}

/// What a successful cycle did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Nothing unread; stored fingerprint removed.
    Cleared,
    /// Unread set unchanged since the last email.
    Suppressed { fingerprint: Fingerprint },
    /// Digest emailed and fingerprint recorded.
    Sent {
        fingerprint: Fingerprint,
        unread_count: u64,
    },
}

/// Orchestrates a single poll cycle.
///
/// Cycles are serialized through an internal guard: a trigger that fires
/// while another cycle is running waits for it and then evaluates against
/// the state it left behind.
pub struct Pipeline {
    config: PipelineConfig,
    source: Arc<dyn NotificationSource>,
    store: AlertStateStore,
    transport: EmailTransport,
    cycle_guard: Mutex<()>,
}

impl Pipeline {
    #[must_use]
    pub fn new(
        config: PipelineConfig,
        source: Arc<dyn NotificationSource>,
        store: AlertStateStore,
        transport: EmailTransport,
    ) -> Self {
        Self {
            config,
            source,
            store,
            transport,
            cycle_guard: Mutex::new(()),
        }
    }

    /// Run one full cycle.
    ///
    /// The stored fingerprint only advances after the email was handed off,
    /// so any error here leaves the next cycle to retry the same alert.
    #[instrument(skip(self))]
    pub async fn run_cycle(&self) -> Result<CycleOutcome, CycleError> {
        let _guard = self.cycle_guard.lock().await;
        debug!(state = %GateState::Idle, "Starting cycle");

        let set = self.source.fetch_unread().await?;
        debug!(
            state = %GateState::Evaluating,
            unread_count = set.unread_count,
            items = set.items.len(),
            "Fetched notifications"
        );

        if set.unread_count > 0 {
            if let Some(listed) = set.count_mismatch() {
                warn!(
                    unread_count = set.unread_count,
                    listed_unread = listed,
                    "Unread count disagrees with listed items; fingerprinting listed items"
                );
            }
        }

        // An empty set never consults the stored fingerprint.
        let last_notified = if gate::needs_clearing(&set) {
            None
        } else {
            self.store.get().await?
        };

        match gate::evaluate(&set, last_notified.as_deref()) {
            Decision::Clear => {
                self.store.clear().await?;
                info!(state = %GateState::Clearing, "No unread notifications, cleared alert state");
                Ok(CycleOutcome::Cleared)
            }
            Decision::Suppress { fingerprint } => {
                info!(
                    state = %GateState::Suppressed,
                    fingerprint = %fingerprint,
                    "No new notifications since last email, skipping"
                );
                Ok(CycleOutcome::Suppressed { fingerprint })
            }
            Decision::Send { fingerprint } => self.send_digest(&set, fingerprint).await,
        }
    }

    async fn send_digest(
        &self,
        set: &NotificationSet,
        fingerprint: Fingerprint,
    ) -> Result<CycleOutcome, CycleError> {
        let digest = DigestComposer::compose(set);
        debug!(state = %GateState::Sending, subject = %digest.subject, "Composed digest");

        self.transport
            .send(&self.config.from, &self.config.to, &digest)
            .await?;

        self.store.set(fingerprint.as_str()).await?;

        info!(
            unread_count = set.unread_count,
            fingerprint = %fingerprint,
            to = %self.config.to,
            "Notification email sent"
        );

        Ok(CycleOutcome::Sent {
            fingerprint,
            unread_count: set.unread_count,
        })
    }
}
