//! End-to-end cycle behavior against in-memory collaborators.

use async_trait::async_trait;
use lettre::Message;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use notify_digest::{
    AlertStateStore, CycleError, CycleOutcome, EmailTransport, KeyValueStore, MemoryStore,
    NotificationItem, NotificationSet, NotificationSource, OutboundMailer, Pipeline,
    PipelineConfig, SourceError, StoreError, TransportError, LAST_NOTIFIED_KEY,
};

// =============================================================================
// Fakes
// =============================================================================

/// Returns queued snapshots in order; the last one repeats.
struct ScriptedSource {
    responses: Mutex<VecDeque<Result<NotificationSet, ()>>>,
    last: Mutex<Option<NotificationSet>>,
}

impl ScriptedSource {
    fn new(responses: Vec<Result<NotificationSet, ()>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            last: Mutex::new(None),
        }
    }
}

#[async_trait]
impl NotificationSource for ScriptedSource {
    async fn fetch_unread(&self) -> Result<NotificationSet, SourceError> {
        let next = self.responses.lock().unwrap().pop_front();
        match next {
            Some(Ok(set)) => {
                *self.last.lock().unwrap() = Some(set.clone());
                Ok(set)
            }
            Some(Err(())) => Err(SourceError::MissingData),
            None => self
                .last
                .lock()
                .unwrap()
                .clone()
                .ok_or(SourceError::MissingData),
        }
    }
}

/// Records every delivered message; can be switched to fail.
#[derive(Default)]
struct RecordingMailer {
    sent: Mutex<Vec<String>>,
    failing: AtomicBool,
    delay: Option<Duration>,
}

impl RecordingMailer {
    fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    fn last(&self) -> String {
        self.sent.lock().unwrap().last().cloned().unwrap_or_default()
    }
}

#[async_trait]
impl OutboundMailer for RecordingMailer {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn deliver(&self, message: Message) -> Result<(), TransportError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(TransportError::Delivery("relay unavailable".to_string()));
        }
        let raw = String::from_utf8(message.formatted()).unwrap();
        self.sent.lock().unwrap().push(raw);
        Ok(())
    }
}

/// Memory store whose reads or writes can be made to fail.
#[derive(Default)]
struct FlakyStore {
    inner: MemoryStore,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    writes: AtomicUsize,
}

#[async_trait]
impl KeyValueStore for FlakyStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Other("read timed out".to_string()));
        }
        self.inner.get(key).await
    }

    async fn put(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Other("disk full".to_string()));
        }
        self.inner.put(key, value).await
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Other("disk full".to_string()));
        }
        self.inner.delete(key).await
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn unread(ids: &[&str]) -> NotificationSet {
    NotificationSet::from_items(
        ids.iter()
            .map(|id| NotificationItem::unread(*id, format!("message {id}")))
            .collect(),
    )
}

fn empty() -> NotificationSet {
    NotificationSet::new(0, vec![])
}

struct Harness {
    pipeline: Arc<Pipeline>,
    mailer: Arc<RecordingMailer>,
    store: Arc<FlakyStore>,
}

impl Harness {
    fn new(responses: Vec<Result<NotificationSet, ()>>) -> Self {
        Self::with_mailer(responses, RecordingMailer::default())
    }

    fn with_mailer(responses: Vec<Result<NotificationSet, ()>>, mailer: RecordingMailer) -> Self {
        let mailer = Arc::new(mailer);
        let store = Arc::new(FlakyStore::default());
        let pipeline = Pipeline::new(
            PipelineConfig::default(),
            Arc::new(ScriptedSource::new(responses)),
            AlertStateStore::new(store.clone()),
            EmailTransport::new(mailer.clone()),
        );
        Self {
            pipeline: Arc::new(pipeline),
            mailer,
            store,
        }
    }

    async fn stored(&self) -> Option<String> {
        self.store.get(LAST_NOTIFIED_KEY).await.unwrap()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[tokio::test]
async fn test_end_to_end_send_suppress_clear() {
    let h = Harness::new(vec![
        Ok(unread(&["n1", "n2"])),
        Ok(unread(&["n1", "n2"])),
        Ok(empty()),
    ]);

    let first = h.pipeline.run_cycle().await.unwrap();
    assert!(matches!(first, CycleOutcome::Sent { unread_count: 2, .. }));
    assert_eq!(h.mailer.count(), 1);
    assert!(h.mailer.last().contains("2 unread notifications"));
    assert_eq!(h.stored().await.as_deref(), Some("n1,n2"));

    let second = h.pipeline.run_cycle().await.unwrap();
    assert!(matches!(second, CycleOutcome::Suppressed { .. }));
    assert_eq!(h.mailer.count(), 1);
    assert_eq!(h.stored().await.as_deref(), Some("n1,n2"));

    let third = h.pipeline.run_cycle().await.unwrap();
    assert_eq!(third, CycleOutcome::Cleared);
    assert_eq!(h.mailer.count(), 1);
    assert_eq!(h.stored().await, None);
}

#[tokio::test]
async fn test_changed_set_resends_in_both_directions() {
    let h = Harness::new(vec![
        Ok(unread(&["n1"])),
        Ok(unread(&["n1", "n2", "n3"])),
        Ok(unread(&["n3"])),
    ]);

    for _ in 0..3 {
        h.pipeline.run_cycle().await.unwrap();
    }

    assert_eq!(h.mailer.count(), 3);
    assert!(h.mailer.last().contains("1 unread notification"));
    assert_eq!(h.stored().await.as_deref(), Some("n3"));
}

#[tokio::test]
async fn test_reordered_ids_are_suppressed() {
    let h = Harness::new(vec![Ok(unread(&["b", "a", "c"])), Ok(unread(&["c", "b", "a"]))]);

    h.pipeline.run_cycle().await.unwrap();
    let second = h.pipeline.run_cycle().await.unwrap();

    assert!(matches!(second, CycleOutcome::Suppressed { .. }));
    assert_eq!(h.mailer.count(), 1);
    assert_eq!(h.stored().await.as_deref(), Some("a,b,c"));
}

#[tokio::test]
async fn test_reappearing_set_after_clear_alerts_again() {
    let h = Harness::new(vec![
        Ok(unread(&["n1"])),
        Ok(empty()),
        Ok(unread(&["n1"])),
    ]);

    for _ in 0..3 {
        h.pipeline.run_cycle().await.unwrap();
    }

    assert_eq!(h.mailer.count(), 2);
    assert_eq!(h.stored().await.as_deref(), Some("n1"));
}

#[tokio::test]
async fn test_failed_send_does_not_advance_state() {
    let h = Harness::new(vec![Ok(unread(&["n1", "n2"]))]);
    h.mailer.failing.store(true, Ordering::SeqCst);

    let err = h.pipeline.run_cycle().await.unwrap_err();
    assert!(matches!(err, CycleError::TransportFailure(_)));
    assert_eq!(h.stored().await, None);
    assert_eq!(h.store.writes.load(Ordering::SeqCst), 0);

    h.mailer.failing.store(false, Ordering::SeqCst);
    let retry = h.pipeline.run_cycle().await.unwrap();
    assert!(matches!(retry, CycleOutcome::Sent { .. }));
    assert_eq!(h.mailer.count(), 1);
    assert_eq!(h.stored().await.as_deref(), Some("n1,n2"));
}

#[tokio::test]
async fn test_source_failure_leaves_state_untouched() {
    let h = Harness::new(vec![Ok(unread(&["n1"])), Err(())]);

    h.pipeline.run_cycle().await.unwrap();
    let err = h.pipeline.run_cycle().await.unwrap_err();

    assert!(matches!(err, CycleError::SourceUnavailable(_)));
    assert_eq!(h.store.writes.load(Ordering::SeqCst), 1);
    assert_eq!(h.stored().await.as_deref(), Some("n1"));
}

#[tokio::test]
async fn test_store_write_failure_after_send_retries_next_cycle() {
    let h = Harness::new(vec![Ok(unread(&["n1"]))]);
    h.store.fail_writes.store(true, Ordering::SeqCst);

    let err = h.pipeline.run_cycle().await.unwrap_err();
    assert!(matches!(err, CycleError::StoreFailure(_)));
    assert_eq!(h.mailer.count(), 1);

    // At-least-once: the alert goes out again rather than being lost.
    h.store.fail_writes.store(false, Ordering::SeqCst);
    h.pipeline.run_cycle().await.unwrap();
    assert_eq!(h.mailer.count(), 2);
    assert_eq!(h.stored().await.as_deref(), Some("n1"));
}

#[tokio::test]
async fn test_store_read_failure_sends_nothing() {
    let h = Harness::new(vec![Ok(unread(&["n1"]))]);
    h.store.fail_reads.store(true, Ordering::SeqCst);

    let err = h.pipeline.run_cycle().await.unwrap_err();
    assert!(matches!(err, CycleError::StoreFailure(_)));
    assert_eq!(err.kind(), "store_failure");
    assert_eq!(h.mailer.count(), 0);
    assert_eq!(h.store.writes.load(Ordering::SeqCst), 0);

    h.store.fail_reads.store(false, Ordering::SeqCst);
    assert_eq!(h.stored().await, None);
}

#[tokio::test]
async fn test_failed_clear_surfaces_and_keeps_state() {
    let h = Harness::new(vec![Ok(unread(&["n1"])), Ok(empty())]);
    h.pipeline.run_cycle().await.unwrap();
    h.store.fail_writes.store(true, Ordering::SeqCst);

    let err = h.pipeline.run_cycle().await.unwrap_err();
    assert!(matches!(err, CycleError::StoreFailure(_)));
    assert_eq!(h.mailer.count(), 1);
    assert_eq!(h.stored().await.as_deref(), Some("n1"));

    // The next empty poll clears once the store recovers.
    h.store.fail_writes.store(false, Ordering::SeqCst);
    assert_eq!(h.pipeline.run_cycle().await.unwrap(), CycleOutcome::Cleared);
    assert_eq!(h.stored().await, None);
}

#[tokio::test]
async fn test_count_without_listed_items_sends_once() {
    let h = Harness::new(vec![Ok(NotificationSet::new(3, vec![]))]);

    let first = h.pipeline.run_cycle().await.unwrap();
    match first {
        CycleOutcome::Sent {
            fingerprint,
            unread_count,
        } => {
            assert_eq!(fingerprint.as_str(), "");
            assert_eq!(unread_count, 3);
        }
        other => panic!("expected a send, got {other:?}"),
    }
    assert!(h.mailer.last().contains("3 unread notifications"));
    assert_eq!(h.stored().await.as_deref(), Some(""));

    let second = h.pipeline.run_cycle().await.unwrap();
    assert!(matches!(second, CycleOutcome::Suppressed { .. }));
    assert_eq!(h.mailer.count(), 1);
}

#[tokio::test]
async fn test_clear_is_idempotent_without_state() {
    let h = Harness::new(vec![Ok(empty()), Ok(empty())]);

    assert_eq!(h.pipeline.run_cycle().await.unwrap(), CycleOutcome::Cleared);
    assert_eq!(h.pipeline.run_cycle().await.unwrap(), CycleOutcome::Cleared);
    assert_eq!(h.mailer.count(), 0);
}

#[tokio::test]
async fn test_overlapping_cycles_send_once() {
    let mailer = RecordingMailer {
        delay: Some(Duration::from_millis(50)),
        ..RecordingMailer::default()
    };
    let h = Harness::with_mailer(vec![Ok(unread(&["n1", "n2"]))], mailer);

    let a = tokio::spawn({
        let pipeline = h.pipeline.clone();
        async move { pipeline.run_cycle().await }
    });
    let b = tokio::spawn({
        let pipeline = h.pipeline.clone();
        async move { pipeline.run_cycle().await }
    });

    let outcomes = [a.await.unwrap().unwrap(), b.await.unwrap().unwrap()];

    assert_eq!(h.mailer.count(), 1);
    assert_eq!(
        outcomes
            .iter()
            .filter(|o| matches!(o, CycleOutcome::Suppressed { .. }))
            .count(),
        1
    );
}

#[tokio::test]
async fn test_read_items_do_not_count_towards_fingerprint() {
    let h = Harness::new(vec![
        Ok(NotificationSet::new(
            1,
            vec![
                NotificationItem::unread("n2", "new"),
                NotificationItem::unread("n1", "old").read(),
            ],
        )),
        Ok(NotificationSet::new(
            2,
            vec![
                NotificationItem::unread("n2", "new"),
                NotificationItem::unread("n1", "old, unread again"),
            ],
        )),
    ]);

    h.pipeline.run_cycle().await.unwrap();
    assert_eq!(h.stored().await.as_deref(), Some("n2"));

    h.pipeline.run_cycle().await.unwrap();
    assert_eq!(h.mailer.count(), 2);
    assert_eq!(h.stored().await.as_deref(), Some("n1,n2"));
}
