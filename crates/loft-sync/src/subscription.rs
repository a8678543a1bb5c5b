use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use loft_store::dedup::Deduplicator;
use loft_types::models::ConversationKey;

use crate::backend::{ChannelError, PushChannel};

/// Handle identifying one subscription. Returned by `subscribe` and
/// required by `unsubscribe`; a handle from a superseded subscription is
/// recognized and ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionHandle {
    conn_id: Uuid,
    key: ConversationKey,
}

struct ActiveSubscription {
    conn_id: Uuid,
    epoch: u64,
    key: ConversationKey,
    reader: JoinHandle<()>,
}

/// Owns the push-channel connection for the currently viewed conversation.
///
/// At most one subscription is active at a time. Subscribing again — e.g.
/// when the user navigates to a different conversation — tears the prior
/// one down first, so a leaked channel can never deliver cross-conversation
/// events. Every received event is routed through the deduplicator.
pub struct SubscriptionManager {
    channel: Arc<dyn PushChannel>,
    dedup: Deduplicator,
    active: Mutex<Option<ActiveSubscription>>,
    epoch: AtomicU64,
}

impl SubscriptionManager {
    pub fn new(channel: Arc<dyn PushChannel>, dedup: Deduplicator) -> Self {
        Self {
            channel,
            dedup,
            active: Mutex::new(None),
            epoch: AtomicU64::new(0),
        }
    }

    /// Open the push channel for `key`, tearing down any prior subscription
    /// first.
    pub async fn subscribe(
        &self,
        key: ConversationKey,
    ) -> Result<SubscriptionHandle, ChannelError> {
        // Claim an epoch before the open suspends, so when two subscribes
        // race across that await the later call wins installation.
        let epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        self.teardown_active();

        let mut rx = self.channel.open(&key).await?;
        let conn_id = Uuid::new_v4();

        let dedup = self.dedup.clone();
        let reader_key = key.clone();
        let reader = tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                // The event carries its own participants; derive the key
                // from those rather than trusting the filter.
                dedup.ingest(event.into_message());
            }
            // Stream ended: the channel dropped server-side. Degrade to
            // fetch-only; the poll fallback bounds staleness.
            warn!(%reader_key, "push channel closed, degrading to fetch-only");
        });

        let sub = ActiveSubscription {
            conn_id,
            epoch,
            key: key.clone(),
            reader,
        };

        let mut active = self.active.lock().expect("subscription lock poisoned");
        match active.as_ref() {
            // A later subscribe finished while this open was in flight:
            // this one lost the race and must not clobber it. The handle
            // returned is inert (unsubscribe ignores its conn_id).
            Some(current) if current.epoch > epoch => {
                sub.reader.abort();
                debug!(%key, "subscription superseded before it was installed");
            }
            _ => {
                if let Some(prev) = active.replace(sub) {
                    prev.reader.abort();
                    debug!(key = %prev.key, "tore down superseded subscription");
                }
                info!(%key, "push subscription established");
            }
        }

        Ok(SubscriptionHandle { conn_id, key })
    }

    /// Tear down the subscription identified by `handle`. Idempotent: a
    /// repeated call, or a handle from a subscription that has already been
    /// superseded, is a no-op.
    pub fn unsubscribe(&self, handle: &SubscriptionHandle) {
        let mut active = self.active.lock().expect("subscription lock poisoned");
        match active.take() {
            Some(sub) if sub.conn_id == handle.conn_id => {
                sub.reader.abort();
                debug!(key = %sub.key, "push subscription torn down");
            }
            // Stale or already-released handle: put the current one back.
            other => *active = other,
        }
    }

    /// Whether a subscription is currently active (any conversation).
    pub fn is_subscribed(&self) -> bool {
        self.active
            .lock()
            .expect("subscription lock poisoned")
            .is_some()
    }

    fn teardown_active(&self) {
        let taken = self
            .active
            .lock()
            .expect("subscription lock poisoned")
            .take();
        if let Some(sub) = taken {
            sub.reader.abort();
            debug!(key = %sub.key, "tore down prior subscription before re-subscribing");
        }
    }
}

impl Drop for SubscriptionManager {
    fn drop(&mut self) {
        self.teardown_active();
    }
}
