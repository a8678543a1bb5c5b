//! Merges the two delivery paths — the direct insert response and the push
//! subscription — into the store without duplicating or dropping messages.

use chrono::Duration;
use tracing::{debug, trace};

use loft_types::models::{Message, MessageId};

use crate::ConversationStore;

/// How far apart a pending placeholder and an incoming confirmation may be
/// and still match. Wide enough to absorb a slow round-trip, narrow enough
/// not to swallow an unrelated later message with identical content.
pub const DEFAULT_RECENCY_WINDOW_SECS: i64 = 30;

/// Outcome of ingesting one confirmed message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ingest {
    /// The durable id was already present; the copy was discarded.
    Duplicate,
    /// A pending placeholder matched and was replaced in place.
    Promoted(MessageId),
    /// No placeholder matched; inserted as a genuinely new message.
    Appended,
}

/// Sole write entry point for messages arriving from the network.
///
/// Optimistic placeholders are the one permitted bypass: the send
/// coordinator writes those to the store directly, and this deduplicator
/// later matches them against their confirmations.
#[derive(Clone)]
pub struct Deduplicator {
    store: ConversationStore,
    window: Duration,
}

impl Deduplicator {
    pub fn new(store: ConversationStore) -> Self {
        Self::with_window(store, Duration::seconds(DEFAULT_RECENCY_WINDOW_SECS))
    }

    /// Recency window override, mainly for tests.
    pub fn with_window(store: ConversationStore, window: Duration) -> Self {
        Self { store, window }
    }

    pub fn store(&self) -> &ConversationStore {
        &self.store
    }

    /// Classify one confirmed message and apply it to the store:
    ///
    /// 1. durable id already present -> discard as a duplicate;
    /// 2. a pending entry with the same sender and content, created within
    ///    the recency window -> treat as its confirmation and promote;
    /// 3. otherwise -> append as a new message.
    ///
    /// Matching on (sender, content, recency) is a heuristic: without a
    /// client-generated correlation id, two identical messages sent in
    /// rapid succession by the same sender can be misattributed. The store
    /// still never holds more entries than durable rows exist.
    pub fn ingest(&self, message: Message) -> Ingest {
        let key = message.conversation.clone();
        let outcome = self.store.reconcile(message, self.window);
        match outcome {
            Ingest::Duplicate => trace!(%key, "discarded duplicate delivery"),
            Ingest::Promoted(local_id) => {
                debug!(%key, ?local_id, "promoted pending message to confirmed")
            }
            Ingest::Appended => trace!(%key, "appended new message"),
        }
        outcome
    }
}
