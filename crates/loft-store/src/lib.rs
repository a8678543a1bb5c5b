//! In-memory conversation state shared between the send path and the
//! push path. The store is the single source of truth for what the UI
//! renders.

pub mod dedup;

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::Duration;
use uuid::Uuid;

use loft_types::models::{ConversationKey, Message, MessageId, MessageStatus};

use crate::dedup::Ingest;

/// Summary row for the conversation list view.
#[derive(Debug, Clone)]
pub struct ConversationSummary {
    pub key: ConversationKey,
    pub last_message: Message,
    /// The participant that is not the viewer, for direct conversations.
    pub other_participant: Option<Uuid>,
}

/// Clone-shared handle over all loaded conversations.
///
/// Every mutating operation takes the lock exactly once, so callers never
/// observe a half-applied update, and the store never holds two entries for
/// the same durable id.
#[derive(Clone, Default)]
pub struct ConversationStore {
    inner: Arc<RwLock<HashMap<ConversationKey, Vec<Message>>>>,
}

impl ConversationStore {
    /// Fresh store for a new session. Views receive a clone of this handle
    /// rather than reaching for a global.
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop all conversation state. Called on session end.
    pub fn clear(&self) {
        self.inner
            .write()
            .expect("conversation store lock poisoned")
            .clear();
    }

    /// Messages currently known for `key`, in display order. Empty if the
    /// conversation has not been loaded. Never blocks on I/O.
    pub fn messages(&self, key: &ConversationKey) -> Vec<Message> {
        self.inner
            .read()
            .expect("conversation store lock poisoned")
            .get(key)
            .cloned()
            .unwrap_or_default()
    }

    /// Insert `message` at its sorted position. If a message with the same
    /// id is already present this is a no-op; the caller learns nothing new
    /// happened from the `false` return.
    pub fn append_or_replace(&self, key: &ConversationKey, message: Message) -> bool {
        let mut map = self.inner.write().expect("conversation store lock poisoned");
        let messages = map.entry(key.clone()).or_default();

        if messages.iter().any(|m| m.id == message.id) {
            return false;
        }
        sorted_insert(messages, message);
        true
    }

    /// Replace the pending placeholder `local_id` with `confirmed`, moving
    /// it to the position its confirmed timestamp dictates. If the
    /// placeholder no longer exists the confirmation is inserted fresh — a
    /// legitimate confirmation is never dropped.
    pub fn promote(&self, key: &ConversationKey, local_id: MessageId, confirmed: Message) {
        let mut map = self.inner.write().expect("conversation store lock poisoned");
        let messages = map.entry(key.clone()).or_default();

        // The push path may have delivered the same durable row already;
        // in that case only the placeholder needs to go.
        let already_confirmed = messages.iter().any(|m| m.id == confirmed.id);

        if let Some(pos) = messages.iter().position(|m| m.id == local_id) {
            messages.remove(pos);
        }
        if !already_confirmed {
            sorted_insert(messages, confirmed);
        }
    }

    /// Remove a pending/failed placeholder, e.g. on send failure. Returns
    /// whether it existed.
    pub fn remove(&self, key: &ConversationKey, local_id: MessageId) -> bool {
        let mut map = self.inner.write().expect("conversation store lock poisoned");
        let Some(messages) = map.get_mut(key) else {
            return false;
        };
        match messages.iter().position(|m| m.id == local_id) {
            Some(pos) => {
                messages.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Whether a confirmed entry with this durable id is present.
    pub fn contains_durable(&self, key: &ConversationKey, id: Uuid) -> bool {
        self.inner
            .read()
            .expect("conversation store lock poisoned")
            .get(key)
            .is_some_and(|messages| messages.iter().any(|m| m.id.durable() == Some(id)))
    }

    /// Conversation list metadata for `viewer`, most recent activity first.
    pub fn conversations(&self, viewer: Uuid) -> Vec<ConversationSummary> {
        let map = self.inner.read().expect("conversation store lock poisoned");
        let mut summaries: Vec<ConversationSummary> = map
            .iter()
            .filter_map(|(key, messages)| {
                let last = messages.last()?;
                Some(ConversationSummary {
                    key: key.clone(),
                    last_message: last.clone(),
                    other_participant: key.other_participant(viewer),
                })
            })
            .collect();
        summaries.sort_by(|x, y| y.last_message.created_at.cmp(&x.last_message.created_at));
        summaries
    }

    /// Composite reconcile step used by the deduplicator. Runs the
    /// duplicate check, the pending match, and the resulting mutation under
    /// a single lock acquisition so the two delivery paths cannot
    /// interleave inside it.
    pub(crate) fn reconcile(&self, confirmed: Message, window: Duration) -> Ingest {
        let key = confirmed.conversation.clone();
        let mut map = self.inner.write().expect("conversation store lock poisoned");
        let messages = map.entry(key).or_default();

        if messages.iter().any(|m| m.id == confirmed.id) {
            return Ingest::Duplicate;
        }

        // Match a pending placeholder by sender and content within the
        // recency window. The window is symmetric: the placeholder carries
        // the local clock, the confirmation the server clock, and either
        // may be ahead of the other.
        let matched = messages.iter().position(|m| {
            m.status == MessageStatus::Pending
                && m.sender_id == confirmed.sender_id
                && m.content == confirmed.content
                && (confirmed.created_at - m.created_at).abs() <= window
        });

        match matched {
            Some(pos) => {
                let local_id = messages[pos].id;
                messages.remove(pos);
                sorted_insert(messages, confirmed);
                Ingest::Promoted(local_id)
            }
            None => {
                sorted_insert(messages, confirmed);
                Ingest::Appended
            }
        }
    }
}

/// Insert keeping `created_at` order; equal timestamps keep arrival order
/// (the new message goes after existing ties).
fn sorted_insert(messages: &mut Vec<Message>, message: Message) {
    let pos = messages.partition_point(|m| m.created_at <= message.created_at);
    messages.insert(pos, message);
}
