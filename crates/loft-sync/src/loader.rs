use std::sync::{Arc, Mutex};

use tracing::{debug, info};

use loft_store::dedup::{Deduplicator, Ingest};
use loft_types::models::ConversationKey;

use crate::backend::{BackendError, MessageBackend};

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// The view shows an error state with a manual retry; other
    /// conversations are unaffected.
    #[error("history fetch failed: {0}")]
    Fetch(#[from] BackendError),
}

/// Loads conversation history when a view mounts.
///
/// A fetch that resolves after the user has navigated elsewhere is
/// discarded: the result is only applied if its conversation is still the
/// active one.
pub struct ConversationLoader {
    backend: Arc<dyn MessageBackend>,
    dedup: Deduplicator,
    active: Mutex<Option<ConversationKey>>,
}

impl ConversationLoader {
    pub fn new(backend: Arc<dyn MessageBackend>, dedup: Deduplicator) -> Self {
        Self {
            backend,
            dedup,
            active: Mutex::new(None),
        }
    }

    /// Mark `key` as the conversation currently on screen.
    pub fn activate(&self, key: ConversationKey) {
        *self.active.lock().expect("active-conversation lock poisoned") = Some(key);
    }

    /// No conversation on screen; in-flight fetches become stale.
    pub fn deactivate(&self) {
        *self.active.lock().expect("active-conversation lock poisoned") = None;
    }

    fn is_active(&self, key: &ConversationKey) -> bool {
        self.active
            .lock()
            .expect("active-conversation lock poisoned")
            .as_ref()
            == Some(key)
    }

    /// Activate `key` and fetch its history. Returns how many messages were
    /// newly applied to the store.
    pub async fn load(&self, key: ConversationKey) -> Result<usize, LoadError> {
        self.activate(key.clone());
        self.fetch_and_apply(key).await
    }

    /// Re-fetch without changing which conversation is active. No-op when
    /// `key` is no longer on screen. Used by the poll fallback.
    pub async fn refresh(&self, key: ConversationKey) -> Result<usize, LoadError> {
        if !self.is_active(&key) {
            return Ok(0);
        }
        self.fetch_and_apply(key).await
    }

    async fn fetch_and_apply(&self, key: ConversationKey) -> Result<usize, LoadError> {
        let rows = self.backend.history(&key).await?;

        // Stale-response guard: the user may have navigated away while the
        // fetch was in flight.
        if !self.is_active(&key) {
            debug!(%key, "discarding stale history fetch");
            return Ok(0);
        }

        // History goes through the deduplicator like every other network
        // source, so rows already known (via push or insert response) are
        // dropped and pending placeholders get matched.
        let mut applied = 0;
        for row in rows {
            if self.dedup.ingest(row.into_message()) != Ingest::Duplicate {
                applied += 1;
            }
        }
        info!(%key, applied, "history loaded");
        Ok(applied)
    }
}
