use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use tracing::{debug, warn};
use uuid::Uuid;

use loft_store::dedup::{Deduplicator, Ingest};
use loft_types::models::{ConversationKey, ContentError, Message, MessageId, validate_content};

use crate::backend::{BackendError, MessageBackend};

#[derive(Debug, thiserror::Error)]
pub enum SendError {
    #[error(transparent)]
    Content(#[from] ContentError),

    /// Another send from this sender is still in flight for this
    /// conversation. The input stays locked until it resolves.
    #[error("a send is already in flight for this conversation")]
    SendInFlight,

    /// The durable insert failed. `draft` carries the trimmed content so
    /// the UI can restore the input for a manual retry; nothing is retried
    /// automatically.
    #[error("send failed: {source}")]
    Transport {
        draft: String,
        source: BackendError,
    },
}

/// Manages the lifecycle of a user-initiated send: optimistic placeholder
/// immediately, exactly one durable insert, reconcile on success, roll back
/// on failure.
pub struct SendCoordinator {
    backend: Arc<dyn MessageBackend>,
    dedup: Deduplicator,
    in_flight: Mutex<HashSet<(ConversationKey, Uuid)>>,
}

impl SendCoordinator {
    pub fn new(backend: Arc<dyn MessageBackend>, dedup: Deduplicator) -> Self {
        Self {
            backend,
            dedup,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    /// Send `content` into the conversation. On success returns the durable
    /// id; on transport failure the placeholder is removed and the draft is
    /// handed back inside the error.
    pub async fn send(
        &self,
        key: ConversationKey,
        sender_id: Uuid,
        receiver_id: Option<Uuid>,
        content: &str,
    ) -> Result<MessageId, SendError> {
        // Validation rejects locally, before any state mutation.
        let content = validate_content(content)?.to_string();

        {
            let mut in_flight = self.in_flight.lock().expect("in-flight lock poisoned");
            if !in_flight.insert((key.clone(), sender_id)) {
                return Err(SendError::SendInFlight);
            }
        }

        let result = self
            .send_inner(&key, sender_id, receiver_id, content)
            .await;

        self.in_flight
            .lock()
            .expect("in-flight lock poisoned")
            .remove(&(key, sender_id));

        result
    }

    async fn send_inner(
        &self,
        key: &ConversationKey,
        sender_id: Uuid,
        receiver_id: Option<Uuid>,
        content: String,
    ) -> Result<MessageId, SendError> {
        // The placeholder shows in the UI before the network round-trip.
        let pending = Message::pending(key.clone(), sender_id, receiver_id, content.clone());
        let local_id = pending.id;
        self.dedup.store().append_or_replace(key, pending);
        debug!(%key, ?local_id, "optimistic placeholder inserted");

        match self.backend.insert(sender_id, receiver_id, &content).await {
            Ok(row) => {
                let durable_id = row.id;
                let outcome = self.dedup.ingest(row.into_message());
                if outcome == Ingest::Duplicate {
                    // The push path delivered this row first and already
                    // promoted (or outran) the placeholder. Make sure no
                    // pending entry is left behind.
                    self.dedup.store().remove(key, local_id);
                }
                debug!(%key, %durable_id, ?outcome, "send confirmed");
                Ok(MessageId::Durable(durable_id))
            }
            Err(source) => {
                self.dedup.store().remove(key, local_id);
                warn!(%key, error = %source, "durable insert failed, placeholder rolled back");
                Err(SendError::Transport {
                    draft: content,
                    source,
                })
            }
        }
    }
}
