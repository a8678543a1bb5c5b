//! In-memory collaborators for exercising the reconciliation flows without
//! a network.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::mpsc;
use uuid::Uuid;

use loft_store::dedup::Deduplicator;
use loft_sync::backend::{
    BackendError, ChannelError, MessageBackend, ProfileLookup, PushChannel,
};
use loft_types::events::PushEvent;
use loft_types::models::{ConversationKey, DurableMessage, Profile};

/// In-memory durable store with test knobs.
#[derive(Default)]
pub struct MockBackend {
    pub rows: Mutex<Vec<DurableMessage>>,
    /// Reject the next insert with a transport-level error.
    pub fail_next_insert: AtomicBool,
    /// Simulate a push notification outrunning the insert response: every
    /// insert is ingested here before the response returns.
    pub mirror: Mutex<Option<Deduplicator>>,
    /// Artificial latency applied to inserts.
    pub insert_delay: Mutex<Option<Duration>>,
    /// Artificial latency applied to history fetches for one conversation.
    pub history_delay: Mutex<Option<(ConversationKey, Duration)>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, row: DurableMessage) {
        self.rows.lock().unwrap().push(row);
    }
}

pub fn chatroom_row(sender: Uuid, content: &str) -> DurableMessage {
    DurableMessage {
        id: Uuid::new_v4(),
        sender_id: sender,
        receiver_id: None,
        content: content.into(),
        created_at: Utc::now(),
    }
}

pub fn direct_row(sender: Uuid, receiver: Uuid, content: &str) -> DurableMessage {
    DurableMessage {
        id: Uuid::new_v4(),
        sender_id: sender,
        receiver_id: Some(receiver),
        content: content.into(),
        created_at: Utc::now(),
    }
}

#[async_trait]
impl MessageBackend for MockBackend {
    async fn insert(
        &self,
        sender_id: Uuid,
        receiver_id: Option<Uuid>,
        content: &str,
    ) -> Result<DurableMessage, BackendError> {
        let delay = *self.insert_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.fail_next_insert.swap(false, Ordering::SeqCst) {
            return Err(BackendError::Rejected("insert rejected by test".into()));
        }

        let row = DurableMessage {
            id: Uuid::new_v4(),
            sender_id,
            receiver_id,
            content: content.into(),
            created_at: Utc::now(),
        };
        self.rows.lock().unwrap().push(row.clone());

        let mirror = self.mirror.lock().unwrap().clone();
        if let Some(dedup) = mirror {
            dedup.ingest(row.clone().into_message());
        }

        Ok(row)
    }

    async fn history(&self, key: &ConversationKey) -> Result<Vec<DurableMessage>, BackendError> {
        let delay = self.history_delay.lock().unwrap().clone();
        if let Some((delayed_key, delay)) = delay {
            if delayed_key == *key {
                tokio::time::sleep(delay).await;
            }
        }

        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|row| row.conversation_key() == *key)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ProfileLookup for MockBackend {
    async fn profile(&self, user_id: Uuid) -> Result<Profile, BackendError> {
        Ok(Profile {
            display_name: format!("user-{}", &user_id.to_string()[..8]),
            avatar_ref: None,
        })
    }
}

/// Push channel that hands out plain mpsc receivers and keeps every sender
/// so tests can inject events and observe teardown.
#[derive(Default)]
pub struct MockChannel {
    pub senders: Mutex<Vec<mpsc::Sender<PushEvent>>>,
    /// Artificial setup latency, consumed one entry per `open` call.
    pub open_delays: Mutex<VecDeque<Duration>>,
}

impl MockChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sender(&self, index: usize) -> mpsc::Sender<PushEvent> {
        self.senders.lock().unwrap()[index].clone()
    }

    pub fn open_count(&self) -> usize {
        self.senders.lock().unwrap().len()
    }

    pub fn delay_opens(&self, delays: &[Duration]) {
        self.open_delays.lock().unwrap().extend(delays.iter().copied());
    }
}

#[async_trait]
impl PushChannel for MockChannel {
    async fn open(
        &self,
        _key: &ConversationKey,
    ) -> Result<mpsc::Receiver<PushEvent>, ChannelError> {
        let delay = self.open_delays.lock().unwrap().pop_front();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let (tx, rx) = mpsc::channel(16);
        self.senders.lock().unwrap().push(tx);
        Ok(rx)
    }
}

pub fn push_event_for(row: &DurableMessage) -> PushEvent {
    PushEvent::MessageCreate {
        id: row.id,
        sender_id: row.sender_id,
        receiver_id: row.receiver_id,
        content: row.content.clone(),
        created_at: row.created_at,
    }
}
