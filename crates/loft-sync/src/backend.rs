//! Boundary traits for the external collaborators. The core is agnostic to
//! their transport as long as these contracts hold.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;
use uuid::Uuid;

use loft_types::events::PushEvent;
use loft_types::models::{ConversationKey, DurableMessage, Profile};

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("insert rejected: {0}")]
    Rejected(String),
}

/// The durable message store, reached over the network.
#[async_trait]
pub trait MessageBackend: Send + Sync {
    /// Durably insert one message. Returns the server-assigned row with its
    /// stable id and timestamp.
    async fn insert(
        &self,
        sender_id: Uuid,
        receiver_id: Option<Uuid>,
        content: &str,
    ) -> Result<DurableMessage, BackendError>;

    /// Stored history for a conversation, oldest first.
    async fn history(&self, key: &ConversationKey) -> Result<Vec<DurableMessage>, BackendError>;
}

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("push channel setup failed: {0}")]
    Setup(String),
}

/// Server-to-client notification stream for durable inserts.
#[async_trait]
pub trait PushChannel: Send + Sync {
    /// Open a stream filtered to `key`. The stream ending means the channel
    /// dropped server-side; callers treat that as degradation to fetch-only
    /// mode, not as an error.
    async fn open(
        &self,
        key: &ConversationKey,
    ) -> Result<mpsc::Receiver<PushEvent>, ChannelError>;
}

/// Profile lookup, used only to decorate messages for display.
#[async_trait]
pub trait ProfileLookup: Send + Sync {
    async fn profile(&self, user_id: Uuid) -> Result<Profile, BackendError>;
}
