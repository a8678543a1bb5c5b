use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{ConversationKey, DurableMessage, Message};

/// Events pushed from the gateway to the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum PushEvent {
    /// A message was durably inserted.
    MessageCreate {
        id: Uuid,
        sender_id: Uuid,
        receiver_id: Option<Uuid>,
        content: String,
        created_at: chrono::DateTime<chrono::Utc>,
    },
}

impl PushEvent {
    /// Normalize the push payload into the internal message shape.
    pub fn into_message(self) -> Message {
        match self {
            Self::MessageCreate {
                id,
                sender_id,
                receiver_id,
                content,
                created_at,
            } => DurableMessage {
                id,
                sender_id,
                receiver_id,
                content,
                created_at,
            }
            .into_message(),
        }
    }
}

/// Commands sent from client to gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayCommand {
    /// Scope the push stream to a single conversation (or the chatroom).
    /// The gateway only forwards inserts matching the key.
    Subscribe { key: ConversationKey },
}
