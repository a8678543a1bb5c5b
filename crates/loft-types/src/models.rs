use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Maximum length of a message body, in characters.
pub const MAX_MESSAGE_LEN: usize = 1000;

/// Identity of a single message.
///
/// A `Local` id is a placeholder minted on this client before the durable
/// store has confirmed the insert. A `Durable` id is the stable identity
/// assigned by the store. The tag lets the deduplicator recognize
/// not-yet-confirmed entries without inspecting anything else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum MessageId {
    Local(Uuid),
    Durable(Uuid),
}

impl MessageId {
    pub fn new_local() -> Self {
        Self::Local(Uuid::new_v4())
    }

    pub fn is_local(&self) -> bool {
        matches!(self, Self::Local(_))
    }

    /// The durable identity, if this message has been confirmed.
    pub fn durable(&self) -> Option<Uuid> {
        match self {
            Self::Durable(id) => Some(*id),
            Self::Local(_) => None,
        }
    }
}

/// Deterministic key grouping messages of one conversation.
///
/// A direct conversation is keyed by the unordered participant pair —
/// `direct(a, b)` and `direct(b, a)` produce the same key. The chatroom is
/// a single well-known key shared by everyone.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum ConversationKey {
    Direct { a: Uuid, b: Uuid },
    Chatroom,
}

impl ConversationKey {
    /// Key for the direct conversation between `x` and `y`, participant
    /// order irrelevant.
    pub fn direct(x: Uuid, y: Uuid) -> Self {
        if x <= y {
            Self::Direct { a: x, b: y }
        } else {
            Self::Direct { a: y, b: x }
        }
    }

    /// The participant that is not `me`, for the conversation list view.
    /// `None` for the chatroom or when `me` is not part of the pair.
    pub fn other_participant(&self, me: Uuid) -> Option<Uuid> {
        match self {
            Self::Direct { a, b } if *a == me => Some(*b),
            Self::Direct { a, b } if *b == me => Some(*a),
            _ => None,
        }
    }
}

impl fmt::Display for ConversationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Direct { a, b } => write!(f, "{}:{}", a, b),
            Self::Chatroom => write!(f, "chatroom"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    /// Optimistic, not yet confirmed by the durable store.
    Pending,
    /// Durably stored; identity and timestamp are authoritative.
    Confirmed,
    /// Insert rejected; eligible for removal or manual retry.
    Failed,
}

/// A single chat or direct-message entry as held in the conversation store.
///
/// Messages from every origin (optimistic insert, insert response, push
/// event, history row) are normalized into this one shape at the boundary,
/// so nothing downstream branches on where a message came from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub conversation: ConversationKey,
    pub sender_id: Uuid,
    pub receiver_id: Option<Uuid>,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub status: MessageStatus,
}

impl Message {
    /// Optimistic placeholder: local id, local clock, `Pending`.
    pub fn pending(
        conversation: ConversationKey,
        sender_id: Uuid,
        receiver_id: Option<Uuid>,
        content: String,
    ) -> Self {
        Self {
            id: MessageId::new_local(),
            conversation,
            sender_id,
            receiver_id,
            content,
            created_at: Utc::now(),
            status: MessageStatus::Pending,
        }
    }
}

/// A message row as confirmed by the durable store. Both delivery paths —
/// the direct insert response and the push subscription — produce this.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DurableMessage {
    pub id: Uuid,
    pub sender_id: Uuid,
    pub receiver_id: Option<Uuid>,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl DurableMessage {
    /// The conversation this row belongs to, derived from its participants.
    pub fn conversation_key(&self) -> ConversationKey {
        match self.receiver_id {
            Some(receiver) => ConversationKey::direct(self.sender_id, receiver),
            None => ConversationKey::Chatroom,
        }
    }

    /// Normalize into the internal message shape, status `Confirmed`.
    pub fn into_message(self) -> Message {
        let conversation = self.conversation_key();
        Message {
            id: MessageId::Durable(self.id),
            conversation,
            sender_id: self.sender_id,
            receiver_id: self.receiver_id,
            content: self.content,
            created_at: self.created_at,
            status: MessageStatus::Confirmed,
        }
    }
}

/// Display decoration fetched from the profile service. Not part of the
/// consistency logic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub display_name: String,
    pub avatar_ref: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContentError {
    #[error("message content is empty")]
    Empty,
    #[error("message content is {0} characters, limit is {MAX_MESSAGE_LEN}")]
    TooLong(usize),
}

/// Validate a message body before any network call. Returns the trimmed
/// content on success; rejection mutates no state.
pub fn validate_content(content: &str) -> Result<&str, ContentError> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err(ContentError::Empty);
    }
    let len = trimmed.chars().count();
    if len > MAX_MESSAGE_LEN {
        return Err(ContentError::TooLong(len));
    }
    Ok(trimmed)
}
