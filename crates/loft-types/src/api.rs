use serde::{Deserialize, Serialize};
use uuid::Uuid;

// -- Messages --

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendMessageRequest {
    pub sender_id: Uuid,
    pub receiver_id: Option<Uuid>,
    pub content: String,
}

// The insert response and the history rows reuse `models::DurableMessage`
// directly; there is no separate response DTO.

// -- Profiles --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileResponse {
    pub user_id: Uuid,
    pub display_name: String,
    pub avatar_ref: Option<String>,
}
