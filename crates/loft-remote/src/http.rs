use async_trait::async_trait;
use reqwest::Client;
use uuid::Uuid;

use loft_sync::backend::{BackendError, MessageBackend, ProfileLookup};
use loft_types::api::{ProfileResponse, SendMessageRequest};
use loft_types::models::{ConversationKey, DurableMessage, Profile};

/// Durable message store and profile service reached over HTTP.
pub struct HttpBackend {
    client: Client,
    base_url: String,
    token: String,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            client: Client::new(),
            base_url,
            token: token.into(),
        }
    }
}

#[async_trait]
impl MessageBackend for HttpBackend {
    async fn insert(
        &self,
        sender_id: Uuid,
        receiver_id: Option<Uuid>,
        content: &str,
    ) -> Result<DurableMessage, BackendError> {
        let resp = self
            .client
            .post(format!("{}/messages", self.base_url))
            .bearer_auth(&self.token)
            .json(&SendMessageRequest {
                sender_id,
                receiver_id,
                content: content.to_string(),
            })
            .send()
            .await
            .map_err(|e| BackendError::Transport(format!("insert request failed: {}", e)))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(BackendError::Rejected(format!("{}: {}", status, body)));
        }

        resp.json::<DurableMessage>()
            .await
            .map_err(|e| BackendError::Transport(format!("bad insert response: {}", e)))
    }

    async fn history(&self, key: &ConversationKey) -> Result<Vec<DurableMessage>, BackendError> {
        let resp = self
            .client
            .get(format!("{}/conversations/{}/messages", self.base_url, key))
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| BackendError::Transport(format!("history request failed: {}", e)))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(BackendError::Transport(format!("{}: {}", status, body)));
        }

        resp.json::<Vec<DurableMessage>>()
            .await
            .map_err(|e| BackendError::Transport(format!("bad history response: {}", e)))
    }
}

#[async_trait]
impl ProfileLookup for HttpBackend {
    async fn profile(&self, user_id: Uuid) -> Result<Profile, BackendError> {
        let resp = self
            .client
            .get(format!("{}/profiles/{}", self.base_url, user_id))
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| BackendError::Transport(format!("profile request failed: {}", e)))?;

        if !resp.status().is_success() {
            return Err(BackendError::Transport(format!(
                "profile fetch failed: {}",
                resp.status()
            )));
        }

        let profile = resp
            .json::<ProfileResponse>()
            .await
            .map_err(|e| BackendError::Transport(format!("bad profile response: {}", e)))?;

        Ok(Profile {
            display_name: profile.display_name,
            avatar_ref: profile.avatar_ref,
        })
    }
}
