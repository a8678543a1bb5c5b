use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, warn};

use loft_types::models::ConversationKey;

use crate::loader::ConversationLoader;

/// Periodic history re-fetch that bounds staleness when the push channel
/// has degraded. Goes through the loader's refresh path, so it stops
/// applying anything once the conversation leaves the screen.
pub struct PollFallback {
    task: JoinHandle<()>,
}

impl PollFallback {
    pub fn spawn(
        loader: Arc<ConversationLoader>,
        key: ConversationKey,
        period: Duration,
    ) -> Self {
        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            // The first tick fires immediately; the initial load already
            // happened, so skip it.
            interval.tick().await;
            loop {
                interval.tick().await;
                match loader.refresh(key.clone()).await {
                    Ok(applied) if applied > 0 => {
                        debug!(%key, applied, "poll fallback applied missed messages")
                    }
                    Ok(_) => {}
                    Err(err) => warn!(%key, error = %err, "poll fallback fetch failed"),
                }
            }
        });
        Self { task }
    }

    pub fn stop(&self) {
        self.task.abort();
    }
}

impl Drop for PollFallback {
    fn drop(&mut self) {
        self.task.abort();
    }
}
