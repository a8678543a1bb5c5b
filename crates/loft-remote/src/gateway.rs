use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, warn};

use loft_sync::backend::{ChannelError, PushChannel};
use loft_types::events::{GatewayCommand, PushEvent};
use loft_types::models::ConversationKey;

/// Push channel over the WebSocket gateway.
///
/// `open` connects, sends a `Subscribe` command scoping the stream to one
/// conversation, and forwards decoded events into an mpsc. Dropping the
/// receiver ends the reader task and closes the socket.
pub struct GatewayChannel {
    url: String,
    token: String,
}

impl GatewayChannel {
    pub fn new(url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            token: token.into(),
        }
    }
}

#[async_trait]
impl PushChannel for GatewayChannel {
    async fn open(
        &self,
        key: &ConversationKey,
    ) -> Result<mpsc::Receiver<PushEvent>, ChannelError> {
        let url = format!("{}?token={}", self.url, self.token);
        let (socket, _) = connect_async(&url)
            .await
            .map_err(|e| ChannelError::Setup(format!("gateway connect failed: {}", e)))?;
        let (mut sink, mut stream) = socket.split();

        let subscribe = GatewayCommand::Subscribe { key: key.clone() };
        let frame = serde_json::to_string(&subscribe)
            .map_err(|e| ChannelError::Setup(format!("bad subscribe command: {}", e)))?;
        sink.send(WsMessage::Text(frame.into()))
            .await
            .map_err(|e| ChannelError::Setup(format!("subscribe send failed: {}", e)))?;

        let (tx, rx) = mpsc::channel(256);
        let key = key.clone();
        tokio::spawn(async move {
            while let Some(Ok(frame)) = stream.next().await {
                match frame {
                    WsMessage::Text(text) => match serde_json::from_str::<PushEvent>(&text) {
                        Ok(event) => {
                            if tx.send(event).await.is_err() {
                                // Receiver dropped: the view unsubscribed.
                                break;
                            }
                        }
                        Err(e) => {
                            warn!("bad gateway frame: {} -- raw: {}", e, text);
                        }
                    },
                    WsMessage::Ping(_) | WsMessage::Pong(_) => {}
                    WsMessage::Close(_) => break,
                    _ => {}
                }
            }
            debug!(%key, "gateway stream ended");
        });

        Ok(rx)
    }
}
