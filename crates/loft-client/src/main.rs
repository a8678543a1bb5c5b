use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use uuid::Uuid;

use loft_remote::{GatewayChannel, HttpBackend};
use loft_store::ConversationStore;
use loft_store::dedup::Deduplicator;
use loft_sync::backend::ProfileLookup;
use loft_sync::loader::ConversationLoader;
use loft_sync::poll::PollFallback;
use loft_sync::send::{SendCoordinator, SendError};
use loft_sync::subscription::SubscriptionManager;
use loft_types::models::{ConversationKey, MessageId, MessageStatus};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "loft=debug".into()),
        )
        .init();

    // Config
    let api_url =
        std::env::var("LOFT_API_URL").unwrap_or_else(|_| "http://localhost:3000".into());
    let gateway_url = std::env::var("LOFT_GATEWAY_URL")
        .unwrap_or_else(|_| "ws://localhost:3000/gateway".into());
    let token = std::env::var("LOFT_TOKEN").unwrap_or_default();
    let user_id: Uuid = std::env::var("LOFT_USER_ID")?.parse()?;
    let peer_id: Option<Uuid> = match std::env::var("LOFT_PEER_ID") {
        Ok(raw) => Some(raw.parse()?),
        Err(_) => None,
    };
    let poll_secs: u64 = std::env::var("LOFT_POLL_SECS")
        .unwrap_or_else(|_| "60".into())
        .parse()?;

    let key = match peer_id {
        Some(peer) => ConversationKey::direct(user_id, peer),
        None => ConversationKey::Chatroom,
    };

    // Shared state: the store is created here and handed to each component,
    // cleared again on exit.
    let store = ConversationStore::new();
    let dedup = Deduplicator::new(store.clone());
    let backend = Arc::new(HttpBackend::new(api_url, token.clone()));
    let coordinator = SendCoordinator::new(backend.clone(), dedup.clone());
    let loader = Arc::new(ConversationLoader::new(backend.clone(), dedup.clone()));
    let subscriptions = SubscriptionManager::new(
        Arc::new(GatewayChannel::new(gateway_url, token)),
        dedup.clone(),
    );

    let loaded = loader.load(key.clone()).await?;
    info!(%key, loaded, "conversation ready");

    // Push subscription; on failure we fall back to polling alone.
    let handle = match subscriptions.subscribe(key.clone()).await {
        Ok(handle) => Some(handle),
        Err(e) => {
            warn!(error = %e, "push channel unavailable, relying on polling");
            None
        }
    };
    let _poll = PollFallback::spawn(loader.clone(), key.clone(), Duration::from_secs(poll_secs));

    let mut names: HashMap<Uuid, String> = HashMap::new();
    let mut seen: HashSet<MessageId> = HashSet::new();
    render_new(&store, &key, backend.as_ref(), &mut names, &mut seen).await;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut render = tokio::time::interval(Duration::from_millis(500));

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if line.trim() == "/quit" {
                    break;
                }
                let receiver_id = key.other_participant(user_id);
                match coordinator.send(key.clone(), user_id, receiver_id, &line).await {
                    Ok(_) => {}
                    Err(SendError::Transport { draft, source }) => {
                        eprintln!("send failed ({}); your draft: {}", source, draft);
                    }
                    Err(e) => eprintln!("{}", e),
                }
            }
            _ = render.tick() => {
                render_new(&store, &key, backend.as_ref(), &mut names, &mut seen).await;
            }
        }
    }

    if let Some(handle) = handle {
        subscriptions.unsubscribe(&handle);
    }
    store.clear();
    info!("session closed");
    Ok(())
}

/// Print entries not shown yet, decorated with display names from the
/// profile service (cached per sender).
async fn render_new(
    store: &ConversationStore,
    key: &ConversationKey,
    profiles: &dyn ProfileLookup,
    names: &mut HashMap<Uuid, String>,
    seen: &mut HashSet<MessageId>,
) {
    for message in store.messages(key) {
        if !seen.insert(message.id) {
            continue;
        }

        let name = match names.get(&message.sender_id) {
            Some(name) => name.clone(),
            None => {
                let name = match profiles.profile(message.sender_id).await {
                    Ok(profile) => profile.display_name,
                    // Decoration only: fall back to a short id.
                    Err(_) => message.sender_id.to_string()[..8].to_string(),
                };
                names.insert(message.sender_id, name.clone());
                name
            }
        };

        match message.status {
            MessageStatus::Pending => {
                println!("[sending] {}: {}", name, message.content)
            }
            _ => println!(
                "[{}] {}: {}",
                message.created_at.format("%H:%M:%S"),
                name,
                message.content
            ),
        }
    }
}
