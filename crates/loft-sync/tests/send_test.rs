//! Optimistic-send lifecycle: placeholder, confirmation, rollback, and the
//! race against the push path.

mod common;

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use uuid::Uuid;

use common::MockBackend;
use loft_store::ConversationStore;
use loft_store::dedup::Deduplicator;
use loft_sync::send::{SendCoordinator, SendError};
use loft_types::models::{ConversationKey, ContentError, MessageId, MessageStatus};

fn setup() -> (Arc<MockBackend>, Deduplicator, SendCoordinator) {
    let backend = Arc::new(MockBackend::new());
    let dedup = Deduplicator::new(ConversationStore::new());
    let coordinator = SendCoordinator::new(backend.clone(), dedup.clone());
    (backend, dedup, coordinator)
}

#[tokio::test]
async fn happy_path_yields_exactly_one_confirmed_message() {
    let (_backend, dedup, coordinator) = setup();
    let key = ConversationKey::Chatroom;
    let sender = Uuid::new_v4();

    let id = coordinator
        .send(key.clone(), sender, None, "hello")
        .await
        .unwrap();

    let messages = dedup.store().messages(&key);
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].id, id);
    assert_eq!(messages[0].content, "hello");
    assert_eq!(messages[0].status, MessageStatus::Confirmed);
    assert!(matches!(id, MessageId::Durable(_)));
}

#[tokio::test]
async fn failed_insert_rolls_back_and_returns_the_draft() {
    let (backend, dedup, coordinator) = setup();
    let key = ConversationKey::Chatroom;
    backend.fail_next_insert.store(true, Ordering::SeqCst);

    let err = coordinator
        .send(key.clone(), Uuid::new_v4(), None, "  hello  ")
        .await
        .unwrap_err();

    match err {
        SendError::Transport { draft, .. } => assert_eq!(draft, "hello"),
        other => panic!("expected transport error, got {:?}", other),
    }
    // Store reverts to its pre-send state: nothing remains of the attempt.
    assert!(dedup.store().messages(&key).is_empty());
}

#[tokio::test]
async fn validation_errors_mutate_nothing() {
    let (_backend, dedup, coordinator) = setup();
    let key = ConversationKey::Chatroom;
    let sender = Uuid::new_v4();

    let err = coordinator
        .send(key.clone(), sender, None, "   ")
        .await
        .unwrap_err();
    assert!(matches!(err, SendError::Content(ContentError::Empty)));

    let oversized = "x".repeat(1001);
    let err = coordinator
        .send(key.clone(), sender, None, &oversized)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        SendError::Content(ContentError::TooLong(1001))
    ));

    assert!(dedup.store().messages(&key).is_empty());
}

#[tokio::test]
async fn push_outrunning_the_insert_response_leaves_a_single_entry() {
    let (backend, dedup, coordinator) = setup();
    let key = ConversationKey::Chatroom;
    let sender = Uuid::new_v4();

    // Every insert is mirrored through the deduplicator before the response
    // returns, as if the push notification won the race.
    *backend.mirror.lock().unwrap() = Some(dedup.clone());

    coordinator
        .send(key.clone(), sender, None, "hello")
        .await
        .unwrap();

    let messages = dedup.store().messages(&key);
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].status, MessageStatus::Confirmed);
    // No orphaned placeholder either.
    assert!(messages.iter().all(|m| !m.id.is_local()));
}

#[tokio::test]
async fn second_send_while_in_flight_is_rejected() {
    let (backend, _dedup, coordinator) = setup();
    let coordinator = Arc::new(coordinator);
    let key = ConversationKey::Chatroom;
    let sender = Uuid::new_v4();

    *backend.insert_delay.lock().unwrap() = Some(Duration::from_millis(200));

    let first = {
        let coordinator = coordinator.clone();
        let key = key.clone();
        tokio::spawn(async move { coordinator.send(key, sender, None, "first").await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    let err = coordinator
        .send(key.clone(), sender, None, "second")
        .await
        .unwrap_err();
    assert!(matches!(err, SendError::SendInFlight));

    // The first send still completes, and a later send is accepted again.
    first.await.unwrap().unwrap();
    coordinator.send(key, sender, None, "third").await.unwrap();
}

#[tokio::test]
async fn sends_to_different_conversations_are_independent() {
    let (backend, dedup, coordinator) = setup();
    let coordinator = Arc::new(coordinator);
    let me = Uuid::new_v4();
    let peer = Uuid::new_v4();
    let direct = ConversationKey::direct(me, peer);

    *backend.insert_delay.lock().unwrap() = Some(Duration::from_millis(200));

    let slow = {
        let coordinator = coordinator.clone();
        tokio::spawn(async move {
            coordinator
                .send(ConversationKey::Chatroom, me, None, "chatroom")
                .await
        })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    // A different conversation is not blocked by the in-flight chatroom send.
    coordinator
        .send(direct.clone(), me, Some(peer), "direct")
        .await
        .unwrap();

    slow.await.unwrap().unwrap();
    assert_eq!(dedup.store().messages(&direct).len(), 1);
    assert_eq!(
        dedup.store().messages(&ConversationKey::Chatroom).len(),
        1
    );
}
