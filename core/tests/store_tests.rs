/// Chat store integration tests
/// End-to-end flows through the store: message lifecycle, completion
/// integration, delivery receipts, persistence round-trips.
use async_trait::async_trait;
use sidechat_core::completion::CompletionService;
use sidechat_core::demo::DEMO_CONTACT_CHAT_ID;
use sidechat_core::snapshot::{MemoryStore, SnapshotStore};
use sidechat_core::types::{ChatEvent, MessageKind, MessageStatus, Sender};
use sidechat_core::{ChatError, ChatStore, Config, Result, ScriptedCompletion};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

struct FixedCompletion(String);

#[async_trait]
impl CompletionService for FixedCompletion {
    async fn complete(&self, _system_prompt: &str, _user_text: &str) -> Result<String> {
        Ok(self.0.clone())
    }
}

struct FailingCompletion;

#[async_trait]
impl CompletionService for FailingCompletion {
    async fn complete(&self, _system_prompt: &str, _user_text: &str) -> Result<String> {
        Err(ChatError::Service("stub outage".to_string()))
    }
}

/// Blocks inside `complete` until the test releases it
struct GatedCompletion {
    release: Arc<Notify>,
}

#[async_trait]
impl CompletionService for GatedCompletion {
    async fn complete(&self, _system_prompt: &str, _user_text: &str) -> Result<String> {
        self.release.notified().await;
        Ok("hello".to_string())
    }
}

fn open_store(completion: Arc<dyn CompletionService>) -> ChatStore {
    let snapshots = SnapshotStore::new(Box::new(MemoryStore::new()));
    ChatStore::open(&Config::default(), snapshots, completion).unwrap()
}

#[tokio::test]
async fn test_ai_exchange_success_scenario() {
    let store = open_store(Arc::new(FixedCompletion("hello".to_string())));
    let chat_id = store.create_chat("Bot", true).await.unwrap();

    // Seed welcome message from the AI
    let seed = store.messages(&chat_id).await;
    assert_eq!(seed.len(), 1);
    assert_eq!(seed[0].sender, Sender::Ai);

    store.send_message(&chat_id, "hi").await.unwrap();

    let history = store.messages(&chat_id).await;
    assert_eq!(history.len(), 3);
    assert_eq!(history[1].sender, Sender::User);
    assert_eq!(history[1].text, "hi");
    assert_eq!(history[2].sender, Sender::Ai);
    assert_eq!(history[2].text, "hello");
    assert_eq!(history[2].status, MessageStatus::Read);

    let chat = store.selected_chat().await.unwrap();
    assert_eq!(chat.last_message, "hello");
    assert!(!store.is_typing().await);
}

#[tokio::test]
async fn test_ai_exchange_failure_scenario() {
    let store = open_store(Arc::new(FailingCompletion));
    let chat_id = store.create_chat("Bot", true).await.unwrap();

    store.send_message(&chat_id, "hi").await.unwrap();

    let history = store.messages(&chat_id).await;
    assert_eq!(history.len(), 3);
    assert_eq!(history[1].sender, Sender::User);
    // Exactly one error message, no AI reply
    assert_eq!(history[2].sender, Sender::System);
    assert_eq!(history[2].status, MessageStatus::Error);
    assert_eq!(history[2].kind, MessageKind::Error);
    assert!(!history.iter().skip(2).any(|m| m.sender == Sender::Ai));

    // The error message never becomes the preview; the user text does
    let chat = store.selected_chat().await.unwrap();
    assert_eq!(chat.last_message, "hi");
    assert!(!store.is_typing().await);
}

#[tokio::test]
async fn test_typing_window_around_completion() {
    let release = Arc::new(Notify::new());
    let store = open_store(Arc::new(GatedCompletion {
        release: release.clone(),
    }));
    let chat_id = store.create_chat("Bot", true).await.unwrap();

    let sender = store.clone();
    let send_chat_id = chat_id.clone();
    let send = tokio::spawn(async move { sender.send_message(&send_chat_id, "hi").await });

    // Wait for the completion call to be in flight
    let mut saw_typing = false;
    for _ in 0..200 {
        if store.is_typing().await {
            saw_typing = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(saw_typing, "typing flag never set while completion pending");
    // No AI reply yet while typing
    assert_eq!(store.messages(&chat_id).await.len(), 2);

    release.notify_one();
    send.await.unwrap().unwrap();

    assert!(!store.is_typing().await);
    let history = store.messages(&chat_id).await;
    assert_eq!(history.len(), 3);
    assert_eq!(history[2].text, "hello");
}

#[tokio::test(start_paused = true)]
async fn test_human_chat_delivery_progression() {
    let store = open_store(Arc::new(ScriptedCompletion::default()));
    let chat_id = store.create_chat("Ivan", false).await.unwrap();
    store.send_message(&chat_id, "hey").await.unwrap();

    let status_of = |store: &ChatStore, chat_id: &str| {
        let store = store.clone();
        let chat_id = chat_id.to_string();
        async move { store.messages(&chat_id).await[0].status }
    };

    assert_eq!(status_of(&store, &chat_id).await, MessageStatus::Sent);

    // Past the first timer, before the second
    tokio::time::sleep(Duration::from_millis(1100)).await;
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
    assert_eq!(status_of(&store, &chat_id).await, MessageStatus::Delivered);

    // Past the second timer
    tokio::time::sleep(Duration::from_millis(1000)).await;
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
    assert_eq!(status_of(&store, &chat_id).await, MessageStatus::Read);
}

#[tokio::test(start_paused = true)]
async fn test_close_cancels_delivery_timers() {
    let store = open_store(Arc::new(ScriptedCompletion::default()));
    let chat_id = store.create_chat("Ivan", false).await.unwrap();
    store.send_message(&chat_id, "hey").await.unwrap();
    store.close();

    tokio::time::sleep(Duration::from_secs(5)).await;
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
    // Aborted timers never advance the message
    assert_eq!(store.messages(&chat_id).await[0].status, MessageStatus::Sent);
}

#[tokio::test]
async fn test_select_resets_unread() {
    let store = open_store(Arc::new(ScriptedCompletion::default()));
    // Demo contact chat is seeded with unread messages
    let before = store
        .chats()
        .await
        .into_iter()
        .find(|c| c.id == DEMO_CONTACT_CHAT_ID)
        .unwrap();
    assert!(before.unread_count > 0);

    store.select_chat(DEMO_CONTACT_CHAT_ID).await.unwrap();

    let after = store
        .chats()
        .await
        .into_iter()
        .find(|c| c.id == DEMO_CONTACT_CHAT_ID)
        .unwrap();
    assert_eq!(after.unread_count, 0);
    assert_eq!(
        store.selected_chat_id().await.as_deref(),
        Some(DEMO_CONTACT_CHAT_ID)
    );
}

#[tokio::test]
async fn test_select_unknown_chat_is_silent() {
    let store = open_store(Arc::new(ScriptedCompletion::default()));
    let before = store.selected_chat_id().await;
    store.select_chat("no-such-chat").await.unwrap();
    assert_eq!(store.selected_chat_id().await, before);
}

#[tokio::test]
async fn test_state_survives_restart() {
    let kv = Arc::new(MemoryStore::new());
    let completion: Arc<dyn CompletionService> = Arc::new(FixedCompletion("hello".to_string()));

    let (chat_id, chats, history) = {
        let snapshots = SnapshotStore::new(Box::new(kv.clone()));
        let store = ChatStore::open(&Config::default(), snapshots, completion.clone()).unwrap();
        let chat_id = store.create_chat("Bot", true).await.unwrap();
        store.send_message(&chat_id, "hi").await.unwrap();
        (chat_id.clone(), store.chats().await, store.messages(&chat_id).await)
    };

    // Fresh store over the same key-value backend
    let snapshots = SnapshotStore::new(Box::new(kv));
    let reopened = ChatStore::open(&Config::default(), snapshots, completion).unwrap();

    assert_eq!(reopened.chats().await, chats);
    assert_eq!(reopened.messages(&chat_id).await, history);
    assert_eq!(reopened.selected_chat_id().await.as_deref(), Some(chat_id.as_str()));
    // The typing flag is never persisted
    assert!(!reopened.is_typing().await);
}

#[tokio::test]
async fn test_events_are_broadcast() {
    let store = open_store(Arc::new(FixedCompletion("hello".to_string())));
    let mut events = store.subscribe();

    let chat_id = store.create_chat("Bot", true).await.unwrap();

    match events.recv().await.unwrap() {
        ChatEvent::ChatCreated { chat_id: id } => assert_eq!(id, chat_id),
        other => panic!("expected ChatCreated, got {:?}", other),
    }
    // Welcome message, then selection
    assert!(matches!(
        events.recv().await.unwrap(),
        ChatEvent::MessageAppended { .. }
    ));
    assert!(matches!(
        events.recv().await.unwrap(),
        ChatEvent::ChatSelected { .. }
    ));

    store.send_message(&chat_id, "hi").await.unwrap();
    let mut seen = Vec::new();
    for _ in 0..4 {
        seen.push(events.recv().await.unwrap());
    }
    assert!(matches!(seen[0], ChatEvent::MessageAppended { .. }));
    assert!(matches!(seen[1], ChatEvent::TypingChanged { typing: true }));
    assert!(matches!(seen[2], ChatEvent::MessageAppended { .. }));
    assert!(matches!(seen[3], ChatEvent::TypingChanged { typing: false }));
}

#[tokio::test]
async fn test_overlapping_ai_sends_both_resolve() {
    let store = open_store(Arc::new(FixedCompletion("hello".to_string())));
    let chat_id = store.create_chat("Bot", true).await.unwrap();

    let (a, b) = tokio::join!(
        store.send_message(&chat_id, "first"),
        store.send_message(&chat_id, "second"),
    );
    a.unwrap();
    b.unwrap();

    let history = store.messages(&chat_id).await;
    // Seed + two user messages + two replies, applied in arrival order
    assert_eq!(history.len(), 5);
    assert_eq!(history.iter().filter(|m| m.sender == Sender::User).count(), 2);
    assert_eq!(history.iter().filter(|m| m.sender == Sender::Ai).count(), 3);
    assert!(!store.is_typing().await);
}
