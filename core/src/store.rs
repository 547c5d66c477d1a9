/// Chat store: the effect-running shell around the pure reducer
///
/// Owns the state behind a lock, broadcasts `ChatEvent`s to subscribers,
/// persists the dirty snapshot keys after every mutation, awaits the
/// completion service for AI chats, and schedules the delivery-receipt
/// timers for human chats.
use crate::completion::CompletionService;
use crate::config::Config;
use crate::error::Result;
use crate::snapshot::SnapshotStore;
use crate::state::{Action, ChatState};
use crate::types::{Chat, ChatEvent, Message, MessageKind, MessageStatus, Sender, ThemeMode};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, RwLock};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info, warn};
use uuid::Uuid;

const EVENT_CHANNEL_CAPACITY: usize = 256;
const AI_WELCOME: &str = "Hi! How can I help?";
const SERVICE_ERROR_TEXT: &str = "Something went wrong while fetching the reply";

/// Which snapshot keys an action touches
#[derive(Debug, Clone, Copy, Default)]
struct Dirty {
    chats: bool,
    messages: bool,
    selected: bool,
    theme: bool,
}

fn dirty_keys(action: &Action) -> Dirty {
    match action {
        Action::CreateChat { .. } => Dirty {
            chats: true,
            messages: true,
            selected: true,
            theme: false,
        },
        Action::SelectChat { .. } => Dirty {
            chats: true,
            messages: false,
            selected: true,
            theme: false,
        },
        Action::AppendMessage { .. } => Dirty {
            chats: true,
            messages: true,
            selected: false,
            theme: false,
        },
        Action::AdvanceStatus { .. } => Dirty {
            chats: false,
            messages: true,
            selected: false,
            theme: false,
        },
        // The typing flag is in-memory only
        Action::SetTyping(_) => Dirty::default(),
        Action::SetTheme(_) => Dirty {
            chats: false,
            messages: false,
            selected: false,
            theme: true,
        },
    }
}

pub struct ChatStore {
    state: Arc<RwLock<ChatState>>,
    snapshots: Arc<SnapshotStore>,
    completion: Arc<dyn CompletionService>,
    events: broadcast::Sender<ChatEvent>,
    /// Outstanding delivery timers, aborted on `close`
    timers: Arc<Mutex<Vec<JoinHandle<()>>>>,
    system_prompt: String,
    delivered_after: Duration,
    read_after: Duration,
}

impl ChatStore {
    /// Hydrate the store from the snapshot collaborator (demo dataset on
    /// first run or corrupt snapshot).
    pub fn open(
        config: &Config,
        snapshots: SnapshotStore,
        completion: Arc<dyn CompletionService>,
    ) -> Result<Self> {
        let state = snapshots.load()?;
        info!(
            "Chat store hydrated: {} chats, {} histories",
            state.chats.len(),
            state.messages.len()
        );
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Ok(Self {
            state: Arc::new(RwLock::new(state)),
            snapshots: Arc::new(snapshots),
            completion,
            events,
            timers: Arc::new(Mutex::new(Vec::new())),
            system_prompt: config.system_prompt.clone(),
            delivered_after: config.delivered_after,
            read_after: config.read_after,
        })
    }

    /// Subscribe to state-change notifications
    pub fn subscribe(&self) -> broadcast::Receiver<ChatEvent> {
        self.events.subscribe()
    }

    // ─── Operations ──────────────────────────────────────────────────────

    /// Create a chat (with an AI welcome message when `is_ai`) and select it
    pub async fn create_chat(&self, name: &str, is_ai: bool) -> Result<String> {
        let chat_id = Uuid::new_v4().to_string();
        let now = display_time();
        let welcome = is_ai.then(|| Message {
            id: Uuid::new_v4().to_string(),
            text: AI_WELCOME.to_string(),
            timestamp: now.clone(),
            sender: Sender::Ai,
            status: MessageStatus::Read,
            kind: MessageKind::Text,
        });
        let chat = Chat {
            id: chat_id.clone(),
            name: name.to_string(),
            last_message: if is_ai { AI_WELCOME.to_string() } else { String::new() },
            last_message_time: now,
            unread_count: 0,
            is_ai,
        };
        self.dispatch(Action::CreateChat { chat, welcome }).await?;
        Ok(chat_id)
    }

    /// Select a chat and reset its unread counter. Unknown ids are ignored.
    pub async fn select_chat(&self, chat_id: &str) -> Result<()> {
        self.dispatch(Action::SelectChat {
            chat_id: chat_id.to_string(),
        })
        .await?;
        Ok(())
    }

    /// Append a user message and run the chat's delivery flow: simulated
    /// receipts for human chats, one completion call for AI chats.
    pub async fn send_message(&self, chat_id: &str, text: &str) -> Result<()> {
        let is_ai = {
            let state = self.state.read().await;
            match state.chat(chat_id) {
                Some(chat) => chat.is_ai,
                None => {
                    debug!("send_message to unknown chat {}, ignoring", chat_id);
                    return Ok(());
                }
            }
        };

        let message = Message {
            id: Uuid::new_v4().to_string(),
            text: text.to_string(),
            timestamp: display_time(),
            sender: Sender::User,
            status: MessageStatus::Sent,
            kind: MessageKind::Text,
        };
        let message_id = message.id.clone();
        self.dispatch(Action::AppendMessage {
            chat_id: chat_id.to_string(),
            message,
            update_preview: true,
        })
        .await?;

        if is_ai {
            self.run_ai_exchange(chat_id, text).await
        } else {
            self.schedule_delivery(chat_id, &message_id);
            Ok(())
        }
    }

    pub async fn set_theme(&self, theme: ThemeMode) -> Result<()> {
        self.dispatch(Action::SetTheme(theme)).await?;
        Ok(())
    }

    /// Abort outstanding delivery timers. Call on teardown so no callback
    /// fires against a torn-down view.
    pub fn close(&self) {
        let mut timers = match self.timers.lock() {
            Ok(timers) => timers,
            Err(poisoned) => poisoned.into_inner(),
        };
        for handle in timers.drain(..) {
            handle.abort();
        }
    }

    // ─── Queries ─────────────────────────────────────────────────────────

    pub async fn chats(&self) -> Vec<Chat> {
        self.state.read().await.chats.clone()
    }

    pub async fn messages(&self, chat_id: &str) -> Vec<Message> {
        self.state.read().await.history(chat_id).to_vec()
    }

    pub async fn selected_chat_id(&self) -> Option<String> {
        self.state.read().await.selected_chat_id.clone()
    }

    pub async fn selected_chat(&self) -> Option<Chat> {
        let state = self.state.read().await;
        state
            .selected_chat_id
            .as_deref()
            .and_then(|id| state.chat(id))
            .cloned()
    }

    pub async fn is_typing(&self) -> bool {
        self.state.read().await.is_typing
    }

    pub async fn theme(&self) -> ThemeMode {
        self.state.read().await.theme
    }

    // ─── Internals ───────────────────────────────────────────────────────

    /// Apply one action under the write lock, persist the keys it touched,
    /// then broadcast the resulting events. No-op actions persist nothing.
    async fn dispatch(&self, action: Action) -> Result<Vec<ChatEvent>> {
        let dirty = dirty_keys(&action);
        let events = {
            let mut state = self.state.write().await;
            let events = state.apply(action);
            if !events.is_empty() {
                self.persist(&state, dirty)?;
            }
            events
        };
        for event in &events {
            // Send only fails when nobody is subscribed
            let _ = self.events.send(event.clone());
        }
        Ok(events)
    }

    fn persist(&self, state: &ChatState, dirty: Dirty) -> Result<()> {
        if dirty.chats {
            self.snapshots.save_chats(&state.chats)?;
        }
        if dirty.messages {
            self.snapshots.save_messages(&state.messages)?;
        }
        if dirty.selected {
            self.snapshots.save_selected(&state.selected_chat_id)?;
        }
        if dirty.theme {
            self.snapshots.save_theme(state.theme)?;
        }
        Ok(())
    }

    /// One completion exchange: typing on, exactly one `complete` call,
    /// reply or error message appended, typing off on every path.
    async fn run_ai_exchange(&self, chat_id: &str, user_text: &str) -> Result<()> {
        self.dispatch(Action::SetTyping(true)).await?;

        let result = self
            .completion
            .complete(&self.system_prompt, user_text)
            .await;

        let outcome = match result {
            Ok(reply) => {
                self.dispatch(Action::AppendMessage {
                    chat_id: chat_id.to_string(),
                    message: Message {
                        id: Uuid::new_v4().to_string(),
                        text: reply,
                        timestamp: display_time(),
                        sender: Sender::Ai,
                        status: MessageStatus::Read,
                        kind: MessageKind::Text,
                    },
                    update_preview: true,
                })
                .await
            }
            Err(e) => {
                warn!("Completion call failed for chat {}: {}", chat_id, e);
                // No user-visible content, so the chat preview stays put
                self.dispatch(Action::AppendMessage {
                    chat_id: chat_id.to_string(),
                    message: Message {
                        id: Uuid::new_v4().to_string(),
                        text: SERVICE_ERROR_TEXT.to_string(),
                        timestamp: display_time(),
                        sender: Sender::System,
                        status: MessageStatus::Error,
                        kind: MessageKind::Error,
                    },
                    update_preview: false,
                })
                .await
            }
        };

        // Typing is cleared before control returns, even when the append
        // above failed to persist.
        let cleared = self.dispatch(Action::SetTyping(false)).await;
        outcome?;
        cleared?;
        Ok(())
    }

    /// Two independent, cancellable timers advancing one message through
    /// delivered and read, both measured from send time. A timer that fires
    /// after the message is gone lands on the reducer's no-op path.
    fn schedule_delivery(&self, chat_id: &str, message_id: &str) {
        let transitions = [
            (self.delivered_after, MessageStatus::Delivered),
            (self.read_after, MessageStatus::Read),
        ];
        let mut timers = match self.timers.lock() {
            Ok(timers) => timers,
            Err(poisoned) => poisoned.into_inner(),
        };
        timers.retain(|handle| !handle.is_finished());
        for (delay, status) in transitions {
            let store = self.clone();
            let chat_id = chat_id.to_string();
            let message_id = message_id.to_string();
            timers.push(tokio::spawn(async move {
                sleep(delay).await;
                let action = Action::AdvanceStatus {
                    chat_id,
                    message_id,
                    status,
                };
                if let Err(e) = store.dispatch(action).await {
                    warn!("Delivery timer failed to persist: {}", e);
                }
            }));
        }
    }
}

impl Clone for ChatStore {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
            snapshots: self.snapshots.clone(),
            completion: self.completion.clone(),
            events: self.events.clone(),
            timers: self.timers.clone(),
            system_prompt: self.system_prompt.clone(),
            delivered_after: self.delivered_after,
            read_after: self.read_after,
        }
    }
}

/// Display-formatted current time for previews and message timestamps
fn display_time() -> String {
    chrono::Local::now().format("%H:%M").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::ScriptedCompletion;
    use crate::error::ChatError;
    use crate::snapshot::{MemoryStore, SnapshotStore};
    use async_trait::async_trait;

    struct FailingCompletion;

    #[async_trait]
    impl CompletionService for FailingCompletion {
        async fn complete(&self, _system_prompt: &str, _user_text: &str) -> Result<String> {
            Err(ChatError::Service("stub outage".to_string()))
        }
    }

    fn open_store(completion: Arc<dyn CompletionService>) -> ChatStore {
        let snapshots = SnapshotStore::new(Box::new(MemoryStore::new()));
        ChatStore::open(&Config::default(), snapshots, completion).unwrap()
    }

    #[tokio::test]
    async fn test_send_to_unknown_chat_is_ignored() {
        let store = open_store(Arc::new(ScriptedCompletion::default()));
        store.send_message("ghost", "hello").await.unwrap();
        assert!(store.messages("ghost").await.is_empty());
        assert!(!store.is_typing().await);
    }

    #[tokio::test]
    async fn test_create_chat_ids_are_distinct() {
        let store = open_store(Arc::new(ScriptedCompletion::default()));
        let mut ids = std::collections::HashSet::new();
        for i in 0..20 {
            let id = store.create_chat(&format!("chat {}", i), false).await.unwrap();
            assert!(ids.insert(id));
        }
    }

    #[tokio::test]
    async fn test_ai_welcome_seeds_history_and_preview() {
        let store = open_store(Arc::new(ScriptedCompletion::default()));
        let chat_id = store.create_chat("Bot", true).await.unwrap();
        let history = store.messages(&chat_id).await;
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].sender, Sender::Ai);
        assert_eq!(history[0].status, MessageStatus::Read);
        let chat = store.selected_chat().await.unwrap();
        assert_eq!(chat.last_message, AI_WELCOME);
    }

    #[tokio::test]
    async fn test_failed_completion_leaves_typing_false() {
        let store = open_store(Arc::new(FailingCompletion));
        let chat_id = store.create_chat("Bot", true).await.unwrap();
        store.send_message(&chat_id, "hi").await.unwrap();
        assert!(!store.is_typing().await);
    }
}
