/// Pure chat state and its transition function
///
/// All non-deterministic inputs (ids, timestamps, completion results) are
/// produced by the store shell; applying an `Action` here is deterministic
/// and timing-free, so the whole message lifecycle can be unit tested
/// without a runtime.
use crate::types::{Chat, ChatEvent, Message, MessageStatus, Sender, ThemeMode};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Complete in-memory state owned by the store
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatState {
    /// Sidebar order = creation order
    pub chats: Vec<Chat>,
    /// Chat id → conversation history, insertion order = conversation order
    pub messages: HashMap<String, Vec<Message>>,
    /// At most one chat is selected at a time
    pub selected_chat_id: Option<String>,
    pub theme: ThemeMode,
    /// True while an AI completion call is outstanding
    pub is_typing: bool,
}

/// One mutation of the chat state
#[derive(Debug, Clone)]
pub enum Action {
    /// Append a new chat (with an optional AI welcome message) and select it
    CreateChat {
        chat: Chat,
        welcome: Option<Message>,
    },
    /// Select a chat and clear its unread counter; no-op on unknown id
    SelectChat { chat_id: String },
    /// Append a message to a chat's history; no-op if the chat is unknown
    AppendMessage {
        chat_id: String,
        message: Message,
        /// Whether the chat's preview fields follow this message
        update_preview: bool,
    },
    /// Advance a message's delivery status; backward moves are no-ops
    AdvanceStatus {
        chat_id: String,
        message_id: String,
        status: MessageStatus,
    },
    SetTyping(bool),
    SetTheme(ThemeMode),
}

impl ChatState {
    /// Apply one action, returning the events describing what changed.
    /// An empty vec means the action was a no-op.
    pub fn apply(&mut self, action: Action) -> Vec<ChatEvent> {
        match action {
            Action::CreateChat { chat, welcome } => {
                let chat_id = chat.id.clone();
                let mut events = vec![ChatEvent::ChatCreated {
                    chat_id: chat_id.clone(),
                }];
                self.messages.entry(chat_id.clone()).or_default();
                if let Some(message) = welcome {
                    events.push(ChatEvent::MessageAppended {
                        chat_id: chat_id.clone(),
                        message_id: message.id.clone(),
                    });
                    self.messages
                        .entry(chat_id.clone())
                        .or_default()
                        .push(message);
                }
                self.chats.push(chat);
                self.selected_chat_id = Some(chat_id.clone());
                events.push(ChatEvent::ChatSelected { chat_id });
                events
            }

            Action::SelectChat { chat_id } => {
                let Some(chat) = self.chats.iter_mut().find(|c| c.id == chat_id) else {
                    return Vec::new();
                };
                chat.unread_count = 0;
                self.selected_chat_id = Some(chat_id.clone());
                vec![ChatEvent::ChatSelected { chat_id }]
            }

            Action::AppendMessage {
                chat_id,
                message,
                update_preview,
            } => {
                let Some(chat) = self.chats.iter_mut().find(|c| c.id == chat_id) else {
                    return Vec::new();
                };
                if update_preview {
                    chat.last_message = message.text.clone();
                    chat.last_message_time = message.timestamp.clone();
                }
                // Incoming messages to an unselected chat count as unread
                if message.sender != Sender::User
                    && self.selected_chat_id.as_deref() != Some(chat_id.as_str())
                {
                    chat.unread_count += 1;
                }
                let message_id = message.id.clone();
                self.messages
                    .entry(chat_id.clone())
                    .or_default()
                    .push(message);
                vec![ChatEvent::MessageAppended { chat_id, message_id }]
            }

            Action::AdvanceStatus {
                chat_id,
                message_id,
                status,
            } => {
                // Late delivery timers may fire after the chat or message is
                // gone; both cases are explicit no-ops.
                let Some(history) = self.messages.get_mut(&chat_id) else {
                    return Vec::new();
                };
                let Some(message) = history.iter_mut().find(|m| m.id == message_id) else {
                    return Vec::new();
                };
                if status.rank() <= message.status.rank() {
                    return Vec::new();
                }
                message.status = status;
                vec![ChatEvent::StatusChanged {
                    chat_id,
                    message_id,
                    status,
                }]
            }

            Action::SetTyping(typing) => {
                if self.is_typing == typing {
                    return Vec::new();
                }
                self.is_typing = typing;
                vec![ChatEvent::TypingChanged { typing }]
            }

            Action::SetTheme(theme) => {
                if self.theme == theme {
                    return Vec::new();
                }
                self.theme = theme;
                vec![ChatEvent::ThemeChanged { theme }]
            }
        }
    }

    pub fn chat(&self, chat_id: &str) -> Option<&Chat> {
        self.chats.iter().find(|c| c.id == chat_id)
    }

    pub fn history(&self, chat_id: &str) -> &[Message] {
        self.messages.get(chat_id).map(Vec::as_slice).unwrap_or(&[])
    }
}
