/// Shared types for the chat core
use serde::{Deserialize, Serialize};

/// Summary of one conversation thread (for the sidebar list view)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chat {
    /// Globally unique chat id (UUID v4)
    pub id: String,
    /// Display name of the counterpart
    pub name: String,
    /// Preview text of the last message
    pub last_message: String,
    /// Display-formatted time of the last message (HH:MM)
    pub last_message_time: String,
    /// Unread message counter, reset to 0 on selection
    pub unread_count: u32,
    /// Whether this chat is backed by the completion service
    pub is_ai: bool,
}

/// One entry in a chat's ordered history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Unique within the owning chat
    pub id: String,
    pub text: String,
    /// Display-formatted send time (HH:MM)
    pub timestamp: String,
    pub sender: Sender,
    pub status: MessageStatus,
    pub kind: MessageKind,
}

/// Who authored a message. Serialized as a bare string: "user", "ai",
/// "system", or a contact id for human counterparts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum Sender {
    User,
    Ai,
    System,
    Contact(String),
}

impl From<Sender> for String {
    fn from(s: Sender) -> String {
        match s {
            Sender::User => "user".to_string(),
            Sender::Ai => "ai".to_string(),
            Sender::System => "system".to_string(),
            Sender::Contact(id) => id,
        }
    }
}

impl From<String> for Sender {
    fn from(s: String) -> Sender {
        match s.as_str() {
            "user" => Sender::User,
            "ai" => Sender::Ai,
            "system" => Sender::System,
            _ => Sender::Contact(s),
        }
    }
}

/// Delivery state of a message. Only ever moves forward:
/// sent → delivered → read for human chats, sent → read or sent → error
/// for AI chats. Error is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Sent,
    Delivered,
    Read,
    Error,
}

impl MessageStatus {
    /// Position in the forward-only progression. Error ranks alongside
    /// read so neither terminal state can overwrite the other.
    pub fn rank(self) -> u8 {
        match self {
            MessageStatus::Sent => 0,
            MessageStatus::Delivered => 1,
            MessageStatus::Read => 2,
            MessageStatus::Error => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Text,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemeMode {
    Light,
    Dark,
}

impl Default for ThemeMode {
    fn default() -> Self {
        ThemeMode::Light
    }
}

impl std::str::FromStr for ThemeMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "light" => Ok(ThemeMode::Light),
            "dark" => Ok(ThemeMode::Dark),
            other => Err(format!("unknown theme mode: {}", other)),
        }
    }
}

/// State-change notifications broadcast to subscribers (UI re-render)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatEvent {
    /// A chat was created and became the selection
    ChatCreated { chat_id: String },
    /// The selection moved to this chat
    ChatSelected { chat_id: String },
    /// A message was appended to a chat's history
    MessageAppended { chat_id: String, message_id: String },
    /// An existing message advanced its delivery status
    StatusChanged {
        chat_id: String,
        message_id: String,
        status: MessageStatus,
    },
    /// The store-wide typing indicator flipped
    TypingChanged { typing: bool },
    /// The persisted theme mode changed
    ThemeChanged { theme: ThemeMode },
}
