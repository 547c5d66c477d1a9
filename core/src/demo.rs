/// Built-in demo dataset used when no snapshot exists yet (or when a
/// persisted value fails to parse): two seed chats with one message each.
use crate::types::{Chat, Message, MessageKind, MessageStatus, Sender};
use std::collections::HashMap;

pub const DEMO_AI_CHAT_ID: &str = "demo-ai";
pub const DEMO_CONTACT_CHAT_ID: &str = "demo-ivan";

pub fn demo_chats() -> Vec<Chat> {
    vec![
        Chat {
            id: DEMO_AI_CHAT_ID.to_string(),
            name: "AI Assistant".to_string(),
            last_message: "How can I help?".to_string(),
            last_message_time: "10:30".to_string(),
            unread_count: 0,
            is_ai: true,
        },
        Chat {
            id: DEMO_CONTACT_CHAT_ID.to_string(),
            name: "Ivan Petrov".to_string(),
            last_message: "Hi! How are you?".to_string(),
            last_message_time: "09:45".to_string(),
            unread_count: 2,
            is_ai: false,
        },
    ]
}

pub fn demo_messages() -> HashMap<String, Vec<Message>> {
    let mut messages = HashMap::new();
    messages.insert(
        DEMO_AI_CHAT_ID.to_string(),
        vec![Message {
            id: "1".to_string(),
            text: "Hi! I'm an AI assistant. How can I help?".to_string(),
            timestamp: "10:30".to_string(),
            sender: Sender::Ai,
            status: MessageStatus::Read,
            kind: MessageKind::Text,
        }],
    );
    messages.insert(
        DEMO_CONTACT_CHAT_ID.to_string(),
        vec![Message {
            id: "1".to_string(),
            text: "Hi! How are you?".to_string(),
            timestamp: "09:45".to_string(),
            sender: Sender::Contact("ivan".to_string()),
            status: MessageStatus::Read,
            kind: MessageKind::Text,
        }],
    );
    messages
}
