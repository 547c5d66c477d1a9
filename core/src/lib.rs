/// SideChat Core - chat state management and message lifecycle
///
/// A small chat core: chats and their ordered message histories behind an
/// explicit mutation API, a pure reducer for the state transitions, a
/// key-value snapshot collaborator for persistence, and a completion-service
/// collaborator for AI-backed chats.

pub mod cli_app;
pub mod completion;
pub mod config;
pub mod demo;
pub mod error;
pub mod snapshot;
pub mod state;
pub mod store;
pub mod types;

pub use completion::{CompletionService, ScriptedCompletion};
pub use config::Config;
pub use error::{ChatError, Result};
pub use store::ChatStore;
