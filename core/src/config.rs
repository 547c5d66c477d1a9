/// Configuration management
use crate::error::{ChatError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_SYSTEM_PROMPT: &str = "You are a friendly and helpful assistant.";

/// Store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Data directory for the persisted snapshot (defaults to `.sidechat`)
    pub data_dir: PathBuf,

    /// System role sent with every completion call
    pub system_prompt: String,

    /// Delay from send until a human-chat message shows `delivered`
    pub delivered_after: Duration,

    /// Delay from send until a human-chat message shows `read`
    pub read_after: Duration,

    /// Run on an in-memory snapshot store, discarding state on exit
    pub ephemeral: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".sidechat"),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            delivered_after: Duration::from_secs(1),
            read_after: Duration::from_secs(2),
            ephemeral: false,
        }
    }
}

impl Config {
    /// Create config from command line arguments
    pub fn from_args(args: &[String]) -> Result<Self> {
        let mut config = Config::default();

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--data-dir" => {
                    let path = args.get(i + 1).ok_or_else(|| {
                        ChatError::Config("--data-dir requires a path argument".to_string())
                    })?;
                    config.data_dir = PathBuf::from(path);
                    i += 2;
                }
                "--system-prompt" => {
                    let prompt = args.get(i + 1).ok_or_else(|| {
                        ChatError::Config("--system-prompt requires a string argument".to_string())
                    })?;
                    config.system_prompt = prompt.clone();
                    i += 2;
                }
                "--delivered-ms" => {
                    let ms = parse_ms(args.get(i + 1), "--delivered-ms")?;
                    config.delivered_after = Duration::from_millis(ms);
                    i += 2;
                }
                "--read-ms" => {
                    let ms = parse_ms(args.get(i + 1), "--read-ms")?;
                    config.read_after = Duration::from_millis(ms);
                    i += 2;
                }
                "--ephemeral" => {
                    config.ephemeral = true;
                    i += 1;
                }
                "--help" | "-h" => {
                    return Err(ChatError::Config(format!(
                        "Usage: {} [--data-dir <path>] [--system-prompt <text>] [--delivered-ms <ms>] [--read-ms <ms>] [--ephemeral]",
                        args.first().map(|s| s.as_str()).unwrap_or("sidechat")
                    )));
                }
                other => {
                    return Err(ChatError::Config(format!("Unknown argument: {}", other)));
                }
            }
        }

        // Env overrides (nice for scripts)
        if let Ok(dir) = std::env::var("SIDECHAT_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Ok(prompt) = std::env::var("SIDECHAT_SYSTEM_PROMPT") {
            config.system_prompt = prompt;
        }

        Ok(config)
    }
}

fn parse_ms(value: Option<&String>, flag: &str) -> Result<u64> {
    let raw = value
        .ok_or_else(|| ChatError::Config(format!("{} requires a millisecond argument", flag)))?;
    raw.parse::<u64>()
        .map_err(|_| ChatError::Config(format!("{} must be a non-negative number", flag)))
}
