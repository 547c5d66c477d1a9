use colored::*;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

use crate::store::ChatStore;
use crate::types::{ChatEvent, Sender, ThemeMode};

/// Interactive CLI collaborator over the chat store. This is the demo UI:
/// it only calls the store's operations and renders its events.
pub async fn run(store: ChatStore) -> anyhow::Result<()> {
    print_help();
    print_chats(&store).await;

    // Render incoming events (AI replies, receipts, typing) in the background
    let printer = tokio::spawn(print_events(store.clone()));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim().to_string();
        if line.is_empty() {
            continue;
        }
        if line == "/quit" || line == "/q" {
            break;
        }
        if let Err(e) = handle_line(&store, &line).await {
            eprintln!("{} {}", "✗".red().bold(), e.to_string().red());
        }
    }

    store.close();
    printer.abort();
    Ok(())
}

async fn handle_line(store: &ChatStore, line: &str) -> anyhow::Result<()> {
    match line.split_once(' ') {
        Some(("/new", name)) if !name.trim().is_empty() => {
            store.create_chat(name.trim(), false).await?;
            print_chats(store).await;
        }
        Some(("/new-ai", name)) if !name.trim().is_empty() => {
            store.create_chat(name.trim(), true).await?;
            print_history(store).await;
        }
        Some(("/select", index)) => {
            let chats = store.chats().await;
            match index.trim().parse::<usize>().ok().and_then(|n| chats.get(n)) {
                Some(chat) => {
                    store.select_chat(&chat.id).await?;
                    print_history(store).await;
                }
                None => eprintln!("{}", "No chat with that number, see /chats".yellow()),
            }
        }
        Some(("/theme", mode)) => match mode.trim().parse::<ThemeMode>() {
            Ok(theme) => store.set_theme(theme).await?,
            Err(e) => eprintln!("{}", e.yellow()),
        },
        None if line == "/chats" => print_chats(store).await,
        None if line == "/history" => print_history(store).await,
        None if line == "/help" => print_help(),
        _ if line.starts_with('/') => {
            eprintln!("{} Unknown command: {}", "✗".red().bold(), line.red());
            print_help();
        }
        _ => {
            // Plain text goes to the selected chat
            match store.selected_chat_id().await {
                Some(chat_id) => store.send_message(&chat_id, line).await?,
                None => eprintln!("{}", "Select a chat first (/chats, /select <n>)".yellow()),
            }
        }
    }
    Ok(())
}

async fn print_events(store: ChatStore) {
    let mut events = store.subscribe();
    loop {
        match events.recv().await {
            Ok(ChatEvent::MessageAppended { chat_id, message_id }) => {
                let Some(message) = store
                    .messages(&chat_id)
                    .await
                    .into_iter()
                    .find(|m| m.id == message_id)
                else {
                    continue;
                };
                match message.sender {
                    // The user's own line is already on screen
                    Sender::User => {}
                    Sender::Ai => {
                        println!("{} {}", "AI:".bright_cyan().bold(), message.text)
                    }
                    Sender::System => {
                        println!("{} {}", "system:".red().bold(), message.text.red())
                    }
                    Sender::Contact(id) => {
                        println!("{} {}", format!("{}:", id).green().bold(), message.text)
                    }
                }
            }
            Ok(ChatEvent::StatusChanged { status, .. }) => {
                println!("{}", format!("  ✓ {:?}", status).dimmed());
            }
            Ok(ChatEvent::TypingChanged { typing: true }) => {
                println!("{}", "  AI is typing…".dimmed());
            }
            Ok(_) => {}
            Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                debug!("Event printer lagged {} events", n);
            }
            Err(_) => break, // channel closed
        }
    }
}

async fn print_chats(store: &ChatStore) {
    let chats = store.chats().await;
    let selected = store.selected_chat_id().await;
    println!("{}", format!("Chats ({})", chats.len()).bright_cyan().bold());
    println!("{}", "─".repeat(60).dimmed());
    for (i, chat) in chats.iter().enumerate() {
        let marker = if selected.as_deref() == Some(chat.id.as_str()) {
            "▶".bright_white()
        } else {
            " ".normal()
        };
        let tag = if chat.is_ai { "[AI]".cyan() } else { "    ".normal() };
        let unread = if chat.unread_count > 0 {
            format!(" ({})", chat.unread_count).yellow()
        } else {
            "".normal()
        };
        println!(
            "{} {} {} {}{} {} {}",
            marker,
            i.to_string().cyan(),
            tag,
            chat.name.bold(),
            unread,
            chat.last_message.dimmed(),
            chat.last_message_time.dimmed()
        );
    }
}

async fn print_history(store: &ChatStore) {
    let Some(chat) = store.selected_chat().await else {
        eprintln!("{}", "No chat selected".yellow());
        return;
    };
    println!("{}", format!("─ {} ", chat.name).bright_cyan().bold());
    for message in store.messages(&chat.id).await {
        let who: ColoredString = match &message.sender {
            Sender::User => "you:".bright_white().bold(),
            Sender::Ai => "AI:".bright_cyan().bold(),
            Sender::System => "system:".red().bold(),
            Sender::Contact(id) => format!("{}:", id).green().bold(),
        };
        println!(
            "  {} {} {} {}",
            message.timestamp.dimmed(),
            who,
            message.text,
            format!("[{:?}]", message.status).to_lowercase().dimmed()
        );
    }
}

fn print_help() {
    println!("{}", "⚡ SideChat".bright_cyan().bold());
    println!();
    println!("{}", "Commands:".bright_white().bold());
    println!("  {} <name>       Create a chat with a human contact", "/new".cyan());
    println!("  {} <name>    Create an AI-backed chat", "/new-ai".cyan());
    println!("  {}              List chats", "/chats".cyan());
    println!("  {} <n>       Select chat number n", "/select".cyan());
    println!("  {}            Show the selected chat's history", "/history".cyan());
    println!("  {} <mode>     Switch theme (light|dark)", "/theme".cyan());
    println!("  {}               Exit", "/quit".cyan());
    println!("  anything else      Send it to the selected chat");
}
