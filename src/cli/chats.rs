//! Chats command implementation

use anyhow::Result;

use super::output::ChatPayload;
use crate::model::format_iso8601;
use crate::store::MessageStore;

pub fn run(store: &MessageStore, limit: usize, json: bool) -> Result<()> {
    let chats = store.list_chats(limit)?;

    if json {
        for chat in &chats {
            println!("{}", serde_json::to_string(&ChatPayload::from(chat))?);
        }
        return Ok(());
    }

    if chats.is_empty() {
        println!("No chats found.");
        return Ok(());
    }

    println!(
        "{:<6} {:<25} {:<10} {:<30} {}",
        "ID", "Last Message", "Service", "Identifier", "Name"
    );
    println!("{}", "-".repeat(100));

    for chat in chats {
        println!(
            "{:<6} {:<25} {:<10} {:<30} {}",
            chat.id,
            format_iso8601(&chat.last_message_at),
            chat.service,
            truncate(&chat.identifier, 30),
            chat.name,
        );
    }

    Ok(())
}

fn truncate(value: &str, width: usize) -> String {
    if value.chars().count() > width {
        let head: String = value.chars().take(width.saturating_sub(3)).collect();
        format!("{head}...")
    } else {
        value.to_string()
    }
}
