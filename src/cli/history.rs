//! History command implementation

use anyhow::{Context, Result};

use super::output::{render_message, OutputMode};
use crate::model::MessageFilter;
use crate::store::MessageStore;

pub struct HistoryArgs {
    pub chat_id: i64,
    pub limit: usize,
    pub filter: MessageFilter,
    pub mode: OutputMode,
}

pub fn run(store: &MessageStore, args: HistoryArgs) -> Result<()> {
    let messages = store
        .messages(args.chat_id, args.limit, &args.filter)
        .with_context(|| format!("failed to read history for chat {}", args.chat_id))?;

    for message in &messages {
        for line in render_message(store, message, args.mode)? {
            println!("{line}");
        }
    }

    Ok(())
}
