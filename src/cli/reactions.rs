//! Reactions command implementation

use anyhow::{Context, Result};

use super::output::{reaction_event_line, ReactionEventPayload};
use crate::store::MessageStore;

pub fn run(
    store: &MessageStore,
    chat_id: Option<i64>,
    since_row_id: i64,
    limit: usize,
    json: bool,
) -> Result<()> {
    let events = store
        .reaction_events_after(since_row_id, chat_id, limit)
        .context("failed to read reaction events")?;

    for event in &events {
        if json {
            println!("{}", serde_json::to_string(&ReactionEventPayload::from(event))?);
        } else {
            println!("{}", reaction_event_line(event));
        }
    }

    Ok(())
}
