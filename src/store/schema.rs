//! Optional-column detection for the Messages store
//!
//! The schema drifts across macOS releases. Each optional column is probed
//! once when the store is opened and the answer is fixed for the life of
//! the handle.

use rusqlite::Connection;
use std::collections::HashSet;

/// Which optional schema features the opened store carries
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    /// `message.attributedBody`
    pub rich_body: bool,
    /// `message.guid`, `associated_message_guid`, `associated_message_type`
    pub reaction_columns: bool,
    /// `message.thread_originator_guid`
    pub thread_originator: bool,
    /// `message.destination_caller_id`
    pub destination_caller_id: bool,
    /// `message.is_audio_message`
    pub audio_flag: bool,
    /// `attachment.user_info`
    pub attachment_extra_info: bool,
}

impl Capabilities {
    /// Inspect `message` and `attachment`. Missing tables just yield `false`.
    pub fn probe(conn: &Connection) -> Self {
        let message = table_columns(conn, "message");
        let attachment = table_columns(conn, "attachment");
        Self::from_columns(&message, &attachment)
    }

    fn from_columns(message: &HashSet<String>, attachment: &HashSet<String>) -> Self {
        Self {
            rich_body: message.contains("attributedbody"),
            reaction_columns: ["guid", "associated_message_guid", "associated_message_type"]
                .iter()
                .all(|c| message.contains(*c)),
            thread_originator: message.contains("thread_originator_guid"),
            destination_caller_id: message.contains("destination_caller_id"),
            audio_flag: message.contains("is_audio_message"),
            attachment_extra_info: attachment.contains("user_info"),
        }
    }

    /// All optional features present (current macOS schema)
    pub fn all() -> Self {
        Self {
            rich_body: true,
            reaction_columns: true,
            thread_originator: true,
            destination_caller_id: true,
            audio_flag: true,
            attachment_extra_info: true,
        }
    }
}

/// Lower-cased column names of `table`; empty if the table is absent or unreadable.
fn table_columns(conn: &Connection, table: &str) -> HashSet<String> {
    let read = || -> rusqlite::Result<HashSet<String>> {
        let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
        let names = stmt.query_map([], |row| row.get::<_, String>(1))?;
        let columns = names
            .map(|name| name.map(|n| n.to_lowercase()))
            .collect();
        columns
    };
    read().unwrap_or_default()
}
