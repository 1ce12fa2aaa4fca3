//! Logical records projected out of the Messages store
//!
//! Every value here is rebuilt on each query; nothing is written back to the store.

use chrono::{DateTime, Utc};

use crate::error::{Result, StoreError};
use crate::reaction::ReactionMarker;

/// A conversation as listed by `list_chats`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chat {
    pub id: i64,
    pub identifier: String,
    pub name: String,
    pub service: String,
    pub last_message_at: DateTime<Utc>,
}

/// Detail for a single conversation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatInfo {
    pub id: i64,
    pub identifier: String,
    pub guid: String,
    pub name: String,
    pub service: String,
}

/// A normalized message row.
///
/// `row_id` is the store-assigned sequence number and doubles as the change cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub row_id: i64,
    pub chat_id: i64,
    /// Empty on schemas that predate the guid column
    pub guid: String,
    pub reply_to_guid: Option<String>,
    pub thread_originator_guid: Option<String>,
    pub sender: String,
    pub text: String,
    pub date: DateTime<Utc>,
    pub is_from_me: bool,
    pub service: String,
    pub handle_id: Option<i64>,
    pub attachments_count: i64,
    /// Set when the row is a tapback add/remove event rather than a message
    pub reaction: Option<ReactionMarker>,
}

impl Message {
    pub fn is_reaction(&self) -> bool {
        self.reaction.is_some()
    }
}

/// Attachment metadata with its on-disk location resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentMeta {
    pub filename: String,
    pub transfer_name: String,
    pub uti: String,
    pub mime_type: String,
    pub total_bytes: i64,
    pub is_sticker: bool,
    pub original_path: String,
    pub missing: bool,
}

/// Caller-supplied narrowing applied inside the SQL, before the result cap.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageFilter {
    /// Effective-sender allow-list, matched case-insensitively
    pub participants: Vec<String>,
    /// Inclusive lower bound
    pub start: Option<DateTime<Utc>>,
    /// Exclusive upper bound
    pub end: Option<DateTime<Utc>>,
}

impl MessageFilter {
    /// Build a filter from raw CLI/RPC values
    pub fn from_iso(
        participants: Vec<String>,
        start: Option<&str>,
        end: Option<&str>,
    ) -> Result<Self> {
        Ok(Self {
            participants: participants
                .into_iter()
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty())
                .collect(),
            start: start.map(parse_iso8601).transpose()?,
            end: end.map(parse_iso8601).transpose()?,
        })
    }
}

/// Parse an ISO8601 / RFC3339 timestamp, with or without fractional seconds
pub fn parse_iso8601(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| StoreError::InvalidDate(value.to_string()))
}

/// Format a timestamp the way every output surface prints it
pub fn format_iso8601(date: &DateTime<Utc>) -> String {
    date.to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}
