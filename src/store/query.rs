//! SQL composition conditioned on the probed capability set
//!
//! Absent optional columns are projected as `NULL`/`0` placeholders so every
//! query variant keeps a fixed column layout. The layouts are spelled out by
//! the `*Columns` maps below; row decoding reads through them, never through
//! bare indices.

use rusqlite::types::Value;

use super::epoch::apple_epoch;
use super::schema::Capabilities;
use crate::model::MessageFilter;

/// Both tapback bands: adds and removes
const REACTION_BANDS: &str = "(m.associated_message_type BETWEEN 2000 AND 2006 \
     OR m.associated_message_type BETWEEN 3000 AND 3006)";

/// A composed statement and its positional bindings
#[derive(Debug, Clone)]
pub struct BuiltQuery {
    pub sql: String,
    pub params: Vec<Value>,
}

// ============================================
// COLUMN MAPS
// ============================================

/// Column positions of the message projection (history and cursor variants)
#[derive(Debug, Clone, Copy)]
pub struct MessageColumns {
    pub row_id: usize,
    pub chat_id: usize,
    pub handle_id: usize,
    pub handle: usize,
    pub text: usize,
    pub date: usize,
    pub is_from_me: usize,
    pub service: usize,
    pub is_audio: usize,
    pub destination_caller_id: usize,
    pub guid: usize,
    pub associated_guid: usize,
    pub associated_type: usize,
    pub thread_originator_guid: usize,
    pub attachments: usize,
    pub body: usize,
}

pub const MESSAGE_COLUMNS: MessageColumns = MessageColumns {
    row_id: 0,
    chat_id: 1,
    handle_id: 2,
    handle: 3,
    text: 4,
    date: 5,
    is_from_me: 6,
    service: 7,
    is_audio: 8,
    destination_caller_id: 9,
    guid: 10,
    associated_guid: 11,
    associated_type: 12,
    thread_originator_guid: 13,
    attachments: 14,
    body: 15,
};

/// Column positions of the per-message tapback history query
#[derive(Debug, Clone, Copy)]
pub struct TapbackColumns {
    pub row_id: usize,
    pub associated_type: usize,
    pub handle: usize,
    pub is_from_me: usize,
    pub date: usize,
    pub text: usize,
    pub body: usize,
    pub destination_caller_id: usize,
}

pub const TAPBACK_COLUMNS: TapbackColumns = TapbackColumns {
    row_id: 0,
    associated_type: 1,
    handle: 2,
    is_from_me: 3,
    date: 4,
    text: 5,
    body: 6,
    destination_caller_id: 7,
};

/// Column positions of the reaction-event cursor query
#[derive(Debug, Clone, Copy)]
pub struct ReactionEventColumns {
    pub row_id: usize,
    pub chat_id: usize,
    pub associated_type: usize,
    pub associated_guid: usize,
    pub handle: usize,
    pub is_from_me: usize,
    pub date: usize,
    pub text: usize,
    pub destination_caller_id: usize,
    pub body: usize,
    pub target_row_id: usize,
}

pub const REACTION_EVENT_COLUMNS: ReactionEventColumns = ReactionEventColumns {
    row_id: 0,
    chat_id: 1,
    associated_type: 2,
    associated_guid: 3,
    handle: 4,
    is_from_me: 5,
    date: 6,
    text: 7,
    destination_caller_id: 8,
    body: 9,
    target_row_id: 10,
};

// ============================================
// BUILDERS
// ============================================

fn column_or(present: bool, column: &str, placeholder: &str) -> String {
    if present {
        column.to_string()
    } else {
        placeholder.to_string()
    }
}

/// Handle identifier, falling back to the destination caller id
fn effective_sender(caps: &Capabilities) -> &'static str {
    if caps.destination_caller_id {
        "COALESCE(NULLIF(h.id, ''), m.destination_caller_id, '')"
    } else {
        "IFNULL(h.id, '')"
    }
}

/// Projection matching `MESSAGE_COLUMNS`
fn message_projection(caps: &Capabilities) -> String {
    let reactions = caps.reaction_columns;
    format!(
        "SELECT m.ROWID, cmj.chat_id, m.handle_id, h.id, IFNULL(m.text, '') AS text, m.date, \
                m.is_from_me, m.service, \
                {audio} AS is_audio_message, {caller} AS destination_caller_id, \
                {guid} AS guid, {assoc_guid} AS associated_guid, {assoc_type} AS associated_type, \
                {thread} AS thread_originator_guid, \
                (SELECT COUNT(*) FROM message_attachment_join maj WHERE maj.message_id = m.ROWID) AS attachments, \
                {body} AS body",
        audio = column_or(caps.audio_flag, "m.is_audio_message", "0"),
        caller = column_or(caps.destination_caller_id, "m.destination_caller_id", "NULL"),
        guid = column_or(reactions, "m.guid", "NULL"),
        assoc_guid = column_or(reactions, "m.associated_message_guid", "NULL"),
        assoc_type = column_or(reactions, "m.associated_message_type", "NULL"),
        thread = column_or(caps.thread_originator, "m.thread_originator_guid", "NULL"),
        body = column_or(caps.rich_body, "m.attributedBody", "NULL"),
    )
}

/// Excludes tapback rows; a no-op on schemas without reaction columns
fn reaction_exclusion(caps: &Capabilities) -> String {
    if caps.reaction_columns {
        format!(" AND (m.associated_message_type IS NULL OR NOT {REACTION_BANDS})")
    } else {
        String::new()
    }
}

fn push_filter(sql: &mut String, params: &mut Vec<Value>, caps: &Capabilities, filter: &MessageFilter) {
    if let Some(start) = &filter.start {
        sql.push_str(" AND m.date >= ?");
        params.push(Value::Integer(apple_epoch(start)));
    }
    if let Some(end) = &filter.end {
        sql.push_str(" AND m.date < ?");
        params.push(Value::Integer(apple_epoch(end)));
    }
    if !filter.participants.is_empty() {
        let placeholders = vec!["?"; filter.participants.len()].join(", ");
        sql.push_str(&format!(
            " AND LOWER({}) IN ({placeholders})",
            effective_sender(caps)
        ));
        params.extend(
            filter
                .participants
                .iter()
                .map(|p| Value::Text(p.to_lowercase())),
        );
    }
}

/// Newest-first history for one chat, capped at `limit` after filtering
pub fn history_query(
    caps: &Capabilities,
    chat_id: i64,
    filter: &MessageFilter,
    limit: usize,
) -> BuiltQuery {
    let mut sql = format!(
        "{} FROM message m \
         JOIN chat_message_join cmj ON m.ROWID = cmj.message_id \
         LEFT JOIN handle h ON m.handle_id = h.ROWID \
         WHERE cmj.chat_id = ?{}",
        message_projection(caps),
        reaction_exclusion(caps),
    );
    let mut params = vec![Value::Integer(chat_id)];
    push_filter(&mut sql, &mut params, caps, filter);
    sql.push_str(" ORDER BY m.date DESC, m.ROWID DESC LIMIT ?");
    params.push(Value::Integer(limit_value(limit)));
    BuiltQuery { sql, params }
}

/// Rows strictly after `after_row_id`, ascending by row id
pub fn cursor_query(
    caps: &Capabilities,
    after_row_id: i64,
    chat_id: Option<i64>,
    filter: &MessageFilter,
    include_reactions: bool,
    limit: usize,
) -> BuiltQuery {
    let mut sql = format!(
        "{} FROM message m \
         LEFT JOIN chat_message_join cmj ON m.ROWID = cmj.message_id \
         LEFT JOIN handle h ON m.handle_id = h.ROWID \
         WHERE m.ROWID > ?",
        message_projection(caps),
    );
    if !include_reactions {
        sql.push_str(&reaction_exclusion(caps));
    }
    let mut params = vec![Value::Integer(after_row_id)];
    if let Some(chat_id) = chat_id {
        sql.push_str(" AND cmj.chat_id = ?");
        params.push(Value::Integer(chat_id));
    }
    push_filter(&mut sql, &mut params, caps, filter);
    sql.push_str(" ORDER BY m.ROWID ASC LIMIT ?");
    params.push(Value::Integer(limit_value(limit)));
    BuiltQuery { sql, params }
}

/// Every tapback row aimed at one message, oldest first. Needs reaction columns.
pub fn tapback_history_query(caps: &Capabilities) -> String {
    format!(
        "SELECT m.ROWID, m.associated_message_type, h.id, m.is_from_me, m.date, \
                IFNULL(m.text, '') AS text, {body} AS body, {caller} AS destination_caller_id \
         FROM message target \
         JOIN message m ON m.associated_message_guid = target.guid \
           OR m.associated_message_guid LIKE '%/' || target.guid \
         LEFT JOIN handle h ON m.handle_id = h.ROWID \
         WHERE target.ROWID = ? \
           AND target.guid IS NOT NULL \
           AND target.guid != '' \
           AND {REACTION_BANDS} \
         ORDER BY m.date ASC, m.ROWID ASC",
        body = column_or(caps.rich_body, "m.attributedBody", "NULL"),
        caller = column_or(caps.destination_caller_id, "m.destination_caller_id", "NULL"),
    )
}

/// Raw tapback events after a cursor. Needs reaction columns.
pub fn reaction_events_query(
    caps: &Capabilities,
    after_row_id: i64,
    chat_id: Option<i64>,
    limit: usize,
) -> BuiltQuery {
    let mut sql = format!(
        "SELECT m.ROWID, cmj.chat_id, m.associated_message_type, m.associated_message_guid, \
                h.id, m.is_from_me, m.date, IFNULL(m.text, '') AS text, \
                {caller} AS destination_caller_id, {body} AS body, target.ROWID AS target_rowid \
         FROM message m \
         LEFT JOIN chat_message_join cmj ON m.ROWID = cmj.message_id \
         LEFT JOIN handle h ON m.handle_id = h.ROWID \
         LEFT JOIN message target ON target.guid IS NOT NULL AND target.guid != '' \
           AND (target.guid = m.associated_message_guid \
                OR m.associated_message_guid LIKE '%/' || target.guid) \
         WHERE m.ROWID > ? AND {REACTION_BANDS}",
        caller = column_or(caps.destination_caller_id, "m.destination_caller_id", "NULL"),
        body = column_or(caps.rich_body, "m.attributedBody", "NULL"),
    );
    let mut params = vec![Value::Integer(after_row_id)];
    if let Some(chat_id) = chat_id {
        sql.push_str(" AND cmj.chat_id = ?");
        params.push(Value::Integer(chat_id));
    }
    sql.push_str(" ORDER BY m.ROWID ASC LIMIT ?");
    params.push(Value::Integer(limit_value(limit)));
    BuiltQuery { sql, params }
}

fn limit_value(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}
