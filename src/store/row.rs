//! Raw result rows to logical records
//!
//! Accessors here are deliberately lenient: a column holding an unexpected
//! type degrades to an empty/absent value instead of failing the read.

use rusqlite::types::ValueRef;
use rusqlite::Row;

use super::epoch::apple_date;
use super::query::{MESSAGE_COLUMNS, REACTION_EVENT_COLUMNS, TAPBACK_COLUMNS};
use crate::decode::decode_attributed_body;
use crate::error::Result;
use crate::model::Message;
use crate::reaction::{is_reaction, ReactionEvent, ReactionMarker, Tapback, TapbackRow};

// ============================================
// FIELD ACCESSORS
// ============================================

pub(crate) fn text_at(row: &Row, idx: usize) -> rusqlite::Result<String> {
    Ok(match row.get_ref(idx)? {
        ValueRef::Text(bytes) => String::from_utf8_lossy(bytes).into_owned(),
        ValueRef::Integer(value) => value.to_string(),
        _ => String::new(),
    })
}

pub(crate) fn int_at(row: &Row, idx: usize) -> rusqlite::Result<Option<i64>> {
    Ok(match row.get_ref(idx)? {
        ValueRef::Integer(value) => Some(value),
        ValueRef::Real(value) => Some(value as i64),
        ValueRef::Text(bytes) => std::str::from_utf8(bytes)
            .ok()
            .and_then(|s| s.trim().parse().ok()),
        _ => None,
    })
}

pub(crate) fn bool_at(row: &Row, idx: usize) -> rusqlite::Result<bool> {
    Ok(int_at(row, idx)?.is_some_and(|value| value != 0))
}

pub(crate) fn blob_at(row: &Row, idx: usize) -> rusqlite::Result<Vec<u8>> {
    Ok(match row.get_ref(idx)? {
        ValueRef::Blob(bytes) => bytes.to_vec(),
        _ => Vec::new(),
    })
}

// ============================================
// FIELD RESOLUTION
// ============================================

/// Handle id, else the destination caller id, else empty
pub fn resolve_sender(handle: String, destination_caller_id: String) -> String {
    if handle.is_empty() {
        destination_caller_id
    } else {
        handle
    }
}

/// Plain text column, else the decoded rich body
pub fn resolve_body(text: String, rich_body: &[u8]) -> String {
    if text.is_empty() {
        decode_attributed_body(rich_body)
    } else {
        text
    }
}

/// Strip the `p:N/` part prefix from an associated message reference
pub fn normalize_associated_guid(guid: &str) -> String {
    match guid.rfind('/') {
        Some(slash) if slash + 1 < guid.len() => guid[slash + 1..].to_string(),
        _ => guid.to_string(),
    }
}

/// Reply target for a normal message; tapbacks never count as replies.
pub fn reply_to_guid(associated_guid: &str, associated_type: Option<i64>) -> Option<String> {
    let normalized = normalize_associated_guid(associated_guid);
    if normalized.is_empty() || associated_type.is_some_and(is_reaction) {
        return None;
    }
    Some(normalized)
}

fn non_empty(value: String) -> Option<String> {
    (!value.is_empty()).then_some(value)
}

// ============================================
// ROW DECODERS
// ============================================

/// Decode a row laid out as `MESSAGE_COLUMNS`.
///
/// `transcription` is consulted only for audio-flagged rows; a transcription
/// replaces the placeholder text those rows carry.
pub fn decode_message<F>(
    row: &Row,
    fallback_chat_id: Option<i64>,
    transcription: F,
) -> Result<Message>
where
    F: FnOnce(i64) -> Result<Option<String>>,
{
    let c = MESSAGE_COLUMNS;
    let row_id = int_at(row, c.row_id)?.unwrap_or(0);
    let sender = resolve_sender(text_at(row, c.handle)?, text_at(row, c.destination_caller_id)?);

    let mut text = resolve_body(text_at(row, c.text)?, &blob_at(row, c.body)?);
    if bool_at(row, c.is_audio)? {
        if let Some(transcript) = transcription(row_id)? {
            text = transcript;
        }
    }

    let associated_guid = text_at(row, c.associated_guid)?;
    let associated_type = int_at(row, c.associated_type)?;
    let reaction = associated_type
        .and_then(|code| Tapback::classify(code, &text))
        .and_then(|tapback| {
            tapback.resolved().map(|(kind, is_add)| ReactionMarker {
                kind: kind.clone(),
                is_add,
                target_guid: normalize_associated_guid(&associated_guid),
            })
        });

    Ok(Message {
        row_id,
        chat_id: int_at(row, c.chat_id)?.or(fallback_chat_id).unwrap_or(0),
        guid: text_at(row, c.guid)?,
        reply_to_guid: reply_to_guid(&associated_guid, associated_type),
        thread_originator_guid: non_empty(text_at(row, c.thread_originator_guid)?),
        sender,
        text,
        date: apple_date(int_at(row, c.date)?),
        is_from_me: bool_at(row, c.is_from_me)?,
        service: text_at(row, c.service)?,
        handle_id: int_at(row, c.handle_id)?,
        attachments_count: int_at(row, c.attachments)?.unwrap_or(0),
        reaction,
    })
}

/// Decode a row laid out as `TAPBACK_COLUMNS`; `None` if it is not a usable tapback.
pub fn decode_tapback(row: &Row) -> rusqlite::Result<Option<TapbackRow>> {
    let c = TAPBACK_COLUMNS;
    let Some(code) = int_at(row, c.associated_type)? else {
        return Ok(None);
    };
    let text = resolve_body(text_at(row, c.text)?, &blob_at(row, c.body)?);
    let Some(action) = Tapback::classify(code, &text) else {
        return Ok(None);
    };
    Ok(Some(TapbackRow {
        row_id: int_at(row, c.row_id)?.unwrap_or(0),
        action,
        sender: resolve_sender(text_at(row, c.handle)?, text_at(row, c.destination_caller_id)?),
        is_from_me: bool_at(row, c.is_from_me)?,
        date: apple_date(int_at(row, c.date)?),
    }))
}

/// Decode a row laid out as `REACTION_EVENT_COLUMNS`.
///
/// Custom tapbacks whose emoji cannot be recovered are skipped.
pub fn decode_reaction_event(
    row: &Row,
    fallback_chat_id: Option<i64>,
) -> rusqlite::Result<Option<ReactionEvent>> {
    let c = REACTION_EVENT_COLUMNS;
    let Some(code) = int_at(row, c.associated_type)? else {
        return Ok(None);
    };
    let text = resolve_body(text_at(row, c.text)?, &blob_at(row, c.body)?);
    let Some((kind, is_add)) = Tapback::classify(code, &text)
        .as_ref()
        .and_then(|tapback| tapback.resolved())
        .map(|(kind, is_add)| (kind.clone(), is_add))
    else {
        return Ok(None);
    };

    Ok(Some(ReactionEvent {
        row_id: int_at(row, c.row_id)?.unwrap_or(0),
        chat_id: int_at(row, c.chat_id)?.or(fallback_chat_id).unwrap_or(0),
        kind,
        is_add,
        sender: resolve_sender(text_at(row, c.handle)?, text_at(row, c.destination_caller_id)?),
        is_from_me: bool_at(row, c.is_from_me)?,
        date: apple_date(int_at(row, c.date)?),
        target_guid: normalize_associated_guid(&text_at(row, c.associated_guid)?),
        target_row_id: int_at(row, c.target_row_id)?,
        text,
    }))
}
