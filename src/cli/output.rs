//! Human and JSON-lines rendering shared by the history and watch commands

use anyhow::Result;
use serde::Serialize;

use crate::attachments::display_name;
use crate::model::{format_iso8601, AttachmentMeta, Chat, Message};
use crate::reaction::{Reaction, ReactionEvent};
use crate::store::MessageStore;

#[derive(Debug, Serialize)]
pub struct ChatPayload {
    pub id: i64,
    pub name: String,
    pub identifier: String,
    pub service: String,
    pub last_message_at: String,
}

impl From<&Chat> for ChatPayload {
    fn from(chat: &Chat) -> Self {
        Self {
            id: chat.id,
            name: chat.name.clone(),
            identifier: chat.identifier.clone(),
            service: chat.service.clone(),
            last_message_at: format_iso8601(&chat.last_message_at),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AttachmentPayload {
    pub filename: String,
    pub transfer_name: String,
    pub uti: String,
    pub mime_type: String,
    pub total_bytes: i64,
    pub is_sticker: bool,
    pub original_path: String,
    pub missing: bool,
}

impl From<&AttachmentMeta> for AttachmentPayload {
    fn from(meta: &AttachmentMeta) -> Self {
        Self {
            filename: meta.filename.clone(),
            transfer_name: meta.transfer_name.clone(),
            uti: meta.uti.clone(),
            mime_type: meta.mime_type.clone(),
            total_bytes: meta.total_bytes,
            is_sticker: meta.is_sticker,
            original_path: meta.original_path.clone(),
            missing: meta.missing,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ReactionPayload {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: String,
    pub emoji: String,
    pub sender: String,
    pub is_from_me: bool,
    pub created_at: String,
}

impl From<&Reaction> for ReactionPayload {
    fn from(reaction: &Reaction) -> Self {
        Self {
            id: reaction.row_id,
            kind: reaction.kind.name().to_string(),
            emoji: reaction.kind.emoji().to_string(),
            sender: reaction.sender.clone(),
            is_from_me: reaction.is_from_me,
            created_at: format_iso8601(&reaction.date),
        }
    }
}

/// A raw tapback add/remove event
#[derive(Debug, Serialize)]
pub struct ReactionEventPayload {
    pub id: i64,
    pub chat_id: i64,
    #[serde(rename = "type")]
    pub kind: String,
    pub emoji: String,
    pub is_reaction_add: bool,
    pub sender: String,
    pub is_from_me: bool,
    pub created_at: String,
    pub reacted_to_guid: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reacted_to_id: Option<i64>,
    pub text: String,
}

impl From<&ReactionEvent> for ReactionEventPayload {
    fn from(event: &ReactionEvent) -> Self {
        Self {
            id: event.row_id,
            chat_id: event.chat_id,
            kind: event.kind.name().to_string(),
            emoji: event.kind.emoji().to_string(),
            is_reaction_add: event.is_add,
            sender: event.sender.clone(),
            is_from_me: event.is_from_me,
            created_at: format_iso8601(&event.date),
            reacted_to_guid: event.target_guid.clone(),
            reacted_to_id: event.target_row_id,
            text: event.text.clone(),
        }
    }
}

/// One message per JSON line. Tapback keys appear only on tapback rows.
#[derive(Debug, Serialize)]
pub struct MessagePayload {
    pub id: i64,
    pub chat_id: i64,
    pub guid: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_to_guid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_originator_guid: Option<String>,
    pub sender: String,
    pub is_from_me: bool,
    pub text: String,
    pub created_at: String,
    pub service: String,
    pub attachments: Vec<AttachmentPayload>,
    pub reactions: Vec<ReactionPayload>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_reaction: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reaction_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reaction_emoji: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_reaction_add: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reacted_to_guid: Option<String>,
}

impl MessagePayload {
    pub fn new(message: &Message, attachments: &[AttachmentMeta], reactions: &[Reaction]) -> Self {
        let marker = message.reaction.as_ref();
        Self {
            id: message.row_id,
            chat_id: message.chat_id,
            guid: message.guid.clone(),
            reply_to_guid: message.reply_to_guid.clone(),
            thread_originator_guid: message.thread_originator_guid.clone(),
            sender: message.sender.clone(),
            is_from_me: message.is_from_me,
            text: message.text.clone(),
            created_at: format_iso8601(&message.date),
            service: message.service.clone(),
            attachments: attachments.iter().map(AttachmentPayload::from).collect(),
            reactions: reactions.iter().map(ReactionPayload::from).collect(),
            is_reaction: marker.map(|_| true),
            reaction_type: marker.map(|m| m.kind.name().to_string()),
            reaction_emoji: marker.map(|m| m.kind.emoji().to_string()),
            is_reaction_add: marker.map(|m| m.is_add),
            reacted_to_guid: marker
                .map(|m| m.target_guid.clone())
                .filter(|guid| !guid.is_empty()),
        }
    }
}

// ============================================
// HUMAN OUTPUT
// ============================================

fn direction(is_from_me: bool) -> &'static str {
    if is_from_me {
        "sent"
    } else {
        "recv"
    }
}

pub fn message_line(message: &Message) -> String {
    format!(
        "{} [{}] {}: {}",
        format_iso8601(&message.date),
        direction(message.is_from_me),
        message.sender,
        message.text
    )
}

fn tapback_line(
    date: &chrono::DateTime<chrono::Utc>,
    is_from_me: bool,
    sender: &str,
    is_add: bool,
    emoji: &str,
    target_guid: &str,
) -> String {
    let action = if is_add { "added" } else { "removed" };
    let target = if target_guid.is_empty() { "unknown" } else { target_guid };
    format!(
        "{} [{}] {sender} {action} {emoji} reaction to {target}",
        format_iso8601(date),
        direction(is_from_me)
    )
}

/// `None` unless the message is a tapback row
pub fn reaction_line(message: &Message) -> Option<String> {
    let marker = message.reaction.as_ref()?;
    Some(tapback_line(
        &message.date,
        message.is_from_me,
        &message.sender,
        marker.is_add,
        marker.kind.emoji(),
        &marker.target_guid,
    ))
}

pub fn reaction_event_line(event: &ReactionEvent) -> String {
    tapback_line(
        &event.date,
        event.is_from_me,
        &event.sender,
        event.is_add,
        event.kind.emoji(),
        &event.target_guid,
    )
}

pub fn attachment_line(meta: &AttachmentMeta) -> String {
    format!(
        "  attachment: name={} mime={} missing={} path={}",
        display_name(&meta.filename, &meta.transfer_name),
        meta.mime_type,
        meta.missing,
        meta.original_path
    )
}

pub fn attachment_summary(count: i64) -> String {
    let suffix = if count == 1 { "" } else { "s" };
    format!("  ({count} attachment{suffix})")
}

/// How the history and watch commands print each message
#[derive(Debug, Clone, Copy, Default)]
pub struct OutputMode {
    pub json: bool,
    pub attachments: bool,
}

/// Render one message as the lines to print.
///
/// JSON mode loads attachments and the reconciled reaction set; human mode
/// only loads attachments when detail is requested.
pub fn render_message(store: &MessageStore, message: &Message, mode: OutputMode) -> Result<Vec<String>> {
    if mode.json {
        let attachments = store.attachments(message.row_id)?;
        let reactions = store.reactions(message.row_id)?;
        let payload = MessagePayload::new(message, &attachments, &reactions);
        return Ok(vec![serde_json::to_string(&payload)?]);
    }

    if let Some(line) = reaction_line(message) {
        return Ok(vec![line]);
    }

    let mut lines = vec![message_line(message)];
    if message.attachments_count > 0 {
        if mode.attachments {
            lines.extend(store.attachments(message.row_id)?.iter().map(attachment_line));
        } else {
            lines.push(attachment_summary(message.attachments_count));
        }
    }
    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reaction::{ReactionKind, ReactionMarker};
    use chrono::DateTime;

    fn message() -> Message {
        Message {
            row_id: 7,
            chat_id: 1,
            guid: "GUID-7".to_string(),
            reply_to_guid: None,
            thread_originator_guid: None,
            sender: "+123".to_string(),
            text: "hello".to_string(),
            date: DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
            is_from_me: false,
            service: "iMessage".to_string(),
            handle_id: Some(1),
            attachments_count: 0,
            reaction: None,
        }
    }

    #[test]
    fn test_message_line() {
        assert_eq!(
            message_line(&message()),
            "2023-11-14T22:13:20.000Z [recv] +123: hello"
        );
    }

    #[test]
    fn test_reaction_line() {
        let mut tapback = message();
        tapback.is_from_me = true;
        tapback.reaction = Some(ReactionMarker {
            kind: ReactionKind::Like,
            is_add: false,
            target_guid: "GUID-1".to_string(),
        });
        assert_eq!(
            reaction_line(&tapback).unwrap(),
            "2023-11-14T22:13:20.000Z [sent] +123 removed 👍 reaction to GUID-1"
        );
        assert!(reaction_line(&message()).is_none());
    }

    #[test]
    fn test_attachment_lines() {
        assert_eq!(attachment_summary(1), "  (1 attachment)");
        assert_eq!(attachment_summary(3), "  (3 attachments)");

        let meta = AttachmentMeta {
            filename: "~/a.jpg".to_string(),
            transfer_name: String::new(),
            uti: "public.jpeg".to_string(),
            mime_type: "image/jpeg".to_string(),
            total_bytes: 10,
            is_sticker: false,
            original_path: "/Users/me/a.jpg".to_string(),
            missing: true,
        };
        assert_eq!(
            attachment_line(&meta),
            "  attachment: name=~/a.jpg mime=image/jpeg missing=true path=/Users/me/a.jpg"
        );
    }

    #[test]
    fn test_payload_omits_unset_keys() {
        let json = serde_json::to_value(MessagePayload::new(&message(), &[], &[])).unwrap();
        assert_eq!(json["id"], 7);
        assert_eq!(json["created_at"], "2023-11-14T22:13:20.000Z");
        assert_eq!(json["attachments"], serde_json::json!([]));
        assert!(json.get("reply_to_guid").is_none());
        assert!(json.get("is_reaction").is_none());
        assert!(json.get("reacted_to_guid").is_none());
    }

    #[test]
    fn test_payload_reaction_keys() {
        let mut tapback = message();
        tapback.reaction = Some(ReactionMarker {
            kind: ReactionKind::Custom("🎉".to_string()),
            is_add: true,
            target_guid: "GUID-1".to_string(),
        });
        let reaction = Reaction {
            row_id: 9,
            kind: ReactionKind::Love,
            sender: "+456".to_string(),
            is_from_me: false,
            date: tapback.date,
            associated_message_id: 7,
        };
        let json = serde_json::to_value(MessagePayload::new(&tapback, &[], &[reaction])).unwrap();
        assert_eq!(json["is_reaction"], true);
        assert_eq!(json["reaction_type"], "custom");
        assert_eq!(json["reaction_emoji"], "🎉");
        assert_eq!(json["is_reaction_add"], true);
        assert_eq!(json["reacted_to_guid"], "GUID-1");
        assert_eq!(json["reactions"][0]["type"], "love");
        assert_eq!(json["reactions"][0]["emoji"], "❤️");
    }

    #[test]
    fn test_reaction_event_output() {
        let event = ReactionEvent {
            row_id: 12,
            chat_id: 1,
            kind: ReactionKind::Custom("🇺🇸".to_string()),
            is_add: false,
            sender: "+456".to_string(),
            is_from_me: false,
            date: DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
            target_guid: "GUID-1".to_string(),
            target_row_id: None,
            text: "Removed 🇺🇸 from \"hi\"".to_string(),
        };
        assert_eq!(
            reaction_event_line(&event),
            "2023-11-14T22:13:20.000Z [recv] +456 removed 🇺🇸 reaction to GUID-1"
        );

        let json = serde_json::to_value(ReactionEventPayload::from(&event)).unwrap();
        assert_eq!(json["type"], "custom");
        assert_eq!(json["is_reaction_add"], false);
        assert_eq!(json["reacted_to_guid"], "GUID-1");
        assert!(json.get("reacted_to_id").is_none());
    }
}
