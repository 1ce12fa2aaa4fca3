//! Tapback (reaction) model and classification
//!
//! Reactions are stored as ordinary message rows whose `associated_message_type`
//! falls in 2000..=2006 (add) or 3000..=3006 (remove). Code 2006/3006 carries a
//! custom emoji that only appears in the row's text.

mod emoji;
mod reconcile;

pub use emoji::{extract_custom_emoji, first_emoji};
pub use reconcile::{reconcile, ReactionReconciler, TapbackRow};

use chrono::{DateTime, Utc};
use std::ops::RangeInclusive;

pub const ADD_CODES: RangeInclusive<i64> = 2000..=2006;
pub const REMOVE_CODES: RangeInclusive<i64> = 3000..=3006;
pub const REMOVE_OFFSET: i64 = 1000;
const CUSTOM_ADD_CODE: i64 = 2006;

pub fn is_reaction_add(code: i64) -> bool {
    ADD_CODES.contains(&code)
}

pub fn is_reaction_remove(code: i64) -> bool {
    REMOVE_CODES.contains(&code)
}

pub fn is_reaction(code: i64) -> bool {
    is_reaction_add(code) || is_reaction_remove(code)
}

/// The six standard tapbacks plus custom emoji reactions
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ReactionKind {
    Love,
    Like,
    Dislike,
    Laugh,
    Emphasis,
    Question,
    Custom(String),
}

impl ReactionKind {
    /// Map an add code (2000..=2006) to a kind. Custom needs its emoji.
    pub fn from_add_code(code: i64, custom_emoji: Option<String>) -> Option<Self> {
        match code {
            2000 => Some(ReactionKind::Love),
            2001 => Some(ReactionKind::Like),
            2002 => Some(ReactionKind::Dislike),
            2003 => Some(ReactionKind::Laugh),
            2004 => Some(ReactionKind::Emphasis),
            2005 => Some(ReactionKind::Question),
            CUSTOM_ADD_CODE => custom_emoji.map(ReactionKind::Custom),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ReactionKind::Love => "love",
            ReactionKind::Like => "like",
            ReactionKind::Dislike => "dislike",
            ReactionKind::Laugh => "laugh",
            ReactionKind::Emphasis => "emphasis",
            ReactionKind::Question => "question",
            ReactionKind::Custom(_) => "custom",
        }
    }

    pub fn emoji(&self) -> &str {
        match self {
            ReactionKind::Love => "❤️",
            ReactionKind::Like => "👍",
            ReactionKind::Dislike => "👎",
            ReactionKind::Laugh => "😂",
            ReactionKind::Emphasis => "‼️",
            ReactionKind::Question => "❓",
            ReactionKind::Custom(emoji) => emoji,
        }
    }

    pub fn add_code(&self) -> i64 {
        match self {
            ReactionKind::Love => 2000,
            ReactionKind::Like => 2001,
            ReactionKind::Dislike => 2002,
            ReactionKind::Laugh => 2003,
            ReactionKind::Emphasis => 2004,
            ReactionKind::Question => 2005,
            ReactionKind::Custom(_) => CUSTOM_ADD_CODE,
        }
    }

    pub fn remove_code(&self) -> i64 {
        self.add_code() + REMOVE_OFFSET
    }

    pub fn is_custom(&self) -> bool {
        matches!(self, ReactionKind::Custom(_))
    }
}

/// What a single tapback row does to the reaction state of its target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tapback {
    Add(ReactionKind),
    Remove(ReactionKind),
    /// Custom removal whose emoji could not be recovered from the text
    RemoveAnyCustom,
}

impl Tapback {
    /// Classify an `associated_message_type` code, using `text` for custom emoji.
    ///
    /// Returns `None` for non-reaction codes and for custom adds without an emoji.
    pub fn classify(code: i64, text: &str) -> Option<Self> {
        if is_reaction_add(code) {
            let emoji = (code == CUSTOM_ADD_CODE)
                .then(|| extract_custom_emoji(text))
                .flatten();
            return ReactionKind::from_add_code(code, emoji).map(Tapback::Add);
        }
        if is_reaction_remove(code) {
            let add_code = code - REMOVE_OFFSET;
            if add_code == CUSTOM_ADD_CODE {
                return Some(match extract_custom_emoji(text) {
                    Some(emoji) => Tapback::Remove(ReactionKind::Custom(emoji)),
                    None => Tapback::RemoveAnyCustom,
                });
            }
            return ReactionKind::from_add_code(add_code, None).map(Tapback::Remove);
        }
        None
    }

    /// The kind and add/remove flag, when the row fully identifies one.
    pub fn resolved(&self) -> Option<(&ReactionKind, bool)> {
        match self {
            Tapback::Add(kind) => Some((kind, true)),
            Tapback::Remove(kind) => Some((kind, false)),
            Tapback::RemoveAnyCustom => None,
        }
    }
}

/// Reaction metadata attached to a `Message` that is itself a tapback event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReactionMarker {
    pub kind: ReactionKind,
    pub is_add: bool,
    /// Target message GUID with any `p:N/` part prefix stripped
    pub target_guid: String,
}

/// A live reaction on a message (the reconciled state)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reaction {
    /// Row id of the tapback row that produced this state
    pub row_id: i64,
    pub kind: ReactionKind,
    pub sender: String,
    pub is_from_me: bool,
    pub date: DateTime<Utc>,
    /// Row id of the message being reacted to
    pub associated_message_id: i64,
}

/// A raw add/remove event, as streamed by watch mode
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReactionEvent {
    pub row_id: i64,
    pub chat_id: i64,
    pub kind: ReactionKind,
    pub is_add: bool,
    pub sender: String,
    pub is_from_me: bool,
    pub date: DateTime<Utc>,
    pub target_guid: String,
    pub target_row_id: Option<i64>,
    /// Original tapback text, e.g. `Liked "hello"`
    pub text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_ranges() {
        assert!(is_reaction_add(2000));
        assert!(is_reaction_add(2006));
        assert!(!is_reaction_add(2007));
        assert!(is_reaction_remove(3003));
        assert!(!is_reaction(0));
        assert!(!is_reaction(1999));
    }

    #[test]
    fn test_kind_codes_and_names() {
        assert_eq!(ReactionKind::Love.add_code(), 2000);
        assert_eq!(ReactionKind::Question.remove_code(), 3005);
        assert_eq!(ReactionKind::Laugh.name(), "laugh");
        assert_eq!(ReactionKind::Like.emoji(), "👍");
        let custom = ReactionKind::Custom("🎉".to_string());
        assert_eq!(custom.emoji(), "🎉");
        assert_eq!(custom.remove_code(), 3006);
        assert!(custom.is_custom());
    }

    #[test]
    fn test_classify_standard() {
        assert_eq!(
            Tapback::classify(2001, "Liked \"hi\""),
            Some(Tapback::Add(ReactionKind::Like))
        );
        assert_eq!(
            Tapback::classify(3001, "Removed a like"),
            Some(Tapback::Remove(ReactionKind::Like))
        );
        assert_eq!(Tapback::classify(0, "hello"), None);
    }

    #[test]
    fn test_classify_custom() {
        assert_eq!(
            Tapback::classify(2006, "Reacted 🎉 to \"hi\""),
            Some(Tapback::Add(ReactionKind::Custom("🎉".to_string())))
        );
        assert_eq!(Tapback::classify(2006, "Reacted to a message"), None);
        assert_eq!(
            Tapback::classify(3006, "Removed a reaction"),
            Some(Tapback::RemoveAnyCustom)
        );
        assert_eq!(Tapback::RemoveAnyCustom.resolved(), None);
    }

    #[test]
    fn test_flag_removal_cancels_flag_add() {
        let add = Tapback::classify(2006, "Reacted 🇺🇸 to \"hi\"").unwrap();
        let remove = Tapback::classify(3006, "Removed 🇺🇸 from \"hi\"").unwrap();
        assert_eq!(remove, Tapback::Remove(ReactionKind::Custom("🇺🇸".to_string())));

        let date = chrono::DateTime::from_timestamp(1_000, 0).unwrap();
        let row = |row_id, action| TapbackRow {
            row_id,
            action,
            sender: "+123".to_string(),
            is_from_me: false,
            date,
        };
        assert!(reconcile(1, [row(2, add), row(3, remove)]).is_empty());
    }
}
