//! Collapse an ordered tapback history into the live reaction set
//!
//! One live reaction per (sender, direction, kind). A later add for the same
//! key replaces the entry in place; a remove deletes it; a remove with nothing
//! live is ignored.

use chrono::{DateTime, Utc};
use std::collections::HashMap;

use super::{Reaction, ReactionKind, Tapback};

/// One tapback row targeting a message, in ascending store order
#[derive(Debug, Clone)]
pub struct TapbackRow {
    pub row_id: i64,
    pub action: Tapback,
    pub sender: String,
    pub is_from_me: bool,
    pub date: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ReactionKey {
    sender: String,
    is_from_me: bool,
    kind: ReactionKind,
}

/// Incremental reconciler. Removed entries leave a hole that `finish` compacts,
/// so every add/remove is O(1) on average.
#[derive(Debug)]
pub struct ReactionReconciler {
    message_row_id: i64,
    slots: Vec<Option<Reaction>>,
    index: HashMap<ReactionKey, usize>,
}

impl ReactionReconciler {
    pub fn new(message_row_id: i64) -> Self {
        Self {
            message_row_id,
            slots: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub fn apply(&mut self, row: TapbackRow) {
        match row.action {
            Tapback::Add(kind) => self.add(row.row_id, kind, row.sender, row.is_from_me, row.date),
            Tapback::Remove(kind) => {
                let key = ReactionKey {
                    sender: row.sender,
                    is_from_me: row.is_from_me,
                    kind,
                };
                if let Some(slot) = self.index.remove(&key) {
                    self.slots[slot] = None;
                }
            }
            Tapback::RemoveAnyCustom => self.remove_first_custom(&row.sender, row.is_from_me),
        }
    }

    fn add(
        &mut self,
        row_id: i64,
        kind: ReactionKind,
        sender: String,
        is_from_me: bool,
        date: DateTime<Utc>,
    ) {
        let key = ReactionKey {
            sender: sender.clone(),
            is_from_me,
            kind: kind.clone(),
        };
        let reaction = Reaction {
            row_id,
            kind,
            sender,
            is_from_me,
            date,
            associated_message_id: self.message_row_id,
        };
        match self.index.get(&key) {
            Some(&slot) => self.slots[slot] = Some(reaction),
            None => {
                self.index.insert(key, self.slots.len());
                self.slots.push(Some(reaction));
            }
        }
    }

    // Linear, but only reached when a custom removal lost its emoji.
    fn remove_first_custom(&mut self, sender: &str, is_from_me: bool) {
        let found = self.slots.iter().position(|slot| {
            slot.as_ref().is_some_and(|r| {
                r.sender == sender && r.is_from_me == is_from_me && r.kind.is_custom()
            })
        });
        if let Some(slot) = found {
            if let Some(reaction) = self.slots[slot].take() {
                self.index.remove(&ReactionKey {
                    sender: reaction.sender,
                    is_from_me: reaction.is_from_me,
                    kind: reaction.kind,
                });
            }
        }
    }

    /// Live reactions in first-added order
    pub fn finish(self) -> Vec<Reaction> {
        self.slots.into_iter().flatten().collect()
    }
}

/// Reconcile a complete history for one message
pub fn reconcile(message_row_id: i64, rows: impl IntoIterator<Item = TapbackRow>) -> Vec<Reaction> {
    let mut reconciler = ReactionReconciler::new(message_row_id);
    for row in rows {
        reconciler.apply(row);
    }
    reconciler.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn row(row_id: i64, action: Tapback, sender: &str, secs: i64) -> TapbackRow {
        TapbackRow {
            row_id,
            action,
            sender: sender.to_string(),
            is_from_me: false,
            date: at(secs),
        }
    }

    #[test]
    fn test_add_twice_keeps_one_with_later_timestamp() {
        let reactions = reconcile(
            1,
            vec![
                row(10, Tapback::Add(ReactionKind::Love), "+1", 100),
                row(11, Tapback::Add(ReactionKind::Love), "+1", 200),
            ],
        );
        assert_eq!(reactions.len(), 1);
        assert_eq!(reactions[0].row_id, 11);
        assert_eq!(reactions[0].date, at(200));
        assert_eq!(reactions[0].associated_message_id, 1);
    }

    #[test]
    fn test_add_then_remove_leaves_nothing() {
        let reactions = reconcile(
            1,
            vec![
                row(10, Tapback::Add(ReactionKind::Like), "+1", 100),
                row(11, Tapback::Remove(ReactionKind::Like), "+1", 200),
            ],
        );
        assert!(reactions.is_empty());
    }

    #[test]
    fn test_remove_without_add_is_noop() {
        let reactions = reconcile(
            1,
            vec![
                row(10, Tapback::Remove(ReactionKind::Laugh), "+1", 100),
                row(11, Tapback::Add(ReactionKind::Like), "+1", 200),
            ],
        );
        assert_eq!(reactions.len(), 1);
        assert_eq!(reactions[0].kind, ReactionKind::Like);
    }

    #[test]
    fn test_keys_are_per_sender_direction_and_kind() {
        let mut mine = row(12, Tapback::Add(ReactionKind::Love), "+1", 300);
        mine.is_from_me = true;
        let reactions = reconcile(
            1,
            vec![
                row(10, Tapback::Add(ReactionKind::Love), "+1", 100),
                row(11, Tapback::Add(ReactionKind::Love), "+2", 200),
                mine,
                row(13, Tapback::Add(ReactionKind::Laugh), "+1", 400),
                row(14, Tapback::Remove(ReactionKind::Love), "+2", 500),
            ],
        );
        let ids: Vec<i64> = reactions.iter().map(|r| r.row_id).collect();
        assert_eq!(ids, vec![10, 12, 13]);
    }

    #[test]
    fn test_readd_after_remove_moves_to_end() {
        let reactions = reconcile(
            1,
            vec![
                row(10, Tapback::Add(ReactionKind::Love), "+1", 100),
                row(11, Tapback::Add(ReactionKind::Like), "+2", 110),
                row(12, Tapback::Remove(ReactionKind::Love), "+1", 120),
                row(13, Tapback::Add(ReactionKind::Love), "+1", 130),
            ],
        );
        let ids: Vec<i64> = reactions.iter().map(|r| r.row_id).collect();
        assert_eq!(ids, vec![11, 13]);
    }

    #[test]
    fn test_custom_emoji_variants() {
        let party = ReactionKind::Custom("🎉".to_string());
        let fire = ReactionKind::Custom("🔥".to_string());
        let reactions = reconcile(
            1,
            vec![
                row(10, Tapback::Add(party.clone()), "+1", 100),
                row(11, Tapback::Add(fire.clone()), "+1", 110),
                row(12, Tapback::Remove(party), "+1", 120),
            ],
        );
        assert_eq!(reactions.len(), 1);
        assert_eq!(reactions[0].kind, fire);
    }

    #[test]
    fn test_remove_any_custom_takes_first_live_custom() {
        let reactions = reconcile(
            1,
            vec![
                row(10, Tapback::Add(ReactionKind::Love), "+1", 100),
                row(11, Tapback::Add(ReactionKind::Custom("🎉".into())), "+1", 110),
                row(12, Tapback::Add(ReactionKind::Custom("🔥".into())), "+2", 120),
                row(13, Tapback::RemoveAnyCustom, "+1", 130),
                // the removed key is free again
                row(14, Tapback::Add(ReactionKind::Custom("🎉".into())), "+1", 140),
            ],
        );
        let ids: Vec<i64> = reactions.iter().map(|r| r.row_id).collect();
        assert_eq!(ids, vec![10, 12, 14]);
    }
}
