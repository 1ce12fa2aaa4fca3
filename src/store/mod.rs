//! Read-only access to the Messages database (`chat.db`)
//!
//! The store is foreign: its schema is owned by macOS and shifts between
//! releases. Optional columns are probed once on open (see `schema`), SQL is
//! composed against that capability set (see `query`) and rows are decoded
//! leniently (see `row`).
//!
//! All access goes through one connection guarded by a re-entrant lock, so a
//! decoder that needs a follow-up lookup can call back into the store from
//! inside a running query.

mod epoch;
mod query;
mod row;
mod schema;

use parking_lot::ReentrantMutex;
use rusqlite::{params, params_from_iter, Connection, OpenFlags};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use crate::attachments;
use crate::decode::extract_transcription;
use crate::error::{Result, StoreError};
use crate::model::{AttachmentMeta, Chat, ChatInfo, Message, MessageFilter};
use crate::reaction::{reconcile, Reaction, ReactionEvent};

pub use epoch::{apple_date, apple_epoch, APPLE_EPOCH_OFFSET};
pub use query::BuiltQuery;
pub use row::normalize_associated_guid;
pub use schema::Capabilities;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

pub struct MessageStore {
    path: PathBuf,
    conn: ReentrantMutex<Connection>,
    caps: Capabilities,
}

impl MessageStore {
    /// Open the store read-only and probe its schema
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_ONLY)
            .map_err(|e| StoreError::classify(e, path))?;
        conn.busy_timeout(BUSY_TIMEOUT)
            .map_err(|e| StoreError::classify(e, path))?;
        let store = Self::from_connection(conn, path);
        info!(
            path = %path.display(),
            capabilities = ?store.caps,
            "opened message store"
        );
        Ok(store)
    }

    /// Wrap an already-open connection, probing its schema
    pub fn from_connection(conn: Connection, path: &Path) -> Self {
        let caps = Capabilities::probe(&conn);
        Self::with_capabilities(conn, path, caps)
    }

    /// Wrap a connection with an explicit capability set
    pub fn with_capabilities(conn: Connection, path: &Path, caps: Capabilities) -> Self {
        Self {
            path: path.to_path_buf(),
            conn: ReentrantMutex::new(conn),
            caps,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn capabilities(&self) -> Capabilities {
        self.caps
    }

    /// Run `f` against the connection. Re-entrant on the calling thread.
    pub(crate) fn with_connection<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.conn.lock();
        f(&conn).map_err(|err| match err {
            StoreError::Sqlite(e) => StoreError::classify(e, &self.path),
            other => other,
        })
    }

    // ============================================
    // CHATS
    // ============================================

    /// Chats ordered by most recent message
    pub fn list_chats(&self, limit: usize) -> Result<Vec<Chat>> {
        self.with_connection(|conn| {
            let mut stmt = conn.prepare(
                r#"SELECT c.ROWID, IFNULL(c.display_name, c.chat_identifier) AS name,
                          c.chat_identifier, c.service_name, MAX(m.date) AS last_date
                   FROM chat c
                   JOIN chat_message_join cmj ON c.ROWID = cmj.chat_id
                   JOIN message m ON m.ROWID = cmj.message_id
                   GROUP BY c.ROWID
                   ORDER BY last_date DESC
                   LIMIT ?"#,
            )?;
            let mut rows = stmt.query(params![limit as i64])?;
            let mut chats = Vec::new();
            while let Some(r) = rows.next()? {
                chats.push(Chat {
                    id: row::int_at(r, 0)?.unwrap_or(0),
                    name: row::text_at(r, 1)?,
                    identifier: row::text_at(r, 2)?,
                    service: row::text_at(r, 3)?,
                    last_message_at: apple_date(row::int_at(r, 4)?),
                });
            }
            Ok(chats)
        })
    }

    pub fn chat_info(&self, chat_id: i64) -> Result<Option<ChatInfo>> {
        self.with_connection(|conn| {
            let mut stmt = conn.prepare(
                r#"SELECT c.ROWID, IFNULL(c.chat_identifier, ''), IFNULL(c.guid, ''),
                          IFNULL(c.display_name, c.chat_identifier), IFNULL(c.service_name, '')
                   FROM chat c
                   WHERE c.ROWID = ?
                   LIMIT 1"#,
            )?;
            let mut rows = stmt.query(params![chat_id])?;
            let info = match rows.next()? {
                Some(r) => Some(ChatInfo {
                    id: row::int_at(r, 0)?.unwrap_or(0),
                    identifier: row::text_at(r, 1)?,
                    guid: row::text_at(r, 2)?,
                    name: row::text_at(r, 3)?,
                    service: row::text_at(r, 4)?,
                }),
                None => None,
            };
            Ok(info)
        })
    }

    /// Distinct, non-empty handle ids participating in a chat
    pub fn participants(&self, chat_id: i64) -> Result<Vec<String>> {
        self.with_connection(|conn| {
            let mut stmt = conn.prepare(
                r#"SELECT h.id
                   FROM chat_handle_join chj
                   JOIN handle h ON h.ROWID = chj.handle_id
                   WHERE chj.chat_id = ?
                   ORDER BY h.id ASC"#,
            )?;
            let mut rows = stmt.query(params![chat_id])?;
            let mut handles: Vec<String> = Vec::new();
            while let Some(r) = rows.next()? {
                let handle = row::text_at(r, 0)?;
                if !handle.is_empty() && !handles.contains(&handle) {
                    handles.push(handle);
                }
            }
            Ok(handles)
        })
    }

    // ============================================
    // ATTACHMENTS
    // ============================================

    pub fn attachments(&self, message_row_id: i64) -> Result<Vec<AttachmentMeta>> {
        self.with_connection(|conn| {
            let mut stmt = conn.prepare(
                r#"SELECT a.filename, a.transfer_name, a.uti, a.mime_type, a.total_bytes, a.is_sticker
                   FROM message_attachment_join maj
                   JOIN attachment a ON a.ROWID = maj.attachment_id
                   WHERE maj.message_id = ?"#,
            )?;
            let mut rows = stmt.query(params![message_row_id])?;
            let mut metas = Vec::new();
            while let Some(r) = rows.next()? {
                let filename = row::text_at(r, 0)?;
                let resolved = attachments::resolve(&filename);
                metas.push(AttachmentMeta {
                    filename,
                    transfer_name: row::text_at(r, 1)?,
                    uti: row::text_at(r, 2)?,
                    mime_type: row::text_at(r, 3)?,
                    total_bytes: row::int_at(r, 4)?.unwrap_or(0),
                    is_sticker: row::bool_at(r, 5)?,
                    original_path: resolved.resolved,
                    missing: resolved.missing,
                });
            }
            Ok(metas)
        })
    }

    /// Transcription stored in an attachment's `user_info` plist, if any
    pub fn audio_transcription(&self, message_row_id: i64) -> Result<Option<String>> {
        if !self.caps.attachment_extra_info {
            return Ok(None);
        }
        self.with_connection(|conn| {
            let mut stmt = conn.prepare(
                r#"SELECT a.user_info
                   FROM message_attachment_join maj
                   JOIN attachment a ON a.ROWID = maj.attachment_id
                   WHERE maj.message_id = ?"#,
            )?;
            let mut rows = stmt.query(params![message_row_id])?;
            while let Some(r) = rows.next()? {
                if let Some(text) = extract_transcription(&row::blob_at(r, 0)?) {
                    return Ok(Some(text));
                }
            }
            Ok(None)
        })
    }

    // ============================================
    // MESSAGES
    // ============================================

    /// Highest message row id, 0 for an empty store
    pub fn max_row_id(&self) -> Result<i64> {
        self.with_connection(|conn| {
            let max = conn.query_row("SELECT MAX(ROWID) FROM message", [], |r| row::int_at(r, 0))?;
            Ok(max.unwrap_or(0))
        })
    }

    /// Newest-first history of one chat, tapback rows excluded
    pub fn messages(&self, chat_id: i64, limit: usize, filter: &MessageFilter) -> Result<Vec<Message>> {
        let query = query::history_query(&self.caps, chat_id, filter, limit);
        self.run_message_query(query, Some(chat_id))
    }

    /// Rows strictly after `after_row_id` in ascending order.
    ///
    /// With `include_reactions`, tapback rows come through as messages carrying
    /// a `ReactionMarker`.
    pub fn messages_after(
        &self,
        after_row_id: i64,
        chat_id: Option<i64>,
        filter: &MessageFilter,
        include_reactions: bool,
        limit: usize,
    ) -> Result<Vec<Message>> {
        let query =
            query::cursor_query(&self.caps, after_row_id, chat_id, filter, include_reactions, limit);
        self.run_message_query(query, chat_id)
    }

    fn run_message_query(&self, query: BuiltQuery, fallback_chat_id: Option<i64>) -> Result<Vec<Message>> {
        debug!(sql = %query.sql, params = query.params.len(), "running message query");
        self.with_connection(|conn| {
            let mut stmt = conn.prepare(&query.sql)?;
            let mut rows = stmt.query(params_from_iter(query.params.iter()))?;
            let mut messages = Vec::new();
            while let Some(r) = rows.next()? {
                let message = row::decode_message(r, fallback_chat_id, |row_id| {
                    self.audio_transcription(row_id)
                })?;
                messages.push(message);
            }
            Ok(messages)
        })
    }

    // ============================================
    // REACTIONS
    // ============================================

    /// Current reactions on a message, reconciled from its tapback history
    pub fn reactions(&self, message_row_id: i64) -> Result<Vec<Reaction>> {
        if !self.caps.reaction_columns {
            return Ok(Vec::new());
        }
        let sql = query::tapback_history_query(&self.caps);
        self.with_connection(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let mut rows = stmt.query(params![message_row_id])?;
            let mut tapbacks = Vec::new();
            while let Some(r) = rows.next()? {
                if let Some(tapback) = row::decode_tapback(r)? {
                    tapbacks.push(tapback);
                }
            }
            Ok(reconcile(message_row_id, tapbacks))
        })
    }

    /// Raw tapback add/remove events after a cursor
    pub fn reaction_events_after(
        &self,
        after_row_id: i64,
        chat_id: Option<i64>,
        limit: usize,
    ) -> Result<Vec<ReactionEvent>> {
        if !self.caps.reaction_columns {
            return Ok(Vec::new());
        }
        let query = query::reaction_events_query(&self.caps, after_row_id, chat_id, limit);
        self.with_connection(|conn| {
            let mut stmt = conn.prepare(&query.sql)?;
            let mut rows = stmt.query(params_from_iter(query.params.iter()))?;
            let mut events: Vec<ReactionEvent> = Vec::new();
            while let Some(r) = rows.next()? {
                let Some(event) = row::decode_reaction_event(r, chat_id)? else {
                    continue;
                };
                // a target guid can match more than one joined row
                if events.last().is_some_and(|last| last.row_id == event.row_id) {
                    continue;
                }
                events.push(event);
            }
            Ok(events)
        })
    }
}
