//! Error types for store access and change tracking

use std::path::{Path, PathBuf};

use thiserror::Error;

pub type Result<T> = std::result::Result<T, StoreError>;

/// OS / SQLite error fragments that mean the process may not read the store.
const PERMISSION_MARKERS: &[&str] = &[
    "authorization denied",
    "unable to open",
    "cannot open",
    "out of memory",
];

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(
        "{source}\n\n\
         Permission Error: cannot access the Messages database\n\n\
         The Messages database at {} requires Full Disk Access permission.\n\n\
         To fix:\n\
         1. Open System Settings > Privacy & Security > Full Disk Access\n\
         2. Add your terminal application (Terminal.app, iTerm, etc.)\n\
         3. Restart your terminal\n\
         4. Try again",
        .path.display()
    )]
    PermissionDenied {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    #[error("failed to watch message store: {0}")]
    Watch(#[from] notify::Error),

    #[error("invalid ISO8601 date: {0}")]
    InvalidDate(String),

    #[error("store worker terminated before the poll completed")]
    WorkerGone,
}

impl StoreError {
    /// Re-signal access failures as `PermissionDenied`; everything else passes through.
    pub fn classify(err: rusqlite::Error, path: &Path) -> Self {
        if is_permission_failure(&err.to_string()) {
            StoreError::PermissionDenied {
                path: path.to_path_buf(),
                source: err,
            }
        } else {
            StoreError::Sqlite(err)
        }
    }

    pub fn is_permission_denied(&self) -> bool {
        matches!(self, StoreError::PermissionDenied { .. })
    }
}

fn is_permission_failure(message: &str) -> bool {
    let lowered = message.to_lowercase();
    PERMISSION_MARKERS
        .iter()
        .any(|marker| lowered.contains(marker))
}
