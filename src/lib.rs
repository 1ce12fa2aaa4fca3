pub mod attachments;
pub mod cli;
pub mod config;
pub mod decode;
pub mod error;
pub mod model;
pub mod reaction;
pub mod store;
pub mod watch;

pub use config::Config;
pub use error::{Result, StoreError};
pub use model::{AttachmentMeta, Chat, ChatInfo, Message, MessageFilter};
pub use reaction::{Reaction, ReactionEvent, ReactionKind, ReactionMarker};
pub use store::{Capabilities, MessageStore};
pub use watch::{ChangeTracker, WatchOptions, WatchRequest, WatchStream};
