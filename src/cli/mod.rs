pub mod chats;
pub mod history;
pub mod output;
pub mod reactions;
pub mod watch;
