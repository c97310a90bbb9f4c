pub mod book;
pub mod history;
pub mod types;

pub use book::{title_from_query, ChatBook};
pub use history::{message_pairs, parse_history};
pub use types::{
    ChatEntry, ChatManager, ChatTitle, Conversation, HistorySource, Role, DEFAULT_ASSISTANT_REPLY, NEW_CHAT_TITLE,
    UNTITLED_CHAT,
};
