use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::dashboard::DashboardResult;
use crate::error::TrackerResult;

pub const NEW_CHAT_TITLE: &str = "New Chat";
pub const UNTITLED_CHAT: &str = "Untitled Chat";
pub const DEFAULT_ASSISTANT_REPLY: &str = "Dashboard generated successfully!";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTitle {
    pub chat_id: String,
    pub title: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One turn of a conversation as the chat manager keeps it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatEntry {
    pub id: String,
    pub chat_id: String,
    pub role: Role,
    pub content: String,
    pub query: String,
    pub files: Vec<String>,
    pub response: Option<DashboardResult>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub chat_id: String,
    pub title: String,
    pub messages: Vec<ChatEntry>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    pub fn new(chat_id: &str, title: &str) -> Self {
        let now = Utc::now();
        Self {
            chat_id: chat_id.to_string(),
            title: title.to_string(),
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Remote chat history endpoints.
#[async_trait]
pub trait HistorySource: Send + Sync {
    async fn fetch_titles(&self) -> TrackerResult<Vec<ChatTitle>>;
    async fn fetch_history(&self, chat_id: &str) -> TrackerResult<Value>;
}

/// Conversation bookkeeping the tracker correlates dashboard results with.
#[async_trait]
pub trait ChatManager: Send + Sync {
    async fn create_new_chat(&self) -> TrackerResult<String>;
    async fn fetch_chat_history(&self, chat_id: &str) -> TrackerResult<Vec<ChatEntry>>;
    async fn fetch_chat_titles(&self) -> TrackerResult<Vec<ChatTitle>>;
    async fn add_assistant_message(
        &self,
        chat_id: &str,
        text: &str,
        result: &DashboardResult,
    ) -> TrackerResult<()>;

    async fn add_user_message(&self, _chat_id: &str, _query: &str, _files: &[String]) -> TrackerResult<()> {
        Ok(())
    }
}
