use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info};

use super::history::parse_history;
use super::types::{
    ChatEntry, ChatManager, ChatTitle, Conversation, HistorySource, Role, NEW_CHAT_TITLE, UNTITLED_CHAT,
};
use crate::dashboard::DashboardResult;
use crate::error::TrackerResult;

const TITLE_MAX_CHARS: usize = 40;

#[derive(Default)]
struct BookState {
    titles: Vec<ChatTitle>,
    chats: HashMap<String, Conversation>,
    current_chat_id: Option<String>,
    unsaved: bool,
}

/// In-process chat manager. Chat ids are numeric strings allocated past the
/// highest id seen in titles or local conversations.
pub struct ChatBook {
    state: RwLock<BookState>,
    remote: Option<Arc<dyn HistorySource>>,
}

impl ChatBook {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(BookState::default()),
            remote: None,
        }
    }

    pub fn with_remote(remote: Arc<dyn HistorySource>) -> Self {
        Self {
            state: RwLock::new(BookState::default()),
            remote: Some(remote),
        }
    }

    pub fn current_chat_id(&self) -> Option<String> {
        self.state.read().ok()?.current_chat_id.clone()
    }

    pub fn titles(&self) -> Vec<ChatTitle> {
        match self.state.read() {
            Ok(state) => state.titles.clone(),
            Err(_) => vec![],
        }
    }

    pub fn title(&self, chat_id: &str) -> String {
        let state = match self.state.read() {
            Ok(state) => state,
            Err(_) => return UNTITLED_CHAT.to_string(),
        };
        if let Some(title) = state.titles.iter().find(|t| t.chat_id == chat_id) {
            return title.title.clone();
        }
        if state.unsaved && state.current_chat_id.as_deref() == Some(chat_id) {
            return NEW_CHAT_TITLE.to_string();
        }
        UNTITLED_CHAT.to_string()
    }

    pub fn conversation(&self, chat_id: &str) -> Option<Conversation> {
        self.state.read().ok()?.chats.get(chat_id).cloned()
    }

    pub fn next_chat_id(&self) -> String {
        match self.state.read() {
            Ok(state) => next_chat_id(&state),
            Err(_) => "1".to_string(),
        }
    }

    fn push_entry(&self, entry: ChatEntry) {
        let mut state = match self.state.write() {
            Ok(state) => state,
            Err(_) => return,
        };
        let chat_id = entry.chat_id.clone();
        let first_user_turn = entry.role == Role::User
            && state
                .chats
                .get(&chat_id)
                .map_or(true, |c| c.messages.is_empty());

        let title = if first_user_turn {
            Some(title_from_query(&entry.query))
        } else {
            None
        };

        let chat = state
            .chats
            .entry(chat_id.clone())
            .or_insert_with(|| Conversation::new(&chat_id, NEW_CHAT_TITLE));
        if let Some(title) = &title {
            chat.title = title.clone();
        }
        chat.updated_at = entry.timestamp;
        chat.messages.push(entry);

        if let Some(title) = title {
            if !state.titles.iter().any(|t| t.chat_id == chat_id) {
                state.titles.push(ChatTitle {
                    chat_id: chat_id.clone(),
                    title,
                });
                state
                    .titles
                    .sort_by(|a, b| numeric_id(&b.chat_id).cmp(&numeric_id(&a.chat_id)));
            }
        }
        if state.current_chat_id.as_deref() == Some(chat_id.as_str()) {
            state.unsaved = false;
        }
    }
}

impl Default for ChatBook {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChatManager for ChatBook {
    async fn create_new_chat(&self) -> TrackerResult<String> {
        let mut state = self.state.write().map_err(|_| lock_error())?;
        let chat_id = next_chat_id(&state);
        state.current_chat_id = Some(chat_id.clone());
        state.unsaved = true;
        info!("started new unsaved chat {}", chat_id);
        Ok(chat_id)
    }

    async fn fetch_chat_history(&self, chat_id: &str) -> TrackerResult<Vec<ChatEntry>> {
        let remote = match &self.remote {
            Some(remote) => remote,
            None => {
                return Ok(self
                    .conversation(chat_id)
                    .map(|c| c.messages)
                    .unwrap_or_default())
            }
        };
        let payload = remote.fetch_history(chat_id).await?;
        let messages = parse_history(chat_id, &payload);
        debug!("loaded {} history entries for chat {}", messages.len(), chat_id);

        let title = self.title(chat_id);
        let mut state = self.state.write().map_err(|_| lock_error())?;
        let now = Utc::now();
        state.chats.insert(
            chat_id.to_string(),
            Conversation {
                chat_id: chat_id.to_string(),
                title,
                created_at: messages.first().map(|m| m.timestamp).unwrap_or(now),
                updated_at: messages.last().map(|m| m.timestamp).unwrap_or(now),
                messages: messages.clone(),
            },
        );
        state.current_chat_id = Some(chat_id.to_string());
        state.unsaved = false;
        Ok(messages)
    }

    async fn fetch_chat_titles(&self) -> TrackerResult<Vec<ChatTitle>> {
        if let Some(remote) = &self.remote {
            let titles = remote.fetch_titles().await?;
            let mut state = self.state.write().map_err(|_| lock_error())?;
            state.titles = titles;
        }
        Ok(self.titles())
    }

    async fn add_assistant_message(
        &self,
        chat_id: &str,
        text: &str,
        result: &DashboardResult,
    ) -> TrackerResult<()> {
        self.push_entry(ChatEntry {
            id: format!("msg-{}-{}-assistant", chat_id, Utc::now().timestamp_millis()),
            chat_id: chat_id.to_string(),
            role: Role::Assistant,
            content: text.to_string(),
            query: String::new(),
            files: Vec::new(),
            response: Some(result.clone()),
            timestamp: Utc::now(),
        });
        Ok(())
    }

    async fn add_user_message(&self, chat_id: &str, query: &str, files: &[String]) -> TrackerResult<()> {
        self.push_entry(ChatEntry {
            id: format!("msg-{}-{}-user", chat_id, Utc::now().timestamp_millis()),
            chat_id: chat_id.to_string(),
            role: Role::User,
            content: query.to_string(),
            query: query.to_string(),
            files: files.to_vec(),
            response: None,
            timestamp: Utc::now(),
        });
        Ok(())
    }
}

fn next_chat_id(state: &BookState) -> String {
    let highest = state
        .titles
        .iter()
        .map(|t| t.chat_id.as_str())
        .chain(state.chats.keys().map(String::as_str))
        .filter_map(numeric_id)
        .max()
        .unwrap_or(0);
    highest.saturating_add(1).to_string()
}

fn numeric_id(chat_id: &str) -> Option<u64> {
    chat_id.trim().parse::<u64>().ok()
}

pub fn title_from_query(query: &str) -> String {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        return NEW_CHAT_TITLE.to_string();
    }
    if trimmed.chars().count() <= TITLE_MAX_CHARS {
        return trimmed.to_string();
    }
    let head: String = trimmed.chars().take(TITLE_MAX_CHARS).collect();
    format!("{}...", head)
}

fn lock_error() -> crate::error::TrackerError {
    crate::error::TrackerError::Storage(std::io::Error::new(
        std::io::ErrorKind::Other,
        "chat book lock poisoned",
    ))
}
