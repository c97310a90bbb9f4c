use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::dashboard::{TaskId, TaskStatusResponse};
use crate::error::{TrackerError, TrackerResult};

/// Placeholder titles that never override the query as a chat title.
const PLACEHOLDER_TITLES: [&str; 2] = ["New Chat", "Untitled Chat"];

/// Message ids on the wire look like `U_<chat>_<seq:04>`.
pub fn format_message_id(chat_id: &str, message_seq: u32) -> String {
    format!("U_{}_{:04}", chat_id, message_seq)
}

fn resolve_title(query: &str, chat_title: Option<&str>) -> String {
    match chat_title.map(str::trim) {
        Some(title) if !title.is_empty() && !PLACEHOLDER_TITLES.contains(&title) => title.to_string(),
        _ => query.to_string(),
    }
}

/// Body of a dashboard-generation request, built once per submission.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TaskRequest {
    pub message: String,
    pub file_name: String,
    pub chat_id: String,
    pub message_id: String,
    pub title: String,
}

impl TaskRequest {
    pub fn new(
        query: &str,
        file_names: &[String],
        chat_id: &str,
        message_seq: u32,
        chat_title: Option<&str>,
    ) -> TrackerResult<Self> {
        let query = query.trim();
        if query.is_empty() {
            return Err(TrackerError::Validation("query must not be empty".to_string()));
        }
        let files: Vec<&str> = file_names
            .iter()
            .map(|name| name.trim())
            .filter(|name| !name.is_empty())
            .collect();
        if files.is_empty() {
            return Err(TrackerError::Validation("select at least one file".to_string()));
        }
        Ok(Self {
            message: query.to_string(),
            file_name: files.join(","),
            chat_id: chat_id.to_string(),
            message_id: format_message_id(chat_id, message_seq),
            title: resolve_title(query, chat_title),
        })
    }

    pub fn files(&self) -> Vec<String> {
        self.file_name.split(',').map(str::to_string).collect()
    }
}

/// Parameters of one status check.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatusQuery {
    pub task_id: TaskId,
    pub chat_id: String,
    pub message_id: String,
}

impl StatusQuery {
    pub fn new(task_id: &str, chat_id: &str, message_seq: u32) -> Self {
        Self {
            task_id: task_id.to_string(),
            chat_id: chat_id.to_string(),
            message_id: format_message_id(chat_id, message_seq),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct CreateTaskResponse {
    #[serde(default)]
    pub task_id: Option<String>,
}

/// The remote dashboard-generation service.
#[async_trait]
pub trait DashboardBackend: Send + Sync {
    async fn create_task(&self, request: &TaskRequest) -> TrackerResult<TaskId>;
    async fn task_status(&self, query: &StatusQuery) -> TrackerResult<TaskStatusResponse>;
}
