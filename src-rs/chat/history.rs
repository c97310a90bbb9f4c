use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::warn;

use super::types::{ChatEntry, Role, DEFAULT_ASSISTANT_REPLY};
use crate::dashboard::DashboardResult;

/// Flattens a history payload into conversation turns.
///
/// Accepts `{"chats": {"messages": [...]}}` or a bare array. A single item can
/// carry both a user turn and a bot turn.
pub fn parse_history(chat_id: &str, payload: &Value) -> Vec<ChatEntry> {
    let items = match payload
        .pointer("/chats/messages")
        .and_then(|v| v.as_array())
        .or_else(|| payload.as_array())
    {
        Some(items) => items,
        None => {
            warn!("unexpected history payload for chat {}", chat_id);
            return Vec::new();
        }
    };

    let mut entries = Vec::new();
    for (index, item) in items.iter().enumerate() {
        let timestamp = parse_timestamp(item.get("created_at"));
        let message_id = item.get("message_id").and_then(|v| v.as_str());
        let role = item.get("role").and_then(|v| v.as_str()).unwrap_or("");
        let query = item
            .pointer("/content/query")
            .or_else(|| item.get("query"))
            .and_then(|v| v.as_str());

        if role == "user" || item.pointer("/content/query").is_some() {
            let query = query.unwrap_or("").to_string();
            let files = item
                .get("files")
                .and_then(|v| v.as_array())
                .map(|files| {
                    files
                        .iter()
                        .filter_map(|f| f.as_str().map(str::to_string))
                        .collect()
                })
                .unwrap_or_default();
            entries.push(ChatEntry {
                id: message_id
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("msg-{}-{}-user", chat_id, index)),
                chat_id: chat_id.to_string(),
                role: Role::User,
                content: query.clone(),
                query,
                files,
                response: None,
                timestamp,
            });
        }

        if role == "bot" || item.pointer("/content/result").is_some() {
            let response = item
                .pointer("/content/result")
                .or_else(|| item.get("result"))
                .and_then(|v| serde_json::from_value::<DashboardResult>(v.clone()).ok());
            entries.push(ChatEntry {
                id: message_id
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("msg-{}-{}-assistant", chat_id, index)),
                chat_id: chat_id.to_string(),
                role: Role::Assistant,
                content: DEFAULT_ASSISTANT_REPLY.to_string(),
                query: String::new(),
                files: Vec::new(),
                response: Some(response.unwrap_or_default()),
                timestamp,
            });
        }
    }
    entries
}

/// Number of user/assistant exchanges, rounding a dangling turn up.
pub fn message_pairs(entries: &[ChatEntry]) -> u32 {
    entries.len().div_ceil(2) as u32
}

fn parse_timestamp(value: Option<&Value>) -> DateTime<Utc> {
    value
        .and_then(|v| v.as_str())
        .and_then(|raw| {
            DateTime::parse_from_rfc3339(raw)
                .map(|dt| dt.with_timezone(&Utc))
                .ok()
                .or_else(|| {
                    chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
                        .ok()
                        .map(|naive| naive.and_utc())
                })
        })
        .unwrap_or_else(Utc::now)
}
