#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use dashboard_tracker_rs::api::{DashboardBackend, StatusQuery, TaskRequest};
use dashboard_tracker_rs::chat::ChatBook;
use dashboard_tracker_rs::dashboard::{DashboardResult, TaskId, TaskStatusResponse};
use dashboard_tracker_rs::storage::{KeyValueStore, MemoryStore};
use dashboard_tracker_rs::{DashboardTracker, TrackerConfig, TrackerError, TrackerResult};

/// A status reply, optionally taking some (virtual) time to arrive.
pub struct Reply {
    pub delay: Duration,
    pub body: TrackerResult<TaskStatusResponse>,
}

/// In-process backend answering from per-task scripts. An exhausted script
/// keeps answering `pending`.
#[derive(Default)]
pub struct ScriptedBackend {
    created: Mutex<VecDeque<(Duration, TrackerResult<TaskId>)>>,
    replies: Mutex<HashMap<String, VecDeque<Reply>>>,
    pub requests: Mutex<Vec<TaskRequest>>,
    pub checks: Mutex<Vec<StatusQuery>>,
}

impl ScriptedBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn accept(&self, task_id: &str) {
        self.accept_after(task_id, Duration::ZERO);
    }

    pub fn accept_after(&self, task_id: &str, delay: Duration) {
        self.created
            .lock()
            .unwrap()
            .push_back((delay, Ok(task_id.to_string())));
    }

    pub fn reject(&self, err: TrackerError) {
        self.created.lock().unwrap().push_back((Duration::ZERO, Err(err)));
    }

    pub fn reply(&self, task_id: &str, body: TrackerResult<TaskStatusResponse>) {
        self.reply_after(task_id, Duration::ZERO, body);
    }

    pub fn reply_after(&self, task_id: &str, delay: Duration, body: TrackerResult<TaskStatusResponse>) {
        self.replies
            .lock()
            .unwrap()
            .entry(task_id.to_string())
            .or_default()
            .push_back(Reply { delay, body });
    }

    pub fn checks_for(&self, task_id: &str) -> usize {
        self.checks
            .lock()
            .unwrap()
            .iter()
            .filter(|q| q.task_id == task_id)
            .count()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl DashboardBackend for ScriptedBackend {
    async fn create_task(&self, request: &TaskRequest) -> TrackerResult<TaskId> {
        self.requests.lock().unwrap().push(request.clone());
        let next = self.created.lock().unwrap().pop_front();
        match next {
            Some((delay, created)) => {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                created
            }
            None => Err(TrackerError::Transport("no scripted task".to_string())),
        }
    }

    async fn task_status(&self, query: &StatusQuery) -> TrackerResult<TaskStatusResponse> {
        self.checks.lock().unwrap().push(query.clone());
        let next = self
            .replies
            .lock()
            .unwrap()
            .get_mut(&query.task_id)
            .and_then(|script| script.pop_front());
        match next {
            Some(reply) => {
                if !reply.delay.is_zero() {
                    tokio::time::sleep(reply.delay).await;
                }
                reply.body
            }
            None => Ok(TaskStatusResponse::pending()),
        }
    }
}

pub fn status(raw: &str) -> TrackerResult<TaskStatusResponse> {
    Ok(serde_json::from_value(json!({ "status": raw })).unwrap())
}

pub fn completed(result: &DashboardResult) -> TrackerResult<TaskStatusResponse> {
    Ok(serde_json::from_value(json!({ "status": "completed", "result": result })).unwrap())
}

pub fn sales_result() -> DashboardResult {
    serde_json::from_value(json!({
        "kpis": [
            {"title": "Total Sales", "value": "$1.2M", "description": "Year to date"},
            {"title": "Orders", "value": "8,410", "description": "Completed orders"}
        ],
        "charts": [
            {"title": {"text": "Monthly Sales", "left": "center"}, "tooltip": {}, "series": [{"type": "bar", "data": [3, 5, 8]}]}
        ]
    }))
    .unwrap()
}

pub fn files(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}

pub struct Harness {
    pub backend: Arc<ScriptedBackend>,
    pub chats: Arc<ChatBook>,
    pub storage: Arc<MemoryStore>,
    pub tracker: DashboardTracker,
}

pub fn config() -> TrackerConfig {
    TrackerConfig {
        poll_interval: Duration::from_secs(10),
        ..TrackerConfig::default()
    }
}

pub fn harness_with(config: TrackerConfig, storage: Arc<MemoryStore>) -> Harness {
    let backend = ScriptedBackend::new();
    let chats = Arc::new(ChatBook::new());
    let store: Arc<dyn KeyValueStore> = storage.clone();
    let tracker = DashboardTracker::new(config, backend.clone(), chats.clone(), store);
    Harness {
        backend,
        chats,
        storage,
        tracker,
    }
}

pub fn harness() -> Harness {
    harness_with(config(), Arc::new(MemoryStore::new()))
}
