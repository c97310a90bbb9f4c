use std::sync::{PoisonError, RwLock};

use crate::dashboard::{ChatMessage, DashboardResult, TaskId};

pub const INITIAL_CHAT_ID: &str = "1";

/// Everything a view needs to render the dashboard flow.
#[derive(Clone, Debug, PartialEq)]
pub struct DashboardState {
    pub loading: bool,
    pub has_data: bool,
    pub dashboard_result: DashboardResult,
    pub current_task_id: Option<TaskId>,
    pub polling: bool,
    pub current_chat_id: String,
    /// Sequence number the next submission in this chat will use.
    pub current_message_seq: u32,
    pub chat_history: Vec<ChatMessage>,
}

impl Default for DashboardState {
    fn default() -> Self {
        Self {
            loading: false,
            has_data: false,
            dashboard_result: DashboardResult::default(),
            current_task_id: None,
            polling: false,
            current_chat_id: INITIAL_CHAT_ID.to_string(),
            current_message_seq: 0,
            chat_history: Vec::new(),
        }
    }
}

impl DashboardState {
    pub fn is_tracking(&self, task_id: &str) -> bool {
        self.polling && self.current_task_id.as_deref() == Some(task_id)
    }

    pub(crate) fn clear_task(&mut self) {
        self.loading = false;
        self.polling = false;
        self.current_task_id = None;
    }

    pub(crate) fn clear_result(&mut self) {
        self.has_data = false;
        self.dashboard_result = DashboardResult::default();
    }

    pub fn latest_message(&self, chat_id: &str) -> Option<&ChatMessage> {
        self.chat_history.iter().rev().find(|m| m.chat_id == chat_id)
    }

    pub fn messages_in(&self, chat_id: &str) -> usize {
        self.chat_history.iter().filter(|m| m.chat_id == chat_id).count()
    }
}

/// Shared container for [`DashboardState`]. Readers get snapshots; writers
/// replace fields under the lock.
#[derive(Default)]
pub struct StateStore {
    inner: RwLock<DashboardState>,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> DashboardState {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn update<R>(&self, f: impl FnOnce(&mut DashboardState) -> R) -> R {
        let mut state = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut state)
    }

    /// Applies `f` only while `task_id` is still the task being polled.
    pub fn update_if_tracking<R>(&self, task_id: &str, f: impl FnOnce(&mut DashboardState) -> R) -> Option<R> {
        let mut state = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        if state.is_tracking(task_id) {
            Some(f(&mut state))
        } else {
            None
        }
    }

    pub fn is_tracking(&self, task_id: &str) -> bool {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_tracking(task_id)
    }
}
