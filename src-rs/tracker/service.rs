use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use tokio::sync::{watch, Mutex as AsyncMutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::poller::{forget_task, PollContext, PollOutcome, Poller};
use super::state::{DashboardState, StateStore};
use crate::api::{format_message_id, DashboardBackend, TaskRequest};
use crate::chat::{message_pairs, ChatManager, DEFAULT_ASSISTANT_REPLY};
use crate::config::TrackerConfig;
use crate::dashboard::{ChatMessage, DashboardResult, TaskId};
use crate::error::TrackerResult;
use crate::storage::{KeyValueStore, PollingTaskShim, ResumeRecord};

struct PollHandle {
    task_id: TaskId,
    cancel: CancellationToken,
    /// Set once the loop settles.
    outcome: watch::Receiver<Option<PollOutcome>>,
}

/// Submits dashboard requests and keeps [`DashboardState`] in step with the
/// remote task. At most one task is polled at a time.
pub struct DashboardTracker {
    config: TrackerConfig,
    backend: Arc<dyn DashboardBackend>,
    chats: Arc<dyn ChatManager>,
    state: Arc<StateStore>,
    shim: PollingTaskShim,
    active: Mutex<Option<PollHandle>>,
    submitting: AsyncMutex<()>,
}

impl DashboardTracker {
    pub fn new(
        config: TrackerConfig,
        backend: Arc<dyn DashboardBackend>,
        chats: Arc<dyn ChatManager>,
        storage: Arc<dyn KeyValueStore>,
    ) -> Self {
        Self {
            config,
            backend,
            chats,
            state: Arc::new(StateStore::new()),
            shim: PollingTaskShim::new(storage),
            active: Mutex::new(None),
            submitting: AsyncMutex::new(()),
        }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn state(&self) -> DashboardState {
        self.state.snapshot()
    }

    pub fn store(&self) -> Arc<StateStore> {
        self.state.clone()
    }

    pub fn chats(&self) -> Arc<dyn ChatManager> {
        self.chats.clone()
    }

    pub fn is_polling(&self) -> bool {
        self.state.snapshot().polling
    }

    /// Sends a generation request and starts polling the task it creates.
    ///
    /// Any task already being polled stops being tracked. Invalid input is
    /// rejected before the state is touched. Concurrent calls are handled one
    /// at a time so each gets its own message sequence.
    pub async fn submit(
        &self,
        query: &str,
        file_names: &[String],
        chat_title: Option<&str>,
    ) -> TrackerResult<TaskId> {
        let _turn = self.submitting.lock().await;
        let snapshot = self.state.snapshot();
        let chat_id = snapshot.current_chat_id.clone();
        let message_seq = snapshot.current_message_seq;
        let request = TaskRequest::new(query, file_names, &chat_id, message_seq, chat_title)?;

        self.halt_active();
        self.state.update(|s| {
            s.current_task_id = None;
            s.polling = false;
            s.loading = true;
            s.has_data = false;
        });

        let task_id = match self.backend.create_task(&request).await {
            Ok(task_id) => task_id,
            Err(err) => {
                warn!("dashboard request failed: {}", err);
                let shim = self.shim.clone();
                self.state.update(|s| {
                    s.clear_result();
                    s.clear_task();
                    forget_task(&shim);
                });
                return Err(err);
            }
        };
        info!(task_id = %task_id, chat_id = %chat_id, message_id = %request.message_id, "dashboard task created");

        let shim = self.shim.clone();
        let record = ResumeRecord::new(&task_id, &chat_id, message_seq);
        self.state.update(|s| {
            if s.current_chat_id == chat_id {
                s.current_message_seq = message_seq.saturating_add(1);
            }
            s.current_task_id = Some(task_id.clone());
            s.polling = true;
            s.loading = false;
            if let Err(err) = shim.save(&record) {
                warn!("failed to persist polling task: {}", err);
            }
        });

        let files = request.files();
        if let Err(err) = self.chats.add_user_message(&chat_id, &request.message, &files).await {
            warn!("failed to record user message: {}", err);
        }
        if let Err(err) = self.chats.fetch_chat_titles().await {
            warn!("failed to refresh chat titles: {}", err);
        }

        self.spawn_poll(PollContext {
            task_id: task_id.clone(),
            chat_id,
            message_seq,
            query: request.message,
            files,
        });
        Ok(task_id)
    }

    /// Picks up a task persisted before a restart, if there is one.
    pub fn resume_if_needed(&self) -> TrackerResult<Option<ResumeRecord>> {
        let record = match self.shim.load()? {
            Some(record) => record,
            None => return Ok(None),
        };
        let message_seq = record.message_seq();
        info!(task_id = %record.task_id, chat_id = %record.chat_id, "resuming dashboard task");

        self.halt_active();
        self.state.update(|s| {
            s.current_chat_id = record.chat_id.clone();
            s.current_message_seq = message_seq.saturating_add(1);
            s.current_task_id = Some(record.task_id.clone());
            s.polling = true;
            s.loading = false;
        });
        self.spawn_poll(PollContext {
            task_id: record.task_id.clone(),
            chat_id: record.chat_id.clone(),
            message_seq,
            query: String::new(),
            files: Vec::new(),
        });
        Ok(Some(record))
    }

    /// Waits for the latest poll loop to settle and hands out its outcome once.
    /// `None` when no loop was started since the last completed wait.
    ///
    /// Dropping the returned future leaves the loop and its handle in place.
    pub async fn wait(&self) -> Option<PollOutcome> {
        let (task_id, mut outcome) = {
            let active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
            let handle = active.as_ref()?;
            (handle.task_id.clone(), handle.outcome.clone())
        };
        let settled = match outcome.wait_for(Option::is_some).await {
            Ok(settled) => settled.clone(),
            Err(_) => {
                warn!(task_id = %task_id, "poll loop ended without an outcome");
                None
            }
        };

        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        if active
            .as_ref()
            .map_or(false, |handle| handle.outcome.same_channel(&outcome))
        {
            active.take();
        }
        settled
    }

    pub fn stop_polling(&self) {
        self.halt_active();
        let shim = self.shim.clone();
        self.state.update(|s| {
            s.clear_task();
            forget_task(&shim);
        });
    }

    pub fn reset_dashboard(&self) {
        self.halt_active();
        let shim = self.shim.clone();
        self.state.update(|s| {
            s.clear_result();
            s.clear_task();
            forget_task(&shim);
        });
    }

    pub async fn start_new_chat(&self) -> TrackerResult<String> {
        let chat_id = self.chats.create_new_chat().await?;
        self.halt_active();
        let shim = self.shim.clone();
        self.state.update(|s| {
            s.current_chat_id = chat_id.clone();
            s.current_message_seq = 0;
            s.clear_result();
            s.clear_task();
            forget_task(&shim);
        });
        info!(chat_id = %chat_id, "switched to new chat");
        Ok(chat_id)
    }

    /// Makes `chat_id` current and shows its latest local result. Returns
    /// whether a result was restored.
    pub async fn load_chat(&self, chat_id: &str) -> bool {
        let restored = self.state.update(|s| {
            let latest = s.latest_message(chat_id).map(|m| m.response.clone());
            let found = latest.is_some();
            let response = latest.flatten();
            s.current_chat_id = chat_id.to_string();
            s.current_message_seq = s.messages_in(chat_id) as u32;
            s.has_data = response.is_some();
            s.dashboard_result = response.unwrap_or_default();
            (found, s.has_data)
        });

        match self.chats.fetch_chat_history(chat_id).await {
            Ok(entries) if !restored.0 => {
                let seq = message_pairs(&entries);
                self.state.update(|s| {
                    if s.current_chat_id == chat_id {
                        s.current_message_seq = seq;
                    }
                });
            }
            Ok(_) => {}
            Err(err) => warn!(chat_id = %chat_id, "failed to load chat history: {}", err),
        }
        debug!(chat_id = %chat_id, has_data = restored.1, "chat loaded");
        restored.1
    }

    /// Records an exchange for the current chat outside the submit flow.
    pub async fn add_to_chat_history(&self, query: &str, files: &[String], response: Option<DashboardResult>) {
        let chat_id = self.state.update(|s| {
            let message = ChatMessage {
                id: format_message_id(&s.current_chat_id, s.current_message_seq),
                chat_id: s.current_chat_id.clone(),
                query: query.to_string(),
                files: files.to_vec(),
                response: response.clone(),
                timestamp: Utc::now(),
            };
            s.chat_history.push(message);
            s.current_message_seq = s.current_message_seq.saturating_add(1);
            s.current_chat_id.clone()
        });

        if let Some(result) = &response {
            let reply = result
                .content
                .as_deref()
                .filter(|c| !c.trim().is_empty())
                .unwrap_or(DEFAULT_ASSISTANT_REPLY);
            if let Err(err) = self.chats.add_assistant_message(&chat_id, reply, result).await {
                warn!("failed to record assistant message: {}", err);
            }
        }
    }

    pub fn set_chat_info(&self, chat_id: &str, message_seq: u32) {
        self.state.update(|s| {
            s.current_chat_id = chat_id.to_string();
            s.current_message_seq = message_seq;
        });
    }

    fn poller(&self) -> Poller {
        Poller {
            backend: self.backend.clone(),
            chats: self.chats.clone(),
            state: self.state.clone(),
            shim: self.shim.clone(),
            interval: self.config.poll_interval,
            max_duration: self.config.max_poll_duration,
            error_retries: self.config.status_error_retries,
        }
    }

    fn spawn_poll(&self, ctx: PollContext) {
        let cancel = CancellationToken::new();
        let task_id = ctx.task_id.clone();
        let (done, outcome) = watch::channel(None);
        let poll = self.poller().run(ctx, cancel.clone());
        tokio::spawn(async move {
            done.send_replace(Some(poll.await));
        });
        let previous = self
            .active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(PollHandle {
                task_id,
                cancel,
                outcome,
            });
        if let Some(previous) = previous {
            previous.cancel.cancel();
        }
    }

    fn halt_active(&self) {
        let active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(handle) = active.as_ref() {
            debug!(task_id = %handle.task_id, "cancelling poll loop");
            handle.cancel.cancel();
        }
    }
}

impl Drop for DashboardTracker {
    fn drop(&mut self) {
        if let Ok(mut active) = self.active.lock() {
            if let Some(handle) = active.take() {
                handle.cancel.cancel();
            }
        }
    }
}
