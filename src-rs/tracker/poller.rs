use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::state::{DashboardState, StateStore};
use crate::api::{format_message_id, DashboardBackend, StatusQuery};
use crate::chat::{ChatManager, DEFAULT_ASSISTANT_REPLY};
use crate::dashboard::{ChatMessage, DashboardResult, TaskId, TaskStatus};
use crate::storage::PollingTaskShim;

/// What a poll loop is watching.
#[derive(Clone, Debug)]
pub struct PollContext {
    pub task_id: TaskId,
    pub chat_id: String,
    /// Sequence the task was submitted with.
    pub message_seq: u32,
    pub query: String,
    pub files: Vec<String>,
}

impl PollContext {
    fn status_query(&self) -> StatusQuery {
        StatusQuery::new(&self.task_id, &self.chat_id, self.message_seq)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FailureReason {
    /// The service reported the task as failed.
    Reported,
    /// Completed without a usable result.
    EmptyResult,
    StatusCheck(String),
    TimedOut,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::Reported => write!(f, "task failed"),
            FailureReason::EmptyResult => write!(f, "task completed without a result"),
            FailureReason::StatusCheck(msg) => write!(f, "status check failed: {}", msg),
            FailureReason::TimedOut => write!(f, "task did not finish in time"),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum PollOutcome {
    Completed(DashboardResult),
    Failed(FailureReason),
    /// Stopped, or replaced by a newer task.
    Cancelled,
}

/// Drives status checks for one task until it settles.
pub struct Poller {
    pub(crate) backend: Arc<dyn DashboardBackend>,
    pub(crate) chats: Arc<dyn ChatManager>,
    pub(crate) state: Arc<StateStore>,
    pub(crate) shim: PollingTaskShim,
    pub(crate) interval: Duration,
    pub(crate) max_duration: Option<Duration>,
    pub(crate) error_retries: usize,
}

impl Poller {
    pub async fn run(self, ctx: PollContext, cancel: CancellationToken) -> PollOutcome {
        let started = Instant::now();
        let query = ctx.status_query();
        let mut failed_checks = 0usize;
        info!(task_id = %ctx.task_id, chat_id = %ctx.chat_id, "polling dashboard task");

        loop {
            if cancel.is_cancelled() || !self.state.is_tracking(&ctx.task_id) {
                debug!(task_id = %ctx.task_id, "poll loop no longer tracking");
                return PollOutcome::Cancelled;
            }
            if let Some(max) = self.max_duration {
                if started.elapsed() >= max {
                    return self.fail(&ctx, FailureReason::TimedOut).await;
                }
            }

            match self.backend.task_status(&query).await {
                Ok(resp) => {
                    failed_checks = 0;
                    match resp.status {
                        TaskStatus::Completed => {
                            return match resp.into_result() {
                                Some(result) if !result.is_empty() => self.complete(&ctx, result).await,
                                _ => self.fail(&ctx, FailureReason::EmptyResult).await,
                            };
                        }
                        TaskStatus::Failed => return self.fail(&ctx, FailureReason::Reported).await,
                        ref other => debug!(task_id = %ctx.task_id, status = other.as_str(), "task not done"),
                    }
                }
                Err(err) if err.is_transient() && failed_checks < self.error_retries => {
                    failed_checks += 1;
                    warn!(
                        task_id = %ctx.task_id,
                        attempt = failed_checks,
                        "status check failed, retrying: {}",
                        err
                    );
                }
                Err(err) => {
                    return self
                        .fail(&ctx, FailureReason::StatusCheck(err.to_string()))
                        .await;
                }
            }

            tokio::select! {
                _ = cancel.cancelled() => return PollOutcome::Cancelled,
                _ = sleep(self.interval) => {}
            }
        }
    }

    async fn complete(&self, ctx: &PollContext, result: DashboardResult) -> PollOutcome {
        let shim = self.shim.clone();
        let message = history_entry(ctx, Some(result.clone()));
        let applied = self.state.update_if_tracking(&ctx.task_id, |s| {
            s.dashboard_result = result.clone();
            s.has_data = true;
            s.clear_task();
            s.chat_history.push(message);
            forget_task(&shim);
        });
        if applied.is_none() {
            debug!(task_id = %ctx.task_id, "discarding result for superseded task");
            return PollOutcome::Cancelled;
        }
        info!(task_id = %ctx.task_id, kpis = result.kpis.len(), charts = result.charts.len(), "dashboard ready");

        let reply = result
            .content
            .as_deref()
            .filter(|c| !c.trim().is_empty())
            .unwrap_or(DEFAULT_ASSISTANT_REPLY);
        if let Err(err) = self.chats.add_assistant_message(&ctx.chat_id, reply, &result).await {
            warn!("failed to record assistant message: {}", err);
        }
        self.refresh_titles().await;
        PollOutcome::Completed(result)
    }

    async fn fail(&self, ctx: &PollContext, reason: FailureReason) -> PollOutcome {
        let shim = self.shim.clone();
        let message = history_entry(ctx, None);
        let applied = self.state.update_if_tracking(&ctx.task_id, |s: &mut DashboardState| {
            s.clear_result();
            s.clear_task();
            s.chat_history.push(message);
            forget_task(&shim);
        });
        if applied.is_none() {
            return PollOutcome::Cancelled;
        }
        warn!(task_id = %ctx.task_id, "dashboard task ended: {}", reason);
        self.refresh_titles().await;
        PollOutcome::Failed(reason)
    }

    async fn refresh_titles(&self) {
        if let Err(err) = self.chats.fetch_chat_titles().await {
            warn!("failed to refresh chat titles: {}", err);
        }
    }
}

pub(crate) fn forget_task(shim: &PollingTaskShim) {
    if let Err(err) = shim.clear() {
        warn!("failed to clear persisted polling task: {}", err);
    }
}

fn history_entry(ctx: &PollContext, response: Option<DashboardResult>) -> ChatMessage {
    ChatMessage {
        id: format_message_id(&ctx.chat_id, ctx.message_seq),
        chat_id: ctx.chat_id.clone(),
        query: ctx.query.clone(),
        files: ctx.files.clone(),
        response,
        timestamp: Utc::now(),
    }
}
