mod common;

use std::sync::Arc;
use std::time::Duration;

use common::*;
use dashboard_tracker_rs::dashboard::DashboardResult;
use dashboard_tracker_rs::storage::{KeyValueStore, MemoryStore, POLLING_TASK_KEY};
use dashboard_tracker_rs::{FailureReason, PollOutcome, TrackerConfig, TrackerError};
use serde_json::json;
use tokio::time::{sleep, timeout};

#[tokio::test(start_paused = true)]
async fn sales_query_completes_on_second_check() {
    let h = harness();
    let result = sales_result();
    h.backend.accept("abc");
    h.backend.reply("abc", status("processing"));
    h.backend.reply("abc", completed(&result));

    let task_id = h
        .tracker
        .submit("Plot a sales Dashboard", &files(&["sales.csv"]), None)
        .await
        .unwrap();
    assert_eq!(task_id, "abc");

    sleep(Duration::from_secs(1)).await;
    let state = h.tracker.state();
    assert!(state.polling);
    assert!(!state.has_data);
    assert_eq!(state.current_task_id.as_deref(), Some("abc"));
    assert_eq!(h.backend.checks_for("abc"), 1);
    assert!(h.storage.get(POLLING_TASK_KEY).unwrap().is_some());

    let outcome = h.tracker.wait().await.unwrap();
    assert_eq!(outcome, PollOutcome::Completed(result.clone()));

    let state = h.tracker.state();
    assert!(state.has_data);
    assert!(!state.polling);
    assert!(state.current_task_id.is_none());
    assert_eq!(state.dashboard_result, result);
    assert_eq!(state.current_message_seq, 1);
    assert_eq!(state.chat_history.len(), 1);
    assert_eq!(state.chat_history[0].query, "Plot a sales Dashboard");
    assert_eq!(state.chat_history[0].response.as_ref(), Some(&result));
    assert_eq!(h.backend.checks_for("abc"), 2);
    assert_eq!(h.storage.get(POLLING_TASK_KEY).unwrap(), None);

    let requests = h.backend.requests.lock().unwrap();
    assert_eq!(requests[0].file_name, "sales.csv");
    assert_eq!(requests[0].message_id, "U_1_0000");
    assert_eq!(requests[0].title, "Plot a sales Dashboard");
    let checks = h.backend.checks.lock().unwrap();
    assert_eq!(checks[1].message_id, "U_1_0000");
    assert_eq!(checks[1].chat_id, "1");

    let convo = h.chats.conversation("1").unwrap();
    assert_eq!(convo.messages.len(), 2);
    assert_eq!(convo.title, "Plot a sales Dashboard");
}

#[tokio::test(start_paused = true)]
async fn empty_file_selection_is_rejected_without_a_request() {
    let h = harness();
    let before = h.tracker.state();

    let err = h.tracker.submit("Plot a sales Dashboard", &[], None).await.unwrap_err();
    assert!(matches!(err, TrackerError::Validation(_)));
    let err = h.tracker.submit("   ", &files(&["sales.csv"]), None).await.unwrap_err();
    assert!(matches!(err, TrackerError::Validation(_)));

    assert_eq!(h.backend.request_count(), 0);
    assert_eq!(h.tracker.state(), before);
}

#[tokio::test(start_paused = true)]
async fn reported_failure_clears_state() {
    let h = harness();
    h.backend.accept("t1");
    h.backend.reply("t1", status("pending"));
    h.backend.reply("t1", status("failed"));

    h.tracker.submit("churn", &files(&["c.csv"]), None).await.unwrap();
    let outcome = h.tracker.wait().await.unwrap();

    assert_eq!(outcome, PollOutcome::Failed(FailureReason::Reported));
    let state = h.tracker.state();
    assert!(!state.polling);
    assert!(!state.has_data);
    assert_eq!(state.dashboard_result, DashboardResult::default());
    assert_eq!(state.chat_history.len(), 1);
    assert!(state.chat_history[0].response.is_none());
    assert_eq!(h.storage.get(POLLING_TASK_KEY).unwrap(), None);
}

#[tokio::test(start_paused = true)]
async fn completion_without_result_counts_as_failure() {
    let h = harness();
    h.backend.accept("t1");
    h.backend.reply("t1", status("completed"));

    h.tracker.submit("churn", &files(&["c.csv"]), None).await.unwrap();
    let outcome = h.tracker.wait().await.unwrap();

    assert_eq!(outcome, PollOutcome::Failed(FailureReason::EmptyResult));
    assert!(!h.tracker.state().has_data);
}

#[tokio::test(start_paused = true)]
async fn unknown_status_keeps_polling() {
    let h = harness();
    let result = sales_result();
    h.backend.accept("t1");
    h.backend.reply("t1", status("queued"));
    h.backend.reply("t1", status("processing"));
    h.backend.reply("t1", completed(&result));

    h.tracker.submit("q", &files(&["a.csv"]), None).await.unwrap();
    let outcome = h.tracker.wait().await.unwrap();

    assert_eq!(outcome, PollOutcome::Completed(result));
    assert_eq!(h.backend.checks_for("t1"), 3);
}

#[tokio::test(start_paused = true)]
async fn stop_polling_ends_the_loop() {
    let h = harness();
    h.backend.accept("t1");

    h.tracker.submit("q", &files(&["a.csv"]), None).await.unwrap();
    sleep(Duration::from_secs(1)).await;
    h.tracker.stop_polling();

    assert_eq!(h.tracker.wait().await, Some(PollOutcome::Cancelled));
    sleep(Duration::from_secs(60)).await;
    assert_eq!(h.backend.checks_for("t1"), 1);

    let state = h.tracker.state();
    assert!(!state.polling);
    assert!(state.current_task_id.is_none());
    assert_eq!(h.storage.get(POLLING_TASK_KEY).unwrap(), None);
}

#[tokio::test(start_paused = true)]
async fn late_result_after_cancel_is_discarded() {
    let h = harness();
    h.backend.accept("t1");
    h.backend
        .reply_after("t1", Duration::from_secs(5), completed(&sales_result()));

    h.tracker.submit("q", &files(&["a.csv"]), None).await.unwrap();
    sleep(Duration::from_secs(1)).await;
    h.tracker.stop_polling();
    sleep(Duration::from_secs(10)).await;

    let state = h.tracker.state();
    assert!(!state.has_data);
    assert_eq!(state.dashboard_result, DashboardResult::default());
    assert!(state.chat_history.is_empty());
}

#[tokio::test(start_paused = true)]
async fn superseded_task_cannot_overwrite_newer_result() {
    let h = harness();
    let stale = sales_result();
    let fresh = DashboardResult {
        content: Some("Fresh summary".to_string()),
        ..Default::default()
    };
    h.backend.accept("t1");
    h.backend.accept("t2");
    h.backend.reply_after("t1", Duration::from_secs(5), completed(&stale));
    h.backend.reply("t2", completed(&fresh));

    h.tracker.submit("first", &files(&["a.csv"]), None).await.unwrap();
    sleep(Duration::from_secs(1)).await;
    h.tracker.submit("second", &files(&["a.csv"]), None).await.unwrap();

    assert_eq!(h.tracker.wait().await, Some(PollOutcome::Completed(fresh.clone())));
    sleep(Duration::from_secs(10)).await;

    let state = h.tracker.state();
    assert_eq!(state.dashboard_result, fresh);
    assert_eq!(state.chat_history.len(), 1);
    assert_eq!(state.chat_history[0].query, "second");
    assert_eq!(state.current_message_seq, 2);
}

#[tokio::test(start_paused = true)]
async fn new_submission_stops_polling_the_previous_task() {
    let h = harness();
    h.backend.accept("t1");
    h.backend.accept("t2");
    h.backend.reply("t2", status("processing"));
    h.backend.reply("t2", completed(&sales_result()));

    h.tracker.submit("first", &files(&["a.csv"]), None).await.unwrap();
    sleep(Duration::from_secs(1)).await;
    h.tracker.submit("second", &files(&["a.csv"]), None).await.unwrap();

    sleep(Duration::from_secs(1)).await;
    let state = h.tracker.state();
    assert_eq!(state.current_task_id.as_deref(), Some("t2"));

    h.tracker.wait().await.unwrap();
    sleep(Duration::from_secs(60)).await;
    assert_eq!(h.backend.checks_for("t1"), 1);
    assert_eq!(h.backend.checks_for("t2"), 2);
}

#[tokio::test(start_paused = true)]
async fn failed_submission_leaves_no_task_behind() {
    let h = harness();
    h.backend.reject(TrackerError::Http {
        status: 500,
        body: "boom".to_string(),
    });

    let err = h.tracker.submit("q", &files(&["a.csv"]), None).await.unwrap_err();
    assert!(matches!(err, TrackerError::Http { status: 500, .. }));

    let state = h.tracker.state();
    assert!(!state.loading);
    assert!(!state.polling);
    assert!(state.current_task_id.is_none());
    assert_eq!(state.current_message_seq, 0);
    assert_eq!(h.storage.get(POLLING_TASK_KEY).unwrap(), None);
    assert!(h.tracker.wait().await.is_none());
}

#[tokio::test(start_paused = true)]
async fn reset_dashboard_is_idempotent() {
    let h = harness();
    h.backend.accept("t1");
    h.backend.reply("t1", completed(&sales_result()));
    h.tracker.submit("q", &files(&["a.csv"]), None).await.unwrap();
    h.tracker.wait().await.unwrap();

    h.tracker.reset_dashboard();
    let once = h.tracker.state();
    h.tracker.reset_dashboard();
    let twice = h.tracker.state();

    assert_eq!(once, twice);
    assert!(!once.has_data);
    assert!(!once.loading);
    assert!(!once.polling);
    assert_eq!(once.dashboard_result, DashboardResult::default());
}

#[tokio::test(start_paused = true)]
async fn transient_check_errors_are_retried_then_fail() {
    let cfg = TrackerConfig {
        status_error_retries: 2,
        ..config()
    };
    let h = harness_with(cfg, Arc::new(MemoryStore::new()));
    h.backend.accept("t1");
    for _ in 0..3 {
        h.backend
            .reply("t1", Err(TrackerError::Transport("connection reset".to_string())));
    }

    h.tracker.submit("q", &files(&["a.csv"]), None).await.unwrap();
    let outcome = h.tracker.wait().await.unwrap();

    assert!(matches!(outcome, PollOutcome::Failed(FailureReason::StatusCheck(_))));
    assert_eq!(h.backend.checks_for("t1"), 3);
    assert!(!h.tracker.state().polling);
}

#[tokio::test(start_paused = true)]
async fn transient_error_then_success_completes() {
    let h = harness();
    let result = sales_result();
    h.backend.accept("t1");
    h.backend.reply(
        "t1",
        Err(TrackerError::Http {
            status: 502,
            body: String::new(),
        }),
    );
    h.backend.reply("t1", completed(&result));

    h.tracker.submit("q", &files(&["a.csv"]), None).await.unwrap();
    assert_eq!(h.tracker.wait().await, Some(PollOutcome::Completed(result)));
}

#[tokio::test(start_paused = true)]
async fn expired_session_during_polling_fails_immediately() {
    let h = harness();
    h.backend.accept("t1");
    h.backend.reply("t1", Err(TrackerError::SessionExpired));

    h.tracker.submit("q", &files(&["a.csv"]), None).await.unwrap();
    let outcome = h.tracker.wait().await.unwrap();

    assert!(matches!(outcome, PollOutcome::Failed(FailureReason::StatusCheck(_))));
    assert_eq!(h.backend.checks_for("t1"), 1);
}

#[tokio::test(start_paused = true)]
async fn max_poll_duration_times_out() {
    let cfg = TrackerConfig {
        max_poll_duration: Some(Duration::from_secs(25)),
        ..config()
    };
    let h = harness_with(cfg, Arc::new(MemoryStore::new()));
    h.backend.accept("t1");

    h.tracker.submit("q", &files(&["a.csv"]), None).await.unwrap();
    let outcome = h.tracker.wait().await.unwrap();

    assert_eq!(outcome, PollOutcome::Failed(FailureReason::TimedOut));
    assert_eq!(h.backend.checks_for("t1"), 3);
    assert_eq!(h.storage.get(POLLING_TASK_KEY).unwrap(), None);
}

#[tokio::test(start_paused = true)]
async fn new_chat_then_load_restores_previous_result() {
    let h = harness();
    let result = sales_result();
    h.backend.accept("t1");
    h.backend.reply("t1", completed(&result));
    h.tracker
        .submit("Plot a sales Dashboard", &files(&["sales.csv"]), None)
        .await
        .unwrap();
    h.tracker.wait().await.unwrap();

    let chat_id = h.tracker.start_new_chat().await.unwrap();
    assert_eq!(chat_id, "2");
    let state = h.tracker.state();
    assert_eq!(state.current_chat_id, "2");
    assert_eq!(state.current_message_seq, 0);
    assert!(!state.has_data);

    assert!(h.tracker.load_chat("1").await);
    let state = h.tracker.state();
    assert_eq!(state.current_chat_id, "1");
    assert_eq!(state.current_message_seq, 1);
    assert_eq!(state.dashboard_result, result);

    assert!(!h.tracker.load_chat("77").await);
    let state = h.tracker.state();
    assert!(!state.has_data);
    assert_eq!(state.dashboard_result, DashboardResult::default());
}

#[tokio::test(start_paused = true)]
async fn manual_history_entries_advance_the_sequence() {
    let h = harness();
    h.tracker.set_chat_info("5", 3);
    h.tracker
        .add_to_chat_history("imported", &files(&["old.csv"]), Some(sales_result()))
        .await;

    let state = h.tracker.state();
    assert_eq!(state.current_message_seq, 4);
    assert_eq!(state.chat_history[0].id, "U_5_0003");
    assert_eq!(h.chats.conversation("5").unwrap().messages.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn reply_without_status_keeps_polling() {
    let h = harness();
    let result = sales_result();
    h.backend.accept("t1");
    h.backend.reply("t1", Ok(serde_json::from_value(json!({})).unwrap()));
    h.backend.reply("t1", Ok(serde_json::from_value(json!({"status": null})).unwrap()));
    h.backend.reply("t1", completed(&result));

    h.tracker.submit("q", &files(&["a.csv"]), None).await.unwrap();
    let outcome = h.tracker.wait().await.unwrap();

    assert_eq!(outcome, PollOutcome::Completed(result));
    assert_eq!(h.backend.checks_for("t1"), 3);
}

#[tokio::test(start_paused = true)]
async fn numeric_kpi_values_are_kept() {
    let h = harness();
    h.backend.accept("t1");
    h.backend.reply(
        "t1",
        Ok(serde_json::from_value(json!({
            "status": "completed",
            "result": {"kpis": [{"title": "Orders", "value": 8410, "description": "Completed orders"}]}
        }))
        .unwrap()),
    );

    h.tracker.submit("q", &files(&["a.csv"]), None).await.unwrap();
    let outcome = h.tracker.wait().await.unwrap();

    let result = match outcome {
        PollOutcome::Completed(result) => result,
        other => panic!("unexpected outcome {:?}", other),
    };
    assert_eq!(result.kpis[0].value, "8410");
    assert_eq!(h.tracker.state().dashboard_result.kpis[0].title, "Orders");
}

#[tokio::test(start_paused = true)]
async fn abandoned_wait_keeps_the_loop_reachable() {
    let h = harness();
    let result = sales_result();
    h.backend.accept("t1");
    h.backend.reply("t1", status("pending"));
    h.backend.reply("t1", status("processing"));
    h.backend.reply("t1", completed(&result));

    h.tracker.submit("q", &files(&["a.csv"]), None).await.unwrap();
    assert!(timeout(Duration::from_secs(1), h.tracker.wait()).await.is_err());
    assert!(h.tracker.is_polling());

    assert_eq!(h.tracker.wait().await, Some(PollOutcome::Completed(result)));
    assert_eq!(h.backend.checks_for("t1"), 3);
    assert!(h.tracker.wait().await.is_none());
}

#[tokio::test(start_paused = true)]
async fn abandoned_wait_can_still_be_cancelled() {
    let h = harness();
    h.backend.accept("t1");

    h.tracker.submit("q", &files(&["a.csv"]), None).await.unwrap();
    assert!(timeout(Duration::from_secs(1), h.tracker.wait()).await.is_err());
    h.tracker.stop_polling();

    assert_eq!(h.tracker.wait().await, Some(PollOutcome::Cancelled));
    sleep(Duration::from_secs(60)).await;
    assert_eq!(h.backend.checks_for("t1"), 1);
}

#[tokio::test(start_paused = true)]
async fn reset_dashboard_while_polling_stops_the_loop() {
    let h = harness();
    h.backend.accept("t1");

    h.tracker.submit("q", &files(&["a.csv"]), None).await.unwrap();
    sleep(Duration::from_secs(1)).await;
    assert!(h.storage.get(POLLING_TASK_KEY).unwrap().is_some());
    h.tracker.reset_dashboard();

    assert_eq!(h.tracker.wait().await, Some(PollOutcome::Cancelled));
    sleep(Duration::from_secs(60)).await;
    assert_eq!(h.backend.checks_for("t1"), 1);
    assert_eq!(h.storage.get(POLLING_TASK_KEY).unwrap(), None);
    let state = h.tracker.state();
    assert!(!state.polling);
    assert!(state.current_task_id.is_none());
}

#[tokio::test(start_paused = true)]
async fn new_chat_while_polling_stops_the_loop() {
    let h = harness();
    h.backend.accept("t1");

    h.tracker.submit("q", &files(&["a.csv"]), None).await.unwrap();
    sleep(Duration::from_secs(1)).await;
    assert_eq!(h.tracker.start_new_chat().await.unwrap(), "2");

    assert_eq!(h.tracker.wait().await, Some(PollOutcome::Cancelled));
    sleep(Duration::from_secs(60)).await;
    assert_eq!(h.backend.checks_for("t1"), 1);
    assert_eq!(h.storage.get(POLLING_TASK_KEY).unwrap(), None);
    let state = h.tracker.state();
    assert!(!state.polling);
    assert_eq!(state.current_chat_id, "2");
    assert_eq!(state.current_message_seq, 0);
}

#[tokio::test(start_paused = true)]
async fn concurrent_submissions_take_distinct_sequences() {
    let h = harness();
    h.backend.accept_after("t1", Duration::from_secs(5));
    h.backend.accept("t2");

    let first_files = files(&["a.csv"]);
    let second_files = files(&["a.csv"]);
    let (first, second) = tokio::join!(
        h.tracker.submit("first", &first_files, None),
        h.tracker.submit("second", &second_files, None),
    );
    assert_eq!(first.unwrap(), "t1");
    assert_eq!(second.unwrap(), "t2");

    let ids: Vec<String> = h
        .backend
        .requests
        .lock()
        .unwrap()
        .iter()
        .map(|r| r.message_id.clone())
        .collect();
    assert_eq!(ids, vec!["U_1_0000", "U_1_0001"]);
    let state = h.tracker.state();
    assert_eq!(state.current_message_seq, 2);
    assert_eq!(state.current_task_id.as_deref(), Some("t2"));
}

#[tokio::test(start_paused = true)]
async fn sequence_saturates_at_its_maximum() {
    let h = harness();
    h.backend.accept("t1");
    h.tracker.set_chat_info("1", u32::MAX);

    h.tracker.submit("q", &files(&["a.csv"]), None).await.unwrap();

    assert_eq!(h.tracker.state().current_message_seq, u32::MAX);
    assert_eq!(h.backend.requests.lock().unwrap()[0].message_id, "U_1_4294967295");
    h.tracker
        .add_to_chat_history("imported", &files(&["old.csv"]), None)
        .await;
    assert_eq!(h.tracker.state().current_message_seq, u32::MAX);
}
