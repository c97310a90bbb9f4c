use std::io::{self, Write};

use dashboard_tracker_rs::chat::ChatTitle;
use dashboard_tracker_rs::dashboard::{ChatMessage, DashboardResult};
use dashboard_tracker_rs::{DashboardState, PollOutcome, TrackerConfig};

pub fn banner(cfg: &TrackerConfig, files: &[String]) {
    println!("Dashboard CLI");
    println!("API: {}", cfg.base_url);
    println!(
        "Poll every {}s  Files: {}",
        cfg.poll_interval.as_secs(),
        if files.is_empty() { "(none)".to_string() } else { files.join(", ") }
    );
    println!("Type /help for commands.");
}

pub fn prompt() {
    print!("> ");
    let _ = io::stdout().flush();
}

pub fn help() {
    println!("Commands:");
    println!("  <query>                Generate a dashboard from the selected files");
    println!("  /files [a.csv,b.csv]   Show or set selected files");
    println!("  /status                Show tracker state");
    println!("  /wait                  Wait for the running task");
    println!("  /cancel                Stop polling the running task");
    println!("  /reset                 Clear the current dashboard");
    println!("  /new                   Start a new chat");
    println!("  /load <chat>           Load a chat's latest dashboard");
    println!("  /chats                 List chats");
    println!("  /history               Show local query history");
    println!("  /token <token>         Store a bearer token");
    println!("  /logout                Forget stored credentials");
    println!("  /config                Show current config");
    println!("  /exit | /quit          Exit");
}

pub fn dashboard(result: &DashboardResult) {
    for kpi in &result.kpis {
        if kpi.description.is_empty() {
            println!("  {:<28} {}", kpi.title, kpi.value);
        } else {
            println!("  {:<28} {}  ({})", kpi.title, kpi.value, kpi.description);
        }
    }
    for (idx, chart) in result.charts.iter().enumerate() {
        println!(
            "  chart {}: {} [{} series]",
            idx + 1,
            chart.title().unwrap_or("untitled"),
            chart.series_len()
        );
    }
    if let Some(content) = result.content.as_deref().filter(|c| !c.trim().is_empty()) {
        println!("{}", content);
    }
    if let Some(rows) = result.table.as_ref().filter(|rows| !rows.is_empty()) {
        let columns: Vec<&str> = rows[0].keys().map(String::as_str).collect();
        println!("  table: {} rows [{}]", rows.len(), columns.join(", "));
    }
}

pub fn outcome(outcome: &PollOutcome) {
    match outcome {
        PollOutcome::Completed(result) => {
            println!("dashboard ready");
            dashboard(result);
        }
        PollOutcome::Failed(reason) => println!("generation failed: {}", reason),
        PollOutcome::Cancelled => println!("stopped"),
    }
}

pub fn state(state: &DashboardState) {
    println!("chat: {}  next message: {}", state.current_chat_id, state.current_message_seq);
    match (&state.current_task_id, state.polling) {
        (Some(task), true) => println!("polling task {}", task),
        _ if state.loading => println!("submitting..."),
        _ => println!("idle"),
    }
    if state.has_data {
        dashboard(&state.dashboard_result);
    }
}

pub fn titles(titles: &[ChatTitle]) {
    if titles.is_empty() {
        println!("no chats");
        return;
    }
    for title in titles {
        println!("[{}] {}", title.chat_id, title.title);
    }
}

pub fn history(items: &[ChatMessage]) {
    if items.is_empty() {
        println!("no history");
        return;
    }
    for msg in items {
        let marker = if msg.response.is_some() { "ok" } else { "--" };
        println!(
            "{} {} [{}] {} ({})",
            msg.timestamp.format("%H:%M:%S"),
            msg.id,
            marker,
            msg.query,
            msg.files.join(", ")
        );
    }
}

pub fn config(cfg: &TrackerConfig, files: &[String]) {
    println!("config:");
    println!("  base: {}", cfg.base_url);
    println!("  poll: {}s", cfg.poll_interval.as_secs());
    match cfg.max_poll_duration {
        Some(max) => println!("  max poll: {}s", max.as_secs()),
        None => println!("  max poll: none"),
    }
    println!("  status retries: {}", cfg.status_error_retries);
    println!("  data dir: {}", cfg.data_dir.display());
    println!("  files: {}", files.join(", "));
}

pub fn info(msg: &str) {
    println!("{}", msg);
}

pub fn error(msg: &str) {
    eprintln!("error: {}", msg);
}
