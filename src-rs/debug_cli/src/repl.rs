use tokio::io::{AsyncBufReadExt, BufReader};

use dashboard_tracker_rs::storage::Credentials;
use dashboard_tracker_rs::{DashboardTracker, TrackerConfig};

use crate::render;

pub struct Repl {
    pub config: TrackerConfig,
    pub tracker: DashboardTracker,
    pub credentials: Credentials,
    pub files: Vec<String>,
}

impl Repl {
    pub fn new(config: TrackerConfig, tracker: DashboardTracker, credentials: Credentials, files: Vec<String>) -> Self {
        Self {
            config,
            tracker,
            credentials,
            files,
        }
    }

    pub async fn run(&mut self, resume: bool) -> std::io::Result<()> {
        render::banner(&self.config, &self.files);
        if resume {
            match self.tracker.resume_if_needed() {
                Ok(Some(record)) => {
                    render::info(&format!(
                        "resuming task {} in chat {}",
                        record.task_id, record.chat_id
                    ));
                    self.wait().await;
                }
                Ok(None) => {}
                Err(err) => render::error(&err.to_string()),
            }
        }

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            render::prompt();
            let line = match lines.next_line().await? {
                Some(line) => line,
                None => break,
            };
            let line = line.trim().to_string();
            if line.is_empty() {
                continue;
            }
            if line.starts_with('/') {
                if self.handle_command(&line).await {
                    break;
                }
                continue;
            }
            self.send(&line).await;
        }
        self.tracker.stop_polling();
        Ok(())
    }

    async fn handle_command(&mut self, line: &str) -> bool {
        let mut parts = line.splitn(2, ' ');
        let cmd = parts.next().unwrap_or("").trim_start_matches('/');
        let rest = parts.next().unwrap_or("").trim();
        match cmd {
            "exit" | "quit" => return true,
            "help" => render::help(),
            "files" => {
                if !rest.is_empty() {
                    self.files = rest
                        .split(',')
                        .map(|f| f.trim().to_string())
                        .filter(|f| !f.is_empty())
                        .collect();
                }
                render::info(&format!("files: {}", self.files.join(", ")));
            }
            "status" => render::state(&self.tracker.state()),
            "wait" => self.wait().await,
            "cancel" => {
                self.tracker.stop_polling();
                render::info("polling stopped");
            }
            "reset" => {
                self.tracker.reset_dashboard();
                render::info("dashboard cleared");
            }
            "new" => match self.tracker.start_new_chat().await {
                Ok(chat_id) => render::info(&format!("new chat {}", chat_id)),
                Err(err) => render::error(&err.to_string()),
            },
            "load" => {
                if rest.is_empty() {
                    render::error("usage: /load <chat>");
                } else if self.tracker.load_chat(rest).await {
                    render::state(&self.tracker.state());
                } else {
                    render::info(&format!("chat {} has no local dashboard", rest));
                }
            }
            "chats" => match self.tracker.chats().fetch_chat_titles().await {
                Ok(titles) => render::titles(&titles),
                Err(err) => render::error(&err.to_string()),
            },
            "history" => render::history(&self.tracker.state().chat_history),
            "token" => {
                if rest.is_empty() {
                    render::error("usage: /token <token>");
                } else if let Err(err) = self.credentials.set_token(rest) {
                    render::error(&err.to_string());
                } else {
                    render::info("token updated");
                }
            }
            "logout" => match self.credentials.clear() {
                Ok(()) => render::info("credentials cleared"),
                Err(err) => render::error(&err.to_string()),
            },
            "config" => render::config(&self.config, &self.files),
            _ => render::info("unknown command, type /help"),
        }
        false
    }

    async fn send(&mut self, query: &str) {
        if self.files.is_empty() {
            render::error("select files first with /files");
            return;
        }
        match self.tracker.submit(query, &self.files, None).await {
            Ok(task_id) => {
                render::info(&format!("task {} submitted, Ctrl-C stops polling", task_id));
                self.wait().await;
            }
            Err(err) => render::error(&err.to_string()),
        }
    }

    async fn wait(&self) {
        if !self.tracker.is_polling() {
            render::info("nothing running");
            return;
        }
        tokio::select! {
            outcome = self.tracker.wait() => match outcome {
                Some(outcome) => render::outcome(&outcome),
                None => render::info("nothing running"),
            },
            _ = tokio::signal::ctrl_c() => {
                self.tracker.stop_polling();
                render::info("polling stopped");
            }
        }
    }
}
