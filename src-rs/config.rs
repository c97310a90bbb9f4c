use std::path::PathBuf;
use std::time::Duration;

use crate::helpers::{env_opt, env_secs, env_usize};

pub const DEFAULT_API_URL: &str = "http://localhost:8000";
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

#[derive(Clone, Debug)]
pub struct TrackerConfig {
    pub base_url: String,
    pub poll_interval: Duration,
    /// `None` polls until the task reaches a terminal state or is cancelled.
    pub max_poll_duration: Option<Duration>,
    /// Consecutive failed status checks tolerated before the task is failed.
    pub status_error_retries: usize,
    pub request_timeout: Duration,
    pub data_dir: PathBuf,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_URL.to_string(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_poll_duration: None,
            status_error_retries: 3,
            request_timeout: Duration::from_secs(30),
            data_dir: default_data_dir(),
        }
    }
}

impl TrackerConfig {
    /// Defaults overridden by `DASHBOARD_*` environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            base_url: env_opt("DASHBOARD_API_URL").unwrap_or(defaults.base_url),
            poll_interval: env_secs("DASHBOARD_POLL_INTERVAL_SECS").unwrap_or(defaults.poll_interval),
            max_poll_duration: env_secs("DASHBOARD_MAX_POLL_SECS").or(defaults.max_poll_duration),
            status_error_retries: env_usize("DASHBOARD_STATUS_RETRIES")
                .unwrap_or(defaults.status_error_retries),
            request_timeout: env_secs("DASHBOARD_TIMEOUT_SECS").unwrap_or(defaults.request_timeout),
            data_dir: env_opt("DASHBOARD_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("dashboard-tracker")
}
