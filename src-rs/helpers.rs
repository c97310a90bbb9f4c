use std::env;
use std::sync::Arc;
use std::time::Duration;

use crate::api::DashboardClient;
use crate::chat::ChatBook;
use crate::config::TrackerConfig;
use crate::error::TrackerResult;
use crate::storage::{Credentials, FileStore, KeyValueStore};
use crate::tracker::DashboardTracker;

pub(crate) fn env_opt(key: &str) -> Option<String> {
    match env::var(key) {
        Ok(value) if !value.trim().is_empty() => Some(value.trim().to_string()),
        _ => None,
    }
}

pub(crate) fn env_usize(key: &str) -> Option<usize> {
    env_opt(key).and_then(|raw| raw.parse::<usize>().ok())
}

pub(crate) fn env_secs(key: &str) -> Option<Duration> {
    env_opt(key)
        .and_then(|raw| raw.parse::<u64>().ok())
        .map(Duration::from_secs)
}

/// Wires a tracker against the HTTP service with file-backed storage. The
/// returned credentials share that storage.
pub fn build_tracker(cfg: &TrackerConfig) -> TrackerResult<(DashboardTracker, Credentials)> {
    let storage: Arc<dyn KeyValueStore> = Arc::new(FileStore::open(&cfg.data_dir)?);
    let credentials = Credentials::new(storage.clone());
    let client = Arc::new(DashboardClient::new(
        &cfg.base_url,
        credentials.clone(),
        cfg.request_timeout,
    )?);
    let chats = Arc::new(ChatBook::with_remote(client.clone()));
    let tracker = DashboardTracker::new(cfg.clone(), client, chats, storage);
    Ok((tracker, credentials))
}
