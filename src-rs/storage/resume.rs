use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::store::KeyValueStore;
use crate::error::TrackerResult;

pub const POLLING_TASK_KEY: &str = "polling_task";

/// Identity of the task being polled, enough to pick it back up after a restart.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumeRecord {
    #[serde(default)]
    pub task_id: String,
    #[serde(default)]
    pub chat_id: String,
    #[serde(default)]
    pub message_id: String,
}

impl ResumeRecord {
    pub fn new(task_id: &str, chat_id: &str, message_seq: u32) -> Self {
        Self {
            task_id: task_id.to_string(),
            chat_id: chat_id.to_string(),
            message_id: message_seq.to_string(),
        }
    }

    fn is_well_formed(&self) -> bool {
        !self.task_id.trim().is_empty() && !self.chat_id.trim().is_empty()
    }

    /// Message sequence recorded at submission; blank or non-numeric reads as 0.
    pub fn message_seq(&self) -> u32 {
        let raw = self.message_id.trim();
        if raw.is_empty() {
            return 0;
        }
        match raw.parse::<u32>() {
            Ok(seq) => seq,
            Err(_) => {
                warn!("stored message id {:?} is not numeric, resuming at 0", raw);
                0
            }
        }
    }
}

#[derive(Clone)]
pub struct PollingTaskShim {
    store: Arc<dyn KeyValueStore>,
}

impl PollingTaskShim {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub fn save(&self, record: &ResumeRecord) -> TrackerResult<()> {
        let blob = serde_json::to_string(record)?;
        self.store.set(POLLING_TASK_KEY, &blob)
    }

    pub fn clear(&self) -> TrackerResult<()> {
        self.store.remove(POLLING_TASK_KEY)
    }

    /// Reads the persisted entry. A malformed entry is deleted and reported as absent.
    pub fn load(&self) -> TrackerResult<Option<ResumeRecord>> {
        let raw = match self.store.get(POLLING_TASK_KEY)? {
            Some(raw) => raw,
            None => return Ok(None),
        };
        match serde_json::from_str::<ResumeRecord>(&raw) {
            Ok(record) if record.is_well_formed() => Ok(Some(record)),
            Ok(_) => {
                warn!("persisted polling task lacks taskId or chatId, discarding");
                self.clear()?;
                Ok(None)
            }
            Err(err) => {
                warn!("persisted polling task is unreadable ({}), discarding", err);
                self.clear()?;
                Ok(None)
            }
        }
    }
}
