use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

pub type TaskId = String;

/// Table rows keyed by column name.
pub type TableRow = Map<String, Value>;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Kpi {
    #[serde(default, deserialize_with = "loose_text")]
    pub title: String,
    #[serde(default, deserialize_with = "loose_text")]
    pub value: String,
    #[serde(default, deserialize_with = "loose_text")]
    pub description: String,
}

/// Accepts strings as-is and renders numbers and booleans the way the
/// service printed them. `null` reads as empty.
fn loose_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    })
}

/// Backend-provided chart options and series, passed through untouched.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChartSpec(pub Map<String, Value>);

impl ChartSpec {
    pub fn title(&self) -> Option<&str> {
        self.0.get("title")?.get("text")?.as_str()
    }

    pub fn series_len(&self) -> usize {
        self.0
            .get("series")
            .and_then(|v| v.as_array())
            .map(|series| series.len())
            .unwrap_or(0)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DashboardResult {
    #[serde(default)]
    pub kpis: Vec<Kpi>,
    #[serde(default)]
    pub charts: Vec<ChartSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<Vec<TableRow>>,
}

impl DashboardResult {
    pub fn is_empty(&self) -> bool {
        self.kpis.is_empty()
            && self.charts.is_empty()
            && self.content.as_deref().map_or(true, |c| c.trim().is_empty())
            && self.table.as_ref().map_or(true, |rows| rows.is_empty())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TaskStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Unknown(String),
}

impl TaskStatus {
    pub fn as_str(&self) -> &str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Processing => "processing",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::Unknown(raw) => raw,
        }
    }
}

impl Default for TaskStatus {
    fn default() -> Self {
        TaskStatus::Unknown(String::new())
    }
}

impl From<&str> for TaskStatus {
    fn from(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "pending" => TaskStatus::Pending,
            "processing" => TaskStatus::Processing,
            "completed" => TaskStatus::Completed,
            "failed" => TaskStatus::Failed,
            _ => TaskStatus::Unknown(raw.to_string()),
        }
    }
}

impl Serialize for TaskStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for TaskStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // Anything that isn't a string is kept as an unknown status.
        Ok(match Value::deserialize(deserializer)? {
            Value::String(raw) => TaskStatus::from(raw.as_str()),
            Value::Null => TaskStatus::default(),
            other => TaskStatus::Unknown(other.to_string()),
        })
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TaskStatusResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<DashboardResult>,
    /// Older backends answer with `data` instead of `result`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<DashboardResult>,
}

impl TaskStatusResponse {
    pub fn pending() -> Self {
        Self {
            task_id: None,
            status: TaskStatus::Pending,
            result: None,
            data: None,
        }
    }

    pub fn into_result(self) -> Option<DashboardResult> {
        self.result.or(self.data)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub chat_id: String,
    pub query: String,
    pub files: Vec<String>,
    pub response: Option<DashboardResult>,
    pub timestamp: DateTime<Utc>,
}
