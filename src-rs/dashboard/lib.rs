pub mod types;

pub use types::{ChartSpec, ChatMessage, DashboardResult, Kpi, TableRow, TaskId, TaskStatus, TaskStatusResponse};
