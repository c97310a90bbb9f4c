pub mod client;
pub mod types;

pub use client::DashboardClient;
pub use types::{format_message_id, CreateTaskResponse, DashboardBackend, StatusQuery, TaskRequest};
