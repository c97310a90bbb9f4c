pub mod config;
pub mod error;
pub mod helpers;

#[path = "dashboard/lib.rs"]
pub mod dashboard;
#[path = "storage/lib.rs"]
pub mod storage;
#[path = "chat/lib.rs"]
pub mod chat;
#[path = "api/lib.rs"]
pub mod api;
#[path = "tracker/lib.rs"]
pub mod tracker;

pub use config::TrackerConfig;
pub use error::{TrackerError, TrackerResult};
pub use helpers::build_tracker;
pub use tracker::{DashboardState, DashboardTracker, FailureReason, PollOutcome};
