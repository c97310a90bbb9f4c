pub mod poller;
pub mod service;
pub mod state;

pub use poller::{FailureReason, PollContext, PollOutcome, Poller};
pub use service::DashboardTracker;
pub use state::{DashboardState, StateStore, INITIAL_CHAT_ID};
