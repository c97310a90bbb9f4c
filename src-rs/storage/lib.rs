pub mod credentials;
pub mod resume;
pub mod store;

pub use credentials::Credentials;
pub use resume::{PollingTaskShim, ResumeRecord, POLLING_TASK_KEY};
pub use store::{FileStore, KeyValueStore, MemoryStore};
