pub mod orchestrator;
pub mod resolve;
pub mod scoring;

pub use orchestrator::{BestsellerSync, SyncError, SyncReport};
