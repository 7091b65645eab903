pub mod config;
pub mod engine;
pub mod error;
pub mod event;
pub mod logging;
pub mod report;
pub mod scheduler;
pub mod store;
pub mod system;

pub use engine::SnapshotEngine;
pub use error::SnapshotError;
