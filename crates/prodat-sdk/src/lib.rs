//! Rust SDK for code running under prodat.
//!
//! # Example
//! ```no_run
//! use prodat_sdk::{SnapshotBuilder, TaskLogger};
//! use serde_json::json;
//!
//! // Inside a command started with `prodat run`
//! let logger = TaskLogger::from_env();
//! logger.log_config([("lr", json!(0.01)), ("epochs", json!(20))]).unwrap();
//! logger.log_stats([("accuracy", json!(0.94))]).unwrap();
//!
//! // Or record a snapshot directly
//! let store = prodat_sdk::ProjectStore::discover(std::path::Path::new(".")).unwrap();
//! let snapshot = SnapshotBuilder::new("baseline")
//!     .config("lr", json!(0.01))
//!     .stat("accuracy", json!(0.94))
//!     .path("src")
//!     .commit(&store)
//!     .unwrap();
//! println!("Created snapshot {}", snapshot.id);
//! ```

mod error;
mod logger;
mod snapshot;

pub use error::SdkError;
pub use logger::TaskLogger;
pub use snapshot::SnapshotBuilder;

// Re-export core types that SDK users may need
pub use prodat_core::model::{EntityId, Snapshot, ValueMap};
pub use prodat_core::ProjectStore;
