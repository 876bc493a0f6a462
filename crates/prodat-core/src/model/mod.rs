pub mod environment;
pub mod id;
pub mod session;
pub mod snapshot;
pub mod task;

pub use environment::{Environment, NewEnvironment};
pub use id::{EntityId, EntityKind};
pub use session::{Session, DEFAULT_SESSION};
pub use snapshot::{NewSnapshot, Snapshot, SnapshotData, TrackedFile, ValueMap};
pub use task::{Task, TaskData, TaskStatus};
