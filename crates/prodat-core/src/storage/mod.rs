pub mod code;
pub mod environments;
pub mod git_backend;
pub mod lock;
pub mod objects;
pub mod read;
pub mod refs;
pub mod sessions;
pub mod snapshots;
pub mod tasks;

pub use git_backend::{ListOptions, ProjectStore};
pub use lock::ProjectLock;
pub use snapshots::Checkout;
