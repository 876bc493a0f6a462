//! Working-tree tracking and restoration.

pub mod checkout;
pub mod tracker;

pub use checkout::{restore_files, CheckoutSummary};
pub use tracker::{restrict_to, tracked_files, write_code_tree, IGNORE_FILE};
