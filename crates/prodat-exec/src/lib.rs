//! Task execution for prodat: environment drivers, output capture and the
//! run / rerun / stop flow.

pub mod capture;
pub mod driver;
pub mod error;
pub mod process;
pub mod runner;
pub mod workspace;

pub use driver::{driver_for, EnvironmentDriver, RunSpec};
pub use error::ExecError;
pub use runner::{RunOptions, RunOutcome, Runner};
pub use workspace::Workspace;
pub use prodat_core::{TASK_DIR_ENV, TASK_ID_ENV};
