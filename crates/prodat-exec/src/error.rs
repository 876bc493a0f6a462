use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExecError {
    #[error("Failed to start command: {0}")]
    Spawn(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Core error: {0}")]
    Core(#[from] prodat_core::error::CoreError),

    #[error("Driver error: {0}")]
    Driver(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Task {0} is not running")]
    NotRunning(String),
}
