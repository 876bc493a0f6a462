use thiserror::Error;

#[derive(Error, Debug)]
pub enum SdkError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Core error: {0}")]
    Core(#[from] prodat_core::error::CoreError),

    #[error("{0} does not hold a JSON object")]
    NotAnObject(String),
}
