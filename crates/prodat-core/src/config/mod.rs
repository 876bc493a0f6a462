pub mod settings;

pub use settings::{ProjectConfig, DEFAULT_DRIVER, DEFAULT_ENVIRONMENT_DIR, SCHEMA_VERSION};
