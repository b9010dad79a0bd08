use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Invalid task: {0}")]
    InvalidTask(String),

    #[error("Unknown {kind} value: {value}")]
    UnknownVariant { kind: &'static str, value: String },

    #[error("Configuration error: {0}")]
    Config(String),
}
