use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Unknown activity label: {0}")]
    UnknownLabel(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Prototype store is locked by another process (delete {path} if no trainer is running)")]
    Locked { path: String },
}

impl StoreError {
    /// A locked store can be retried once the other writer finishes.
    pub fn is_recoverable(&self) -> bool {
        match self {
            StoreError::Locked { .. } => true,
            StoreError::Io(_) => true,
            StoreError::Serialization(_) => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
