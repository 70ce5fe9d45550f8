use thiserror::Error;

#[derive(Error, Debug)]
pub enum HerdNetError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Malformed interaction record: {0}")]
    MalformedRecord(String),

    #[error("Unknown individual: {0}")]
    UnknownNode(String),

    #[error("Stage {stage} failed: {message}")]
    StageExecution { stage: String, message: String },

    #[error("Checkpoint error: {0}")]
    Checkpoint(String),

    #[error("Collaborator error: {0}")]
    Collaborator(String),
}

pub type Result<T> = std::result::Result<T, HerdNetError>;
