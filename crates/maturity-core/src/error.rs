use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid question at index {index}: {reason}")]
    InvalidQuestion { index: usize, reason: String },

    #[error("invalid catalog: {0}")]
    InvalidCatalog(String),

    #[error("invalid assessment: {0}")]
    InvalidAssessment(String),

    #[error("duplicate question id: {0}")]
    DuplicateQuestion(String),

    #[error("unknown question: {0}")]
    UnknownQuestion(String),

    #[error("invalid answer '{0}', expected \"yes\" or \"no\"")]
    InvalidAnswer(String),
}
