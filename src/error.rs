//! Error taxonomy for the approval workflow engine.
//!
//! Every variant maps to an HTTP-style status code at the api boundary;
//! the transport layer itself lives outside this crate.

#[derive(thiserror::Error, Debug)]
pub enum TargetError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid action '{action}' for stage '{stage}'")]
    InvalidAction {
        action: &'static str,
        stage: &'static str,
    },

    #[error("validation failed: {0}")]
    Validation(String),

    /// The nested-creation transaction was aborted. Nothing was persisted.
    #[error("creation transaction aborted: {0}")]
    Transaction(String),

    #[error("identifier encoding failed: {0}")]
    Id(String),

    #[error("storage failure: {0}")]
    Storage(#[from] sled::Error),

    #[error("encoding failure: {0}")]
    Codec(#[from] serde_json::Error),
}

impl TargetError {
    /// Status code the api boundary reports for this failure.
    pub fn status(&self) -> u16 {
        match self {
            TargetError::NotFound(_) => 404,
            TargetError::InvalidAction { .. }
            | TargetError::Validation(_)
            | TargetError::Transaction(_) => 400,
            TargetError::Id(_) | TargetError::Storage(_) | TargetError::Codec(_) => 500,
        }
    }
}
