use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// A request field failed validation. Holds the field name and the issue.
    #[error("Invalid input for {0}: {1}")]
    InvalidInput(String, String),

    #[error("Invalid job state transition: {0}")]
    InvalidTransition(String),
}
