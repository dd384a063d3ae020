use analytics::AnalyticsError;
use api_client::error::ApiError;
use core_types::CoreError;
use database::DbError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("Invalid {field}: {message}")]
    InvalidArgument { field: String, message: String },

    #[error("{0} not found")]
    NotFound(String),

    #[error("Storage error: {0}")]
    Store(#[from] DbError),

    #[error("Worker pool error: {0}")]
    Pool(#[from] PoolError),
}

impl From<CoreError> for OrchestratorError {
    fn from(error: CoreError) -> Self {
        match error {
            CoreError::InvalidInput(field, message) => OrchestratorError::InvalidArgument { field, message },
            other => OrchestratorError::Store(DbError::Core(other)),
        }
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolError {
    #[error("the worker pool is shut down and accepts no new jobs")]
    Closed,
}

/// Why a job's pipeline stopped. The display text becomes the job's `error_message`.
#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("Failed to fetch market data: {0}")]
    Fetch(#[from] ApiError),

    #[error("Failed to compute analytics: {0}")]
    Analytics(#[from] AnalyticsError),

    #[error("Failed to persist job state: {0}")]
    Store(#[from] DbError),
}
