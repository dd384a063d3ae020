use core_types::CoreError;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Missing or invalid database connection settings: {0}")]
    ConnectionConfigError(String),

    #[error("Database operation failed: {0}")]
    QueryError(#[from] sqlx::Error),

    #[error("Database migration failed: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),

    #[error("The requested data was not found in the database.")]
    NotFound,

    #[error("A result for job {0} already exists.")]
    AlreadyExists(Uuid),

    /// A write the job state machine does not allow, or a stored row it cannot represent.
    #[error(transparent)]
    Core(#[from] CoreError),
}
