//! # Database Errors
//!
//! ```text
//! sqlx::Error ──► DbError ──► PaymentError::Database ──► ApiError (404 / 500)
//! ```
//!
//! Constraint failures are classified with sqlx's driver-neutral
//! [`ErrorKind`], so a duplicate `payrexx_reference` surfaces as
//! [`DbError::UniqueViolation`] and a balance above face value as
//! [`DbError::ConstraintViolation`].

use sqlx::error::ErrorKind;
use thiserror::Error;

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// A second row claimed a value that must be unique (a reference).
    #[error("Duplicate value for {column}")]
    UniqueViolation { column: String },

    /// Foreign key, NOT NULL or CHECK rule rejected the write.
    #[error("Constraint violation: {message}")]
    ConstraintViolation { message: String },

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// A JSON column (transaction snapshot) could not be written or read.
    #[error("Serialization failed: {0}")]
    Serialization(String),

    /// Every pooled connection stayed busy past the acquire timeout.
    #[error("Connection pool exhausted")]
    PoolExhausted,

    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    pub fn not_found(entity: impl Into<String>, id: impl ToString) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, DbError::NotFound { .. })
    }
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::not_found("Row", "?"),
            sqlx::Error::Database(db_err) => {
                let message = db_err.message().to_string();
                match db_err.kind() {
                    // SQLite: "UNIQUE constraint failed: bookings.payrexx_reference"
                    ErrorKind::UniqueViolation => DbError::UniqueViolation {
                        column: message
                            .rsplit(": ")
                            .next()
                            .unwrap_or(message.as_str())
                            .to_string(),
                    },
                    ErrorKind::ForeignKeyViolation
                    | ErrorKind::NotNullViolation
                    | ErrorKind::CheckViolation => DbError::ConstraintViolation { message },
                    _ => DbError::Internal(message),
                }
            }
            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,
            sqlx::Error::PoolClosed => DbError::ConnectionFailed("pool is closed".to_string()),
            other => DbError::Internal(other.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

impl From<serde_json::Error> for DbError {
    fn from(err: serde_json::Error) -> Self {
        DbError::Serialization(err.to_string())
    }
}
