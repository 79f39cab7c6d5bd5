//! Conversions from external infrastructure errors into domain errors.

use quorum_domain::QuorumError;
use reqwest::Error as HttpError;
use rusqlite::Error as SqlError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub QuorumError);

impl From<InfraError> for QuorumError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<QuorumError> for InfraError {
    fn from(value: QuorumError) -> Self {
        InfraError(value)
    }
}

impl From<SqlError> for InfraError {
    fn from(value: SqlError) -> Self {
        use rusqlite::ffi::ErrorCode;

        let mapped = match value {
            SqlError::SqliteFailure(err, maybe_message) => {
                let message = maybe_message.unwrap_or_default();
                match err.code {
                    ErrorCode::DatabaseBusy => QuorumError::Database("database is busy".into()),
                    ErrorCode::DatabaseLocked => QuorumError::Database("database is locked".into()),
                    ErrorCode::ConstraintViolation => QuorumError::Database(format!(
                        "constraint violation (code {}): {message}",
                        err.extended_code
                    )),
                    _ => QuorumError::Database(format!(
                        "sqlite failure {:?} (code {}): {message}",
                        err.code, err.extended_code
                    )),
                }
            }
            SqlError::QueryReturnedNoRows => {
                QuorumError::NotFound("no rows returned by query".into())
            }
            other => QuorumError::Database(other.to_string()),
        };

        InfraError(mapped)
    }
}

impl From<r2d2::Error> for InfraError {
    fn from(value: r2d2::Error) -> Self {
        InfraError(QuorumError::Database(format!("connection pool error: {value}")))
    }
}

impl From<HttpError> for InfraError {
    fn from(value: HttpError) -> Self {
        let mapped = if value.is_timeout() {
            QuorumError::Timeout(value.to_string())
        } else if value.is_connect() {
            QuorumError::Provider(format!("connection failed: {value}"))
        } else {
            QuorumError::Network(value.to_string())
        };
        InfraError(mapped)
    }
}
