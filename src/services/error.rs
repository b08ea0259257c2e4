use thiserror::Error;
use uuid::Uuid;

use crate::database::DatabaseError;
use crate::services::validation::FieldErrors;

/// Which live operation a partial failure followed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiveOperation {
    Create,
    Delete,
}

impl std::fmt::Display for LiveOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LiveOperation::Create => f.write_str("create"),
            LiveOperation::Delete => f.write_str("delete"),
        }
    }
}

/// Failure taxonomy of the provisioning service
#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("{message}")]
    Validation {
        message: String,
        field_errors: FieldErrors,
    },

    #[error("Database flavour with name {0} is not mysql or postgres.")]
    UnsupportedFlavour(String),

    #[error("Database {0} Already Exists.")]
    DuplicateName(String),

    #[error("Database user {0} Already Exists.")]
    DuplicateUser(String),

    #[error("Project with id {0} not found")]
    ProjectNotFound(Uuid),

    #[error("Database with id {0} not found.")]
    DatabaseNotFound(Uuid),

    #[error("Failed to connect to the database service")]
    ServiceUnavailable,

    #[error("Unable to create database")]
    CreateFailed,

    #[error("Unable to delete database")]
    DeleteFailed,

    #[error("Unable to reset database")]
    ResetFailed,

    /// The live side effect succeeded but the record store did not follow.
    /// Needs manual reconciliation; never retry blindly.
    #[error("Database {name} was {operation}d on the server but its record could not be updated")]
    PartialFailure {
        operation: LiveOperation,
        name: String,
        record_id: Uuid,
        #[source]
        source: DatabaseError,
    },

    #[error("Record store error: {0}")]
    Storage(#[from] DatabaseError),
}

impl ProvisionError {
    pub fn validation(field_errors: FieldErrors) -> Self {
        ProvisionError::Validation {
            message: "Validation failed".to_string(),
            field_errors,
        }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            ProvisionError::Validation { .. }
            | ProvisionError::DuplicateName(_)
            | ProvisionError::DuplicateUser(_) => 400,
            ProvisionError::ProjectNotFound(_) | ProvisionError::DatabaseNotFound(_) => 404,
            ProvisionError::UnsupportedFlavour(_) => 409,
            ProvisionError::ServiceUnavailable
            | ProvisionError::CreateFailed
            | ProvisionError::DeleteFailed
            | ProvisionError::ResetFailed
            | ProvisionError::PartialFailure { .. }
            | ProvisionError::Storage(_) => 500,
        }
    }

    /// Stable error code for clients
    pub fn kind(&self) -> &'static str {
        match self {
            ProvisionError::Validation { .. } => "VALIDATION_ERROR",
            ProvisionError::UnsupportedFlavour(_) => "UNSUPPORTED_FLAVOUR",
            ProvisionError::DuplicateName(_) => "DUPLICATE_NAME",
            ProvisionError::DuplicateUser(_) => "DUPLICATE_USER",
            ProvisionError::ProjectNotFound(_) | ProvisionError::DatabaseNotFound(_) => "NOT_FOUND",
            ProvisionError::ServiceUnavailable => "SERVICE_UNAVAILABLE",
            ProvisionError::CreateFailed => "CREATE_FAILED",
            ProvisionError::DeleteFailed => "DELETE_FAILED",
            ProvisionError::ResetFailed => "RESET_FAILED",
            ProvisionError::PartialFailure { .. } => "PARTIAL_FAILURE",
            ProvisionError::Storage(_) => "INTERNAL_SERVER_ERROR",
        }
    }

    /// Retrying the same request may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ProvisionError::ServiceUnavailable
                | ProvisionError::CreateFailed
                | ProvisionError::DeleteFailed
                | ProvisionError::ResetFailed
        )
    }
}
