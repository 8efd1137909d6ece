use axum::http::StatusCode;

use super::store::StoreError;

/// Errors that abort a console operation. None of them touch the snapshot cache.
#[derive(Debug, thiserror::Error)]
pub enum ConsoleError {
    #[error("{collection}/{id} not found")]
    NotFound { collection: &'static str, id: String },
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("malformed {collection} document {id}: {source}")]
    Malformed {
        collection: &'static str,
        id: String,
        #[source]
        source: serde_json::Error,
    },
}

impl ConsoleError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ConsoleError::NotFound { .. } => StatusCode::NOT_FOUND,
            ConsoleError::InvalidArgument(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ConsoleError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ConsoleError::PermissionDenied(_) => StatusCode::FORBIDDEN,
            ConsoleError::Malformed { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StoreError> for ConsoleError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::NotFound { collection, id } => ConsoleError::NotFound { collection, id },
            StoreError::Unavailable(reason) => ConsoleError::StoreUnavailable(reason),
            StoreError::PermissionDenied(reason) => ConsoleError::PermissionDenied(reason),
        }
    }
}
