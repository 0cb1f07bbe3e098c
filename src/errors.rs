use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Failures raised by the asset store. Callers react to the variant, never to
/// the message text.
#[derive(Error, Debug)]
pub enum AssetError {
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),
    #[error("Payload of {actual} bytes exceeds the {limit} byte limit")]
    PayloadTooLarge { limit: usize, actual: usize },
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("Invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
    #[error("Failed to prepare storage root {path}: {source}")]
    StorageRoot {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Internal server error")]
    Internal,
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Payload too large: limit is {limit} bytes")]
    PayloadTooLarge { limit: usize },
}

impl From<AssetError> for ApiError {
    fn from(err: AssetError) -> Self {
        match err {
            AssetError::InvalidPayload(msg) => ApiError::BadRequest(msg),
            AssetError::PayloadTooLarge { limit, .. } => ApiError::PayloadTooLarge { limit },
            AssetError::StorageUnavailable(e) => {
                tracing::error!(error = %e, "Asset storage failure");
                ApiError::Internal
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        };

        let body = match self {
            ApiError::BadRequest(msg) => msg,
            _ => self.to_string(),
        };

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn too_large_maps_to_413_with_limit() {
        let err: ApiError = AssetError::PayloadTooLarge {
            limit: 3,
            actual: 4,
        }
        .into();
        assert!(matches!(err, ApiError::PayloadTooLarge { limit: 3 }));
        assert_eq!(err.into_response().status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[test]
    fn storage_failure_is_not_echoed() {
        let io = std::io::Error::other("disk on fire");
        let err: ApiError = AssetError::StorageUnavailable(io).into();
        assert_eq!(err.to_string(), "Internal server error");
    }
}
