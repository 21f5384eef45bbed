// Mapping of domain errors onto HTTP responses
use crate::domain::error::EnlightenError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

#[derive(Debug)]
pub enum ApiError {
    Portal(EnlightenError),
    BadRequest(String),
    NotFound(String),
}

impl From<EnlightenError> for ApiError {
    fn from(e: EnlightenError) -> Self {
        ApiError::Portal(e)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Portal(e) => match e {
                EnlightenError::Configuration(_)
                | EnlightenError::Persistence(_)
                | EnlightenError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
                EnlightenError::Authentication(_) | EnlightenError::AuthenticationExpired => {
                    StatusCode::UNAUTHORIZED
                }
                EnlightenError::InvalidDate(_) => StatusCode::BAD_REQUEST,
                EnlightenError::Fetch(_) | EnlightenError::Payload(_) => StatusCode::BAD_GATEWAY,
            },
        }
    }

    fn message(&self) -> String {
        match self {
            ApiError::Portal(e) => e.to_string(),
            ApiError::BadRequest(msg) | ApiError::NotFound(msg) => msg.clone(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self.message());
        } else {
            tracing::debug!("Request rejected ({}): {}", status, self.message());
        }
        (status, Json(json!({ "error": self.message() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (
                ApiError::Portal(EnlightenError::AuthenticationExpired),
                StatusCode::UNAUTHORIZED,
            ),
            (
                ApiError::Portal(EnlightenError::InvalidDate("2099-01-01".into())),
                StatusCode::BAD_REQUEST,
            ),
            (
                ApiError::Portal(EnlightenError::Payload("junk".into())),
                StatusCode::BAD_GATEWAY,
            ),
            (
                ApiError::Portal(EnlightenError::Configuration("step".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (ApiError::NotFound("INV9".into()), StatusCode::NOT_FOUND),
        ];
        for (error, status) in cases {
            assert_eq!(error.into_response().status(), status);
        }
    }
}
