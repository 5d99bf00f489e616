//! HTTP-surface error handling.
//!
//! Every handler failure maps onto one of three caller-visible classes:
//! unauthorized, bad request, or internal. The body carries a Matrix-style
//! errcode object so federated callers get something they can parse.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

/// Errors surfaced by the HTTP handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Bad or missing bearer token / federation signature.
    #[error("unauthorized")]
    Unauthorized,

    /// Request body was not valid JSON.
    #[error("body is not JSON")]
    NotJson,

    /// A query parameter failed to parse.
    #[error("invalid parameter: {0}")]
    InvalidParam(&'static str),

    /// Upstream transport or storage failure.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Matrix errcode string for the response body.
    pub fn errcode(&self) -> &'static str {
        match self {
            Self::Unauthorized => "M_FORBIDDEN",
            Self::NotJson => "M_NOT_JSON",
            Self::InvalidParam(_) => "M_INVALID_PARAM",
            Self::Internal(_) => "M_UNKNOWN",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::NotJson | Self::InvalidParam(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "errcode": self.errcode(),
            "error": self.to_string(),
        }));
        (self.status(), body).into_response()
    }
}

impl From<crate::db::DbError> for ApiError {
    fn from(err: crate::db::DbError) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<crate::matrix::MatrixError> for ApiError {
    fn from(err: crate::matrix::MatrixError) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<crate::directory::DirectoryError> for ApiError {
    fn from(err: crate::directory::DirectoryError) -> Self {
        Self::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_classes_map_to_distinct_statuses() {
        assert_eq!(ApiError::Unauthorized.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::NotJson.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ApiError::InvalidParam("limit").status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::Internal("x".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn errcodes_are_matrix_flavored() {
        assert_eq!(ApiError::Unauthorized.errcode(), "M_FORBIDDEN");
        assert_eq!(ApiError::NotJson.errcode(), "M_NOT_JSON");
        assert_eq!(ApiError::InvalidParam("since").errcode(), "M_INVALID_PARAM");
        assert_eq!(ApiError::Internal("x".into()).errcode(), "M_UNKNOWN");
    }
}
