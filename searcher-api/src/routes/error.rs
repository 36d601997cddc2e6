use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::extract::QueryRejection;
use serde::Serialize;

use crate::dto::QueryValidationError;
use crate::search::SearchError;

#[derive(Debug, Clone, Serialize)]
struct ErrorDetail {
    msg: String,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    detail: Vec<ErrorDetail>,
}

/// Error rendered at the HTTP boundary as `{"detail":[{"msg": ...}]}`.
pub struct ApiError {
    status: StatusCode,
    detail: Vec<ErrorDetail>,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            detail: vec![ErrorDetail {
                msg: message.into(),
            }],
        }
    }

    pub fn unprocessable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    pub fn bad_gateway(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_GATEWAY, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            detail: self.detail,
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<QueryValidationError> for ApiError {
    fn from(err: QueryValidationError) -> Self {
        Self::unprocessable(err.message)
    }
}

impl From<QueryRejection> for ApiError {
    fn from(err: QueryRejection) -> Self {
        Self::unprocessable(err.to_string())
    }
}

impl From<SearchError> for ApiError {
    fn from(err: SearchError) -> Self {
        match &err {
            SearchError::StoreTransient(cause) => {
                tracing::error!("store unavailable: {cause}");
                Self::bad_gateway(err.to_string())
            }
            SearchError::StoreContract(cause) => {
                tracing::error!("store contract violation: {cause}");
                Self::internal(err.to_string())
            }
            SearchError::Startup(cause) => {
                tracing::error!("store startup failure: {cause}");
                Self::internal(err.to_string())
            }
            SearchError::Embedding(cause) => {
                tracing::error!("embedding failure: {cause}");
                Self::internal(err.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(error: ApiError) -> (StatusCode, serde_json::Value) {
        let response = error.into_response();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn validation_errors_render_as_422_detail() {
        let err = QueryValidationError::new(
            "'page' must be 0 for 'semantic' or 'combined' search.",
        );
        let (status, body) = body_json(ApiError::from(err)).await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(
            body,
            serde_json::json!({
                "detail": [
                    {"msg": "'page' must be 0 for 'semantic' or 'combined' search."}
                ]
            })
        );
    }

    #[tokio::test]
    async fn transient_store_errors_render_as_502() {
        let err = SearchError::StoreTransient("connection reset".to_string());
        let (status, _) = body_json(ApiError::from(err)).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn contract_errors_render_as_500() {
        let err = SearchError::StoreContract("no '_id' field".to_string());
        let (status, _) = body_json(ApiError::from(err)).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
