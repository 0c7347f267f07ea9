//! `ProgramError` → HTTP response.

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use program_core::ProgramError;

use super::envelope::Envelope;

/// Handler error. Anything convertible to `ProgramError` converts to this.
#[derive(Debug)]
pub struct AppError(pub ProgramError);

impl From<ProgramError> for AppError {
    fn from(err: ProgramError) -> Self {
        Self(err)
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self(ProgramError::InvalidPayload(rejection.body_text()))
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        Self(ProgramError::InvalidFilterValue(rejection.body_text()))
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        Self(ProgramError::InvalidPayload(rejection.body_text()))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status.is_server_error() {
            tracing::error!(kind = %self.0.kind(), error = ?self.0, "request failed");
        } else {
            tracing::debug!(kind = %self.0.kind(), error = %self.0, "request rejected");
        }

        let body = Envelope::error(self.0.kind(), self.0.public_message());
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn render(err: ProgramError) -> (StatusCode, serde_json::Value) {
        let resp = AppError(err).into_response();
        let status = resp.status();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn timeout_is_gateway_timeout() {
        let (status, body) = render(ProgramError::Timeout("list programs".into())).await;
        assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(body["kind"], "timeout");
    }

    #[tokio::test]
    async fn conflict_is_409() {
        let (status, body) = render(ProgramError::UniquenessConflict("name".into())).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn internal_detail_is_not_exposed() {
        let err = ProgramError::Internal(anyhow::anyhow!("password=hunter2 in connection string"));
        let (status, body) = render(err).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], "internal error");
        assert!(!body.to_string().contains("hunter2"));
    }
}
