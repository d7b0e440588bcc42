use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::database::StoreError;
use crate::utils::{error_codes, error_to_api_response};

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("输入参数无效: {}", .0.join("; "))]
    Validation(Vec<String>),
    #[error("未知的计算模型: {0}")]
    UnknownModel(i32),
    #[error("计算请求不存在")]
    NotFound,
    #[error("计算尚未完成")]
    ResultNotReady,
    #[error("请求过于频繁，请在{0}秒后重试")]
    RateLimited(u64),
    #[error("存储错误: {0}")]
    Store(#[from] StoreError),
}

impl AppError {
    fn status_and_code(&self) -> (StatusCode, i32) {
        match self {
            AppError::Validation(_) | AppError::UnknownModel(_) => {
                (StatusCode::BAD_REQUEST, error_codes::VALIDATION_ERROR)
            }
            AppError::NotFound | AppError::ResultNotReady => {
                (StatusCode::NOT_FOUND, error_codes::NOT_FOUND)
            }
            AppError::RateLimited(_) => (StatusCode::TOO_MANY_REQUESTS, error_codes::RATE_LIMIT),
            AppError::Store(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                error_codes::INTERNAL_ERROR,
            ),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let body = match &self {
            AppError::Validation(errors) => {
                let mut body = error_to_api_response(code, "输入参数无效".to_string());
                body.0.resp_data = Some(errors.clone());
                body
            }
            AppError::Store(e) => {
                tracing::error!("Store failure while handling request: {}", e);
                error_to_api_response(code, "内部服务器错误".to_string())
            }
            other => error_to_api_response(code, other.to_string()),
        };

        (status, body).into_response()
    }
}
