use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
    AppState,
    error::AppError,
    models::{CalculationOutput, ModelKind, NewCalculationRequest, RequestStatus},
};

/// 提交计算请求
#[derive(Debug, Deserialize)]
pub struct RequestCalculation {
    pub model_id: i32,
    /// 具体结构由模型决定，这里不解析
    pub input_params: serde_json::Value,
    pub user_requester_id: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RequestCalculationResponse {
    pub calculation_request_id: i64,
}

#[derive(Debug, Default, Deserialize)]
pub struct RequesterQuery {
    pub user_requester_id: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CalculationStatusResponse {
    pub calculation_request_id: i64,
    pub status_id: i16,
    pub status: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ResultFileInfo {
    pub file_name: String,
    pub extension: String,
    pub size: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct OutputParams {
    pub calc_result: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<ResultFileInfo>,
}

impl From<CalculationOutput> for OutputParams {
    fn from(output: CalculationOutput) -> Self {
        Self {
            calc_result: output.value,
            file: output.artifact.map(|file| ResultFileInfo {
                size: file.content.len(),
                file_name: file.file_name_without_extension,
                extension: file.extension,
            }),
        }
    }
}

/// 计算结果及其输入参数
#[derive(Debug, Serialize, Deserialize)]
pub struct CalculationResultResponse {
    pub model_name: String,
    pub status_id: i16,
    pub input_params: serde_json::Value,
    pub output_params: OutputParams,
}

pub struct CalculationRequestInfo;

impl CalculationRequestInfo {
    /// 校验后入队，返回新请求 ID
    pub async fn submit(state: &AppState, req: RequestCalculation) -> Result<i64, AppError> {
        let (kind, algorithm) = state
            .registry
            .resolve(req.model_id)
            .ok_or(AppError::UnknownModel(req.model_id))?;

        let errors = algorithm.validate(&req.input_params);
        if !errors.is_empty() {
            tracing::debug!("Rejected {} request: {:?}", kind.name(), errors);
            return Err(AppError::Validation(errors));
        }

        let id = state
            .store
            .enqueue(NewCalculationRequest {
                model_id: kind.id(),
                input_params: req.input_params,
                user_requester_id: req.user_requester_id,
            })
            .await?;

        tracing::info!("Accepted {} calculation request {}", kind.name(), id);
        Ok(id)
    }

    pub async fn status(
        state: &AppState,
        id: i64,
        query: &RequesterQuery,
    ) -> Result<RequestStatus, AppError> {
        state
            .store
            .status_of(id, query.user_requester_id)
            .await?
            .ok_or(AppError::NotFound)
    }

    /// 只返回 Success 状态的请求
    pub async fn result(
        state: &AppState,
        id: i64,
        query: &RequesterQuery,
    ) -> Result<CalculationResultResponse, AppError> {
        let record = state
            .store
            .fetch_record(id, query.user_requester_id)
            .await?
            .ok_or(AppError::NotFound)?;

        let output = match (record.status, record.output) {
            (RequestStatus::Success, Some(output)) => output,
            _ => return Err(AppError::ResultNotReady),
        };

        let model_name = ModelKind::try_from(record.model_id)
            .map(|kind| kind.name().to_string())
            .unwrap_or_else(|id| format!("model #{}", id));

        Ok(CalculationResultResponse {
            model_name,
            status_id: record.status.id(),
            input_params: record.input_params,
            output_params: output.into(),
        })
    }

    /// 状态字典
    pub fn statuses() -> BTreeMap<i16, &'static str> {
        RequestStatus::ALL
            .iter()
            .map(|status| (status.id(), status.name()))
            .collect()
    }
}
