use std::collections::BTreeMap;

use axum::{
    Json,
    extract::{Path, Query, State},
};

use super::model::{
    CalculationRequestInfo, CalculationResultResponse, CalculationStatusResponse,
    RequestCalculation, RequestCalculationResponse, RequesterQuery,
};
use crate::{
    AppState,
    error::AppError,
    models::RequestStatus,
    result::ApiResponse,
    utils::success_to_api_response,
};

type ApiResult<T> = Result<Json<ApiResponse<T>>, AppError>;

#[axum::debug_handler]
pub async fn request_calculation(
    State(state): State<AppState>,
    Json(req): Json<RequestCalculation>,
) -> ApiResult<RequestCalculationResponse> {
    let calculation_request_id = CalculationRequestInfo::submit(&state, req).await?;
    Ok(success_to_api_response(RequestCalculationResponse {
        calculation_request_id,
    }))
}

#[axum::debug_handler]
pub async fn get_status(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(query): Query<RequesterQuery>,
) -> ApiResult<CalculationStatusResponse> {
    let status = CalculationRequestInfo::status(&state, id, &query).await?;
    Ok(success_to_api_response(CalculationStatusResponse {
        calculation_request_id: id,
        status_id: status.id(),
        status: status.name().to_string(),
    }))
}

#[axum::debug_handler]
pub async fn is_result_ready(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(query): Query<RequesterQuery>,
) -> ApiResult<bool> {
    let status = CalculationRequestInfo::status(&state, id, &query).await?;
    Ok(success_to_api_response(status == RequestStatus::Success))
}

#[axum::debug_handler]
pub async fn get_result(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(query): Query<RequesterQuery>,
) -> ApiResult<CalculationResultResponse> {
    let result = CalculationRequestInfo::result(&state, id, &query).await?;
    Ok(success_to_api_response(result))
}

pub async fn get_statuses() -> Json<ApiResponse<BTreeMap<i16, &'static str>>> {
    success_to_api_response(CalculationRequestInfo::statuses())
}
