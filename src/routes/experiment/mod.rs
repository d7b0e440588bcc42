mod handler;
mod model;

pub use handler::{get_result, get_status, get_statuses, is_result_ready, request_calculation};
pub use model::{
    CalculationResultResponse, CalculationStatusResponse, OutputParams, RequestCalculation,
    RequestCalculationResponse, RequesterQuery, ResultFileInfo,
};
