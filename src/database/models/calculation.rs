// 计算请求实体
// 对应 calculation_requests 表

use chrono::{DateTime, Utc};
use sqlx::FromRow;

use crate::database::store::StoreError;
use crate::models::{CalculationOutput, CalculationRecord, PhysicalFile, RequestStatus};

/// 计算请求实体
#[derive(Debug, Clone, FromRow)]
pub struct CalculationRequestEntity {
    pub id: i64,
    /// 模型类型判别值
    pub model_id: i32,
    pub status_id: i16,
    /// 原样保存的输入参数
    pub input_params: serde_json::Value,
    pub user_requester_id: Option<i64>,
    pub requested_at: DateTime<Utc>,
    pub result_value: Option<f64>,
    pub result_file_name: Option<String>,
    pub result_file_extension: Option<String>,
    pub result_file_content: Option<Vec<u8>>,
}

impl CalculationRequestEntity {
    pub fn status(&self) -> Result<RequestStatus, StoreError> {
        RequestStatus::try_from(self.status_id).map_err(|status_id| StoreError::Corrupt {
            id: self.id,
            reason: format!("unknown status_id {}", status_id),
        })
    }

    pub fn into_record(self) -> Result<CalculationRecord, StoreError> {
        let status = self.status()?;
        let artifact = match (self.result_file_name, self.result_file_extension) {
            (Some(file_name_without_extension), Some(extension)) => Some(PhysicalFile {
                file_name_without_extension,
                extension,
                content: self.result_file_content.unwrap_or_default(),
            }),
            _ => None,
        };
        let output = self
            .result_value
            .map(|value| CalculationOutput { value, artifact });

        Ok(CalculationRecord {
            id: self.id,
            model_id: self.model_id,
            status,
            input_params: self.input_params,
            user_requester_id: self.user_requester_id,
            requested_at: self.requested_at,
            output,
        })
    }
}
