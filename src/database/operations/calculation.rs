// 计算请求存储库
// 基于 PostgreSQL 的 CalculationStore 实现

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::PgPool;

use crate::database::models::calculation::CalculationRequestEntity;
use crate::database::store::{CalculationStore, StoreError, StoreResult};
use crate::models::{
    CalculationInput, CalculationOutput, CalculationRecord, NewCalculationRequest, PendingRequest,
    RequestStatus,
};

const SELECT_COLUMNS: &str = r#"
    SELECT id, model_id, status_id, input_params, user_requester_id, requested_at,
           result_value, result_file_name, result_file_extension, result_file_content
    FROM calculation_requests
"#;

/// 计算请求存储库，处理所有与计算请求相关的数据库操作
pub struct CalculationOperation {
    db: Arc<PgPool>,
}

impl CalculationOperation {
    /// 创建新的计算请求存储库实例
    pub fn new(db: Arc<PgPool>) -> Self {
        Self { db }
    }

    async fn find(
        &self,
        id: i64,
        user_requester_id: Option<i64>,
    ) -> StoreResult<Option<CalculationRequestEntity>> {
        let query = format!(
            "{} WHERE id = $1 AND ($2::BIGINT IS NULL OR user_requester_id = $2)",
            SELECT_COLUMNS
        );
        let entity = sqlx::query_as::<_, CalculationRequestEntity>(&query)
            .bind(id)
            .bind(user_requester_id)
            .fetch_optional(&*self.db)
            .await?;
        Ok(entity)
    }

    /// 条件更新失败后区分“不存在”和“状态不允许”
    async fn transition_error(&self, id: i64, to: RequestStatus) -> StoreError {
        match self.find(id, None).await {
            Ok(Some(entity)) => match entity.status() {
                Ok(from) => StoreError::InvalidTransition { id, from, to },
                Err(e) => e,
            },
            Ok(None) => StoreError::NotFound(id),
            Err(e) => e,
        }
    }
}

#[async_trait]
impl CalculationStore for CalculationOperation {
    async fn enqueue(&self, request: NewCalculationRequest) -> StoreResult<i64> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO calculation_requests (model_id, status_id, input_params, user_requester_id, requested_at)
            VALUES ($1, $2, $3, $4, NOW())
            RETURNING id
            "#,
        )
        .bind(request.model_id)
        .bind(RequestStatus::New.id())
        .bind(&request.input_params)
        .bind(request.user_requester_id)
        .fetch_one(&*self.db)
        .await?;

        tracing::info!("Calculation request {} enqueued", id);
        Ok(id)
    }

    async fn next_pending(&self) -> StoreResult<Option<PendingRequest>> {
        let row: Option<(i64, i32)> = sqlx::query_as(
            r#"
            SELECT id, model_id FROM calculation_requests
            WHERE status_id = $1
            ORDER BY requested_at ASC, id ASC
            LIMIT 1
            "#,
        )
        .bind(RequestStatus::New.id())
        .fetch_optional(&*self.db)
        .await?;

        Ok(row.map(|(id, model_id)| PendingRequest { id, model_id }))
    }

    async fn try_claim(&self, id: i64) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE calculation_requests
            SET status_id = $2, started_at = NOW()
            WHERE id = $1 AND status_id = $3
            "#,
        )
        .bind(id)
        .bind(RequestStatus::InProgress.id())
        .bind(RequestStatus::New.id())
        .execute(&*self.db)
        .await?;

        if result.rows_affected() == 1 {
            return Ok(true);
        }
        match self.find(id, None).await? {
            Some(_) => Ok(false),
            None => Err(StoreError::NotFound(id)),
        }
    }

    async fn fetch_input(&self, id: i64) -> StoreResult<Option<CalculationInput>> {
        Ok(self.find(id, None).await?.map(|entity| CalculationInput {
            id: entity.id,
            model_id: entity.model_id,
            input_params: entity.input_params,
            user_requester_id: entity.user_requester_id,
            requested_at: entity.requested_at,
        }))
    }

    async fn mark_succeeded(&self, id: i64, output: CalculationOutput) -> StoreResult<()> {
        let (file_name, extension, content) = match output.artifact {
            Some(file) => (
                Some(file.file_name_without_extension),
                Some(file.extension),
                Some(file.content),
            ),
            None => (None, None, None),
        };

        let result = sqlx::query(
            r#"
            UPDATE calculation_requests
            SET status_id = $2,
                result_value = $3,
                result_file_name = $4,
                result_file_extension = $5,
                result_file_content = $6,
                finished_at = NOW()
            WHERE id = $1 AND status_id = $7
            "#,
        )
        .bind(id)
        .bind(RequestStatus::Success.id())
        .bind(output.value)
        .bind(file_name)
        .bind(extension)
        .bind(content)
        .bind(RequestStatus::InProgress.id())
        .execute(&*self.db)
        .await?;

        if result.rows_affected() == 1 {
            Ok(())
        } else {
            Err(self.transition_error(id, RequestStatus::Success).await)
        }
    }

    async fn mark_failed(&self, id: i64) -> StoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE calculation_requests
            SET status_id = $2, finished_at = NOW()
            WHERE id = $1 AND status_id IN ($3, $4)
            "#,
        )
        .bind(id)
        .bind(RequestStatus::Error.id())
        .bind(RequestStatus::New.id())
        .bind(RequestStatus::InProgress.id())
        .execute(&*self.db)
        .await?;

        if result.rows_affected() == 1 {
            Ok(())
        } else {
            Err(self.transition_error(id, RequestStatus::Error).await)
        }
    }

    async fn status_of(
        &self,
        id: i64,
        user_requester_id: Option<i64>,
    ) -> StoreResult<Option<RequestStatus>> {
        self.find(id, user_requester_id)
            .await?
            .map(|entity| entity.status())
            .transpose()
    }

    async fn fetch_record(
        &self,
        id: i64,
        user_requester_id: Option<i64>,
    ) -> StoreResult<Option<CalculationRecord>> {
        self.find(id, user_requester_id)
            .await?
            .map(CalculationRequestEntity::into_record)
            .transpose()
    }
}
