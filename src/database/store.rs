// 计算请求存储接口
// 调度器和接口层只通过该 trait 访问计算请求

use async_trait::async_trait;

use crate::models::{
    CalculationInput, CalculationOutput, CalculationRecord, NewCalculationRequest, PendingRequest,
    RequestStatus,
};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("calculation request {0} not found")]
    NotFound(i64),
    #[error("calculation request {id} cannot move from {from:?} to {to:?}")]
    InvalidTransition {
        id: i64,
        from: RequestStatus,
        to: RequestStatus,
    },
    #[error("corrupt record {id}: {reason}")]
    Corrupt { id: i64, reason: String },
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait CalculationStore: Send + Sync {
    /// 新增请求，状态为 New，返回新 ID
    async fn enqueue(&self, request: NewCalculationRequest) -> StoreResult<i64>;

    /// 最早提交的 New 请求（按提交时间、再按 ID 升序），不改变状态
    async fn next_pending(&self) -> StoreResult<Option<PendingRequest>>;

    /// 条件更新 New -> InProgress，只有一个调用方能拿到 true
    async fn try_claim(&self, id: i64) -> StoreResult<bool>;

    async fn fetch_input(&self, id: i64) -> StoreResult<Option<CalculationInput>>;

    /// InProgress -> Success，同时写入结果
    async fn mark_succeeded(&self, id: i64, output: CalculationOutput) -> StoreResult<()>;

    /// New/InProgress -> Error
    async fn mark_failed(&self, id: i64) -> StoreResult<()>;

    /// 指定 requester 时只返回该用户自己的请求
    async fn status_of(
        &self,
        id: i64,
        user_requester_id: Option<i64>,
    ) -> StoreResult<Option<RequestStatus>>;

    async fn fetch_record(
        &self,
        id: i64,
        user_requester_id: Option<i64>,
    ) -> StoreResult<Option<CalculationRecord>>;
}
