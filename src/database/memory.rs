// 内存计算请求存储
// 未配置 DATABASE_URL 时使用，也用于测试

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use super::store::{CalculationStore, StoreError, StoreResult};
use crate::models::{
    CalculationInput, CalculationOutput, CalculationRecord, NewCalculationRequest, PendingRequest,
    RequestStatus,
};

#[derive(Default)]
struct MemoryState {
    last_id: i64,
    requests: BTreeMap<i64, CalculationRecord>,
}

/// 基于互斥锁的内存存储，语义与 PostgreSQL 实现一致
#[derive(Default)]
pub struct InMemoryCalculationStore {
    state: Mutex<MemoryState>,
}

impl InMemoryCalculationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 以指定提交时间入队
    pub async fn enqueue_at(
        &self,
        request: NewCalculationRequest,
        requested_at: DateTime<Utc>,
    ) -> i64 {
        let mut state = self.state.lock().await;
        state.last_id += 1;
        let id = state.last_id;
        state.requests.insert(
            id,
            CalculationRecord {
                id,
                model_id: request.model_id,
                status: RequestStatus::New,
                input_params: request.input_params,
                user_requester_id: request.user_requester_id,
                requested_at,
                output: None,
            },
        );
        id
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.requests.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

fn visible_to(record: &CalculationRecord, user_requester_id: Option<i64>) -> bool {
    match user_requester_id {
        Some(requester) => record.user_requester_id == Some(requester),
        None => true,
    }
}

#[async_trait]
impl CalculationStore for InMemoryCalculationStore {
    async fn enqueue(&self, request: NewCalculationRequest) -> StoreResult<i64> {
        Ok(self.enqueue_at(request, Utc::now()).await)
    }

    async fn next_pending(&self) -> StoreResult<Option<PendingRequest>> {
        let state = self.state.lock().await;
        Ok(state
            .requests
            .values()
            .filter(|record| record.status == RequestStatus::New)
            .min_by_key(|record| (record.requested_at, record.id))
            .map(|record| PendingRequest {
                id: record.id,
                model_id: record.model_id,
            }))
    }

    async fn try_claim(&self, id: i64) -> StoreResult<bool> {
        let mut state = self.state.lock().await;
        match state.requests.get_mut(&id) {
            Some(record) if record.status == RequestStatus::New => {
                record.status = RequestStatus::InProgress;
                Ok(true)
            }
            Some(_) => Ok(false),
            None => Err(StoreError::NotFound(id)),
        }
    }

    async fn fetch_input(&self, id: i64) -> StoreResult<Option<CalculationInput>> {
        let state = self.state.lock().await;
        Ok(state.requests.get(&id).map(|record| CalculationInput {
            id: record.id,
            model_id: record.model_id,
            input_params: record.input_params.clone(),
            user_requester_id: record.user_requester_id,
            requested_at: record.requested_at,
        }))
    }

    async fn mark_succeeded(&self, id: i64, output: CalculationOutput) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        let record = state.requests.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        if record.status != RequestStatus::InProgress {
            return Err(StoreError::InvalidTransition {
                id,
                from: record.status,
                to: RequestStatus::Success,
            });
        }
        record.status = RequestStatus::Success;
        record.output = Some(output);
        Ok(())
    }

    async fn mark_failed(&self, id: i64) -> StoreResult<()> {
        let mut state = self.state.lock().await;
        let record = state.requests.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        if record.status.is_terminal() {
            return Err(StoreError::InvalidTransition {
                id,
                from: record.status,
                to: RequestStatus::Error,
            });
        }
        record.status = RequestStatus::Error;
        Ok(())
    }

    async fn status_of(
        &self,
        id: i64,
        user_requester_id: Option<i64>,
    ) -> StoreResult<Option<RequestStatus>> {
        let state = self.state.lock().await;
        Ok(state
            .requests
            .get(&id)
            .filter(|record| visible_to(record, user_requester_id))
            .map(|record| record.status))
    }

    async fn fetch_record(
        &self,
        id: i64,
        user_requester_id: Option<i64>,
    ) -> StoreResult<Option<CalculationRecord>> {
        let state = self.state.lock().await;
        Ok(state
            .requests
            .get(&id)
            .filter(|record| visible_to(record, user_requester_id))
            .cloned())
    }
}
