// 计算请求调度
// 每个周期取出最早的 New 请求，执行对应模型算法并写回结果

mod worker;

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use crate::algorithms::{AlgorithmError, AlgorithmRegistry};
use crate::database::{CalculationStore, StoreError};
use crate::models::CalculationOutput;

pub use worker::{WorkerHandle, spawn_worker};

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("unknown model type {0}")]
    UnknownModelType(i32),
    #[error("input of calculation request {0} not found")]
    InputNotFound(i64),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Algorithm(#[from] AlgorithmError),
    #[error("calculation timed out after {0:?}")]
    Timeout(Duration),
}

/// 一个调度周期的结果
#[derive(Debug)]
pub enum CycleOutcome {
    /// 没有待处理的请求
    Idle,
    /// 请求已被其他调度器认领
    Contended(i64),
    /// 无法读取队列，本周期跳过
    Skipped(StoreError),
    Succeeded(i64),
    Failed { id: i64, error: DispatchError },
}

impl CycleOutcome {
    pub fn request_id(&self) -> Option<i64> {
        match self {
            CycleOutcome::Succeeded(id)
            | CycleOutcome::Contended(id)
            | CycleOutcome::Failed { id, .. } => Some(*id),
            CycleOutcome::Idle | CycleOutcome::Skipped(_) => None,
        }
    }
}

#[derive(Clone)]
pub struct CalculationDispatcher {
    store: Arc<dyn CalculationStore>,
    registry: Arc<AlgorithmRegistry>,
    algorithm_timeout: Duration,
}

impl CalculationDispatcher {
    pub fn new(
        store: Arc<dyn CalculationStore>,
        registry: Arc<AlgorithmRegistry>,
        algorithm_timeout: Duration,
    ) -> Self {
        Self {
            store,
            registry,
            algorithm_timeout,
        }
    }

    /// 推进一个请求；所有单请求错误都在这里消化，不向外传播
    pub async fn run_cycle(&self) -> CycleOutcome {
        let pending = match self.store.next_pending().await {
            Ok(Some(pending)) => pending,
            Ok(None) => return CycleOutcome::Idle,
            Err(e) => {
                error!("Failed to read pending calculation requests: {}", e);
                return CycleOutcome::Skipped(e);
            }
        };
        let id = pending.id;

        match self.store.try_claim(id).await {
            Ok(true) => {}
            Ok(false) => {
                warn!("Calculation request {} was claimed elsewhere", id);
                return CycleOutcome::Contended(id);
            }
            Err(e) => return self.fail(id, e.into()).await,
        }

        info!("Started calculation request {}", id);

        let output = match self.execute(id).await {
            Ok(output) => output,
            Err(e) => return self.fail(id, e).await,
        };

        match self.store.mark_succeeded(id, output).await {
            Ok(()) => {
                info!("Calculation request {} succeeded", id);
                CycleOutcome::Succeeded(id)
            }
            Err(e) => self.fail(id, e.into()).await,
        }
    }

    async fn execute(&self, id: i64) -> Result<CalculationOutput, DispatchError> {
        let input = self
            .store
            .fetch_input(id)
            .await?
            .ok_or(DispatchError::InputNotFound(id))?;

        let (kind, algorithm) = self
            .registry
            .resolve(input.model_id)
            .ok_or(DispatchError::UnknownModelType(input.model_id))?;

        info!(
            "Running {} for calculation request {}",
            kind.name(),
            input.id
        );

        // 算法在独立任务中运行，panic 只会让这个请求失败
        let params = input.input_params;
        let mut task = tokio::spawn(async move { algorithm.calculate(&params).await });

        match tokio::time::timeout(self.algorithm_timeout, &mut task).await {
            Ok(Ok(result)) => Ok(result?),
            Ok(Err(e)) => Err(AlgorithmError::Panicked(e.to_string()).into()),
            Err(_) => {
                task.abort();
                Err(DispatchError::Timeout(self.algorithm_timeout))
            }
        }
    }

    async fn fail(&self, id: i64, error: DispatchError) -> CycleOutcome {
        error!("CalculationRequestId: {}. {}", id, error);
        if let Err(e) = self.store.mark_failed(id).await {
            error!("Failed to mark calculation request {} as failed: {}", id, e);
        }
        CycleOutcome::Failed { id, error }
    }
}
