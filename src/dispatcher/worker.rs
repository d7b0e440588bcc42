use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::{CalculationDispatcher, CycleOutcome};

/// 后台计算 worker 的句柄，用于优雅停止
pub struct WorkerHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl WorkerHandle {
    /// 发出停止信号并等待当前周期完成
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.task.await {
            tracing::error!("Calculation worker terminated abnormally: {}", e);
        }
    }
}

/// 启动定时调度循环：每个周期结束后等待 interval，周期之间不重叠
pub fn spawn_worker(dispatcher: CalculationDispatcher, interval: Duration) -> WorkerHandle {
    let (shutdown, mut stopping) = watch::channel(false);

    let task = tokio::spawn(async move {
        info!("Calculation worker is starting");

        loop {
            if *stopping.borrow() {
                break;
            }

            match dispatcher.run_cycle().await {
                CycleOutcome::Idle => debug!("No pending calculation requests"),
                outcome => debug!("Calculation cycle finished: {:?}", outcome),
            }

            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = stopping.changed() => break,
            }
        }

        info!("Calculation worker is stopping");
    });

    WorkerHandle { shutdown, task }
}
