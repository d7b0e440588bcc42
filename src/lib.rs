use std::sync::Arc;

use algorithms::AlgorithmRegistry;
use config::Config;
use database::CalculationStore;
use rate_limit::{RateLimitRule, SlidingWindowLimiter};

pub mod algorithms;
pub mod config;
pub mod database;
pub mod dispatcher;
pub mod error;
pub mod middleware;
pub mod models;
pub mod rate_limit;
pub mod result;
pub mod router;
pub mod routes;
pub mod utils;

/// 进程级共享对象，启动时创建一次，按句柄传给请求处理和后台 worker
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn CalculationStore>,
    pub registry: Arc<AlgorithmRegistry>,
    pub rate_limiter: Arc<SlidingWindowLimiter>,
    pub config: Config,
}

impl AppState {
    pub fn new(
        store: Arc<dyn CalculationStore>,
        registry: AlgorithmRegistry,
        config: Config,
    ) -> Self {
        let rule = RateLimitRule {
            limit: config.rate_limit_requests,
            period: config.rate_limit_window(),
        };
        let rate_limiter =
            SlidingWindowLimiter::new(rule).with_max_keys(config.rate_limit_max_keys);

        Self {
            store,
            registry: Arc::new(registry),
            rate_limiter: Arc::new(rate_limiter),
            config,
        }
    }

    pub fn dispatcher(&self) -> dispatcher::CalculationDispatcher {
        dispatcher::CalculationDispatcher::new(
            self.store.clone(),
            self.registry.clone(),
            self.config.algorithm_timeout(),
        )
    }
}
