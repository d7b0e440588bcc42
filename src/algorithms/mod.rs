// 计算模型算法
// 每种模型类型对应一个 Algorithm 实现，由 AlgorithmRegistry 统一登记

mod bezier;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::models::{CalculationOutput, ModelKind};

pub use bezier::{BezierAlgorithm, BezierInputParams};

#[derive(Debug, thiserror::Error)]
pub enum AlgorithmError {
    #[error("invalid input parameters: {0}")]
    InvalidInput(String),
    #[error("calculation failed: {0}")]
    Execution(String),
    #[error("calculation task panicked: {0}")]
    Panicked(String),
}

/// 计算模型的统一接口
#[async_trait]
pub trait Algorithm: Send + Sync {
    /// 提交前校验输入参数，返回全部错误信息
    fn validate(&self, _input: &serde_json::Value) -> Vec<String> {
        Vec::new()
    }

    async fn calculate(
        &self,
        input: &serde_json::Value,
    ) -> Result<CalculationOutput, AlgorithmError>;
}

/// 模型类型到算法实现的映射
#[derive(Default, Clone)]
pub struct AlgorithmRegistry {
    algorithms: HashMap<ModelKind, Arc<dyn Algorithm>>,
}

impl AlgorithmRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 默认登记：目前只有 Bezier 有实现
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(ModelKind::Bezier, Arc::new(BezierAlgorithm));
        registry
    }

    pub fn register(&mut self, kind: ModelKind, algorithm: Arc<dyn Algorithm>) {
        if self.algorithms.insert(kind, algorithm).is_some() {
            tracing::warn!("Algorithm for {} replaced", kind.name());
        }
    }

    pub fn get(&self, kind: ModelKind) -> Option<Arc<dyn Algorithm>> {
        self.algorithms.get(&kind).cloned()
    }

    /// 按原始判别值解析；未知或未登记的模型返回 None
    pub fn resolve(&self, model_id: i32) -> Option<(ModelKind, Arc<dyn Algorithm>)> {
        let kind = ModelKind::try_from(model_id).ok()?;
        self.get(kind).map(|algorithm| (kind, algorithm))
    }
}
