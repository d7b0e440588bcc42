use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{Algorithm, AlgorithmError};
use crate::models::CalculationOutput;

/// Bezier 模型的占位结果（孔隙率），真实模型接入前固定返回
const PLACEHOLDER_POROSITY: f64 = 1.0;

/// Bezier 模型输入参数，Z 为空表示二维
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BezierInputParams {
    pub x: i32,
    pub y: i32,
    #[serde(default)]
    pub z: Option<i32>,
    #[serde(default)]
    pub fibre_diameter: i32,
    #[serde(default)]
    pub desired_porosity: f32,
}

impl BezierInputParams {
    pub fn is_3d(&self) -> bool {
        self.z.is_some()
    }

    fn errors(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.x < 0 {
            errors.push("X 不能小于 0".to_string());
        }
        if self.y < 0 {
            errors.push("Y 不能小于 0".to_string());
        }
        if self.z.is_some_and(|z| z < 0) {
            errors.push("Z 不能小于 0".to_string());
        }
        if self.fibre_diameter < 0 {
            errors.push("FibreDiameter 不能小于 0".to_string());
        }
        if self.desired_porosity < 0.0 {
            errors.push("DesiredPorosity 不能小于 0".to_string());
        }
        errors
    }
}

// TODO: 接入真实的 Bezier 纤维结构生成模型后替换占位结果
fn porosity(_params: &BezierInputParams) -> f64 {
    PLACEHOLDER_POROSITY
}

pub struct BezierAlgorithm;

#[async_trait]
impl Algorithm for BezierAlgorithm {
    fn validate(&self, input: &serde_json::Value) -> Vec<String> {
        match serde_json::from_value::<BezierInputParams>(input.clone()) {
            Ok(params) => params.errors(),
            Err(e) => vec![format!("输入参数格式无效: {}", e)],
        }
    }

    async fn calculate(
        &self,
        input: &serde_json::Value,
    ) -> Result<CalculationOutput, AlgorithmError> {
        let params = serde_json::from_value::<BezierInputParams>(input.clone())
            .map_err(|e| AlgorithmError::InvalidInput(e.to_string()))?;

        tracing::debug!(
            "Bezier calculation for {}D field {}x{}",
            if params.is_3d() { 3 } else { 2 },
            params.x,
            params.y
        );

        // CPU 密集型计算放到阻塞线程池
        let value = tokio::task::spawn_blocking(move || porosity(&params))
            .await
            .map_err(|e| AlgorithmError::Panicked(e.to_string()))?;

        Ok(CalculationOutput::value(value))
    }
}
