pub mod experiment;

/// 存活检查
pub async fn health() -> &'static str {
    "ok"
}
