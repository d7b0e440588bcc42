// 数据库模块
// 包含计算请求实体、存储接口及其 PostgreSQL / 内存实现

pub mod memory;
pub mod models;
pub mod operations;
pub mod store;

use sqlx::PgPool;

pub use memory::InMemoryCalculationStore;
pub use models::calculation::CalculationRequestEntity;
pub use operations::calculation::CalculationOperation;
pub use store::{CalculationStore, StoreError, StoreResult};

/// 执行 migrations 目录下的数据库迁移
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
