use axum::{
    Router,
    routing::{get, post},
};

use crate::{
    AppState,
    middleware::{log_errors, rate_limit},
    routes,
};

// 计算实验相关的路由
fn experiment_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/computational-experiments",
            post(routes::experiment::request_calculation),
        )
        .route(
            "/computational-experiments/statuses",
            get(routes::experiment::get_statuses),
        )
        .route(
            "/computational-experiments/{id}/status",
            get(routes::experiment::get_status),
        )
        .route(
            "/computational-experiments/{id}/ready",
            get(routes::experiment::is_result_ready),
        )
        .route(
            "/computational-experiments/{id}/result",
            get(routes::experiment::get_result),
        )
}

// 创建主路由：限流在日志之内、业务处理之前执行
pub fn create_router(state: AppState) -> Router {
    let base = state.config.api_base_uri.trim_end_matches('/');
    let router = Router::new().route("/health", get(routes::health));
    let router = if base.is_empty() {
        router.merge(experiment_routes())
    } else {
        router.nest(base, experiment_routes())
    };

    router
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            rate_limit,
        ))
        .layer(axum::middleware::from_fn(log_errors))
        .with_state(state)
}
