//! 분석 작업 시작 API.
//!
//! 요청을 검증하고 작업 레코드를 만든 뒤 작업 실행기에 넘기고 즉시
//! `202 Accepted`와 작업 ID를 반환합니다. 결과는 `/api/v1/tasks/{id}`로 폴링합니다.

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use insight_analytics::{
    run_etf_analysis, run_market_scan, run_stock_analysis, EtfAnalysisRequest,
    MarketScanRequest, StockAnalysisRequest,
};
use insight_tasks::{JobContext, JobError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use tracing::info;
use utoipa::ToSchema;

use crate::error::{
    from_analysis_error, from_job_error, tasks_unavailable, ApiErrorResponse, ApiResult,
    INTERNAL_ERROR,
};
use crate::state::AppState;

/// 작업 접수 응답.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TaskAccepted {
    pub task_id: String,
}

type Accepted = (StatusCode, Json<TaskAccepted>);

/// 작업 레코드를 만들고 실행기에 작업 단위를 넘깁니다.
async fn launch<F, Fut>(
    state: &AppState,
    name: &str,
    params: Value,
    initial_progress: u8,
    work: F,
) -> ApiResult<Accepted>
where
    F: FnOnce(JobContext) -> Fut + Send + 'static,
    Fut: Future<Output = Result<Value, JobError>> + Send + 'static,
{
    if !state.registry.is_enabled() {
        return Err(tasks_unavailable());
    }

    let task = state.registry.create(name, params).await.ok_or_else(|| {
        ApiErrorResponse::new(INTERNAL_ERROR, "Failed to create task")
            .status(StatusCode::INTERNAL_SERVER_ERROR)
    })?;

    state
        .runner
        .spawn(&task.id, initial_progress, work)
        .await
        .map_err(from_job_error)?;

    info!(task_id = %task.id, name = %name, "Analysis task accepted");
    Ok((StatusCode::ACCEPTED, Json(TaskAccepted { task_id: task.id })))
}

/// 종목 분석 시작.
///
/// POST /api/v1/analysis/stock
pub async fn start_stock_analysis(
    State(state): State<Arc<AppState>>,
    Json(request): Json<StockAnalysisRequest>,
) -> ApiResult<Accepted> {
    let request = request.validate().map_err(from_analysis_error)?;
    let name = request.task_name();
    let params = request.params();
    let analyzer = state.analyzer.clone();

    launch(&state, &name, params, 10, move |ctx| {
        run_stock_analysis(ctx, analyzer, request)
    })
    .await
}

/// 시장 스캔 시작. 종목 수가 한도를 넘으면 잘라냅니다.
///
/// POST /api/v1/analysis/scan
pub async fn start_market_scan(
    State(state): State<Arc<AppState>>,
    Json(request): Json<MarketScanRequest>,
) -> ApiResult<Accepted> {
    let plan = request.into_plan(&state.scan).map_err(from_analysis_error)?;
    let params = plan.params();
    let analyzer = state.analyzer.clone();

    launch(&state, "Market Scan", params, 0, move |ctx| {
        run_market_scan(ctx, analyzer, plan)
    })
    .await
}

/// ETF 분석 시작.
///
/// POST /api/v1/analysis/etf
pub async fn start_etf_analysis(
    State(state): State<Arc<AppState>>,
    Json(request): Json<EtfAnalysisRequest>,
) -> ApiResult<Accepted> {
    let plan = request.into_plan().map_err(from_analysis_error)?;
    let name = plan.task_name();
    let params = plan.params();
    let analyzer = state.analyzer.clone();

    launch(&state, &name, params, 10, move |ctx| {
        run_etf_analysis(ctx, analyzer, plan)
    })
    .await
}

/// 분석 라우터 생성.
pub fn analysis_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/stock", post(start_stock_analysis))
        .route("/scan", post(start_market_scan))
        .route("/etf", post(start_etf_analysis))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::testing::send;
    use crate::state::{create_disabled_test_state, create_test_state};
    use axum::http::Method;
    use insight_core::TaskStatus;
    use serde_json::json;

    fn app(state: AppState) -> (Arc<AppState>, Router) {
        let state = Arc::new(state);
        let router = Router::new()
            .nest("/api/v1/analysis", analysis_router())
            .with_state(Arc::clone(&state));
        (state, router)
    }

    #[tokio::test]
    async fn test_start_stock_analysis_accepted() {
        let (state, router) = app(create_test_state().await);

        let (status, body) = send(
            &router,
            Method::POST,
            "/api/v1/analysis/stock",
            Some(json!({"stock_code": "600519", "market_type": "A"})),
        )
        .await;
        assert_eq!(status, StatusCode::ACCEPTED);

        let task_id = body["task_id"].as_str().unwrap();
        let task = state.registry.get(task_id).await.unwrap();
        assert_eq!(task.name, "Analysis for 600519");
        assert_eq!(task.params["market_type"], "A");
    }

    #[tokio::test]
    async fn test_start_stock_analysis_requires_code() {
        let (state, router) = app(create_test_state().await);

        let (status, body) =
            send(&router, Method::POST, "/api/v1/analysis/stock", Some(json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "INVALID_INPUT");
        assert!(state.registry.list_all().await.is_empty());
    }

    #[tokio::test]
    async fn test_market_scan_truncates_symbols() {
        let (state, router) = app(create_test_state().await);
        let symbols: Vec<String> = (0..120).map(|i| format!("{:06}", i)).collect();

        let (status, body) = send(
            &router,
            Method::POST,
            "/api/v1/analysis/scan",
            Some(json!({"stock_list": symbols})),
        )
        .await;
        assert_eq!(status, StatusCode::ACCEPTED);

        let task = state
            .registry
            .get(body["task_id"].as_str().unwrap())
            .await
            .unwrap();
        assert_eq!(task.name, "Market Scan");
        assert_eq!(task.params["stock_list_count"], 100);
        assert_eq!(task.params["min_score"], 60);
    }

    #[tokio::test]
    async fn test_market_scan_requires_symbols() {
        let (_state, router) = app(create_test_state().await);

        let (status, _) = send(
            &router,
            Method::POST,
            "/api/v1/analysis/scan",
            Some(json!({"stock_list": []})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_etf_analysis_period_validation() {
        let (state, router) = app(create_test_state().await);

        let (status, body) = send(
            &router,
            Method::POST,
            "/api/v1/analysis/etf",
            Some(json!({"etf_code": "510300"})),
        )
        .await;
        assert_eq!(status, StatusCode::ACCEPTED);
        let task = state
            .registry
            .get(body["task_id"].as_str().unwrap())
            .await
            .unwrap();
        assert_eq!(task.params["period"], "1y");

        let (status, body) = send(
            &router,
            Method::POST,
            "/api/v1/analysis/etf",
            Some(json!({"etf_code": "510300", "period": "10y"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "INVALID_INPUT");
    }

    #[tokio::test]
    async fn test_disabled_registry_returns_503() {
        let (_state, router) = app(create_disabled_test_state());

        let (status, body) = send(
            &router,
            Method::POST,
            "/api/v1/analysis/stock",
            Some(json!({"stock_code": "600519"})),
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["code"], "TASKS_UNAVAILABLE");
    }

    #[tokio::test]
    async fn test_full_runner_returns_429() {
        let (state, router) = app(create_test_state().await);

        // 모든 실행 슬롯을 취소될 때까지 대기하는 작업으로 채움
        for _ in 0..state.runner.capacity() {
            let task = state.registry.create("blocker", json!({})).await.unwrap();
            state
                .runner
                .spawn(&task.id, 0, |ctx| async move {
                    ctx.cancelled().await;
                    Err::<Value, JobError>(JobError::Cancelled)
                })
                .await
                .unwrap();
        }

        let (status, body) = send(
            &router,
            Method::POST,
            "/api/v1/analysis/stock",
            Some(json!({"stock_code": "600519"})),
        )
        .await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body["code"], "TOO_MANY_TASKS");

        let rejected = state
            .registry
            .list_by_status(TaskStatus::Failed)
            .await;
        assert_eq!(rejected.len(), 1);
        assert_eq!(rejected[0].name, "Analysis for 600519");
    }
}
