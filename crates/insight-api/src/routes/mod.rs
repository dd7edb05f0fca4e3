//! API 라우트.
//!
//! # 라우트 구조
//!
//! - `/health` - 헬스 체크 (liveness)
//! - `/health/ready` - 상세 헬스 체크 (readiness)
//! - `/api/v1/tasks` - 작업 조회/취소/삭제
//! - `/api/v1/analysis` - 종목/시장 스캔/ETF 분석 시작

pub mod analysis;
pub mod health;
pub mod tasks;

pub use analysis::{analysis_router, TaskAccepted};
pub use health::{
    health_router, ComponentHealth, ComponentState, ComponentStatus, HealthResponse,
};
pub use tasks::{
    tasks_router, ActiveTaskSummary, ActiveTasksResponse, BulkDeleteRequest, BulkDeleteResponse,
    TaskActionResponse, TaskHistoryResponse,
};

use axum::Router;
use std::sync::Arc;

use crate::state::AppState;

/// 전체 API 라우터 생성.
pub fn create_api_router() -> Router<Arc<AppState>> {
    Router::new()
        .nest("/health", health_router())
        .nest("/api/v1/tasks", tasks_router())
        .nest("/api/v1/analysis", analysis_router())
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::create_test_state;
    use axum::http::{Method, StatusCode};

    #[tokio::test]
    async fn test_full_router_polling_flow() {
        let state = Arc::new(create_test_state().await);
        let router = create_api_router().with_state(Arc::clone(&state));

        let (status, body) = testing::send(&router, Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, serde_json::Value::Null);

        let (status, body) = testing::send(
            &router,
            Method::POST,
            "/api/v1/analysis/stock",
            Some(serde_json::json!({"stock_code": "UNKNOWN"})),
        )
        .await;
        assert_eq!(status, StatusCode::ACCEPTED);
        let task_id = body["task_id"].as_str().unwrap().to_string();

        // 데이터가 없는 종목이므로 작업은 실패로 끝남
        let mut last = serde_json::Value::Null;
        for _ in 0..50 {
            let (_, task) =
                testing::send(&router, Method::GET, &format!("/api/v1/tasks/{}", task_id), None)
                    .await;
            if task["status"] == "failed" {
                last = task;
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert_eq!(last["status"], "failed");
        assert!(last["error"].as_str().unwrap().contains("UNKNOWN"));
    }
}
