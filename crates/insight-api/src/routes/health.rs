//! `/health` endpoint.
//!
//! `/health`는 프로세스 생존 여부만, `/health/ready`는 작업 저장소와
//! 실행기 상태까지 확인합니다.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::state::AppState;

/// 컴포넌트 상태 값.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ComponentState {
    Up,
    Down,
    NotConfigured,
}

/// 단일 컴포넌트 점검 결과.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ComponentStatus {
    pub status: ComponentState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ComponentStatus {
    fn new(status: ComponentState, detail: Option<String>) -> Self {
        Self { status, detail }
    }

    pub fn up(detail: impl Into<String>) -> Self {
        Self::new(ComponentState::Up, Some(detail.into()))
    }

    pub fn down(detail: impl Into<String>) -> Self {
        Self::new(ComponentState::Down, Some(detail.into()))
    }

    pub fn not_configured() -> Self {
        Self::new(ComponentState::NotConfigured, None)
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ComponentHealth {
    pub task_store: ComponentStatus,
    pub job_runner: ComponentStatus,
    pub llm: ComponentStatus,
}

/// `/health/ready` 응답.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// `healthy` 또는 `degraded`
    pub status: String,
    pub version: String,
    pub uptime_secs: i64,
    /// RFC 3339
    pub timestamp: String,
    pub components: ComponentHealth,
}

impl HealthResponse {
    fn is_healthy(components: &ComponentHealth) -> bool {
        components.task_store.status == ComponentState::Up
    }
}

/// Liveness 확인.
pub async fn health_check() -> (StatusCode, &'static str) {
    (StatusCode::OK, "OK")
}

/// Readiness 확인.
///
/// 저장소가 설정되어 있지만 응답이 없으면 503. 저장소가 아예 없으면
/// 분석 endpoint만 막힌 상태이므로 200과 `degraded`를 반환합니다.
pub async fn health_ready(
    State(state): State<Arc<AppState>>,
) -> (StatusCode, Json<HealthResponse>) {
    let task_store = match state.registry.backend() {
        None => ComponentStatus::not_configured(),
        Some(backend) if state.registry.health_check().await => ComponentStatus::up(backend),
        Some(backend) => ComponentStatus::down(format!("{} 연결 실패", backend)),
    };
    let code = if task_store.status == ComponentState::Down {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };

    let components = ComponentHealth {
        task_store,
        job_runner: ComponentStatus::up(format!(
            "{}/{} running",
            state.runner.in_flight(),
            state.runner.capacity()
        )),
        llm: if state.has_llm() {
            ComponentStatus::up("summaries enabled")
        } else {
            ComponentStatus::not_configured()
        },
    };

    let status = if HealthResponse::is_healthy(&components) {
        "healthy"
    } else {
        "degraded"
    };

    (
        code,
        Json(HealthResponse {
            status: status.to_string(),
            version: state.version.clone(),
            uptime_secs: state.uptime_secs(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            components,
        }),
    )
}

pub fn health_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(health_check))
        .route("/ready", get(health_ready))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::testing::send;
    use crate::state::{create_disabled_test_state, create_test_state};
    use axum::http::Method;

    fn app(state: AppState) -> Router {
        Router::new()
            .nest("/health", health_router())
            .with_state(Arc::new(state))
    }

    #[tokio::test]
    async fn liveness_is_plain_ok() {
        let (status, body) = send(&app(create_test_state().await), Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.is_null());
    }

    #[tokio::test]
    async fn ready_reports_memory_backend() {
        let router = app(create_test_state().await);
        let (status, body) = send(&router, Method::GET, "/health/ready", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["components"]["task_store"]["status"], "up");
        assert_eq!(body["components"]["task_store"]["detail"], "memory");
        assert_eq!(body["components"]["job_runner"]["detail"], "0/4 running");
        assert_eq!(body["components"]["llm"]["status"], "not_configured");
        assert!(body["components"]["llm"].get("detail").is_none());
    }

    #[tokio::test]
    async fn ready_without_store_is_degraded_but_serving() {
        let router = app(create_disabled_test_state());
        let (status, body) = send(&router, Method::GET, "/health/ready", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "degraded");
        assert_eq!(body["components"]["task_store"]["status"], "not_configured");
    }

    #[test]
    fn component_state_serializes_snake_case() {
        let json = serde_json::to_value(ComponentStatus::not_configured()).unwrap();
        assert_eq!(json, serde_json::json!({ "status": "not_configured" }));

        let down = ComponentStatus::down("timeout");
        assert_eq!(down.status, ComponentState::Down);
        assert_eq!(down.detail.as_deref(), Some("timeout"));
    }
}
