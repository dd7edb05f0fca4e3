//! 작업 조회/취소/삭제 API.
//!
//! 분석 시작 엔드포인트가 돌려준 작업 ID로 진행 상황을 폴링하고,
//! 실행 중인 작업을 취소하거나 기록을 정리합니다.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use insight_core::{Task, TaskStatus};
use insight_tasks::CancelOutcome;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use utoipa::ToSchema;

use crate::error::{
    invalid_input, task_not_found, tasks_unavailable, ApiErrorResponse, ApiResult, TASK_FINISHED,
};
use crate::state::AppState;

/// 진행 단계가 아직 보고되지 않은 작업의 표시 문구.
const STEP_PLACEHOLDER: &str = "loading";

// ============================================================================
// Types
// ============================================================================

/// 실행 중 작업 요약.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ActiveTaskSummary {
    pub task_id: String,
    pub name: String,
    /// 분석 대상 코드 (종목 또는 ETF, 스캔은 빈 문자열)
    pub stock_code: String,
    pub progress: u8,
    pub current_step: String,
}

impl From<&Task> for ActiveTaskSummary {
    fn from(task: &Task) -> Self {
        let stock_code = task
            .param_str("stock_code")
            .or_else(|| task.param_str("etf_code"))
            .unwrap_or_default()
            .to_string();
        Self {
            task_id: task.id.clone(),
            name: task.name.clone(),
            stock_code,
            progress: task.progress,
            current_step: task.current_step().unwrap_or(STEP_PLACEHOLDER).to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ActiveTasksResponse {
    pub active_tasks: Vec<ActiveTaskSummary>,
}

#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    /// 최대 반환 개수
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TaskHistoryResponse {
    pub tasks: Vec<Task>,
    pub total: usize,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TaskActionResponse {
    pub task_id: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct BulkDeleteRequest {
    #[serde(default)]
    pub task_ids: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct BulkDeleteResponse {
    pub deleted: Vec<String>,
    pub not_found: Vec<String>,
}

fn ensure_enabled(state: &AppState) -> ApiResult<()> {
    if state.registry.is_enabled() {
        Ok(())
    } else {
        Err(tasks_unavailable())
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// 전체 작업 목록 (최신순).
///
/// GET /api/v1/tasks
pub async fn list_tasks(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<Task>>> {
    ensure_enabled(&state)?;
    Ok(Json(state.registry.list_all().await))
}

/// 실행 중인 작업 요약.
///
/// GET /api/v1/tasks/active
pub async fn active_tasks(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<ActiveTasksResponse>> {
    ensure_enabled(&state)?;
    let running = state.registry.list_by_status(TaskStatus::Running).await;
    Ok(Json(ActiveTasksResponse {
        active_tasks: running.iter().map(ActiveTaskSummary::from).collect(),
    }))
}

/// 종료된 작업 기록 (최근 변경순).
///
/// GET /api/v1/tasks/history
pub async fn task_history(
    State(state): State<Arc<AppState>>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<Json<TaskHistoryResponse>> {
    ensure_enabled(&state)?;
    let mut tasks: Vec<Task> = state
        .registry
        .list_all()
        .await
        .into_iter()
        .filter(Task::is_terminal)
        .collect();
    tasks.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));

    let total = tasks.len();
    if let Some(limit) = query.limit {
        tasks.truncate(limit);
    }
    Ok(Json(TaskHistoryResponse { tasks, total }))
}

/// 단일 작업 조회.
///
/// GET /api/v1/tasks/{id}
pub async fn get_task(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<String>,
) -> ApiResult<Json<Task>> {
    ensure_enabled(&state)?;
    state
        .registry
        .get(&task_id)
        .await
        .map(Json)
        .ok_or_else(|| task_not_found(&task_id))
}

/// 작업 삭제. 이 프로세스에서 실행 중이면 먼저 취소 신호를 보냅니다.
///
/// DELETE /api/v1/tasks/{id}
pub async fn delete_task(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<String>,
) -> ApiResult<Json<TaskActionResponse>> {
    ensure_enabled(&state)?;
    if state.runner.is_running(&task_id).await {
        state.runner.cancel(&task_id).await;
    }

    if !state.registry.delete(&task_id).await {
        return Err(task_not_found(&task_id));
    }

    info!(task_id = %task_id, "Task deleted via API");
    Ok(Json(TaskActionResponse {
        task_id,
        message: "Task deleted successfully".to_string(),
        status: None,
    }))
}

/// 작업 취소.
///
/// 작업 단위는 다음 확인 지점에서 멈춥니다. 이미 종료된 작업은 409.
/// POST /api/v1/tasks/{id}/cancel
pub async fn cancel_task(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<String>,
) -> ApiResult<Json<TaskActionResponse>> {
    ensure_enabled(&state)?;
    match state.runner.cancel(&task_id).await {
        CancelOutcome::Cancelled(task) => Ok(Json(TaskActionResponse {
            task_id,
            message: "Task cancelled".to_string(),
            status: Some(task.status),
        })),
        CancelOutcome::AlreadyFinished(status) => Err(ApiErrorResponse::with_details(
            TASK_FINISHED,
            format!("Task {} already finished and cannot be cancelled", task_id),
            serde_json::json!({ "status": status }),
        )
        .status(StatusCode::CONFLICT)),
        CancelOutcome::NotFound => Err(task_not_found(&task_id)),
    }
}

/// 여러 작업 일괄 삭제. 진행 중인 작업은 취소 후 삭제합니다.
///
/// POST /api/v1/tasks/delete
pub async fn bulk_delete(
    State(state): State<Arc<AppState>>,
    Json(request): Json<BulkDeleteRequest>,
) -> ApiResult<Json<BulkDeleteResponse>> {
    ensure_enabled(&state)?;
    if request.task_ids.is_empty() {
        return Err(invalid_input("task_ids is required"));
    }

    let mut deleted = Vec::new();
    let mut not_found = Vec::new();

    for task_id in request.task_ids {
        if let Some(task) = state.registry.get(&task_id).await {
            if !task.is_terminal() {
                state.runner.cancel(&task_id).await;
            }
        }

        if state.registry.delete(&task_id).await {
            deleted.push(task_id);
        } else {
            not_found.push(task_id);
        }
    }

    info!(
        deleted = deleted.len(),
        not_found = not_found.len(),
        "Bulk task delete"
    );
    Ok(Json(BulkDeleteResponse { deleted, not_found }))
}

/// 작업 라우터 생성.
pub fn tasks_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_tasks))
        .route("/active", get(active_tasks))
        .route("/history", get(task_history))
        .route("/delete", post(bulk_delete))
        .route("/{id}", get(get_task).delete(delete_task))
        .route("/{id}/cancel", post(cancel_task))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::testing::send;
    use crate::state::{create_disabled_test_state, create_test_state};
    use axum::http::Method;
    use insight_core::TaskUpdate;
    use serde_json::{json, Value};

    fn app(state: AppState) -> (Arc<AppState>, Router) {
        let state = Arc::new(state);
        let router = Router::new()
            .nest("/api/v1/tasks", tasks_router())
            .with_state(Arc::clone(&state));
        (state, router)
    }

    #[tokio::test]
    async fn test_get_task_and_not_found() {
        let (state, router) = app(create_test_state().await);
        let task = state
            .registry
            .create("Analysis for 600519", json!({"stock_code": "600519"}))
            .await
            .unwrap();

        let (status, body) =
            send(&router, Method::GET, &format!("/api/v1/tasks/{}", task.id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["id"], task.id);
        assert_eq!(body["status"], "pending");
        assert_eq!(body["params"]["stock_code"], "600519");

        let (status, body) = send(&router, Method::GET, "/api/v1/tasks/nope", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "TASK_NOT_FOUND");
    }

    #[tokio::test]
    async fn test_list_tasks_newest_first() {
        let (state, router) = app(create_test_state().await);
        let first = state.registry.create("first", json!({})).await.unwrap();
        let second = state.registry.create("second", json!({})).await.unwrap();

        let (status, body) = send(&router, Method::GET, "/api/v1/tasks", None).await;
        assert_eq!(status, StatusCode::OK);
        let ids: Vec<&str> = body
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["id"].as_str().unwrap())
            .collect();
        assert_eq!(ids, vec![second.id.as_str(), first.id.as_str()]);
    }

    #[tokio::test]
    async fn test_active_tasks_summary() {
        let (state, router) = app(create_test_state().await);
        let running = state
            .registry
            .create("Analysis for 600519", json!({"stock_code": "600519"}))
            .await
            .unwrap();
        state.registry.create("idle", json!({})).await.unwrap();
        state
            .registry
            .update(
                &running.id,
                TaskUpdate::running(40).result(json!({"current_step": "computing indicators"})),
            )
            .await
            .unwrap();

        let (status, body) = send(&router, Method::GET, "/api/v1/tasks/active", None).await;
        assert_eq!(status, StatusCode::OK);
        let active = body["active_tasks"].as_array().unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0]["task_id"], running.id);
        assert_eq!(active[0]["stock_code"], "600519");
        assert_eq!(active[0]["progress"], 40);
        assert_eq!(active[0]["current_step"], "computing indicators");
    }

    #[tokio::test]
    async fn test_history_sorted_by_updated_at() {
        let (state, router) = app(create_test_state().await);
        let a = state.registry.create("a", json!({})).await.unwrap();
        let b = state.registry.create("b", json!({})).await.unwrap();
        state.registry.create("still pending", json!({})).await.unwrap();

        state.registry.update(&b.id, TaskUpdate::running(0)).await.unwrap();
        state
            .registry
            .update(&b.id, TaskUpdate::completed(json!({"ok": true})))
            .await
            .unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        state.registry.cancel(&a.id).await;

        let (status, body) = send(&router, Method::GET, "/api/v1/tasks/history", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 2);
        let tasks = body["tasks"].as_array().unwrap();
        assert_eq!(tasks[0]["id"], a.id);
        assert_eq!(tasks[0]["status"], "cancelled");
        assert_eq!(tasks[1]["id"], b.id);

        let (_, body) =
            send(&router, Method::GET, "/api/v1/tasks/history?limit=1", None).await;
        assert_eq!(body["tasks"].as_array().unwrap().len(), 1);
        assert_eq!(body["total"], 2);
    }

    #[tokio::test]
    async fn test_cancel_task_then_conflict() {
        let (state, router) = app(create_test_state().await);
        let task = state.registry.create("scan", json!({})).await.unwrap();
        let uri = format!("/api/v1/tasks/{}/cancel", task.id);

        let (status, body) = send(&router, Method::POST, &uri, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "cancelled");

        let (status, body) = send(&router, Method::POST, &uri, None).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "TASK_ALREADY_FINISHED");
        assert_eq!(body["details"]["status"], "cancelled");

        let (status, _) = send(&router, Method::POST, "/api/v1/tasks/nope/cancel", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_delete_task_is_idempotent_404() {
        let (state, router) = app(create_test_state().await);
        let task = state.registry.create("x", json!({})).await.unwrap();
        let uri = format!("/api/v1/tasks/{}", task.id);

        let (status, body) = send(&router, Method::DELETE, &uri, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["task_id"], task.id);

        let (status, _) = send(&router, Method::DELETE, &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(state.registry.get(&task.id).await.is_none());
    }

    #[tokio::test]
    async fn test_bulk_delete() {
        let (state, router) = app(create_test_state().await);
        let pending = state.registry.create("p", json!({})).await.unwrap();
        let done = state.registry.create("d", json!({})).await.unwrap();
        state.registry.update(&done.id, TaskUpdate::failed("boom")).await.unwrap();

        let (status, body) = send(
            &router,
            Method::POST,
            "/api/v1/tasks/delete",
            Some(json!({"task_ids": [pending.id, done.id, "ghost"]})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["deleted"].as_array().unwrap().len(), 2);
        assert_eq!(body["not_found"], json!(["ghost"]));
        assert!(state.registry.list_all().await.is_empty());

        let (status, body) = send(
            &router,
            Method::POST,
            "/api/v1/tasks/delete",
            Some(json!({"task_ids": []})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "INVALID_INPUT");
    }

    #[tokio::test]
    async fn test_disabled_registry_returns_503() {
        let (_state, router) = app(create_disabled_test_state());

        for uri in ["/api/v1/tasks", "/api/v1/tasks/active", "/api/v1/tasks/abc"] {
            let (status, body): (StatusCode, Value) = send(&router, Method::GET, uri, None).await;
            assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE, "{}", uri);
            assert_eq!(body["code"], "TASKS_UNAVAILABLE");
        }
    }
}
