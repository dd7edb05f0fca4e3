//! OpenAPI 문서화 설정.
//!
//! 응답/요청 타입의 스키마를 중앙 `ApiDoc`에서 모읍니다.
//! 새 응답 타입을 추가하면 `components(schemas(...))`에도 등록하세요.

use utoipa::OpenApi;

use crate::error::ApiErrorResponse;
use crate::routes::{
    ActiveTaskSummary, ActiveTasksResponse, BulkDeleteRequest, BulkDeleteResponse,
    ComponentHealth, ComponentState, ComponentStatus, HealthResponse, TaskAccepted, TaskActionResponse,
    TaskHistoryResponse,
};
use insight_core::{Task, TaskStatus};

/// Market Insight API 문서.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Market Insight API",
        description = "종목/시장 스캔/ETF 분석을 비동기 작업으로 실행하고 작업 상태를 폴링하는 REST API"
    ),
    components(schemas(
        Task,
        TaskStatus,
        ApiErrorResponse,
        HealthResponse,
        ComponentHealth,
        ComponentState,
        ComponentStatus,
        TaskAccepted,
        ActiveTaskSummary,
        ActiveTasksResponse,
        TaskHistoryResponse,
        TaskActionResponse,
        BulkDeleteRequest,
        BulkDeleteResponse,
    )),
    tags(
        (name = "tasks", description = "작업 조회/취소/삭제"),
        (name = "analysis", description = "분석 작업 시작"),
        (name = "health", description = "헬스 체크")
    )
)]
pub struct ApiDoc;

/// OpenAPI 스펙 JSON.
pub fn openapi_json() -> Result<String, serde_json::Error> {
    ApiDoc::openapi().to_pretty_json()
}
