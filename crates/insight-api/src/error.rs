//! 통합 API 에러 응답 타입.
//!
//! 모든 엔드포인트가 같은 JSON 형식으로 에러를 반환합니다.

use axum::{http::StatusCode, Json};
use insight_analytics::AnalysisError;
use insight_tasks::JobError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

/// 입력 검증 실패
pub const INVALID_INPUT: &str = "INVALID_INPUT";
/// 작업 없음
pub const TASK_NOT_FOUND: &str = "TASK_NOT_FOUND";
/// 이미 종료된 작업
pub const TASK_FINISHED: &str = "TASK_ALREADY_FINISHED";
/// 작업 저장소 비활성
pub const TASKS_UNAVAILABLE: &str = "TASKS_UNAVAILABLE";
/// 실행 중 작업 한도 초과
pub const TOO_MANY_TASKS: &str = "TOO_MANY_TASKS";
/// 내부 오류
pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";

/// 통합 API 에러 응답.
///
/// ```json
/// {
///   "code": "TASK_NOT_FOUND",
///   "message": "Task not found: 3f1c...",
///   "timestamp": 1738300800
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiErrorResponse {
    /// 에러 코드 (예: "INVALID_INPUT", "TASK_NOT_FOUND")
    pub code: String,
    /// 사람이 읽을 수 있는 에러 메시지
    pub message: String,
    /// 추가 에러 상세 정보 (선택적)
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Object)]
    pub details: Option<Value>,
    /// 에러 발생 타임스탬프 (Unix timestamp, 선택적)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
}

impl ApiErrorResponse {
    /// 타임스탬프를 포함한 에러를 생성합니다.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
            timestamp: Some(chrono::Utc::now().timestamp()),
        }
    }

    /// 상세 정보 포함 에러 생성.
    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: Value,
    ) -> Self {
        Self {
            details: Some(details),
            ..Self::new(code, message)
        }
    }

    /// HTTP 상태 코드와 묶어 핸들러 에러로 변환합니다.
    pub fn status(self, status: StatusCode) -> ApiError {
        (status, Json(self))
    }
}

impl std::fmt::Display for ApiErrorResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for ApiErrorResponse {}

/// 핸들러 에러 (상태 코드 + 본문).
pub type ApiError = (StatusCode, Json<ApiErrorResponse>);

/// API 핸들러 Result 타입 별칭.
pub type ApiResult<T> = Result<T, ApiError>;

pub fn invalid_input(message: impl Into<String>) -> ApiError {
    ApiErrorResponse::new(INVALID_INPUT, message).status(StatusCode::BAD_REQUEST)
}

pub fn task_not_found(task_id: &str) -> ApiError {
    ApiErrorResponse::new(TASK_NOT_FOUND, format!("Task not found: {}", task_id))
        .status(StatusCode::NOT_FOUND)
}

pub fn tasks_unavailable() -> ApiError {
    ApiErrorResponse::new(TASKS_UNAVAILABLE, "Task store is not available")
        .status(StatusCode::SERVICE_UNAVAILABLE)
}

/// 작업 실행기 에러를 HTTP 응답으로 변환합니다.
pub fn from_job_error(err: JobError) -> ApiError {
    match err {
        JobError::TooManyInFlight(limit) => ApiErrorResponse::with_details(
            TOO_MANY_TASKS,
            err.to_string(),
            serde_json::json!({ "limit": limit }),
        )
        .status(StatusCode::TOO_MANY_REQUESTS),
        JobError::RegistryUnavailable => tasks_unavailable(),
        other => ApiErrorResponse::new(INTERNAL_ERROR, other.to_string())
            .status(StatusCode::INTERNAL_SERVER_ERROR),
    }
}

/// 분석 요청 검증 에러를 HTTP 응답으로 변환합니다.
pub fn from_analysis_error(err: AnalysisError) -> ApiError {
    match err {
        AnalysisError::InvalidInput(message) => invalid_input(message),
        other => ApiErrorResponse::new(INTERNAL_ERROR, other.to_string())
            .status(StatusCode::INTERNAL_SERVER_ERROR),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_response_new() {
        let error = ApiErrorResponse::new("TEST_ERROR", "Test message");
        assert_eq!(error.code, "TEST_ERROR");
        assert_eq!(error.message, "Test message");
        assert!(error.timestamp.is_some());
        assert!(error.details.is_none());
        assert_eq!(error.to_string(), "[TEST_ERROR] Test message");
    }

    #[test]
    fn test_details_skipped_when_absent() {
        let json = serde_json::to_string(&ApiErrorResponse::new(TASK_NOT_FOUND, "x")).unwrap();
        assert!(!json.contains("details"));
        assert!(json.contains(r#""code":"TASK_NOT_FOUND""#));
    }

    #[test]
    fn test_job_error_mapping() {
        let (status, Json(body)) = from_job_error(JobError::TooManyInFlight(4));
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body.code, TOO_MANY_TASKS);
        assert_eq!(body.details.unwrap()["limit"], 4);

        let (status, Json(body)) = from_job_error(JobError::RegistryUnavailable);
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body.code, TASKS_UNAVAILABLE);

        let (status, _) = from_job_error(JobError::failed("boom"));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_analysis_error_mapping() {
        let (status, Json(body)) =
            from_analysis_error(AnalysisError::InvalidInput("stock_code is required".into()));
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.code, INVALID_INPUT);
        assert_eq!(body.message, "stock_code is required");
    }
}
