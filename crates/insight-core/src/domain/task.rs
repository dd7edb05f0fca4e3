//! 비동기 작업(Task) 레코드.
//!
//! 오래 걸리는 분석 요청은 HTTP 요청/응답 주기와 분리되어 백그라운드에서 실행되고,
//! 클라이언트는 작업 ID로 상태를 폴링합니다. 이 모듈은 그 작업 레코드와
//! 상태 전이 규칙을 정의합니다.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// 작업 상태.
///
/// ```text
/// Pending ──▶ Running ──▶ Completed
///    │           │
///    │           ├──────▶ Failed
///    └───────────┴──────▶ Cancelled
/// ```
///
/// Pending/Running 상태는 정리 작업(sweep)에 의해 Failed로 바뀔 수 있습니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa-support", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl TaskStatus {
    /// 저장소에 기록되는 문자열 표현.
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::Cancelled => "cancelled",
        }
    }

    /// 종료 상태 여부 (Completed, Failed, Cancelled).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled
        )
    }

    /// 상태 전이 허용 여부.
    ///
    /// 같은 상태로의 "전이"는 진행률 갱신으로 간주되어 비종료 상태에서만 허용됩니다.
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        use TaskStatus::*;
        match (self, next) {
            (Pending, Pending | Running | Failed | Cancelled) => true,
            (Running, Running | Completed | Failed | Cancelled) => true,
            _ => false,
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(TaskStatus::Pending),
            "running" => Ok(TaskStatus::Running),
            "completed" => Ok(TaskStatus::Completed),
            "failed" => Ok(TaskStatus::Failed),
            "cancelled" | "canceled" => Ok(TaskStatus::Cancelled),
            _ => Err(format!("Unknown task status: {}", s)),
        }
    }
}

/// 작업 레코드.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa-support", derive(utoipa::ToSchema))]
pub struct Task {
    /// 작업 ID (UUID v4)
    pub id: String,
    /// 사람이 읽을 수 있는 작업 이름
    pub name: String,
    /// 현재 상태
    pub status: TaskStatus,
    /// 진행률 (0-100)
    pub progress: u8,
    /// 생성 시 전달된 입력 파라미터
    #[cfg_attr(feature = "utoipa-support", schema(value_type = Object))]
    pub params: Value,
    /// 작업 결과 (진행 중에는 현재 단계 정보가 들어갈 수 있음)
    #[cfg_attr(feature = "utoipa-support", schema(value_type = Object))]
    pub result: Option<Value>,
    /// 실패 사유
    pub error: Option<String>,
    /// 생성 시각
    pub created_at: DateTime<Utc>,
    /// 마지막 변경 시각
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// 새 Pending 작업을 생성합니다.
    pub fn new(id: impl Into<String>, name: impl Into<String>, params: Value, now: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            status: TaskStatus::Pending,
            progress: 0,
            params,
            result: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// 종료 상태 여부.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// 진행 중 보고된 현재 단계 (`result.current_step`).
    pub fn current_step(&self) -> Option<&str> {
        self.result
            .as_ref()
            .and_then(|r| r.get("current_step"))
            .and_then(Value::as_str)
    }

    /// 파라미터에서 문자열 값을 조회합니다.
    pub fn param_str(&self, key: &str) -> Option<&str> {
        self.params.get(key).and_then(Value::as_str)
    }
}

/// 부분 업데이트.
///
/// 지정된 필드만 기록됩니다. `updated_at`은 항상 갱신됩니다.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskUpdate {
    pub status: Option<TaskStatus>,
    pub progress: Option<u8>,
    pub result: Option<Value>,
    pub error: Option<String>,
}

impl TaskUpdate {
    /// 빈 업데이트 (타임스탬프만 갱신).
    pub fn new() -> Self {
        Self::default()
    }

    /// 상태를 지정합니다.
    pub fn status(mut self, status: TaskStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// 진행률을 지정합니다. 100을 넘으면 100으로 제한됩니다.
    pub fn progress(mut self, progress: u8) -> Self {
        self.progress = Some(progress.min(100));
        self
    }

    /// 결과를 지정합니다.
    pub fn result(mut self, result: Value) -> Self {
        self.result = Some(result);
        self
    }

    /// 에러 메시지를 지정합니다.
    pub fn error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// Running 상태와 진행률.
    pub fn running(progress: u8) -> Self {
        Self::new().status(TaskStatus::Running).progress(progress)
    }

    /// Completed 상태, 진행률 100, 결과.
    pub fn completed(result: Value) -> Self {
        Self::new()
            .status(TaskStatus::Completed)
            .progress(100)
            .result(result)
    }

    /// Failed 상태와 에러 메시지.
    pub fn failed(error: impl Into<String>) -> Self {
        Self::new().status(TaskStatus::Failed).error(error)
    }

    /// 아무 필드도 지정되지 않았는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.status.is_none() && self.progress.is_none() && self.result.is_none() && self.error.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_round_trip_str() {
        for status in [
            TaskStatus::Pending,
            TaskStatus::Running,
            TaskStatus::Completed,
            TaskStatus::Failed,
            TaskStatus::Cancelled,
        ] {
            assert_eq!(status.as_str().parse::<TaskStatus>().unwrap(), status);
        }
        assert!("paused".parse::<TaskStatus>().is_err());
    }

    #[test]
    fn test_status_serde_lowercase() {
        let json = serde_json::to_string(&TaskStatus::Cancelled).unwrap();
        assert_eq!(json, r#""cancelled""#);
    }

    #[test]
    fn test_terminal_states() {
        assert!(!TaskStatus::Pending.is_terminal());
        assert!(!TaskStatus::Running.is_terminal());
        assert!(TaskStatus::Completed.is_terminal());
        assert!(TaskStatus::Failed.is_terminal());
        assert!(TaskStatus::Cancelled.is_terminal());
    }

    #[test]
    fn test_transitions() {
        assert!(TaskStatus::Pending.can_transition_to(TaskStatus::Running));
        assert!(TaskStatus::Running.can_transition_to(TaskStatus::Completed));
        assert!(TaskStatus::Running.can_transition_to(TaskStatus::Cancelled));
        assert!(!TaskStatus::Pending.can_transition_to(TaskStatus::Completed));
        assert!(!TaskStatus::Completed.can_transition_to(TaskStatus::Running));
        assert!(!TaskStatus::Cancelled.can_transition_to(TaskStatus::Failed));
    }

    #[test]
    fn test_update_builder() {
        let update = TaskUpdate::running(150);
        assert_eq!(update.status, Some(TaskStatus::Running));
        assert_eq!(update.progress, Some(100));

        let done = TaskUpdate::completed(json!({"matches": 3}));
        assert_eq!(done.progress, Some(100));
        assert!(done.error.is_none());

        assert!(TaskUpdate::new().is_empty());
    }

    #[test]
    fn test_current_step() {
        let mut task = Task::new("id", "scan", json!({}), Utc::now());
        assert_eq!(task.current_step(), None);
        task.result = Some(json!({"current_step": "fetching"}));
        assert_eq!(task.current_step(), Some("fetching"));
    }
}
