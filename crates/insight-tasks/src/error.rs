//! 작업 실행 에러 타입.

use insight_data::DataError;
use thiserror::Error;

/// 작업 실행 에러.
#[derive(Debug, Error)]
pub enum JobError {
    /// 사용자 취소 (협조적 취소 지점에서 발생)
    #[error("cancelled by user")]
    Cancelled,

    /// 동시 실행 한도 초과
    #[error("too many tasks in flight (limit {0})")]
    TooManyInFlight(usize),

    /// 작업 저장소 비활성
    #[error("task registry unavailable")]
    RegistryUnavailable,

    /// 작업 실패
    #[error("{0}")]
    Failed(String),
}

impl JobError {
    pub fn failed(msg: impl Into<String>) -> Self {
        JobError::Failed(msg.into())
    }

    /// 취소 여부.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, JobError::Cancelled)
    }
}

impl From<DataError> for JobError {
    fn from(err: DataError) -> Self {
        JobError::Failed(err.to_string())
    }
}

impl From<serde_json::Error> for JobError {
    fn from(err: serde_json::Error) -> Self {
        JobError::Failed(format!("result serialization failed: {}", err))
    }
}
