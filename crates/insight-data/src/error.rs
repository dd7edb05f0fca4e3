//! 데이터 모듈 오류 타입.

use thiserror::Error;

/// 데이터 관련 오류.
#[derive(Debug, Error)]
pub enum DataError {
    /// 저장소 연결 오류
    #[error("Store connection error: {0}")]
    ConnectionError(String),

    /// 저장소 명령 실행 오류
    #[error("Store error: {0}")]
    StoreError(String),

    /// 직렬화/역직렬화 오류
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// 레코드를 찾을 수 없음
    #[error("Record not found: {0}")]
    NotFound(String),

    /// 잘못된 데이터 형식
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// 타임아웃 오류
    #[error("Operation timeout: {0}")]
    Timeout(String),

    /// 데이터 가져오기 오류 (외부 소스)
    #[error("Fetch error: {0}")]
    FetchError(String),

    /// 파싱 오류
    #[error("Parse error: {0}")]
    ParseError(String),
}

impl DataError {
    /// 저장소 자체에 도달할 수 없어서 생긴 오류인지 확인합니다.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, DataError::ConnectionError(_) | DataError::Timeout(_))
    }
}

impl From<redis::RedisError> for DataError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_connection_refusal() || err.is_connection_dropped() || err.is_io_error() {
            DataError::ConnectionError(err.to_string())
        } else if err.is_timeout() {
            DataError::Timeout(err.to_string())
        } else {
            DataError::StoreError(err.to_string())
        }
    }
}

impl From<serde_json::Error> for DataError {
    fn from(err: serde_json::Error) -> Self {
        DataError::SerializationError(err.to_string())
    }
}

impl From<DataError> for insight_core::InsightError {
    fn from(err: DataError) -> Self {
        match err {
            DataError::NotFound(msg) => insight_core::InsightError::NotFound(msg),
            DataError::SerializationError(msg) => insight_core::InsightError::Serialization(msg),
            other => insight_core::InsightError::Data(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, DataError>;
