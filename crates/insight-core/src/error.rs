//! 분석 시스템 공통 에러 타입.
//!
//! 크레이트 경계를 넘나드는 에러를 정의합니다. 각 크레이트는 자체 에러 타입을
//! 가지며, 필요한 경우 이 타입으로 변환됩니다.

use thiserror::Error;

/// 핵심 에러.
#[derive(Debug, Error)]
pub enum InsightError {
    /// 설정 에러
    #[error("설정 에러: {0}")]
    Config(String),

    /// 데이터 에러
    #[error("데이터 에러: {0}")]
    Data(String),

    /// 직렬화 에러
    #[error("직렬화 에러: {0}")]
    Serialization(String),

    /// 잘못된 입력
    #[error("잘못된 입력: {0}")]
    InvalidInput(String),

    /// 찾을 수 없음
    #[error("찾을 수 없음: {0}")]
    NotFound(String),

    /// 내부 에러
    #[error("내부 에러: {0}")]
    Internal(String),
}

/// 공통 Result 타입.
pub type InsightResult<T> = Result<T, InsightError>;

impl InsightError {
    /// 클라이언트 입력 때문에 발생한 에러인지 확인합니다.
    pub fn is_client_error(&self) -> bool {
        matches!(self, InsightError::InvalidInput(_) | InsightError::NotFound(_))
    }
}

impl From<serde_json::Error> for InsightError {
    fn from(err: serde_json::Error) -> Self {
        InsightError::Serialization(err.to_string())
    }
}

impl From<config::ConfigError> for InsightError {
    fn from(err: config::ConfigError) -> Self {
        InsightError::Config(err.to_string())
    }
}
