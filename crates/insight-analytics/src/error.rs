//! 분석 에러 타입.

use insight_data::DataError;
use insight_tasks::JobError;
use thiserror::Error;

use crate::indicators::IndicatorError;

/// 분석 에러.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// 분석에 필요한 시세가 부족함
    #[error("insufficient data for {symbol}: need {required} candles, got {provided}")]
    InsufficientData {
        symbol: String,
        required: usize,
        provided: usize,
    },

    /// 데이터 제공자 오류
    #[error("market data provider error: {0}")]
    Provider(#[from] DataError),

    /// LLM 호출 오류
    #[error("LLM error: {0}")]
    Llm(String),

    /// 잘못된 입력
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl AnalysisError {
    /// 지표 오류를 심볼 정보와 함께 변환합니다.
    pub fn from_indicator(symbol: &str, err: IndicatorError) -> Self {
        match err {
            IndicatorError::InsufficientData { required, provided } => {
                AnalysisError::InsufficientData {
                    symbol: symbol.to_string(),
                    required,
                    provided,
                }
            }
            IndicatorError::InvalidParameter(msg) => AnalysisError::InvalidInput(msg),
        }
    }
}

impl From<AnalysisError> for JobError {
    fn from(err: AnalysisError) -> Self {
        JobError::Failed(err.to_string())
    }
}

pub type AnalysisResult<T> = Result<T, AnalysisError>;
