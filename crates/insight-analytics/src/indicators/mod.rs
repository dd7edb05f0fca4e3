//! 기술적 지표.
//!
//! 모든 지표는 종가 시계열(`&[Decimal]`, 오래된 순)을 받아 같은 길이의
//! `Vec<Option<Decimal>>`을 반환합니다. 계산 구간이 채워지기 전 값은 `None`입니다.
//!
//! - 추세: SMA, EMA, MACD
//! - 모멘텀: RSI
//! - 변동성: 볼린저 밴드

pub mod momentum;
pub mod trend;
pub mod volatility;

use rust_decimal::Decimal;
use thiserror::Error;

pub use momentum::rsi;
pub use trend::{ema, macd, sma, MacdParams, MacdPoint};
pub use volatility::{bollinger_bands, BollingerPoint};

/// 지표 계산 오류.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum IndicatorError {
    /// 데이터 부족
    #[error("데이터가 부족합니다: 필요 {required}개, 제공 {provided}개")]
    InsufficientData { required: usize, provided: usize },

    /// 잘못된 파라미터
    #[error("잘못된 파라미터: {0}")]
    InvalidParameter(String),
}

pub type IndicatorResult<T> = Result<T, IndicatorError>;

/// 기간 파라미터와 데이터 길이를 검증합니다.
pub(crate) fn check_period(len: usize, period: usize, required: usize) -> IndicatorResult<()> {
    if period == 0 {
        return Err(IndicatorError::InvalidParameter(
            "기간은 0보다 커야 합니다".to_string(),
        ));
    }
    if len < required {
        return Err(IndicatorError::InsufficientData {
            required,
            provided: len,
        });
    }
    Ok(())
}

/// 시계열의 마지막 값.
pub fn last_value(series: &[Option<Decimal>]) -> Option<Decimal> {
    series.last().copied().flatten()
}
