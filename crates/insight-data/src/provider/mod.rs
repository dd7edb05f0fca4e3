//! 시장 데이터 제공자.
//!
//! 분석 작업은 [`MarketDataProvider`]를 통해서만 과거 시세를 조회합니다.

pub mod memory;
pub mod yahoo;

use async_trait::async_trait;
use insight_core::{Candle, MarketType};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{DataError, Result};

/// 조회 기간.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HistoryPeriod {
    #[serde(rename = "1m")]
    OneMonth,
    #[serde(rename = "3m")]
    ThreeMonths,
    #[serde(rename = "6m")]
    SixMonths,
    #[default]
    #[serde(rename = "1y")]
    OneYear,
    #[serde(rename = "2y")]
    TwoYears,
    #[serde(rename = "5y")]
    FiveYears,
}

impl HistoryPeriod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HistoryPeriod::OneMonth => "1m",
            HistoryPeriod::ThreeMonths => "3m",
            HistoryPeriod::SixMonths => "6m",
            HistoryPeriod::OneYear => "1y",
            HistoryPeriod::TwoYears => "2y",
            HistoryPeriod::FiveYears => "5y",
        }
    }

    /// Yahoo Finance `range` 파라미터.
    pub fn as_range(&self) -> &'static str {
        match self {
            HistoryPeriod::OneMonth => "1mo",
            HistoryPeriod::ThreeMonths => "3mo",
            HistoryPeriod::SixMonths => "6mo",
            HistoryPeriod::OneYear => "1y",
            HistoryPeriod::TwoYears => "2y",
            HistoryPeriod::FiveYears => "5y",
        }
    }

    /// 기간 내 대략적인 거래일 수.
    pub fn trading_days(&self) -> usize {
        match self {
            HistoryPeriod::OneMonth => 21,
            HistoryPeriod::ThreeMonths => 63,
            HistoryPeriod::SixMonths => 126,
            HistoryPeriod::OneYear => 252,
            HistoryPeriod::TwoYears => 504,
            HistoryPeriod::FiveYears => 1260,
        }
    }
}

impl fmt::Display for HistoryPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HistoryPeriod {
    type Err = DataError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "1m" | "1mo" => Ok(HistoryPeriod::OneMonth),
            "3m" | "3mo" => Ok(HistoryPeriod::ThreeMonths),
            "6m" | "6mo" => Ok(HistoryPeriod::SixMonths),
            "1y" => Ok(HistoryPeriod::OneYear),
            "2y" => Ok(HistoryPeriod::TwoYears),
            "5y" => Ok(HistoryPeriod::FiveYears),
            other => Err(DataError::InvalidData(format!("unknown period: {}", other))),
        }
    }
}

/// 종목 코드를 Yahoo Finance 심볼로 변환합니다.
///
/// - A주: `6`/`9`/`5`로 시작하면 상해(`.SS`), 그 외 심천(`.SZ`)
/// - 홍콩: 4자리로 0을 채워 `.HK`
/// - 미국: 대문자
///
/// 이미 접미사(`.`)가 있는 심볼은 그대로 반환합니다.
pub fn to_yahoo_symbol(symbol: &str, market: MarketType) -> String {
    let symbol = symbol.trim();
    if symbol.contains('.') || symbol.starts_with('^') {
        return symbol.to_uppercase();
    }

    match market {
        MarketType::A => {
            if symbol.starts_with(['6', '9', '5']) {
                format!("{}.SS", symbol)
            } else {
                format!("{}.SZ", symbol)
            }
        }
        MarketType::Hk => {
            let digits = symbol.trim_start_matches('0');
            format!("{:0>4}.HK", if digits.is_empty() { "0" } else { digits })
        }
        MarketType::Us => symbol.to_uppercase(),
    }
}

/// 시장 데이터 제공자.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// 제공자 이름.
    fn name(&self) -> &str;

    /// 일봉 이력을 오래된 순서로 반환합니다.
    async fn fetch_history(
        &self,
        symbol: &str,
        market: MarketType,
        period: HistoryPeriod,
    ) -> Result<Vec<Candle>>;

    /// 응답에 표시할 심볼.
    fn display_symbol(&self, symbol: &str, market: MarketType) -> String {
        to_yahoo_symbol(symbol, market)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_yahoo_symbol_a_share() {
        assert_eq!(to_yahoo_symbol("600519", MarketType::A), "600519.SS");
        assert_eq!(to_yahoo_symbol("510300", MarketType::A), "510300.SS");
        assert_eq!(to_yahoo_symbol("000001", MarketType::A), "000001.SZ");
        assert_eq!(to_yahoo_symbol("159915", MarketType::A), "159915.SZ");
    }

    #[test]
    fn test_to_yahoo_symbol_hk_and_us() {
        assert_eq!(to_yahoo_symbol("700", MarketType::Hk), "0700.HK");
        assert_eq!(to_yahoo_symbol("00700", MarketType::Hk), "0700.HK");
        assert_eq!(to_yahoo_symbol("9988", MarketType::Hk), "9988.HK");
        assert_eq!(to_yahoo_symbol("aapl", MarketType::Us), "AAPL");
    }

    #[test]
    fn test_to_yahoo_symbol_passthrough() {
        assert_eq!(to_yahoo_symbol("000300.SS", MarketType::A), "000300.SS");
        assert_eq!(to_yahoo_symbol("^HSI", MarketType::Hk), "^HSI");
    }

    #[test]
    fn test_history_period_parse() {
        assert_eq!("1y".parse::<HistoryPeriod>().unwrap(), HistoryPeriod::OneYear);
        assert_eq!("6M".parse::<HistoryPeriod>().unwrap(), HistoryPeriod::SixMonths);
        assert!("10y".parse::<HistoryPeriod>().is_err());
        assert_eq!(HistoryPeriod::default(), HistoryPeriod::OneYear);
        assert_eq!(HistoryPeriod::ThreeMonths.as_range(), "3mo");
    }
}
