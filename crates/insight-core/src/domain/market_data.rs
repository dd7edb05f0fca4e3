//! 시장 데이터 타입.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 일봉 OHLCV 데이터.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    /// 캔들 시작 시각
    pub date: DateTime<Utc>,
    /// 시가
    pub open: Decimal,
    /// 고가
    pub high: Decimal,
    /// 저가
    pub low: Decimal,
    /// 종가
    pub close: Decimal,
    /// 거래량
    pub volume: Decimal,
    /// 거래대금
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<Decimal>,
    /// 회전율 (%)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub turnover_rate: Option<Decimal>,
}

impl Candle {
    /// 거래대금. 데이터 제공자가 주지 않으면 종가 × 거래량으로 추정합니다.
    pub fn traded_value(&self) -> Decimal {
        self.amount.unwrap_or(self.close * self.volume)
    }
}

/// 시장 구분.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "utoipa-support", derive(utoipa::ToSchema))]
pub enum MarketType {
    /// 중국 본토 A주 (상해/심천)
    #[default]
    #[serde(rename = "A")]
    A,
    /// 홍콩
    #[serde(rename = "HK")]
    Hk,
    /// 미국
    #[serde(rename = "US")]
    Us,
}

impl MarketType {
    /// 시장 코드 문자열.
    pub fn as_str(&self) -> &'static str {
        match self {
            MarketType::A => "A",
            MarketType::Hk => "HK",
            MarketType::Us => "US",
        }
    }

    /// 시장 비교 기준 지수 심볼 (Yahoo 표기).
    pub fn benchmark_symbol(&self) -> &'static str {
        match self {
            MarketType::A => "000300.SS",
            MarketType::Hk => "^HSI",
            MarketType::Us => "^GSPC",
        }
    }
}

impl fmt::Display for MarketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MarketType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "A" | "CN" => Ok(MarketType::A),
            "HK" => Ok(MarketType::Hk),
            "US" => Ok(MarketType::Us),
            other => Err(format!("Unknown market type: {}", other)),
        }
    }
}
