//! 기술적 스냅샷과 빠른 점수 산정.
//!
//! 점수(0~100)는 다섯 항목의 합입니다.
//!
//! | 항목 | 배점 |
//! |------|------|
//! | 이동평균 배열 | 30 |
//! | RSI | 20 |
//! | MACD | 20 |
//! | 거래량 | 15 |
//! | 변동성 | 15 |

use insight_core::Candle;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::{AnalysisError, AnalysisResult};
use crate::indicators::{self, last_value, MacdParams, MacdPoint};
use crate::statistics::{annualized_volatility, closes, daily_returns, to_f64};

/// 스냅샷 계산에 필요한 최소 캔들 수 (MACD 12/26/9).
pub const MIN_CANDLES: usize = 35;

/// 이동평균 배열.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaTrend {
    /// MA5 > MA20 > MA60
    Bullish,
    /// MA5 < MA20 < MA60
    Bearish,
    Neutral,
}

/// MACD 신호.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MacdSignal {
    Bullish,
    Bearish,
    Neutral,
}

/// 거래량 상태 (최근 거래량 / 20일 평균).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VolumeStatus {
    Surge,
    Normal,
    Shrink,
}

/// 점수 기반 의견.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    StrongBuy,
    Buy,
    Hold,
    Sell,
}

impl Recommendation {
    pub fn from_score(score: u8) -> Self {
        match score {
            80.. => Recommendation::StrongBuy,
            60..=79 => Recommendation::Buy,
            40..=59 => Recommendation::Hold,
            _ => Recommendation::Sell,
        }
    }
}

/// 최근 시점의 기술적 상태.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TechnicalSnapshot {
    pub price: Decimal,
    /// 전일 대비 등락률 (%)
    pub change_pct: f64,
    pub ma5: Option<Decimal>,
    pub ma20: Option<Decimal>,
    pub ma60: Option<Decimal>,
    pub rsi14: Option<Decimal>,
    pub macd: MacdPoint,
    /// 최근 거래량 / 20일 평균 거래량
    pub volume_ratio: Option<f64>,
    /// 연환산 변동성 (비율)
    pub volatility: Option<f64>,
}

impl TechnicalSnapshot {
    /// 캔들로부터 스냅샷을 계산합니다.
    pub fn from_candles(symbol: &str, candles: &[Candle]) -> AnalysisResult<Self> {
        if candles.len() < MIN_CANDLES {
            return Err(AnalysisError::InsufficientData {
                symbol: symbol.to_string(),
                required: MIN_CANDLES,
                provided: candles.len(),
            });
        }

        let prices: Vec<Decimal> = candles.iter().map(|c| c.close).collect();
        let ma = |period: usize| {
            indicators::sma(&prices, period)
                .ok()
                .and_then(|s| last_value(&s))
        };

        let macd = indicators::macd(&prices, MacdParams::default())
            .map_err(|e| AnalysisError::from_indicator(symbol, e))?
            .last()
            .copied()
            .unwrap_or_default();
        let rsi14 = indicators::rsi(&prices, 14)
            .map_err(|e| AnalysisError::from_indicator(symbol, e))
            .map(|s| last_value(&s))?;

        let n = prices.len();
        let price = prices[n - 1];
        let prev = prices[n - 2];
        let change_pct = if prev.is_zero() {
            0.0
        } else {
            to_f64((price - prev) / prev * dec!(100))
        };

        let volumes: Vec<f64> = candles.iter().map(|c| to_f64(c.volume)).collect();
        let recent = &volumes[n.saturating_sub(20)..];
        let avg_volume = recent.iter().sum::<f64>() / recent.len() as f64;
        let volume_ratio = (avg_volume > 0.0).then(|| volumes[n - 1] / avg_volume);

        let recent_closes = closes(&candles[n.saturating_sub(61)..]);
        let volatility = annualized_volatility(&daily_returns(&recent_closes));

        Ok(Self {
            price,
            change_pct,
            ma5: ma(5),
            ma20: ma(20),
            ma60: ma(60),
            rsi14,
            macd,
            volume_ratio,
            volatility,
        })
    }

    pub fn ma_trend(&self) -> MaTrend {
        match (self.ma5, self.ma20, self.ma60) {
            (Some(a), Some(b), Some(c)) if a > b && b > c => MaTrend::Bullish,
            (Some(a), Some(b), Some(c)) if a < b && b < c => MaTrend::Bearish,
            (Some(a), Some(b), None) if a > b => MaTrend::Bullish,
            (Some(a), Some(b), None) if a < b => MaTrend::Bearish,
            _ => MaTrend::Neutral,
        }
    }

    pub fn macd_signal(&self) -> MacdSignal {
        match self.macd.histogram {
            Some(h) if h > Decimal::ZERO => MacdSignal::Bullish,
            Some(h) if h < Decimal::ZERO => MacdSignal::Bearish,
            _ => MacdSignal::Neutral,
        }
    }

    pub fn volume_status(&self) -> VolumeStatus {
        match self.volume_ratio {
            Some(r) if r >= 1.5 => VolumeStatus::Surge,
            Some(r) if r < 0.7 => VolumeStatus::Shrink,
            _ => VolumeStatus::Normal,
        }
    }

    /// 종합 점수 (0~100).
    pub fn score(&self) -> u8 {
        let trend = match (self.ma5, self.ma20, self.ma60) {
            (Some(a), Some(b), Some(c)) if a > b && b > c => 30,
            (Some(a), Some(b), _) if a > b => 20,
            (_, Some(b), Some(c)) if b > c => 10,
            _ => 0,
        };

        let rsi = match self.rsi14 {
            Some(r) if r >= dec!(40) && r <= dec!(60) => 20,
            Some(r) if (r >= dec!(30) && r < dec!(40)) || (r > dec!(60) && r <= dec!(70)) => 15,
            Some(r) if r < dec!(30) => 10,
            Some(_) => 5,
            None => 0,
        };

        let macd = match (self.macd.macd, self.macd.histogram) {
            (Some(m), Some(h)) if m > Decimal::ZERO && h > Decimal::ZERO => 20,
            (_, Some(h)) if h > Decimal::ZERO => 15,
            (Some(m), _) if m > Decimal::ZERO => 10,
            _ => 0,
        };

        let volume = match self.volume_ratio {
            Some(r) if r >= 1.5 && self.change_pct > 0.0 => 15,
            Some(r) if r >= 1.0 => 10,
            Some(r) if r >= 0.7 => 7,
            Some(_) => 3,
            None => 0,
        };

        let volatility = match self.volatility {
            Some(v) if v < 0.25 => 15,
            Some(v) if v < 0.40 => 10,
            Some(v) if v < 0.60 => 5,
            _ => 0,
        };

        (trend + rsi + macd + volume + volatility).min(100)
    }
}

/// 빠른 분석 결과 (시장 스캔 단위).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuickReport {
    pub stock_code: String,
    pub symbol: String,
    pub score: u8,
    pub price: Decimal,
    pub price_change: f64,
    pub ma_trend: MaTrend,
    pub rsi: Option<Decimal>,
    pub macd_signal: MacdSignal,
    pub volume_status: VolumeStatus,
    pub recommendation: Recommendation,
}

impl QuickReport {
    pub fn new(stock_code: &str, symbol: String, snapshot: &TechnicalSnapshot) -> Self {
        let score = snapshot.score();
        Self {
            stock_code: stock_code.to_string(),
            symbol,
            score,
            price: snapshot.price,
            price_change: (snapshot.change_pct * 100.0).round() / 100.0,
            ma_trend: snapshot.ma_trend(),
            rsi: snapshot.rsi14.map(|r| r.round_dp(2)),
            macd_signal: snapshot.macd_signal(),
            volume_status: snapshot.volume_status(),
            recommendation: Recommendation::from_score(score),
        }
    }
}
