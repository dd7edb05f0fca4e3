//! 개별 종목 분석.

use insight_core::{Candle, MarketType};
use insight_data::{HistoryPeriod, MarketDataProvider};
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::{AnalysisError, AnalysisResult};
use crate::indicators::{self, last_value};
use crate::llm::TextGenerator;
use crate::prompt;
use crate::scoring::{QuickReport, TechnicalSnapshot};
use crate::statistics::{
    annualized_volatility, closes, daily_returns, max_drawdown, period_return, sharpe_ratio,
    ytd_return,
};

/// 빠른 분석에 사용하는 조회 기간.
pub const QUICK_PERIOD: HistoryPeriod = HistoryPeriod::SixMonths;

/// 기간별 수익률 (%).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PeriodReturns {
    pub week_1: Option<f64>,
    pub month_1: Option<f64>,
    pub month_3: Option<f64>,
    pub year_1: Option<f64>,
    pub ytd: Option<f64>,
}

impl PeriodReturns {
    /// 5/21/63/252 거래일 및 연초 대비 수익률.
    pub fn from_candles(candles: &[Candle]) -> Self {
        let prices = closes(candles);
        let pct = |r: Option<f64>| r.map(|v| round2(v * 100.0));
        Self {
            week_1: pct(period_return(&prices, 5)),
            month_1: pct(period_return(&prices, 21)),
            month_3: pct(period_return(&prices, 63)),
            year_1: pct(period_return(&prices, 252)),
            ytd: pct(ytd_return(candles)),
        }
    }

    /// 항목별 차이 (self - other).
    pub fn minus(&self, other: &PeriodReturns) -> PeriodReturns {
        let diff = |a: Option<f64>, b: Option<f64>| match (a, b) {
            (Some(a), Some(b)) => Some(round2(a - b)),
            _ => None,
        };
        PeriodReturns {
            week_1: diff(self.week_1, other.week_1),
            month_1: diff(self.month_1, other.month_1),
            month_3: diff(self.month_3, other.month_3),
            year_1: diff(self.year_1, other.year_1),
            ytd: diff(self.ytd, other.ytd),
        }
    }
}

pub(crate) fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

pub(crate) fn round4(v: f64) -> f64 {
    (v * 10_000.0).round() / 10_000.0
}

/// 최근 지표 값.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IndicatorSummary {
    pub ma5: Option<Decimal>,
    pub ma10: Option<Decimal>,
    pub ma20: Option<Decimal>,
    pub ma60: Option<Decimal>,
    pub rsi14: Option<Decimal>,
    pub macd: Option<Decimal>,
    pub macd_signal: Option<Decimal>,
    pub macd_hist: Option<Decimal>,
    pub bollinger_upper: Option<Decimal>,
    pub bollinger_lower: Option<Decimal>,
}

/// 위험 지표.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RiskSummary {
    pub annualized_volatility: Option<f64>,
    pub max_drawdown: Option<f64>,
    pub sharpe_ratio: Option<f64>,
}

/// 종목 분석 결과.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StockReport {
    #[serde(flatten)]
    pub summary: QuickReport,
    pub market_type: MarketType,
    pub last_date: String,
    pub candles: usize,
    pub returns: PeriodReturns,
    pub indicators: IndicatorSummary,
    pub risk: RiskSummary,
    pub ai_summary: Option<String>,
}

/// 종목 분석기.
#[derive(Clone)]
pub struct StockAnalyzer {
    provider: Arc<dyn MarketDataProvider>,
    generator: Option<Arc<dyn TextGenerator>>,
}

impl StockAnalyzer {
    pub fn new(provider: Arc<dyn MarketDataProvider>) -> Self {
        Self {
            provider,
            generator: None,
        }
    }

    /// AI 요약 생성기를 지정합니다.
    pub fn with_generator(mut self, generator: Option<Arc<dyn TextGenerator>>) -> Self {
        self.generator = generator;
        self
    }

    pub fn provider(&self) -> &Arc<dyn MarketDataProvider> {
        &self.provider
    }

    pub fn generator(&self) -> Option<&Arc<dyn TextGenerator>> {
        self.generator.as_ref()
    }

    /// 일봉을 조회합니다. 빈 응답은 데이터 부족으로 처리합니다.
    pub async fn fetch(
        &self,
        symbol: &str,
        market: MarketType,
        period: HistoryPeriod,
    ) -> AnalysisResult<Vec<Candle>> {
        let candles = self.provider.fetch_history(symbol, market, period).await?;
        if candles.is_empty() {
            return Err(AnalysisError::InsufficientData {
                symbol: symbol.to_string(),
                required: 1,
                provided: 0,
            });
        }
        debug!(symbol, count = candles.len(), "History fetched");
        Ok(candles)
    }

    /// 빠른 분석 (시장 스캔 단위).
    pub async fn quick_analyze(&self, symbol: &str, market: MarketType) -> AnalysisResult<QuickReport> {
        let candles = self.fetch(symbol, market, QUICK_PERIOD).await?;
        let snapshot = TechnicalSnapshot::from_candles(symbol, &candles)?;
        Ok(QuickReport::new(
            symbol,
            self.provider.display_symbol(symbol, market),
            &snapshot,
        ))
    }

    /// 상세 보고서를 계산합니다 (AI 요약 제외).
    pub fn build_report(
        &self,
        symbol: &str,
        market: MarketType,
        candles: &[Candle],
    ) -> AnalysisResult<StockReport> {
        let snapshot = TechnicalSnapshot::from_candles(symbol, candles)?;
        let summary = QuickReport::new(symbol, self.provider.display_symbol(symbol, market), &snapshot);

        let prices: Vec<Decimal> = candles.iter().map(|c| c.close).collect();
        let ma = |period: usize| indicators::sma(&prices, period).ok().and_then(|s| last_value(&s));
        let bands = indicators::bollinger_bands(&prices, 20, Decimal::TWO)
            .ok()
            .and_then(|b| b.last().copied().flatten());

        let indicators = IndicatorSummary {
            ma5: snapshot.ma5,
            ma10: ma(10),
            ma20: snapshot.ma20,
            ma60: snapshot.ma60,
            rsi14: snapshot.rsi14,
            macd: snapshot.macd.macd,
            macd_signal: snapshot.macd.signal,
            macd_hist: snapshot.macd.histogram,
            bollinger_upper: bands.map(|b| b.upper),
            bollinger_lower: bands.map(|b| b.lower),
        };

        let close_series = closes(candles);
        let returns = daily_returns(&close_series);
        let risk = RiskSummary {
            annualized_volatility: annualized_volatility(&returns).map(round4),
            max_drawdown: max_drawdown(&close_series).map(round4),
            sharpe_ratio: sharpe_ratio(&returns).map(round2),
        };

        let last_date = candles
            .last()
            .map(|c| c.date.format("%Y-%m-%d").to_string())
            .unwrap_or_default();

        Ok(StockReport {
            summary,
            market_type: market,
            last_date,
            candles: candles.len(),
            returns: PeriodReturns::from_candles(candles),
            indicators,
            risk,
            ai_summary: None,
        })
    }

    /// AI 요약을 생성합니다.
    ///
    /// 생성기가 없거나 호출이 실패하면 `None` (실패는 경고 로그).
    pub async fn summarize(&self, report: &StockReport) -> Option<String> {
        let generator = self.generator.as_ref()?;
        match generator
            .generate(prompt::SYSTEM_PROMPT, &prompt::stock_prompt(report))
            .await
        {
            Ok(text) => Some(text),
            Err(e) => {
                warn!(symbol = %report.summary.stock_code, error = %e, "AI summary failed");
                None
            }
        }
    }
}
