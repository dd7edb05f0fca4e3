//! ETF 분석.
//!
//! 수익률(기준 지수 대비 초과수익 포함), 유동성, 기술 지표, 거래량 기반
//! 자금 흐름 추정, 위험/추적 지표를 계산합니다.

use insight_core::{Candle, MarketType};
use insight_data::HistoryPeriod;
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::warn;

use crate::error::{AnalysisError, AnalysisResult};
use crate::indicators::{self, last_value, MacdParams};
use crate::prompt;
use crate::statistics::{
    aligned_returns, annualized_volatility, beta, closes, daily_returns, mean, sharpe_ratio,
    to_f64, tracking_error,
};
use crate::stock::{round2, round4, PeriodReturns, StockAnalyzer};

/// 유동성/자금 흐름 집계 기간 (거래일).
const MONTH_DAYS: usize = 21;

/// 자금 흐름 차트에 포함할 최근 거래일 수.
const FLOW_CHART_DAYS: usize = 60;

/// 최근 한 달 유동성.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Liquidity {
    /// 일평균 거래대금
    pub avg_daily_amount: Option<f64>,
    /// 일평균 회전율 (%)
    pub avg_turnover_rate: Option<f64>,
}

/// 최근 기술 지표.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EtfIndicators {
    pub ma20: Option<Decimal>,
    pub ma60: Option<Decimal>,
    pub macd: Option<Decimal>,
    pub macd_signal: Option<Decimal>,
    pub macd_hist: Option<Decimal>,
    pub rsi14: Option<Decimal>,
}

/// 시장 성과.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarketPerformance {
    pub returns: PeriodReturns,
    pub liquidity: Liquidity,
    pub tech_indicators: EtfIndicators,
    pub benchmark_symbol: String,
    /// 기준 지수 조회 실패 시 `None`
    pub benchmark_returns: Option<PeriodReturns>,
    pub alpha: Option<PeriodReturns>,
}

/// 거래량 변화 × 종가로 추정한 순유입 (거래 통화 단위).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FundFlow {
    pub week_1: f64,
    pub month_1: f64,
    pub month_3: f64,
    /// 최근 일별 추정치 `(YYYY-MM-DD, 값 / 1e8)`
    pub daily: Vec<(String, f64)>,
}

/// 위험/추적 지표.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RiskAndTracking {
    pub annualized_volatility: Option<f64>,
    pub beta: Option<f64>,
    pub tracking_error: Option<f64>,
    pub sharpe_ratio: Option<f64>,
}

/// ETF 분석 결과.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EtfReport {
    pub etf_code: String,
    pub symbol: String,
    pub market_type: MarketType,
    pub period: HistoryPeriod,
    pub last_price: Decimal,
    pub market_performance: MarketPerformance,
    pub fund_flow: FundFlow,
    pub risk_and_tracking: RiskAndTracking,
    pub ai_summary: Option<String>,
}

fn liquidity(candles: &[Candle]) -> Liquidity {
    let recent = &candles[candles.len().saturating_sub(MONTH_DAYS)..];
    let amounts: Vec<f64> = recent.iter().map(|c| to_f64(c.traded_value())).collect();
    let turnover: Vec<f64> = recent
        .iter()
        .filter_map(|c| c.turnover_rate.map(to_f64))
        .collect();
    Liquidity {
        avg_daily_amount: mean(&amounts).map(round2),
        avg_turnover_rate: mean(&turnover).map(round4),
    }
}

fn tech_indicators(prices: &[Decimal]) -> EtfIndicators {
    let ma = |period| indicators::sma(prices, period).ok().and_then(|s| last_value(&s));
    let macd = indicators::macd(prices, MacdParams::default())
        .ok()
        .and_then(|m| m.last().copied())
        .unwrap_or_default();
    EtfIndicators {
        ma20: ma(20),
        ma60: ma(60),
        macd: macd.macd,
        macd_signal: macd.signal,
        macd_hist: macd.histogram,
        rsi14: indicators::rsi(prices, 14).ok().and_then(|s| last_value(&s)),
    }
}

/// 거래량 증감을 순유입 대리 지표로 사용합니다.
pub fn fund_flow(candles: &[Candle]) -> FundFlow {
    let flows: Vec<f64> = std::iter::once(0.0)
        .chain(candles.windows(2).map(|w| {
            let volume_change = to_f64(w[1].volume - w[0].volume);
            volume_change * to_f64(w[1].close)
        }))
        .take(candles.len())
        .collect();

    let tail_sum = |days: usize| flows[flows.len().saturating_sub(days)..].iter().sum::<f64>();
    let start = candles.len().saturating_sub(FLOW_CHART_DAYS);

    FundFlow {
        week_1: round2(tail_sum(5)),
        month_1: round2(tail_sum(MONTH_DAYS)),
        month_3: round2(tail_sum(63)),
        daily: candles[start..]
            .iter()
            .zip(&flows[start..])
            .map(|(c, f)| (c.date.format("%Y-%m-%d").to_string(), round4(f / 1e8)))
            .collect(),
    }
}

fn risk_and_tracking(candles: &[Candle], benchmark: Option<&[Candle]>) -> RiskAndTracking {
    let returns = daily_returns(&closes(candles));
    let mut risk = RiskAndTracking {
        annualized_volatility: annualized_volatility(&returns).map(round4),
        sharpe_ratio: sharpe_ratio(&returns).map(round2),
        ..Default::default()
    };
    if let Some(benchmark) = benchmark {
        let (asset, bench) = aligned_returns(candles, benchmark);
        risk.beta = beta(&asset, &bench).map(round4);
        risk.tracking_error = tracking_error(&asset, &bench).map(round4);
        if risk.sharpe_ratio.is_none() {
            risk.sharpe_ratio = sharpe_ratio(&asset).map(round2);
        }
    }
    risk
}

impl StockAnalyzer {
    /// 기준 지수 일봉을 ETF 기간에 맞춰 조회합니다. 실패 시 `None` (경고 로그).
    pub async fn fetch_benchmark(
        &self,
        market: MarketType,
        period: HistoryPeriod,
        etf: &[Candle],
    ) -> Option<Vec<Candle>> {
        let symbol = market.benchmark_symbol();
        let candles = match self.provider().fetch_history(symbol, market, period).await {
            Ok(candles) => candles,
            Err(e) => {
                warn!(benchmark = symbol, error = %e, "Benchmark fetch failed");
                return None;
            }
        };
        let (first, last) = (etf.first()?.date, etf.last()?.date);
        let trimmed: Vec<Candle> = candles
            .into_iter()
            .filter(|c| c.date >= first && c.date <= last)
            .collect();
        (!trimmed.is_empty()).then_some(trimmed)
    }

    /// ETF 보고서를 계산합니다 (AI 요약 제외).
    pub fn build_etf_report(
        &self,
        etf_code: &str,
        market: MarketType,
        period: HistoryPeriod,
        candles: &[Candle],
        benchmark: Option<&[Candle]>,
    ) -> AnalysisResult<EtfReport> {
        let last = candles.last().ok_or_else(|| AnalysisError::InsufficientData {
            symbol: etf_code.to_string(),
            required: 2,
            provided: 0,
        })?;
        if candles.len() < 2 {
            return Err(AnalysisError::InsufficientData {
                symbol: etf_code.to_string(),
                required: 2,
                provided: candles.len(),
            });
        }

        let prices: Vec<Decimal> = candles.iter().map(|c| c.close).collect();
        let returns = PeriodReturns::from_candles(candles);
        let benchmark_returns = benchmark.map(PeriodReturns::from_candles);
        let alpha = benchmark_returns.as_ref().map(|b| returns.minus(b));

        Ok(EtfReport {
            etf_code: etf_code.to_string(),
            symbol: self.provider().display_symbol(etf_code, market),
            market_type: market,
            period,
            last_price: last.close,
            market_performance: MarketPerformance {
                returns,
                liquidity: liquidity(candles),
                tech_indicators: tech_indicators(&prices),
                benchmark_symbol: market.benchmark_symbol().to_string(),
                benchmark_returns,
                alpha,
            },
            fund_flow: fund_flow(candles),
            risk_and_tracking: risk_and_tracking(candles, benchmark),
            ai_summary: None,
        })
    }

    /// ETF AI 요약. 생성기가 없거나 실패하면 `None`.
    pub async fn summarize_etf(&self, report: &EtfReport) -> Option<String> {
        let generator = self.generator()?;
        match generator
            .generate(prompt::SYSTEM_PROMPT, &prompt::etf_prompt(report))
            .await
        {
            Ok(text) => Some(text),
            Err(e) => {
                warn!(etf = %report.etf_code, error = %e, "ETF AI summary failed");
                None
            }
        }
    }
}
