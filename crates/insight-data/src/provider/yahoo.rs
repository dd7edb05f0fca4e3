//! Yahoo Finance 시장 데이터 제공자.

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use insight_core::{Candle, MarketType};
use rust_decimal::Decimal;
use tracing::{debug, instrument};
use yahoo_finance_api::YahooConnector;

use super::{to_yahoo_symbol, HistoryPeriod, MarketDataProvider};
use crate::error::{DataError, Result};

/// Yahoo Finance 일봉 제공자.
pub struct YahooProvider {
    connector: YahooConnector,
}

impl YahooProvider {
    pub fn new() -> Result<Self> {
        let connector = YahooConnector::new()
            .map_err(|e| DataError::ConnectionError(format!("Yahoo Finance 연결 실패: {}", e)))?;
        Ok(Self { connector })
    }
}

#[async_trait]
impl MarketDataProvider for YahooProvider {
    fn name(&self) -> &str {
        "yahoo"
    }

    #[instrument(skip(self), fields(provider = "yahoo"))]
    async fn fetch_history(
        &self,
        symbol: &str,
        market: MarketType,
        period: HistoryPeriod,
    ) -> Result<Vec<Candle>> {
        let yahoo_symbol = to_yahoo_symbol(symbol, market);
        debug!(symbol = %yahoo_symbol, range = period.as_range(), "Yahoo Finance API 호출");

        let response = self
            .connector
            .get_quote_range(&yahoo_symbol, "1d", period.as_range())
            .await
            .map_err(|e| {
                DataError::FetchError(format!("Yahoo Finance API 오류 ({}): {}", yahoo_symbol, e))
            })?;

        let quotes = response
            .quotes()
            .map_err(|e| DataError::ParseError(format!("Quote 파싱 오류: {}", e)))?;

        let mut candles: Vec<Candle> = quotes
            .iter()
            .filter_map(|q| {
                let date = Utc.timestamp_opt(q.timestamp as i64, 0).single()?;
                let close = Decimal::from_f64_retain(q.close)?;
                // 거래 정지일 등 종가 0인 행은 제외
                if close.is_zero() {
                    return None;
                }
                Some(Candle {
                    date,
                    open: Decimal::from_f64_retain(q.open).unwrap_or(close),
                    high: Decimal::from_f64_retain(q.high).unwrap_or(close),
                    low: Decimal::from_f64_retain(q.low).unwrap_or(close),
                    close,
                    volume: Decimal::from(q.volume),
                    amount: None,
                    turnover_rate: None,
                })
            })
            .collect();

        candles.sort_by_key(|c| c.date);
        debug!(symbol = %yahoo_symbol, count = candles.len(), "일봉 조회 완료");
        Ok(candles)
    }
}
