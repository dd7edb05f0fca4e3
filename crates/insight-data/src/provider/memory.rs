//! 고정 데이터 제공자.
//!
//! 미리 등록한 일봉을 그대로 반환합니다. 테스트와 오프라인 개발에 사용합니다.

use async_trait::async_trait;
use insight_core::{Candle, MarketType};
use std::collections::HashMap;

use super::{HistoryPeriod, MarketDataProvider};
use crate::error::{DataError, Result};

/// 심볼별 고정 일봉 제공자.
#[derive(Debug, Default, Clone)]
pub struct StaticProvider {
    series: HashMap<String, Vec<Candle>>,
}

impl StaticProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// 심볼의 일봉을 등록합니다.
    pub fn with_series(mut self, symbol: impl Into<String>, candles: Vec<Candle>) -> Self {
        self.series.insert(symbol.into(), candles);
        self
    }

    pub fn insert(&mut self, symbol: impl Into<String>, candles: Vec<Candle>) {
        self.series.insert(symbol.into(), candles);
    }
}

#[async_trait]
impl MarketDataProvider for StaticProvider {
    fn name(&self) -> &str {
        "static"
    }

    /// 등록된 일봉 중 기간에 해당하는 마지막 구간을 반환합니다.
    async fn fetch_history(
        &self,
        symbol: &str,
        market: MarketType,
        period: HistoryPeriod,
    ) -> Result<Vec<Candle>> {
        let candles = self
            .series
            .get(symbol)
            .or_else(|| self.series.get(&self.display_symbol(symbol, market)))
            .ok_or_else(|| DataError::NotFound(format!("no data for {}", symbol)))?;

        let skip = candles.len().saturating_sub(period.trading_days());
        Ok(candles[skip..].to_vec())
    }
}
