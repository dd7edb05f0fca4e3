//! 이동평균 계열 추세 지표.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use super::{check_period, IndicatorResult};

/// 단순 이동평균.
pub fn sma(prices: &[Decimal], period: usize) -> IndicatorResult<Vec<Option<Decimal>>> {
    check_period(prices.len(), period, period)?;

    let divisor = Decimal::from(period);
    let mut window_sum: Decimal = prices[..period - 1].iter().sum();
    let mut out = vec![None; period - 1];

    for i in (period - 1)..prices.len() {
        window_sum += prices[i];
        out.push(Some(window_sum / divisor));
        window_sum -= prices[i + 1 - period];
    }

    Ok(out)
}

/// 지수 이동평균. 첫 값은 처음 `period`개의 SMA로 시작합니다.
///
/// EMA = 가격 × k + 이전 EMA × (1 - k), k = 2 / (period + 1)
pub fn ema(prices: &[Decimal], period: usize) -> IndicatorResult<Vec<Option<Decimal>>> {
    check_period(prices.len(), period, period)?;

    let k = dec!(2) / Decimal::from(period + 1);
    let seed = prices[..period].iter().sum::<Decimal>() / Decimal::from(period);

    let mut out = vec![None; period - 1];
    out.push(Some(seed));

    let mut prev = seed;
    for price in &prices[period..] {
        prev = *price * k + prev * (Decimal::ONE - k);
        out.push(Some(prev));
    }

    Ok(out)
}

/// MACD 파라미터 (기본 12/26/9).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MacdParams {
    pub fast: usize,
    pub slow: usize,
    pub signal: usize,
}

impl Default for MacdParams {
    fn default() -> Self {
        Self {
            fast: 12,
            slow: 26,
            signal: 9,
        }
    }
}

/// 한 시점의 MACD 값.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MacdPoint {
    /// 단기 EMA - 장기 EMA
    pub macd: Option<Decimal>,
    /// MACD의 EMA
    pub signal: Option<Decimal>,
    /// MACD - 시그널
    pub histogram: Option<Decimal>,
}

/// MACD.
pub fn macd(prices: &[Decimal], params: MacdParams) -> IndicatorResult<Vec<MacdPoint>> {
    check_period(prices.len(), params.slow.min(params.fast).min(params.signal), params.slow + params.signal)?;

    let fast = ema(prices, params.fast)?;
    let slow = ema(prices, params.slow)?;

    let line: Vec<Option<Decimal>> = fast
        .iter()
        .zip(&slow)
        .map(|(f, s)| match (f, s) {
            (Some(f), Some(s)) => Some(*f - *s),
            _ => None,
        })
        .collect();

    // 시그널은 MACD 값이 존재하는 구간에서만 계산
    let offset = line.iter().take_while(|v| v.is_none()).count();
    let defined: Vec<Decimal> = line[offset..].iter().flatten().copied().collect();
    let signal = ema(&defined, params.signal)?;

    let out = line
        .iter()
        .enumerate()
        .map(|(i, m)| {
            let s = i.checked_sub(offset).and_then(|j| signal.get(j).copied().flatten());
            MacdPoint {
                macd: *m,
                signal: s,
                histogram: match (m, s) {
                    (Some(m), Some(s)) => Some(*m - s),
                    _ => None,
                },
            }
        })
        .collect();

    Ok(out)
}
