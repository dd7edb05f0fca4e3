//! 기술 통계.
//!
//! 수익률/위험 지표는 `f64`로 계산합니다. 입력 종가는 오래된 순입니다.
//! 수익률은 퍼센트(%)가 아닌 비율입니다. 예: 0.05 = 5%.

use chrono::Datelike;
use insight_core::Candle;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

/// 연환산 거래일 수.
pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// 연 무위험 수익률 (2%).
pub const RISK_FREE_RATE: f64 = 0.02;

pub fn to_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(0.0)
}

/// 종가 시계열 (f64).
pub fn closes(candles: &[Candle]) -> Vec<f64> {
    candles.iter().map(|c| to_f64(c.close)).collect()
}

fn simple_return(from: f64, to: f64) -> Option<f64> {
    if from == 0.0 || !from.is_finite() || !to.is_finite() {
        None
    } else {
        Some(to / from - 1.0)
    }
}

/// 최근 `days` 거래일 수익률.
///
/// 데이터가 `days`보다 짧으면 첫 종가부터 계산합니다.
pub fn period_return(closes: &[f64], days: usize) -> Option<f64> {
    let last = *closes.last()?;
    let base = if closes.len() > days {
        closes[closes.len() - days - 1]
    } else {
        closes[0]
    };
    simple_return(base, last)
}

/// 연초 대비 수익률.
///
/// 마지막 캔들과 같은 해의 첫 종가를 기준으로 합니다.
pub fn ytd_return(candles: &[Candle]) -> Option<f64> {
    let last = candles.last()?;
    let year = last.date.year();
    let first = candles
        .iter()
        .find(|c| c.date.year() == year)
        .unwrap_or(&candles[0]);
    simple_return(to_f64(first.close), to_f64(last.close))
}

/// 일간 수익률 (길이 = n - 1).
pub fn daily_returns(closes: &[f64]) -> Vec<f64> {
    closes
        .windows(2)
        .map(|w| simple_return(w[0], w[1]).unwrap_or(0.0))
        .collect()
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// 표본 표준편차 (n - 1).
pub fn std_dev(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    Some(var.sqrt())
}

/// 연환산 변동성.
pub fn annualized_volatility(returns: &[f64]) -> Option<f64> {
    std_dev(returns).map(|s| s * TRADING_DAYS_PER_YEAR.sqrt())
}

/// 최대 낙폭 (0 이하의 비율).
pub fn max_drawdown(closes: &[f64]) -> Option<f64> {
    let mut peak = *closes.first()?;
    let mut worst = 0.0_f64;
    for &price in closes {
        peak = peak.max(price);
        if peak > 0.0 {
            worst = worst.min(price / peak - 1.0);
        }
    }
    Some(worst)
}

fn covariance(a: &[f64], b: &[f64]) -> Option<f64> {
    let n = a.len().min(b.len());
    if n < 2 {
        return None;
    }
    let (a, b) = (&a[..n], &b[..n]);
    let (ma, mb) = (mean(a)?, mean(b)?);
    Some(a.iter().zip(b).map(|(x, y)| (x - ma) * (y - mb)).sum::<f64>() / (n - 1) as f64)
}

/// 베타 = Cov(자산, 기준) / Var(기준). 기준 분산이 0이면 `None`.
pub fn beta(asset: &[f64], benchmark: &[f64]) -> Option<f64> {
    let var = covariance(benchmark, benchmark)?;
    if var == 0.0 {
        return None;
    }
    Some(covariance(asset, benchmark)? / var)
}

/// 연환산 추적 오차.
pub fn tracking_error(asset: &[f64], benchmark: &[f64]) -> Option<f64> {
    let diff: Vec<f64> = asset.iter().zip(benchmark).map(|(a, b)| a - b).collect();
    annualized_volatility(&diff)
}

/// 연환산 샤프 비율.
pub fn sharpe_ratio(returns: &[f64]) -> Option<f64> {
    let std = std_dev(returns)?;
    if std == 0.0 {
        return None;
    }
    let rf_daily = (1.0 + RISK_FREE_RATE).powf(1.0 / TRADING_DAYS_PER_YEAR) - 1.0;
    let excess = (mean(returns)? - rf_daily) * TRADING_DAYS_PER_YEAR;
    Some(excess / (std * TRADING_DAYS_PER_YEAR.sqrt()))
}

/// 두 시계열을 날짜로 맞춘 일간 수익률 쌍.
///
/// 양쪽 모두에 존재하는 날짜만 사용합니다.
pub fn aligned_returns(asset: &[Candle], benchmark: &[Candle]) -> (Vec<f64>, Vec<f64>) {
    let bench: std::collections::HashMap<_, f64> = benchmark
        .iter()
        .map(|c| (c.date.date_naive(), to_f64(c.close)))
        .collect();

    let pairs: Vec<(f64, f64)> = asset
        .iter()
        .filter_map(|c| bench.get(&c.date.date_naive()).map(|b| (to_f64(c.close), *b)))
        .collect();

    let a: Vec<f64> = pairs.iter().map(|p| p.0).collect();
    let b: Vec<f64> = pairs.iter().map(|p| p.1).collect();
    (daily_returns(&a), daily_returns(&b))
}

/// 최근 `days`일 평균 (None 값 제외).
pub fn recent_mean(values: impl DoubleEndedIterator<Item = Option<f64>>, days: usize) -> Option<f64> {
    let recent: Vec<f64> = values.rev().take(days).flatten().collect();
    mean(&recent)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn candle_at(date: DateTime<Utc>, close: f64) -> Candle {
        let close = Decimal::from_f64_retain(close).unwrap();
        Candle {
            date,
            open: close,
            high: close,
            low: close,
            close,
            volume: Decimal::from(100),
            amount: None,
            turnover_rate: None,
        }
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_period_return() {
        let closes = vec![100.0, 110.0, 121.0];
        assert!(approx(period_return(&closes, 1).unwrap(), 0.1));
        assert!(approx(period_return(&closes, 2).unwrap(), 0.21));
        // 데이터 부족 시 첫 종가 기준
        assert!(approx(period_return(&closes, 252).unwrap(), 0.21));
        assert!(period_return(&[], 5).is_none());
        assert!(period_return(&[0.0, 1.0], 1).is_none());
    }

    #[test]
    fn test_ytd_return_uses_current_year() {
        let candles = vec![
            candle_at(Utc.with_ymd_and_hms(2023, 12, 29, 0, 0, 0).unwrap(), 50.0),
            candle_at(Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap(), 100.0),
            candle_at(Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap(), 120.0),
        ];
        assert!(approx(ytd_return(&candles).unwrap(), 0.2));
    }

    #[test]
    fn test_volatility_and_drawdown() {
        assert!(approx(annualized_volatility(&[0.01, 0.01, 0.01]).unwrap(), 0.0));
        assert!(annualized_volatility(&[0.01]).is_none());
        assert!(approx(max_drawdown(&[100.0, 120.0, 90.0, 130.0]).unwrap(), -0.25));
        assert!(approx(max_drawdown(&[1.0, 2.0, 3.0]).unwrap(), 0.0));
    }

    #[test]
    fn test_beta_and_tracking_error() {
        let bench = vec![0.01, -0.02, 0.03, 0.0];
        let asset: Vec<f64> = bench.iter().map(|r| r * 2.0).collect();
        assert!(approx(beta(&asset, &bench).unwrap(), 2.0));
        assert!(approx(tracking_error(&bench, &bench).unwrap(), 0.0));
        assert!(beta(&asset, &[0.0, 0.0, 0.0, 0.0]).is_none());
    }

    #[test]
    fn test_sharpe_ratio_sign() {
        assert!(sharpe_ratio(&[0.01, 0.02, 0.015, 0.012]).unwrap() > 0.0);
        assert!(sharpe_ratio(&[-0.01, -0.02, -0.015, -0.012]).unwrap() < 0.0);
        assert!(sharpe_ratio(&[0.01, 0.01]).is_none());
    }

    #[test]
    fn test_aligned_returns_skips_missing_dates() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let asset: Vec<Candle> = (0..4)
            .map(|i| candle_at(start + Duration::days(i), 100.0 + i as f64))
            .collect();
        let bench = vec![
            candle_at(start, 10.0),
            candle_at(start + Duration::days(1), 11.0),
            candle_at(start + Duration::days(3), 12.1),
        ];
        let (a, b) = aligned_returns(&asset, &bench);
        assert_eq!(a.len(), 2);
        assert_eq!(b.len(), 2);
        assert!(approx(b[0], 0.1));
        assert!(approx(b[1], 0.1));
    }

    #[test]
    fn test_recent_mean() {
        let values = vec![Some(1.0), None, Some(3.0), Some(5.0)];
        assert_eq!(recent_mean(values.clone().into_iter(), 2), Some(4.0));
        assert_eq!(recent_mean(values.into_iter(), 10), Some(3.0));
    }
}
