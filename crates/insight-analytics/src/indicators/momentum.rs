//! 모멘텀 지표.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::{check_period, IndicatorResult};

/// RSI (Wilder 평활, alpha = 1/period).
///
/// 첫 평균 상승/하락폭은 처음 `period`개 변화량의 단순 평균이며,
/// 하락폭 평균이 0이면 100을 반환합니다.
pub fn rsi(prices: &[Decimal], period: usize) -> IndicatorResult<Vec<Option<Decimal>>> {
    check_period(prices.len(), period, period + 1)?;

    let n = Decimal::from(period);
    let changes: Vec<Decimal> = prices.windows(2).map(|w| w[1] - w[0]).collect();

    let gain = |d: &Decimal| (*d).max(Decimal::ZERO);
    let loss = |d: &Decimal| (-*d).max(Decimal::ZERO);

    let mut avg_gain = changes[..period].iter().map(gain).sum::<Decimal>() / n;
    let mut avg_loss = changes[..period].iter().map(loss).sum::<Decimal>() / n;

    let to_rsi = |g: Decimal, l: Decimal| {
        if l.is_zero() {
            dec!(100)
        } else {
            dec!(100) - dec!(100) / (Decimal::ONE + g / l)
        }
    };

    let mut out = vec![None; period];
    out.push(Some(to_rsi(avg_gain, avg_loss)));

    for change in &changes[period..] {
        avg_gain = (avg_gain * (n - Decimal::ONE) + gain(change)) / n;
        avg_loss = (avg_loss * (n - Decimal::ONE) + loss(change)) / n;
        out.push(Some(to_rsi(avg_gain, avg_loss)));
    }

    Ok(out)
}
