//! 변동성 지표.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{check_period, sma, IndicatorResult};

/// 한 시점의 볼린저 밴드.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BollingerPoint {
    pub upper: Decimal,
    pub middle: Decimal,
    pub lower: Decimal,
}

/// 볼린저 밴드 (중심선 SMA, 모표준편차 × `width`).
pub fn bollinger_bands(
    prices: &[Decimal],
    period: usize,
    width: Decimal,
) -> IndicatorResult<Vec<Option<BollingerPoint>>> {
    check_period(prices.len(), period, period)?;
    let middle = sma(prices, period)?;
    let n = Decimal::from(period);

    let out = middle
        .iter()
        .enumerate()
        .map(|(i, m)| {
            let m = (*m)?;
            let window = &prices[i + 1 - period..=i];
            let variance = window.iter().map(|p| (*p - m) * (*p - m)).sum::<Decimal>() / n;
            let std = Decimal::from_f64_retain(variance.to_f64()?.sqrt())?;
            Some(BollingerPoint {
                upper: m + std * width,
                middle: m,
                lower: m - std * width,
            })
        })
        .collect();

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_bollinger_flat_series() {
        let prices = vec![dec!(5); 25];
        let bands = bollinger_bands(&prices, 20, dec!(2)).unwrap();
        assert!(bands[18].is_none());
        let last = bands[24].unwrap();
        assert_eq!(last.upper, dec!(5));
        assert_eq!(last.lower, dec!(5));
    }

    #[test]
    fn test_bollinger_width() {
        // 평균 3, 모분산 2 → 표준편차 √2
        let prices = vec![dec!(1), dec!(2), dec!(3), dec!(4), dec!(5)];
        let last = bollinger_bands(&prices, 5, dec!(2)).unwrap()[4].unwrap();
        assert_eq!(last.middle, dec!(3));
        assert!(last.upper > dec!(5.8) && last.upper < dec!(5.9));
        assert!(last.lower > dec!(0.1) && last.lower < dec!(0.2));
    }
}
