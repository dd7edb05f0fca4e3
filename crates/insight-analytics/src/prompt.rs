//! AI 요약 프롬프트.
//!
//! 프롬프트에는 계산된 수치만 넣고, 모델이 외부 지식을 쓰지 않도록 지시합니다.

use std::fmt::Write;

use crate::etf::EtfReport;
use crate::stock::{PeriodReturns, StockReport};

/// 공통 시스템 지시.
pub const SYSTEM_PROMPT: &str = "You are a financial market analyst. \
Base your analysis strictly on the data provided by the user and do not use outside knowledge. \
Be concise and state risks explicitly.";

fn fmt_opt<T: std::fmt::Display>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "N/A".to_string())
}

fn fmt_pct(value: Option<f64>) -> String {
    value
        .map(|v| format!("{:.2}%", v))
        .unwrap_or_else(|| "N/A".to_string())
}

fn write_returns(out: &mut String, label: &str, r: &PeriodReturns) {
    let _ = writeln!(
        out,
        "{}: 1W {}, 1M {}, 3M {}, 1Y {}, YTD {}",
        label,
        fmt_pct(r.week_1),
        fmt_pct(r.month_1),
        fmt_pct(r.month_3),
        fmt_pct(r.year_1),
        fmt_pct(r.ytd),
    );
}

/// 종목 분석 프롬프트.
pub fn stock_prompt(report: &StockReport) -> String {
    let s = &report.summary;
    let i = &report.indicators;
    let mut out = String::new();

    let _ = writeln!(
        out,
        "Write an investment analysis for {} ({}, market {}) as of {}.",
        s.stock_code, s.symbol, report.market_type, report.last_date
    );
    let _ = writeln!(
        out,
        "Price: {} ({:+.2}% on the day). Technical score: {}/100.",
        s.price, s.price_change, s.score
    );
    write_returns(&mut out, "Returns", &report.returns);
    let _ = writeln!(
        out,
        "MA5 {}, MA20 {}, MA60 {}; RSI14 {}; MACD {} / signal {} / hist {}.",
        fmt_opt(i.ma5.map(|v| v.round_dp(3))),
        fmt_opt(i.ma20.map(|v| v.round_dp(3))),
        fmt_opt(i.ma60.map(|v| v.round_dp(3))),
        fmt_opt(i.rsi14.map(|v| v.round_dp(2))),
        fmt_opt(i.macd.map(|v| v.round_dp(4))),
        fmt_opt(i.macd_signal.map(|v| v.round_dp(4))),
        fmt_opt(i.macd_hist.map(|v| v.round_dp(4))),
    );
    let _ = writeln!(
        out,
        "Annualized volatility {}, max drawdown {}, Sharpe {}.",
        fmt_opt(report.risk.annualized_volatility),
        fmt_opt(report.risk.max_drawdown),
        fmt_opt(report.risk.sharpe_ratio),
    );
    out.push_str(
        "Cover: 1) trend and momentum, 2) key risks, 3) a conclusion in under 50 words.",
    );
    out
}

/// ETF 분석 프롬프트.
pub fn etf_prompt(report: &EtfReport) -> String {
    let perf = &report.market_performance;
    let risk = &report.risk_and_tracking;
    let mut out = String::new();

    let _ = writeln!(
        out,
        "Write a comprehensive investment report for ETF {} ({}), period {}.",
        report.etf_code, report.symbol, report.period
    );
    write_returns(&mut out, "ETF returns", &perf.returns);
    if let Some(alpha) = &perf.alpha {
        write_returns(&mut out, &format!("Excess return vs {}", perf.benchmark_symbol), alpha);
    }
    let _ = writeln!(
        out,
        "Average daily traded value (1M): {}. RSI14 {}, MA20 {}, MA60 {}.",
        fmt_opt(perf.liquidity.avg_daily_amount),
        fmt_opt(perf.tech_indicators.rsi14.map(|v| v.round_dp(2))),
        fmt_opt(perf.tech_indicators.ma20.map(|v| v.round_dp(3))),
        fmt_opt(perf.tech_indicators.ma60.map(|v| v.round_dp(3))),
    );
    let _ = writeln!(
        out,
        "Estimated net inflow (volume proxy): 1W {:.0}, 1M {:.0}, 3M {:.0}.",
        report.fund_flow.week_1, report.fund_flow.month_1, report.fund_flow.month_3
    );
    let _ = writeln!(
        out,
        "Annualized volatility {}, beta {}, tracking error {}, Sharpe {}.",
        fmt_opt(risk.annualized_volatility),
        fmt_opt(risk.beta),
        fmt_opt(risk.tracking_error),
        fmt_opt(risk.sharpe_ratio),
    );
    out.push_str(
        "Cover: 1) core strengths, 2) potential risks, 3) outlook, 4) a conclusion in under 50 words.",
    );
    out
}
