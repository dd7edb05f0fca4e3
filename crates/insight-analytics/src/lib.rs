//! 종목/ETF 분석 엔진.
//!
//! 이 크레이트는 다음을 제공합니다:
//! - 기술적 지표 (SMA, EMA, MACD, RSI, 볼린저 밴드)
//! - 수익률/리스크 통계
//! - 빠른 점수 산정과 상세 리포트
//! - LLM 요약 클라이언트
//! - 작업 실행기에서 돌아가는 분석 작업
//!
//! # Re-exports
//!
//! - [`jobs`]: 분석 요청 검증과 `run_*` 작업 단위
//! - [`stock`]: [`StockAnalyzer`]와 종목 리포트
//! - [`etf`]: ETF 리포트

pub mod error;
pub mod etf;
pub mod indicators;
pub mod jobs;
pub mod llm;
pub mod prompt;
pub mod scoring;
pub mod statistics;
pub mod stock;

pub use error::{AnalysisError, AnalysisResult};
pub use etf::EtfReport;
pub use jobs::{
    run_etf_analysis, run_market_scan, run_stock_analysis, EtfAnalysisRequest, EtfPlan,
    MarketScanRequest, ScanPlan, StockAnalysisRequest,
};
pub use llm::{OpenAiChatClient, TextGenerator};
pub use scoring::{QuickReport, Recommendation, TechnicalSnapshot};
pub use stock::{StockAnalyzer, StockReport};
