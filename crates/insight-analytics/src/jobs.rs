//! 분석 작업 요청과 작업 단위.
//!
//! 각 `run_*` 함수는 [`JobRunner::spawn`](insight_tasks::JobRunner::spawn)에 넘기는
//! 작업 단위이며, 단계마다 진행률을 기록하고 취소를 확인합니다.

use futures::stream::{self, StreamExt};
use insight_core::{MarketType, ScanConfig};
use insight_data::HistoryPeriod;
use insight_tasks::{JobContext, JobError};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::error::{AnalysisError, AnalysisResult};
use crate::scoring::QuickReport;
use crate::stock::StockAnalyzer;

/// 상세 종목 분석 조회 기간.
const STOCK_PERIOD: HistoryPeriod = HistoryPeriod::OneYear;

fn require_code(field: &str, value: &str) -> AnalysisResult<String> {
    let code = value.trim();
    if code.is_empty() {
        return Err(AnalysisError::InvalidInput(format!("{} is required", field)));
    }
    Ok(code.to_string())
}

// =============================================================================
// 요청
// =============================================================================

/// 종목 분석 요청.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StockAnalysisRequest {
    #[serde(default)]
    pub stock_code: String,
    #[serde(default)]
    pub market_type: MarketType,
}

impl StockAnalysisRequest {
    pub fn validate(self) -> AnalysisResult<Self> {
        Ok(Self {
            stock_code: require_code("stock_code", &self.stock_code)?,
            ..self
        })
    }

    pub fn task_name(&self) -> String {
        format!("Analysis for {}", self.stock_code)
    }

    pub fn params(&self) -> Value {
        json!({ "stock_code": self.stock_code, "market_type": self.market_type })
    }
}

/// 시장 스캔 요청.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MarketScanRequest {
    #[serde(default, alias = "stock_list")]
    pub symbols: Vec<String>,
    #[serde(default)]
    pub min_score: Option<u8>,
    #[serde(default)]
    pub market_type: MarketType,
}

/// 검증된 스캔 계획.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanPlan {
    pub symbols: Vec<String>,
    pub min_score: u8,
    pub market_type: MarketType,
    pub concurrency: usize,
}

impl MarketScanRequest {
    /// 빈 코드를 제거하고 최대 종목 수로 자릅니다.
    pub fn into_plan(self, config: &ScanConfig) -> AnalysisResult<ScanPlan> {
        let mut symbols: Vec<String> = self
            .symbols
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();

        if symbols.is_empty() {
            return Err(AnalysisError::InvalidInput("stock list is required".to_string()));
        }
        if symbols.len() > config.max_symbols {
            warn!(
                requested = symbols.len(),
                limit = config.max_symbols,
                "Stock list too long, truncating"
            );
            symbols.truncate(config.max_symbols);
        }

        Ok(ScanPlan {
            symbols,
            min_score: self.min_score.unwrap_or(config.default_min_score).min(100),
            market_type: self.market_type,
            concurrency: config.concurrency.max(1),
        })
    }
}

impl ScanPlan {
    pub fn params(&self) -> Value {
        json!({
            "stock_list_count": self.symbols.len(),
            "min_score": self.min_score,
            "market_type": self.market_type,
        })
    }
}

/// ETF 분석 요청.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EtfAnalysisRequest {
    #[serde(default)]
    pub etf_code: String,
    #[serde(default)]
    pub market_type: MarketType,
    #[serde(default)]
    pub period: Option<String>,
}

/// 검증된 ETF 분석 요청.
#[derive(Debug, Clone, PartialEq)]
pub struct EtfPlan {
    pub etf_code: String,
    pub market_type: MarketType,
    pub period: HistoryPeriod,
}

impl EtfAnalysisRequest {
    pub fn into_plan(self) -> AnalysisResult<EtfPlan> {
        let period = match self.period.as_deref().map(str::trim) {
            None | Some("") => HistoryPeriod::default(),
            Some(raw) => raw
                .parse()
                .map_err(|_| AnalysisError::InvalidInput(format!("unsupported period: {}", raw)))?,
        };
        Ok(EtfPlan {
            etf_code: require_code("etf_code", &self.etf_code)?,
            market_type: self.market_type,
            period,
        })
    }
}

impl EtfPlan {
    pub fn task_name(&self) -> String {
        format!("ETF Analysis for {}", self.etf_code)
    }

    pub fn params(&self) -> Value {
        json!({
            "etf_code": self.etf_code,
            "market_type": self.market_type,
            "period": self.period,
        })
    }
}

// =============================================================================
// 작업 단위
// =============================================================================

/// 상세 종목 분석.
pub async fn run_stock_analysis(
    ctx: JobContext,
    analyzer: StockAnalyzer,
    request: StockAnalysisRequest,
) -> Result<Value, JobError> {
    let code = &request.stock_code;

    ctx.report_progress(20, "fetching market data").await?;
    let candles = analyzer.fetch(code, request.market_type, STOCK_PERIOD).await?;

    ctx.report_progress(50, "computing indicators").await?;
    let mut report = analyzer.build_report(code, request.market_type, &candles)?;

    if analyzer.generator().is_some() {
        ctx.report_progress(80, "generating AI summary").await?;
        report.ai_summary = analyzer.summarize(&report).await;
    }

    ctx.checkpoint().await?;
    info!(stock_code = %code, score = report.summary.score, "Stock analysis finished");
    Ok(serde_json::to_value(report)?)
}

/// 시장 스캔.
///
/// 종목별 빠른 분석을 최대 `concurrency`개씩 동시에 실행하고, 완료될 때마다
/// 진행률을 기록합니다. 실패한 종목은 건너뛰며 결과는 점수 내림차순입니다.
pub async fn run_market_scan(
    ctx: JobContext,
    analyzer: StockAnalyzer,
    plan: ScanPlan,
) -> Result<Value, JobError> {
    let total = plan.symbols.len();
    let market = plan.market_type;

    let mut analyses = stream::iter(plan.symbols.into_iter().map(|symbol| {
        let analyzer = analyzer.clone();
        async move {
            let outcome = analyzer.quick_analyze(&symbol, market).await;
            (symbol, outcome)
        }
    }))
    .buffer_unordered(plan.concurrency);

    let mut matches: Vec<QuickReport> = Vec::new();
    let mut completed = 0usize;
    let mut failed = 0usize;

    while let Some((symbol, outcome)) = analyses.next().await {
        match outcome {
            Ok(report) if report.score >= plan.min_score => matches.push(report),
            Ok(_) => {}
            Err(e) => {
                failed += 1;
                warn!(symbol = %symbol, error = %e, "Market scan: analysis failed");
            }
        }

        completed += 1;
        let progress = (completed * 100 / total) as u8;
        ctx.report_progress(progress, &format!("analyzed {}/{}", completed, total))
            .await?;
    }

    matches.sort_by(|a, b| b.score.cmp(&a.score));
    info!(
        total,
        matched = matches.len(),
        failed,
        "Market scan finished"
    );
    Ok(serde_json::to_value(matches)?)
}

/// ETF 분석.
pub async fn run_etf_analysis(
    ctx: JobContext,
    analyzer: StockAnalyzer,
    plan: EtfPlan,
) -> Result<Value, JobError> {
    ctx.report_progress(20, "fetching ETF history").await?;
    let candles = analyzer
        .fetch(&plan.etf_code, plan.market_type, plan.period)
        .await?;

    ctx.report_progress(40, "fetching benchmark").await?;
    let benchmark = analyzer
        .fetch_benchmark(plan.market_type, plan.period, &candles)
        .await;

    ctx.report_progress(60, "computing performance and risk").await?;
    let mut report = analyzer.build_etf_report(
        &plan.etf_code,
        plan.market_type,
        plan.period,
        &candles,
        benchmark.as_deref(),
    )?;

    if analyzer.generator().is_some() {
        ctx.report_progress(80, "generating AI summary").await?;
        report.ai_summary = analyzer.summarize_etf(&report).await;
    }

    ctx.checkpoint().await?;
    info!(etf_code = %plan.etf_code, "ETF analysis finished");
    Ok(serde_json::to_value(report)?)
}
