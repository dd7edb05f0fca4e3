//! 모든 핸들러에서 공유되는 애플리케이션 상태.
//!
//! AppState는 Arc로 래핑되어 Axum의 State extractor를 통해 핸들러에 주입됩니다.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use insight_analytics::StockAnalyzer;
use insight_core::ScanConfig;
use insight_tasks::{JobRunner, TaskRegistry};

/// 애플리케이션 공유 상태.
#[derive(Clone)]
pub struct AppState {
    /// 작업 레지스트리 - 작업 레코드 생성/조회/취소/정리
    pub registry: Arc<TaskRegistry>,

    /// 백그라운드 작업 실행기 - 동시 실행 수 제한과 취소 토큰 관리
    pub runner: Arc<JobRunner>,

    /// 종목/ETF 분석기 (데이터 제공자 + 선택적 LLM)
    pub analyzer: StockAnalyzer,

    /// 시장 스캔 설정
    pub scan: ScanConfig,

    /// 서버 시작 시간 (업타임 계산용)
    pub started_at: DateTime<Utc>,

    /// API 버전
    pub version: String,
}

impl AppState {
    /// 새로운 AppState 생성.
    ///
    /// # 인자
    /// * `registry` - 작업 레지스트리 (비활성일 수 있음)
    /// * `max_in_flight` - 동시에 실행 가능한 작업 수
    /// * `analyzer` - 분석기
    /// * `scan` - 시장 스캔 설정
    pub fn new(
        registry: Arc<TaskRegistry>,
        max_in_flight: usize,
        analyzer: StockAnalyzer,
        scan: ScanConfig,
    ) -> Self {
        let runner = Arc::new(JobRunner::new(Arc::clone(&registry), max_in_flight));
        Self {
            registry,
            runner,
            analyzer,
            scan,
            started_at: Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// 서버 업타임 (초).
    pub fn uptime_secs(&self) -> i64 {
        (Utc::now() - self.started_at).num_seconds()
    }

    /// AI 요약 사용 가능 여부.
    pub fn has_llm(&self) -> bool {
        self.analyzer.generator().is_some()
    }
}

/// 테스트용 AppState (인메모리 저장소, 빈 데이터 제공자).
#[cfg(any(test, feature = "test-utils"))]
pub async fn create_test_state() -> AppState {
    use insight_data::{InMemoryStore, StaticProvider};

    let registry = TaskRegistry::connect(
        Arc::new(InMemoryStore::new()),
        insight_core::TaskSettings::default(),
    )
    .await;
    AppState::new(
        Arc::new(registry),
        4,
        StockAnalyzer::new(Arc::new(StaticProvider::new())),
        ScanConfig::default(),
    )
}

/// 저장소가 없는 테스트용 AppState.
#[cfg(any(test, feature = "test-utils"))]
pub fn create_disabled_test_state() -> AppState {
    use insight_data::StaticProvider;

    AppState::new(
        Arc::new(TaskRegistry::disabled()),
        4,
        StockAnalyzer::new(Arc::new(StaticProvider::new())),
        ScanConfig::default(),
    )
}
