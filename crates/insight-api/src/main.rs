//! 시장 분석 API 서버.
//!
//! Axum 기반 REST API 서버를 시작합니다. 작업 저장소(Redis)에 연결하고,
//! 주기적 작업 정리 루프와 백그라운드 작업 실행기를 준비한 뒤 요청을 받습니다.
//!
//! # 플래그
//!
//! - `--memory-store`: Redis 대신 프로세스 내 저장소 사용 (개발용)
//! - `--export-openapi`: OpenAPI 스펙을 stdout으로 출력하고 종료

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::{http::StatusCode, Router};
use tokio_util::sync::CancellationToken;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use insight_analytics::{OpenAiChatClient, StockAnalyzer, TextGenerator};
use insight_api::openapi::openapi_json;
use insight_api::routes::create_api_router;
use insight_api::state::AppState;
use insight_core::{init_logging, AppConfig, LogConfig};
use insight_data::{InMemoryStore, KvStore, RedisStore, YahooProvider};
use insight_tasks::TaskRegistry;

fn has_flag(name: &str) -> bool {
    std::env::args().any(|arg| arg == name)
}

/// 작업 저장소 연결.
///
/// Redis 연결에 실패하면 저장소 없이 시작합니다. 이 경우 분석 작업 API는 503을 반환합니다.
async fn connect_task_store(config: &AppConfig) -> Option<Arc<dyn KvStore>> {
    if has_flag("--memory-store") {
        warn!("Using in-memory task store (development mode, tasks are lost on restart)");
        return Some(Arc::new(InMemoryStore::new()));
    }

    let timeout = Duration::from_secs(config.redis.connection_timeout_secs);
    match RedisStore::connect(&config.redis.url, timeout).await {
        Ok(store) => {
            info!("Connected to Redis task store");
            Some(Arc::new(store))
        }
        Err(e) => {
            error!(error = %e, "Redis connection failed, task endpoints disabled");
            None
        }
    }
}

/// 분석기 생성 (Yahoo Finance + 선택적 LLM).
fn create_analyzer(config: &AppConfig) -> anyhow::Result<StockAnalyzer> {
    let provider = YahooProvider::new().context("failed to create Yahoo Finance provider")?;

    let generator: Option<Arc<dyn TextGenerator>> = match OpenAiChatClient::from_config(&config.llm) {
        Ok(Some(client)) => {
            info!(model = %client.model(), "AI summaries enabled");
            Some(Arc::new(client))
        }
        Ok(None) => None,
        Err(e) => {
            warn!(error = %e, "LLM client initialization failed, AI summaries disabled");
            None
        }
    };

    Ok(StockAnalyzer::new(Arc::new(provider)).with_generator(generator))
}

/// `CORS_ORIGINS`(쉼표 구분)에 나열된 origin만 허용합니다. 비어 있으면 전부 허용.
fn cors_layer() -> CorsLayer {
    use axum::http::{header, HeaderValue, Method};

    let listed: Vec<HeaderValue> = std::env::var("CORS_ORIGINS")
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect();

    let allow_origin = if listed.is_empty() {
        warn!("no CORS origin list configured, any origin is accepted");
        AllowOrigin::any()
    } else {
        info!(origins = listed.len(), "CORS origin list loaded");
        AllowOrigin::list(listed)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
}

fn create_router(state: Arc<AppState>, request_timeout: Duration) -> Router {
    create_api_router()
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            request_timeout,
        ))
        .layer(cors_layer())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env 파일 로드 (있는 경우)
    let _ = dotenvy::dotenv();

    if has_flag("--export-openapi") {
        println!("{}", openapi_json()?);
        return Ok(());
    }

    let config = AppConfig::load_default().context("failed to load configuration")?;

    init_logging(LogConfig::from_settings(&config.logging))
        .map_err(|e| anyhow::anyhow!("failed to initialize logging: {}", e))?;

    info!(version = env!("CARGO_PKG_VERSION"), "starting market insight api");

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .with_context(|| {
            format!(
                "invalid server address {}:{}",
                config.server.host, config.server.port
            )
        })?;

    let registry = Arc::new(match connect_task_store(&config).await {
        Some(store) => TaskRegistry::connect(store, config.tasks.clone()).await,
        None => TaskRegistry::disabled(),
    });

    let analyzer = create_analyzer(&config)?;
    let state = Arc::new(AppState::new(
        Arc::clone(&registry),
        config.tasks.max_in_flight,
        analyzer,
        config.scan.clone(),
    ));

    info!(
        version = %state.version,
        task_store = registry.backend().unwrap_or("disabled"),
        max_in_flight = state.runner.capacity(),
        has_llm = state.has_llm(),
        "Application state initialized"
    );

    let shutdown = CancellationToken::new();
    let sweeper = registry.start_sweeper(config.tasks.sweep_interval(), shutdown.clone());

    let app = create_router(
        state,
        Duration::from_secs(config.server.request_timeout_secs),
    );

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!(%addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(wait_for_signal(shutdown.clone()))
        .await?;

    shutdown.cancel();
    if let Some(handle) = sweeper {
        if tokio::time::timeout(Duration::from_secs(10), handle).await.is_err() {
            warn!("task sweeper did not stop within 10s");
        }
    }

    info!("server stopped");
    Ok(())
}

/// SIGINT/SIGTERM 중 먼저 오는 신호를 기다린 뒤 `shutdown`을 취소합니다.
async fn wait_for_signal(shutdown: CancellationToken) {
    let interrupt = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "cannot listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let received = tokio::select! {
        _ = interrupt => "SIGINT",
        _ = terminate => "SIGTERM",
    };

    warn!(signal = received, "shutting down");
    shutdown.cancel();
}
