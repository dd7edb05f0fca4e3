//! 로깅 초기화.
//!
//! `RUST_LOG`가 있으면 그 필터를, 없으면 설정 파일의 레벨을 사용합니다.
//! 출력 형식은 `pretty`(개발), `json`(로그 수집), `compact`(한 줄) 중 하나입니다.

use std::fmt;
use std::str::FromStr;

use tracing_subscriber::{
    fmt::format::FmtSpan, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer,
    Registry,
};

use crate::config::LoggingConfig;

/// 로그 출력 형식.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
    Compact,
}

impl LogFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogFormat::Pretty => "pretty",
            LogFormat::Json => "json",
            LogFormat::Compact => "compact",
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [LogFormat::Pretty, LogFormat::Json, LogFormat::Compact]
            .into_iter()
            .find(|format| format.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unsupported log format '{}'", s))
    }
}

/// subscriber 설치 옵션.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// EnvFilter 지시문 (예: `info,insight_tasks=debug`)
    pub filter: String,
    pub format: LogFormat,
    /// span 생성/종료 시점도 기록 (작업 실행 시간 확인용)
    pub span_events: bool,
    /// ANSI 색상 사용
    pub ansi: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            format: LogFormat::default(),
            span_events: false,
            ansi: true,
        }
    }
}

impl LogConfig {
    pub fn new(filter: impl Into<String>) -> Self {
        Self {
            filter: filter.into(),
            ..Default::default()
        }
    }

    pub fn format(mut self, format: LogFormat) -> Self {
        // 수집기로 보내는 JSON에는 색상 코드가 섞이면 안 됨
        self.ansi = format != LogFormat::Json;
        self.format = format;
        self
    }

    pub fn span_events(mut self, enabled: bool) -> Self {
        self.span_events = enabled;
        self
    }

    /// 설정 파일의 `logging` 섹션에서 생성합니다. `LOG_FORMAT` 환경 변수가 우선합니다.
    ///
    /// 알 수 없는 형식 이름은 `pretty`로 처리합니다.
    pub fn from_settings(settings: &LoggingConfig) -> Self {
        let format = std::env::var("LOG_FORMAT")
            .unwrap_or_else(|_| settings.format.clone())
            .parse()
            .unwrap_or_default();

        Self::new(settings.level.clone()).format(format)
    }
}

/// 전역 subscriber를 설치합니다. 두 번째 호출은 에러를 반환합니다.
///
/// ```no_run
/// use insight_core::logging::{init_logging, LogConfig, LogFormat};
///
/// init_logging(LogConfig::new("debug").format(LogFormat::Json)).unwrap();
/// ```
pub fn init_logging(config: LogConfig) -> Result<(), Box<dyn std::error::Error>> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.filter)?,
    };

    let spans = if config.span_events {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };
    let layer = tracing_subscriber::fmt::layer()
        .with_ansi(config.ansi)
        .with_target(true)
        .with_span_events(spans);

    let output: Box<dyn Layer<Registry> + Send + Sync> = match config.format {
        LogFormat::Pretty => layer.pretty().boxed(),
        LogFormat::Json => layer.json().with_current_span(true).boxed(),
        LogFormat::Compact => layer.compact().boxed(),
    };

    tracing_subscriber::registry()
        .with(output)
        .with(filter)
        .try_init()?;

    tracing::debug!(format = %config.format, filter = %config.filter, "tracing subscriber installed");
    Ok(())
}

/// `task_id` 필드를 가진 info 레벨 span.
///
/// ```ignore
/// let span = task_span!("job", task_id);
/// let span = task_span!("job", task_id, "market_scan");
/// ```
#[macro_export]
macro_rules! task_span {
    ($name:expr, $task_id:expr) => {
        tracing::info_span!($name, task_id = %$task_id)
    };
    ($name:expr, $task_id:expr, $kind:expr) => {
        tracing::info_span!($name, task_id = %$task_id, kind = %$kind)
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_parsing() {
        assert_eq!("pretty".parse::<LogFormat>().unwrap(), LogFormat::Pretty);
        assert_eq!(" JSON ".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("compact".parse::<LogFormat>().unwrap(), LogFormat::Compact);
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_json_format_disables_ansi() {
        let config = LogConfig::new("debug").format(LogFormat::Json).span_events(true);
        assert_eq!(config.filter, "debug");
        assert_eq!(config.format, LogFormat::Json);
        assert!(!config.ansi);
        assert!(config.span_events);

        assert!(LogConfig::new("info").format(LogFormat::Compact).ansi);
    }

    #[test]
    fn test_from_settings_falls_back_to_pretty() {
        let settings = LoggingConfig {
            level: "warn".to_string(),
            format: "yaml".to_string(),
        };
        if std::env::var("LOG_FORMAT").is_err() {
            let config = LogConfig::from_settings(&settings);
            assert_eq!(config.filter, "warn");
            assert_eq!(config.format, LogFormat::Pretty);
        }
    }
}
