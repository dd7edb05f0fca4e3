//! # Insight Core
//!
//! 시장 분석 백엔드의 핵심 도메인 모델 및 공통 인프라를 제공합니다.
//!
//! 이 크레이트는 다른 모든 크레이트에서 사용되는 기본 타입을 제공합니다:
//! - 비동기 작업(Task) 레코드와 상태 머신
//! - 캔들 데이터 및 시장 구분
//! - 설정 관리
//! - 로깅 인프라
//! - 공통 에러 타입

pub mod config;
pub mod domain;
pub mod error;
pub mod logging;

pub use config::*;
pub use domain::*;
pub use error::*;
pub use logging::*;
