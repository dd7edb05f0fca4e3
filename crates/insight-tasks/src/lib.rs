//! 비동기 작업 레지스트리와 백그라운드 작업 실행기.
//!
//! - [`TaskRegistry`]: 키-값 저장소에 작업 레코드를 생성/조회/갱신/삭제하고
//!   오래된 작업을 주기적으로 정리합니다.
//! - [`JobRunner`]: 작업 단위를 분리된 tokio 태스크에서 실행하고 결과를
//!   레지스트리에 기록합니다. 동시 실행 수는 세마포어로 제한됩니다.

pub mod codec;
pub mod error;
pub mod registry;
pub mod runner;

pub use error::JobError;
pub use registry::{CancelOutcome, SweepReport, TaskRegistry};
pub use runner::{JobContext, JobRunner};

/// 사용자 취소 시 기록되는 에러 메시지.
pub const CANCELLED_BY_USER: &str = "cancelled by user";
