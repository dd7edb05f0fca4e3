//! 도메인 모델.
//!
//! - [`task`]: 비동기 작업 레코드와 상태 머신
//! - [`market_data`]: 캔들 데이터와 시장 구분

pub mod market_data;
pub mod task;

pub use market_data::{Candle, MarketType};
pub use task::{Task, TaskStatus, TaskUpdate};
