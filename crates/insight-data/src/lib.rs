//! 데이터 저장소 및 시장 데이터 제공자.
//!
//! 이 crate는 다음을 제공합니다:
//! - 작업 레지스트리가 사용하는 키-값 저장소 계약 ([`KvStore`])
//!   - Redis 구현 ([`RedisStore`])
//!   - 인메모리 구현 ([`InMemoryStore`], 테스트 및 개발용)
//! - 시장 데이터 제공자 계약 ([`MarketDataProvider`])
//!   - Yahoo Finance 구현 ([`YahooProvider`])
//!   - 고정 데이터 구현 ([`StaticProvider`])

pub mod error;
pub mod provider;
pub mod storage;

pub use error::{DataError, Result};

pub use storage::memory::InMemoryStore;
pub use storage::redis::RedisStore;
pub use storage::{FieldMap, KvStore, StoreOp, StoreReply};

pub use provider::memory::StaticProvider;
pub use provider::yahoo::YahooProvider;
pub use provider::{to_yahoo_symbol, HistoryPeriod, MarketDataProvider};
