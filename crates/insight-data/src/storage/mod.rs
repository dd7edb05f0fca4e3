//! 키-값 저장소 계약.
//!
//! 작업 레지스트리는 저장소를 다음 두 가지 원시 연산 묶음으로만 사용합니다:
//! - 해시형 레코드: 키 아래에 이름 있는 문자열 필드 집합을 저장 (만료 없음)
//! - 정렬 인덱스: 점수(score) 기준으로 멤버를 정렬하는 집합
//!
//! [`KvStore::execute`]는 여러 연산을 한 번에 전송하는 배치 실행입니다.
//! 효율을 위한 것이며 원자성은 보장하지 않습니다.

pub mod memory;
pub mod redis;

use async_trait::async_trait;
use std::collections::HashMap;

use crate::error::Result;

/// 레코드 필드 맵.
pub type FieldMap = HashMap<String, String>;

/// 배치로 실행할 단일 연산.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreOp {
    /// 필드 upsert
    WriteRecord {
        key: String,
        fields: Vec<(String, String)>,
    },
    /// 전체 필드 조회
    ReadRecord { key: String },
    /// 지정 필드 조회
    ReadFields { key: String, fields: Vec<String> },
    /// 레코드 삭제
    DeleteRecord { key: String },
    /// 인덱스에 멤버 추가 (이미 있으면 점수 갱신)
    IndexAdd {
        index: String,
        member: String,
        score: f64,
    },
    /// 인덱스에서 멤버 제거
    IndexRemove { index: String, member: String },
}

/// 배치 연산 결과. 요청한 연산과 같은 순서로 반환됩니다.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreReply {
    /// 반환값이 없는 연산 (WriteRecord, IndexAdd)
    Done,
    /// ReadRecord 결과. 레코드가 없으면 `None`
    Record(Option<FieldMap>),
    /// ReadFields 결과. 요청 필드 순서와 동일
    Fields(Vec<Option<String>>),
    /// DeleteRecord / IndexRemove 결과 (제거된 개수)
    Removed(u64),
}

impl StoreReply {
    /// Removed 응답의 개수. 다른 응답은 0.
    pub fn removed_count(&self) -> u64 {
        match self {
            StoreReply::Removed(n) => *n,
            _ => 0,
        }
    }

    /// Record 응답을 꺼냅니다.
    pub fn into_record(self) -> Option<FieldMap> {
        match self {
            StoreReply::Record(record) => record,
            _ => None,
        }
    }

    /// Fields 응답을 꺼냅니다.
    pub fn into_fields(self) -> Vec<Option<String>> {
        match self {
            StoreReply::Fields(values) => values,
            _ => Vec::new(),
        }
    }
}

/// 키-값 저장소.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// 저장소 종류 (로그/헬스 체크용).
    fn backend(&self) -> &'static str;

    /// 연결 상태를 확인합니다.
    async fn ping(&self) -> Result<()>;

    /// 키 아래에 필드들을 upsert합니다.
    async fn write_record(&self, key: &str, fields: &[(String, String)]) -> Result<()>;

    /// 레코드가 이미 있을 때만 필드를 기록합니다. 존재 확인과 기록은 원자적입니다.
    ///
    /// 기록했으면 `true`, 레코드가 없어서 건너뛰었으면 `false`.
    async fn update_existing(&self, key: &str, fields: &[(String, String)]) -> Result<bool>;

    /// 키의 모든 필드를 읽습니다. 없으면 `None`.
    async fn read_record(&self, key: &str) -> Result<Option<FieldMap>>;

    /// 지정 필드만 읽습니다. 결과는 `fields`와 같은 순서입니다.
    async fn read_fields(&self, key: &str, fields: &[&str]) -> Result<Vec<Option<String>>>;

    /// 레코드를 삭제하고 제거된 개수를 반환합니다.
    async fn delete_record(&self, key: &str) -> Result<u64>;

    /// 키 존재 여부.
    async fn exists(&self, key: &str) -> Result<bool>;

    /// 인덱스에 멤버를 추가합니다.
    async fn index_add(&self, index: &str, member: &str, score: f64) -> Result<()>;

    /// 인덱스에서 멤버를 제거하고 제거된 개수를 반환합니다.
    async fn index_remove(&self, index: &str, member: &str) -> Result<u64>;

    /// 점수 내림차순으로 전체 멤버를 반환합니다.
    async fn index_range_desc(&self, index: &str) -> Result<Vec<String>>;

    /// 점수 오름차순으로 전체 멤버를 반환합니다.
    async fn index_range_asc(&self, index: &str) -> Result<Vec<String>>;

    /// 여러 연산을 한 번의 왕복으로 실행합니다.
    async fn execute(&self, ops: Vec<StoreOp>) -> Result<Vec<StoreReply>>;
}
