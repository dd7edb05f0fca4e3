//! 인메모리 [`KvStore`] 구현.
//!
//! 프로세스 내부 상태만 사용하므로 재시작 시 데이터가 사라집니다.
//! 테스트와 Redis 없는 로컬 개발(`--memory-store`)에 사용합니다.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::{FieldMap, KvStore, StoreOp, StoreReply};
use crate::error::Result;

#[derive(Default)]
struct MemoryState {
    records: HashMap<String, FieldMap>,
    /// index -> member -> (score, 삽입 순번)
    indexes: HashMap<String, HashMap<String, (f64, u64)>>,
    seq: u64,
}

impl MemoryState {
    fn write_record(&mut self, key: &str, fields: &[(String, String)]) {
        if fields.is_empty() {
            return;
        }
        let record = self.records.entry(key.to_string()).or_default();
        for (field, value) in fields {
            record.insert(field.clone(), value.clone());
        }
    }

    fn read_record(&self, key: &str) -> Option<FieldMap> {
        self.records.get(key).cloned()
    }

    fn read_fields<S: AsRef<str>>(&self, key: &str, fields: &[S]) -> Vec<Option<String>> {
        let record = self.records.get(key);
        fields
            .iter()
            .map(|f| record.and_then(|r| r.get(f.as_ref()).cloned()))
            .collect()
    }

    fn delete_record(&mut self, key: &str) -> u64 {
        u64::from(self.records.remove(key).is_some())
    }

    fn index_add(&mut self, index: &str, member: &str, score: f64) {
        self.seq += 1;
        let seq = self.seq;
        let members = self.indexes.entry(index.to_string()).or_default();
        match members.get_mut(member) {
            // 기존 멤버는 점수만 갱신하고 순번 유지
            Some(entry) => entry.0 = score,
            None => {
                members.insert(member.to_string(), (score, seq));
            }
        }
    }

    fn index_remove(&mut self, index: &str, member: &str) -> u64 {
        let Some(members) = self.indexes.get_mut(index) else {
            return 0;
        };
        let removed = u64::from(members.remove(member).is_some());
        if members.is_empty() {
            self.indexes.remove(index);
        }
        removed
    }

    /// 점수 오름차순, 동점이면 삽입 순서.
    fn index_range_asc(&self, index: &str) -> Vec<String> {
        let Some(members) = self.indexes.get(index) else {
            return Vec::new();
        };
        let mut entries: Vec<(&String, &(f64, u64))> = members.iter().collect();
        entries.sort_by(|a, b| {
            a.1 .0
                .total_cmp(&b.1 .0)
                .then_with(|| a.1 .1.cmp(&b.1 .1))
        });
        entries.into_iter().map(|(m, _)| m.clone()).collect()
    }

    fn apply(&mut self, op: &StoreOp) -> StoreReply {
        match op {
            StoreOp::WriteRecord { key, fields } => {
                self.write_record(key, fields);
                StoreReply::Done
            }
            StoreOp::ReadRecord { key } => StoreReply::Record(self.read_record(key)),
            StoreOp::ReadFields { key, fields } => {
                StoreReply::Fields(self.read_fields(key, fields.as_slice()))
            }
            StoreOp::DeleteRecord { key } => StoreReply::Removed(self.delete_record(key)),
            StoreOp::IndexAdd {
                index,
                member,
                score,
            } => {
                self.index_add(index, member, *score);
                StoreReply::Done
            }
            StoreOp::IndexRemove { index, member } => {
                StoreReply::Removed(self.index_remove(index, member))
            }
        }
    }
}

/// 인메모리 키-값 저장소.
#[derive(Default)]
pub struct InMemoryStore {
    state: RwLock<MemoryState>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 저장된 레코드 수.
    pub async fn record_count(&self) -> usize {
        self.state.read().await.records.len()
    }
}

#[async_trait]
impl KvStore for InMemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn write_record(&self, key: &str, fields: &[(String, String)]) -> Result<()> {
        self.state.write().await.write_record(key, fields);
        Ok(())
    }

    async fn update_existing(&self, key: &str, fields: &[(String, String)]) -> Result<bool> {
        let mut state = self.state.write().await;
        if !state.records.contains_key(key) {
            return Ok(false);
        }
        state.write_record(key, fields);
        Ok(true)
    }

    async fn read_record(&self, key: &str) -> Result<Option<FieldMap>> {
        Ok(self.state.read().await.read_record(key))
    }

    async fn read_fields(&self, key: &str, fields: &[&str]) -> Result<Vec<Option<String>>> {
        Ok(self.state.read().await.read_fields(key, fields))
    }

    async fn delete_record(&self, key: &str) -> Result<u64> {
        Ok(self.state.write().await.delete_record(key))
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.state.read().await.records.contains_key(key))
    }

    async fn index_add(&self, index: &str, member: &str, score: f64) -> Result<()> {
        self.state.write().await.index_add(index, member, score);
        Ok(())
    }

    async fn index_remove(&self, index: &str, member: &str) -> Result<u64> {
        Ok(self.state.write().await.index_remove(index, member))
    }

    async fn index_range_desc(&self, index: &str) -> Result<Vec<String>> {
        let mut members = self.state.read().await.index_range_asc(index);
        members.reverse();
        Ok(members)
    }

    async fn index_range_asc(&self, index: &str) -> Result<Vec<String>> {
        Ok(self.state.read().await.index_range_asc(index))
    }

    async fn execute(&self, ops: Vec<StoreOp>) -> Result<Vec<StoreReply>> {
        let mut state = self.state.write().await;
        Ok(ops.iter().map(|op| state.apply(op)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[tokio::test]
    async fn test_write_merges_fields() {
        let store = InMemoryStore::new();
        store
            .write_record("task:1", &fields(&[("status", "pending"), ("progress", "0")]))
            .await
            .unwrap();
        store
            .write_record("task:1", &fields(&[("progress", "40")]))
            .await
            .unwrap();

        let record = store.read_record("task:1").await.unwrap().unwrap();
        assert_eq!(record.get("status").map(String::as_str), Some("pending"));
        assert_eq!(record.get("progress").map(String::as_str), Some("40"));
    }

    #[tokio::test]
    async fn test_update_existing_skips_missing_record() {
        let store = InMemoryStore::new();
        let written = store
            .update_existing("task:gone", &fields(&[("progress", "40")]))
            .await
            .unwrap();
        assert!(!written);
        assert_eq!(store.record_count().await, 0);

        store.write_record("task:1", &fields(&[("status", "running")])).await.unwrap();
        assert!(store
            .update_existing("task:1", &fields(&[("progress", "40")]))
            .await
            .unwrap());
        let record = store.read_record("task:1").await.unwrap().unwrap();
        assert_eq!(record["status"], "running");
        assert_eq!(record["progress"], "40");
    }

    #[tokio::test]
    async fn test_read_fields_missing_key() {
        let store = InMemoryStore::new();
        let values = store.read_fields("task:none", &["status"]).await.unwrap();
        assert_eq!(values, vec![None]);
        assert!(!store.exists("task:none").await.unwrap());
    }

    #[tokio::test]
    async fn test_index_ordering_with_ties() {
        let store = InMemoryStore::new();
        store.index_add("idx", "a", 1.0).await.unwrap();
        store.index_add("idx", "b", 3.0).await.unwrap();
        store.index_add("idx", "c", 3.0).await.unwrap();
        store.index_add("idx", "d", 2.0).await.unwrap();

        assert_eq!(store.index_range_asc("idx").await.unwrap(), vec!["a", "d", "b", "c"]);
        assert_eq!(store.index_range_desc("idx").await.unwrap(), vec!["c", "b", "d", "a"]);
    }

    #[tokio::test]
    async fn test_index_readd_updates_score() {
        let store = InMemoryStore::new();
        store.index_add("idx", "a", 1.0).await.unwrap();
        store.index_add("idx", "b", 2.0).await.unwrap();
        store.index_add("idx", "a", 5.0).await.unwrap();

        assert_eq!(store.index_range_desc("idx").await.unwrap(), vec!["a", "b"]);
        assert_eq!(store.index_remove("idx", "a").await.unwrap(), 1);
        assert_eq!(store.index_remove("idx", "a").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_execute_batch_in_order() {
        let store = InMemoryStore::new();
        let replies = store
            .execute(vec![
                StoreOp::WriteRecord {
                    key: "task:1".to_string(),
                    fields: fields(&[("status", "completed")]),
                },
                StoreOp::IndexAdd {
                    index: "idx".to_string(),
                    member: "1".to_string(),
                    score: 1.0,
                },
                StoreOp::ReadFields {
                    key: "task:1".to_string(),
                    fields: vec!["status".to_string(), "error".to_string()],
                },
                StoreOp::DeleteRecord {
                    key: "task:1".to_string(),
                },
                StoreOp::IndexRemove {
                    index: "idx".to_string(),
                    member: "1".to_string(),
                },
                StoreOp::ReadRecord {
                    key: "task:1".to_string(),
                },
            ])
            .await
            .unwrap();

        assert_eq!(replies.len(), 6);
        assert_eq!(replies[0], StoreReply::Done);
        assert_eq!(
            replies[2],
            StoreReply::Fields(vec![Some("completed".to_string()), None])
        );
        assert_eq!(replies[3].removed_count(), 1);
        assert_eq!(replies[4].removed_count(), 1);
        assert_eq!(replies[5], StoreReply::Record(None));
        assert_eq!(store.record_count().await, 0);
    }
}
