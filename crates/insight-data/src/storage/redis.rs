//! Redis 기반 [`KvStore`] 구현.
//!
//! 레코드는 Redis 해시(HSET/HGETALL)로, 인덱스는 정렬 집합(ZADD/ZREVRANGE)으로
//! 저장합니다. [`KvStore::execute`]는 하나의 파이프라인으로 전송됩니다.

use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands, Client, Value};
use std::time::Duration;
use tracing::{debug, info, instrument};

use super::{FieldMap, KvStore, StoreOp, StoreReply};
use crate::error::{DataError, Result};

/// Redis 연결 래퍼.
///
/// `ConnectionManager`는 끊어진 연결을 자동으로 재수립하며 복제 비용이 낮아
/// 요청마다 복제해서 사용합니다.
#[derive(Clone)]
pub struct RedisStore {
    manager: ConnectionManager,
}

impl RedisStore {
    /// Redis에 연결합니다.
    ///
    /// `timeout` 안에 연결되지 않으면 [`DataError::Timeout`]을 반환합니다.
    pub async fn connect(url: &str, timeout: Duration) -> Result<Self> {
        info!("Connecting to Redis task store...");

        let client = Client::open(url).map_err(|e| DataError::ConnectionError(e.to_string()))?;

        let manager = tokio::time::timeout(timeout, ConnectionManager::new(client))
            .await
            .map_err(|_| DataError::Timeout(format!("Redis 연결 시간 초과 ({}s)", timeout.as_secs())))??;

        info!("Redis task store connection established");
        Ok(Self { manager })
    }

    fn conn(&self) -> ConnectionManager {
        self.manager.clone()
    }
}

/// 키가 있을 때만 HMSET. 삭제된 작업의 부분 해시가 다시 생기지 않도록 합니다.
const UPDATE_EXISTING_SCRIPT: &str = r#"
if redis.call('EXISTS', KEYS[1]) == 0 then
    return 0
end
redis.call('HMSET', KEYS[1], unpack(ARGV))
return 1
"#;

/// 파이프라인 응답 값을 요청 연산에 맞는 [`StoreReply`]로 변환합니다.
fn decode_reply(op: &StoreOp, value: &Value) -> Result<StoreReply> {
    let reply = match op {
        StoreOp::WriteRecord { .. } | StoreOp::IndexAdd { .. } => StoreReply::Done,
        StoreOp::ReadRecord { .. } => {
            let record: FieldMap = redis::from_redis_value(value)?;
            StoreReply::Record(if record.is_empty() { None } else { Some(record) })
        }
        StoreOp::ReadFields { .. } => StoreReply::Fields(redis::from_redis_value(value)?),
        StoreOp::DeleteRecord { .. } | StoreOp::IndexRemove { .. } => {
            StoreReply::Removed(redis::from_redis_value(value)?)
        }
    };
    Ok(reply)
}

#[async_trait]
impl KvStore for RedisStore {
    fn backend(&self) -> &'static str {
        "redis"
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self.conn();
        let pong: String = redis::cmd("PING").query_async(&mut conn).await?;
        if pong == "PONG" {
            Ok(())
        } else {
            Err(DataError::StoreError(format!("unexpected PING reply: {}", pong)))
        }
    }

    #[instrument(skip(self, fields), fields(count = fields.len()))]
    async fn write_record(&self, key: &str, fields: &[(String, String)]) -> Result<()> {
        if fields.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn();
        // HMSET: Redis 3.x 서버와 호환
        let _: () = conn.hset_multiple(key, fields).await?;
        Ok(())
    }

    #[instrument(skip(self, fields), fields(count = fields.len()))]
    async fn update_existing(&self, key: &str, fields: &[(String, String)]) -> Result<bool> {
        if fields.is_empty() {
            return self.exists(key).await;
        }
        let script = redis::Script::new(UPDATE_EXISTING_SCRIPT);
        let mut invocation = script.key(key);
        for (field, value) in fields {
            invocation.arg(field).arg(value);
        }

        let mut conn = self.conn();
        let written: i64 = invocation.invoke_async(&mut conn).await?;
        if written == 0 {
            debug!(key, "record missing, update skipped");
        }
        Ok(written == 1)
    }

    async fn read_record(&self, key: &str) -> Result<Option<FieldMap>> {
        let mut conn = self.conn();
        let record: FieldMap = conn.hgetall(key).await?;
        Ok(if record.is_empty() { None } else { Some(record) })
    }

    async fn read_fields(&self, key: &str, fields: &[&str]) -> Result<Vec<Option<String>>> {
        if fields.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.conn();
        let values: Vec<Option<String>> = redis::cmd("HMGET")
            .arg(key)
            .arg(fields)
            .query_async(&mut conn)
            .await?;
        Ok(values)
    }

    async fn delete_record(&self, key: &str) -> Result<u64> {
        let mut conn = self.conn();
        let removed: u64 = conn.del(key).await?;
        Ok(removed)
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let mut conn = self.conn();
        let exists: bool = conn.exists(key).await?;
        Ok(exists)
    }

    async fn index_add(&self, index: &str, member: &str, score: f64) -> Result<()> {
        let mut conn = self.conn();
        let _: () = conn.zadd(index, member, score).await?;
        Ok(())
    }

    async fn index_remove(&self, index: &str, member: &str) -> Result<u64> {
        let mut conn = self.conn();
        let removed: u64 = conn.zrem(index, member).await?;
        Ok(removed)
    }

    async fn index_range_desc(&self, index: &str) -> Result<Vec<String>> {
        let mut conn = self.conn();
        let members: Vec<String> = conn.zrevrange(index, 0, -1).await?;
        Ok(members)
    }

    async fn index_range_asc(&self, index: &str) -> Result<Vec<String>> {
        let mut conn = self.conn();
        let members: Vec<String> = conn.zrange(index, 0, -1).await?;
        Ok(members)
    }

    #[instrument(skip(self, ops), fields(ops = ops.len()))]
    async fn execute(&self, ops: Vec<StoreOp>) -> Result<Vec<StoreReply>> {
        if ops.is_empty() {
            return Ok(Vec::new());
        }

        let mut pipe = redis::pipe();
        for op in &ops {
            match op {
                StoreOp::WriteRecord { key, fields } => {
                    if fields.is_empty() {
                        // 빈 HMSET은 오류이므로 응답 순서를 맞추기 위해 EXISTS로 대체
                        pipe.exists(key);
                    } else {
                        pipe.hset_multiple(key, fields.as_slice());
                    }
                }
                StoreOp::ReadRecord { key } => {
                    pipe.hgetall(key);
                }
                StoreOp::ReadFields { key, fields } => {
                    pipe.cmd("HMGET").arg(key).arg(fields);
                }
                StoreOp::DeleteRecord { key } => {
                    pipe.del(key);
                }
                StoreOp::IndexAdd {
                    index,
                    member,
                    score,
                } => {
                    pipe.zadd(index, member, *score);
                }
                StoreOp::IndexRemove { index, member } => {
                    pipe.zrem(index, member);
                }
            }
        }

        let mut conn = self.conn();
        let values: Vec<Value> = pipe.query_async(&mut conn).await?;

        if values.len() != ops.len() {
            return Err(DataError::InvalidData(format!(
                "pipeline returned {} replies for {} ops",
                values.len(),
                ops.len()
            )));
        }

        debug!(count = ops.len(), "Pipeline executed");

        ops.iter()
            .zip(values.iter())
            .map(|(op, value)| decode_reply(op, value))
            .collect()
    }
}
