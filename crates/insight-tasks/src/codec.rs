//! 작업 레코드 ↔ 저장소 필드 변환.
//!
//! 모든 필드는 문자열로 저장됩니다. `params`/`result`/`error`는 JSON 텍스트이며
//! 빈 문자열은 null을 뜻합니다. 타임스탬프는 RFC 3339입니다.

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use insight_core::{Task, TaskStatus, TaskUpdate};
use insight_data::{DataError, FieldMap};
use serde_json::Value;

/// 작업 레코드 키 접두사.
pub const TASK_KEY_PREFIX: &str = "task:";

/// 생성 시각 기준 정렬 인덱스.
pub const TIME_INDEX: &str = "tasks_sorted_by_time";

pub const FIELD_ID: &str = "id";
pub const FIELD_NAME: &str = "name";
pub const FIELD_STATUS: &str = "status";
pub const FIELD_PROGRESS: &str = "progress";
pub const FIELD_RESULT: &str = "result";
pub const FIELD_ERROR: &str = "error";
pub const FIELD_PARAMS: &str = "params";
pub const FIELD_CREATED_AT: &str = "created_at";
pub const FIELD_UPDATED_AT: &str = "updated_at";

/// 작업 레코드 키.
pub fn task_key(id: &str) -> String {
    format!("{}{}", TASK_KEY_PREFIX, id)
}

/// 인덱스 점수: 생성 시각 (Unix epoch 마이크로초).
pub fn index_score(created_at: DateTime<Utc>) -> f64 {
    created_at.timestamp_micros() as f64
}

pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// 타임스탬프를 파싱합니다.
///
/// RFC 3339 외에 시간대 없는 ISO 8601 (`2024-01-01T09:30:00.123456`)도 UTC로 받아들입니다.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

fn encode_json(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(v) => v.to_string(),
    }
}

fn decode_json(raw: Option<&String>) -> Option<Value> {
    let raw = raw?.trim();
    if raw.is_empty() {
        return None;
    }
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Null) => None,
        Ok(v) => Some(v),
        // JSON이 아닌 값은 문자열로 보존
        Err(_) => Some(Value::String(raw.to_string())),
    }
}

fn encode_error(error: Option<&str>) -> String {
    match error {
        None => String::new(),
        Some(msg) => Value::String(msg.to_string()).to_string(),
    }
}

fn decode_error(raw: Option<&String>) -> Option<String> {
    match decode_json(raw)? {
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

/// 진행률 문자열을 0..=100 정수로 변환합니다. 실수 표기도 허용합니다.
fn decode_progress(raw: Option<&String>) -> u8 {
    raw.and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|p| p.is_finite())
        .map(|p| p.clamp(0.0, 100.0) as u8)
        .unwrap_or(0)
}

/// 새 작업 레코드의 전체 필드.
pub fn encode_task(task: &Task) -> Vec<(String, String)> {
    vec![
        (FIELD_ID.to_string(), task.id.clone()),
        (FIELD_NAME.to_string(), task.name.clone()),
        (FIELD_STATUS.to_string(), task.status.as_str().to_string()),
        (FIELD_PROGRESS.to_string(), task.progress.to_string()),
        (FIELD_RESULT.to_string(), encode_json(task.result.as_ref())),
        (FIELD_ERROR.to_string(), encode_error(task.error.as_deref())),
        (FIELD_PARAMS.to_string(), encode_json(Some(&task.params))),
        (FIELD_CREATED_AT.to_string(), format_timestamp(task.created_at)),
        (FIELD_UPDATED_AT.to_string(), format_timestamp(task.updated_at)),
    ]
}

/// 부분 업데이트 필드. `updated_at`은 항상 포함됩니다.
pub fn encode_update(update: &TaskUpdate, now: DateTime<Utc>) -> Vec<(String, String)> {
    let mut fields = vec![(FIELD_UPDATED_AT.to_string(), format_timestamp(now))];
    if let Some(status) = update.status {
        fields.push((FIELD_STATUS.to_string(), status.as_str().to_string()));
    }
    if let Some(progress) = update.progress {
        fields.push((FIELD_PROGRESS.to_string(), progress.min(100).to_string()));
    }
    if let Some(result) = &update.result {
        fields.push((FIELD_RESULT.to_string(), encode_json(Some(result))));
    }
    if let Some(error) = &update.error {
        fields.push((FIELD_ERROR.to_string(), encode_error(Some(error))));
    }
    fields
}

/// 저장소 필드로부터 작업을 복원합니다.
pub fn decode_task(fields: &FieldMap) -> Result<Task, DataError> {
    let id = fields
        .get(FIELD_ID)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| DataError::InvalidData("task record without id".to_string()))?
        .clone();

    let status = fields
        .get(FIELD_STATUS)
        .map(String::as_str)
        .unwrap_or_default()
        .parse::<TaskStatus>()
        .map_err(|e| DataError::InvalidData(format!("task {}: {}", id, e)))?;

    let created_at = fields
        .get(FIELD_CREATED_AT)
        .and_then(|s| parse_timestamp(s))
        .ok_or_else(|| DataError::InvalidData(format!("task {}: bad created_at", id)))?;
    let updated_at = fields
        .get(FIELD_UPDATED_AT)
        .and_then(|s| parse_timestamp(s))
        .unwrap_or(created_at);

    Ok(Task {
        name: fields.get(FIELD_NAME).cloned().unwrap_or_default(),
        status,
        progress: decode_progress(fields.get(FIELD_PROGRESS)),
        params: decode_json(fields.get(FIELD_PARAMS))
            .unwrap_or_else(|| Value::Object(Default::default())),
        result: decode_json(fields.get(FIELD_RESULT)),
        error: decode_error(fields.get(FIELD_ERROR)),
        created_at,
        updated_at,
        id,
    })
}
