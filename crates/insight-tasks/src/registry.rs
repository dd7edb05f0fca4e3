//! 작업 레지스트리.
//!
//! 작업 레코드는 `task:{id}` 해시에, 생성 순서는 `tasks_sorted_by_time`
//! 정렬 인덱스에 저장됩니다. 저장소에 연결할 수 없으면 레지스트리는
//! 비활성 상태가 되고 모든 연산은 `None` / 빈 목록 / `false`를 반환합니다.
//! 런타임 저장소 오류도 로그를 남긴 뒤 같은 값으로 변환됩니다.

use chrono::{DateTime, SubsecRound, Utc};
use insight_core::{Task, TaskSettings, TaskStatus, TaskUpdate};
use insight_data::{KvStore, StoreOp, StoreReply};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::codec::{
    decode_task, encode_task, encode_update, index_score, parse_timestamp, task_key,
    FIELD_STATUS, FIELD_UPDATED_AT, TIME_INDEX,
};
use crate::CANCELLED_BY_USER;

/// 취소 요청 결과.
#[derive(Debug, Clone, PartialEq)]
pub enum CancelOutcome {
    /// 취소됨 (갱신된 작업)
    Cancelled(Box<Task>),
    /// 이미 종료된 작업
    AlreadyFinished(TaskStatus),
    /// 존재하지 않는 작업
    NotFound,
}

/// 정리(sweep) 결과.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// 삭제된 종료 작업 수
    pub deleted: usize,
    /// 응답 없음으로 실패 처리된 작업 수
    pub timed_out: usize,
    /// 레코드 없이 남은 인덱스 항목 정리 수
    pub orphans_removed: usize,
}

impl SweepReport {
    pub fn is_empty(&self) -> bool {
        self.deleted == 0 && self.timed_out == 0 && self.orphans_removed == 0
    }
}

/// 작업 레지스트리.
pub struct TaskRegistry {
    store: Option<Arc<dyn KvStore>>,
    settings: TaskSettings,
}

impl TaskRegistry {
    /// 저장소에 연결합니다.
    ///
    /// PING이 실패하면 에러 로그를 한 번 남기고 비활성 레지스트리를 반환합니다.
    pub async fn connect(store: Arc<dyn KvStore>, settings: TaskSettings) -> Self {
        match store.ping().await {
            Ok(()) => {
                info!(backend = store.backend(), "Task registry connected");
                Self {
                    store: Some(store),
                    settings,
                }
            }
            Err(e) => {
                error!(
                    backend = store.backend(),
                    error = %e,
                    "작업 저장소 연결 실패, 작업 관리 기능이 비활성화됩니다"
                );
                Self {
                    store: None,
                    settings,
                }
            }
        }
    }

    /// 비활성 레지스트리.
    pub fn disabled() -> Self {
        Self {
            store: None,
            settings: TaskSettings::default(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.store.is_some()
    }

    pub fn settings(&self) -> &TaskSettings {
        &self.settings
    }

    /// 저장소 백엔드 이름. 비활성이면 `None`.
    pub fn backend(&self) -> Option<&'static str> {
        self.store.as_ref().map(|s| s.backend())
    }

    /// 저장소 연결 상태. 비활성이면 `false`.
    pub async fn health_check(&self) -> bool {
        match &self.store {
            Some(store) => store.ping().await.is_ok(),
            None => false,
        }
    }

    // =========================================================================
    // 생성 / 조회
    // =========================================================================

    /// 새 작업을 Pending 상태로 생성합니다.
    ///
    /// 레코드 기록과 인덱스 추가는 하나의 배치로 전송됩니다.
    #[instrument(skip(self, params))]
    pub async fn create(&self, name: &str, params: Value) -> Option<Task> {
        let store = self.store.as_ref()?;

        let params = match params {
            Value::Null => Value::Object(Default::default()),
            other => other,
        };
        // 저장 형식이 마이크로초 단위이므로 반환값도 같은 정밀도로 맞춤
        let task = Task::new(
            Uuid::new_v4().to_string(),
            name,
            params,
            Utc::now().trunc_subsecs(6),
        );

        let ops = vec![
            StoreOp::WriteRecord {
                key: task_key(&task.id),
                fields: encode_task(&task),
            },
            StoreOp::IndexAdd {
                index: TIME_INDEX.to_string(),
                member: task.id.clone(),
                score: index_score(task.created_at),
            },
        ];

        match store.execute(ops).await {
            Ok(_) => {
                info!(task_id = %task.id, name = %task.name, "Task created");
                Some(task)
            }
            Err(e) => {
                error!(name = %name, error = %e, "Failed to create task");
                None
            }
        }
    }

    /// 작업을 조회합니다.
    pub async fn get(&self, id: &str) -> Option<Task> {
        let store = self.store.as_ref()?;

        let record = match store.read_record(&task_key(id)).await {
            Ok(record) => record?,
            Err(e) => {
                error!(task_id = %id, error = %e, "Failed to read task");
                return None;
            }
        };

        match decode_task(&record) {
            Ok(task) => Some(task),
            Err(e) => {
                error!(task_id = %id, error = %e, "Corrupt task record");
                None
            }
        }
    }

    /// 모든 작업을 최근 생성 순으로 반환합니다.
    ///
    /// 레코드가 사라진 인덱스 항목은 건너뜁니다.
    pub async fn list_all(&self) -> Vec<Task> {
        let Some(store) = self.store.as_ref() else {
            return Vec::new();
        };

        let ids = match store.index_range_desc(TIME_INDEX).await {
            Ok(ids) => ids,
            Err(e) => {
                error!(error = %e, "Failed to read task index");
                return Vec::new();
            }
        };
        if ids.is_empty() {
            return Vec::new();
        }

        let ops = ids
            .iter()
            .map(|id| StoreOp::ReadRecord { key: task_key(id) })
            .collect();

        let replies = match store.execute(ops).await {
            Ok(replies) => replies,
            Err(e) => {
                error!(error = %e, "Failed to read task records");
                return Vec::new();
            }
        };

        replies
            .into_iter()
            .filter_map(StoreReply::into_record)
            .filter_map(|record| match decode_task(&record) {
                Ok(task) => Some(task),
                Err(e) => {
                    warn!(error = %e, "Skipping corrupt task record");
                    None
                }
            })
            .collect()
    }

    /// 특정 상태의 작업만 반환합니다 (최근 생성 순).
    pub async fn list_by_status(&self, status: TaskStatus) -> Vec<Task> {
        self.list_all()
            .await
            .into_iter()
            .filter(|t| t.status == status)
            .collect()
    }

    // =========================================================================
    // 갱신 / 취소 / 삭제
    // =========================================================================

    /// 작업을 부분 갱신하고 갱신된 작업을 반환합니다.
    ///
    /// 존재하지 않거나 이미 종료된 작업은 기록하지 않고 `None`을 반환합니다.
    pub async fn update(&self, id: &str, update: TaskUpdate) -> Option<Task> {
        let store = self.store.as_ref()?;
        let key = task_key(id);

        let current = match store.read_fields(&key, &[FIELD_STATUS]).await {
            Ok(values) => values.into_iter().next().flatten(),
            Err(e) => {
                error!(task_id = %id, error = %e, "Failed to read task status");
                return None;
            }
        };

        let Some(current) = current else {
            warn!(task_id = %id, "Task not found for update");
            return None;
        };

        match current.parse::<TaskStatus>() {
            Ok(status) if status.is_terminal() => {
                warn!(
                    task_id = %id,
                    status = %status,
                    requested = ?update.status,
                    "Ignoring update of finished task"
                );
                return None;
            }
            Ok(_) => {}
            Err(e) => warn!(task_id = %id, error = %e, "Unknown stored status, updating anyway"),
        }

        let fields = encode_update(&update, Utc::now());
        match store.update_existing(&key, &fields).await {
            Ok(true) => {}
            Ok(false) => {
                // 상태 확인과 기록 사이에 삭제됨
                warn!(task_id = %id, "Task deleted before update was written");
                return None;
            }
            Err(e) => {
                error!(task_id = %id, error = %e, "Failed to update task");
                return None;
            }
        }

        debug!(task_id = %id, status = ?update.status, progress = ?update.progress, "Task updated");
        self.get(id).await
    }

    /// 진행 중인 작업을 취소 상태로 바꿉니다.
    pub async fn cancel(&self, id: &str) -> CancelOutcome {
        let Some(task) = self.get(id).await else {
            return CancelOutcome::NotFound;
        };
        if task.is_terminal() {
            return CancelOutcome::AlreadyFinished(task.status);
        }

        let update = TaskUpdate::new()
            .status(TaskStatus::Cancelled)
            .error(CANCELLED_BY_USER);

        match self.update(id, update).await {
            Some(task) => {
                info!(task_id = %id, "Task cancelled");
                CancelOutcome::Cancelled(Box::new(task))
            }
            // 확인과 기록 사이에 종료되었거나 삭제됨
            None => match self.get(id).await {
                Some(task) => CancelOutcome::AlreadyFinished(task.status),
                None => CancelOutcome::NotFound,
            },
        }
    }

    /// 작업 레코드와 인덱스 항목을 삭제합니다. 레코드가 있었으면 `true`.
    pub async fn delete(&self, id: &str) -> bool {
        let Some(store) = self.store.as_ref() else {
            return false;
        };

        let ops = vec![
            StoreOp::DeleteRecord { key: task_key(id) },
            StoreOp::IndexRemove {
                index: TIME_INDEX.to_string(),
                member: id.to_string(),
            },
        ];

        match store.execute(ops).await {
            Ok(replies) => {
                let deleted = replies.first().map(StoreReply::removed_count).unwrap_or(0) > 0;
                if deleted {
                    info!(task_id = %id, "Task deleted");
                }
                deleted
            }
            Err(e) => {
                error!(task_id = %id, error = %e, "Failed to delete task");
                false
            }
        }
    }

    // =========================================================================
    // 정리 (sweep)
    // =========================================================================

    /// 현재 시각 기준으로 정리합니다.
    pub async fn clean_old_tasks(&self) -> SweepReport {
        self.sweep_at(Utc::now()).await
    }

    /// `now` 기준으로 정리합니다.
    ///
    /// - 종료 작업: `updated_at`이 보존 기간보다 오래되었거나 파싱할 수 없으면 삭제
    /// - 진행 중 작업: `updated_at`이 stale 기준보다 오래되었으면 Failed 처리
    /// - 레코드가 없는 인덱스 항목: 제거
    #[instrument(skip(self))]
    pub async fn sweep_at(&self, now: DateTime<Utc>) -> SweepReport {
        let mut report = SweepReport::default();
        let Some(store) = self.store.as_ref() else {
            return report;
        };

        let ids = match store.index_range_asc(TIME_INDEX).await {
            Ok(ids) => ids,
            Err(e) => {
                error!(error = %e, "Sweep: failed to read task index");
                return report;
            }
        };
        if ids.is_empty() {
            return report;
        }

        let reads = ids
            .iter()
            .map(|id| StoreOp::ReadFields {
                key: task_key(id),
                fields: vec![FIELD_STATUS.to_string(), FIELD_UPDATED_AT.to_string()],
            })
            .collect();

        let replies = match store.execute(reads).await {
            Ok(replies) => replies,
            Err(e) => {
                error!(error = %e, "Sweep: failed to read task fields");
                return report;
            }
        };

        let retention = chrono_duration(self.settings.retention());
        let stale_timeout = chrono_duration(self.settings.stale_timeout());

        let mut removals = Vec::new();
        let mut stale = Vec::new();

        for (id, reply) in ids.iter().zip(replies) {
            let mut values = reply.into_fields().into_iter();
            let status = values.next().flatten();
            let updated_at = values.next().flatten();

            let Some(status) = status else {
                if updated_at.is_none() {
                    debug!(task_id = %id, "Sweep: removing orphan index entry");
                    removals.push(StoreOp::IndexRemove {
                        index: TIME_INDEX.to_string(),
                        member: id.clone(),
                    });
                    report.orphans_removed += 1;
                }
                continue;
            };

            let status = match status.parse::<TaskStatus>() {
                Ok(status) => status,
                Err(e) => {
                    warn!(task_id = %id, error = %e, "Sweep: skipping task with unknown status");
                    continue;
                }
            };
            let updated_at = updated_at.as_deref().and_then(parse_timestamp);

            if status.is_terminal() {
                let expired = match updated_at {
                    Some(ts) => now - ts > retention,
                    None => true,
                };
                if expired {
                    removals.push(StoreOp::DeleteRecord { key: task_key(id) });
                    removals.push(StoreOp::IndexRemove {
                        index: TIME_INDEX.to_string(),
                        member: id.clone(),
                    });
                    report.deleted += 1;
                }
            } else if let Some(ts) = updated_at {
                let idle = now - ts;
                if idle > stale_timeout {
                    stale.push((id.clone(), idle.num_seconds()));
                }
            }
        }

        if !removals.is_empty() {
            if let Err(e) = store.execute(removals).await {
                error!(error = %e, "Sweep: failed to delete expired tasks");
                report.deleted = 0;
                report.orphans_removed = 0;
            }
        }

        for (id, idle_secs) in stale {
            let message = format!(
                "task timed out: no progress for {}s (marked by sweeper)",
                idle_secs
            );
            if self.update(&id, TaskUpdate::failed(message)).await.is_some() {
                warn!(task_id = %id, idle_secs, "Sweep: stale task marked as failed");
                report.timed_out += 1;
            }
        }

        if !report.is_empty() {
            info!(
                deleted = report.deleted,
                timed_out = report.timed_out,
                orphans = report.orphans_removed,
                "Task sweep finished"
            );
        }
        report
    }

    /// 주기적 정리 루프를 시작합니다.
    ///
    /// 첫 정리는 즉시 실행됩니다. `shutdown`이 취소되면 루프가 종료됩니다.
    /// 비활성 레지스트리에서는 시작하지 않습니다.
    pub fn start_sweeper(
        self: &Arc<Self>,
        interval: Duration,
        shutdown: CancellationToken,
    ) -> Option<JoinHandle<()>> {
        if !self.is_enabled() {
            warn!("Task registry disabled, sweeper not started");
            return None;
        }

        let registry = Arc::clone(self);
        info!(interval_secs = interval.as_secs(), "Starting task sweeper");

        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        info!("Task sweeper stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        registry.clean_old_tasks().await;
                    }
                }
            }
        }))
    }
}

fn chrono_duration(d: Duration) -> chrono::Duration {
    chrono::Duration::from_std(d).unwrap_or_else(|_| chrono::Duration::days(365 * 100))
}
