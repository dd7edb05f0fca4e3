//! 백그라운드 작업 실행기.
//!
//! 작업 단위(unit of work)는 분리된 tokio 태스크에서 실행되고, 그 결과는
//! 레지스트리에 기록됩니다. 실행기 밖으로 에러가 전파되지 않으며 실패는
//! 작업의 `error` 필드로 남습니다.
//!
//! 취소는 협조적입니다. 작업 단위는 [`JobContext::checkpoint`] 또는
//! [`JobContext::report_progress`]를 호출하는 지점에서 취소를 관찰합니다.

use insight_core::{TaskStatus, TaskUpdate};
use serde_json::{json, Value};
use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{RwLock, Semaphore};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn, Instrument};

use crate::error::JobError;
use crate::registry::{CancelOutcome, TaskRegistry};
use crate::CANCELLED_BY_USER;

/// 작업 단위에 전달되는 실행 컨텍스트.
#[derive(Clone)]
pub struct JobContext {
    task_id: String,
    registry: Arc<TaskRegistry>,
    token: CancellationToken,
}

impl JobContext {
    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    pub fn registry(&self) -> &Arc<TaskRegistry> {
        &self.registry
    }

    /// 취소 여부.
    ///
    /// 프로세스 내 취소 토큰과 레지스트리에 기록된 상태를 모두 확인합니다.
    /// 다른 프로세스에서 취소된 작업도 여기서 관찰됩니다.
    pub async fn is_cancelled(&self) -> bool {
        if self.token.is_cancelled() {
            return true;
        }
        let cancelled = matches!(
            self.registry.get(&self.task_id).await,
            Some(task) if task.status == TaskStatus::Cancelled
        );
        if cancelled {
            self.token.cancel();
        }
        cancelled
    }

    /// 취소되었으면 [`JobError::Cancelled`]를 반환합니다.
    pub async fn checkpoint(&self) -> Result<(), JobError> {
        if self.is_cancelled().await {
            debug!(task_id = %self.task_id, "Cancellation observed");
            return Err(JobError::Cancelled);
        }
        Ok(())
    }

    /// 취소 토큰이 취소될 때 완료되는 future. `tokio::select!`에 사용합니다.
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }

    /// 진행률과 현재 단계를 기록합니다.
    ///
    /// 기록 전에 취소를 확인하며, `result`에는 `{"current_step": step}`이 기록됩니다.
    pub async fn report_progress(&self, progress: u8, step: &str) -> Result<(), JobError> {
        self.checkpoint().await?;

        let update = TaskUpdate::running(progress).result(json!({ "current_step": step }));
        if self.registry.update(&self.task_id, update).await.is_none() {
            // 기록 거부: 그 사이 종료(취소)되었을 수 있음
            self.checkpoint().await?;
        }
        Ok(())
    }
}

/// 백그라운드 작업 실행기.
pub struct JobRunner {
    registry: Arc<TaskRegistry>,
    permits: Arc<Semaphore>,
    max_in_flight: usize,
    tokens: Arc<RwLock<HashMap<String, CancellationToken>>>,
}

impl JobRunner {
    /// 최대 `max_in_flight`개의 작업을 동시에 실행하는 실행기를 생성합니다.
    pub fn new(registry: Arc<TaskRegistry>, max_in_flight: usize) -> Self {
        let max_in_flight = max_in_flight.max(1);
        Self {
            registry,
            permits: Arc::new(Semaphore::new(max_in_flight)),
            max_in_flight,
            tokens: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn registry(&self) -> &Arc<TaskRegistry> {
        &self.registry
    }

    /// 동시 실행 한도.
    pub fn capacity(&self) -> usize {
        self.max_in_flight
    }

    /// 현재 실행 중인 작업 수.
    pub fn in_flight(&self) -> usize {
        self.max_in_flight - self.permits.available_permits()
    }

    /// 이 프로세스에서 실행 중인 작업인지 확인합니다.
    pub async fn is_running(&self, task_id: &str) -> bool {
        self.tokens.read().await.contains_key(task_id)
    }

    /// 작업 단위를 백그라운드에서 실행합니다.
    ///
    /// 1. 실행 슬롯을 확보합니다. 여유가 없으면 작업을 Failed로 기록하고
    ///    [`JobError::TooManyInFlight`]를 즉시 반환합니다.
    /// 2. 작업을 Running(`initial_progress`)으로 기록합니다.
    /// 3. 작업 단위를 실행하고 결과에 따라 Completed / Cancelled / Failed를 기록합니다.
    ///    작업 단위의 panic도 Failed로 기록됩니다.
    pub async fn spawn<F, Fut>(
        &self,
        task_id: &str,
        initial_progress: u8,
        work: F,
    ) -> Result<JoinHandle<()>, JobError>
    where
        F: FnOnce(JobContext) -> Fut + Send + 'static,
        Fut: Future<Output = Result<Value, JobError>> + Send + 'static,
    {
        if !self.registry.is_enabled() {
            return Err(JobError::RegistryUnavailable);
        }

        let permit = match Arc::clone(&self.permits).try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                let err = JobError::TooManyInFlight(self.max_in_flight);
                warn!(task_id = %task_id, limit = self.max_in_flight, "Job rejected: runner is full");
                self.registry
                    .update(task_id, TaskUpdate::failed(err.to_string()))
                    .await;
                return Err(err);
            }
        };

        if self
            .registry
            .update(task_id, TaskUpdate::running(initial_progress))
            .await
            .is_none()
        {
            return Err(JobError::failed(format!("task {} is not runnable", task_id)));
        }

        let token = CancellationToken::new();
        self.tokens
            .write()
            .await
            .insert(task_id.to_string(), token.clone());

        let ctx = JobContext {
            task_id: task_id.to_string(),
            registry: Arc::clone(&self.registry),
            token,
        };
        let registry = Arc::clone(&self.registry);
        let tokens = Arc::clone(&self.tokens);
        let id = task_id.to_string();
        let span = insight_core::task_span!("job", id);

        let handle = tokio::spawn(
            async move {
                let _permit = permit;
                info!("Job started");

                // 별도 태스크에서 실행해 panic을 JoinError로 받음
                let outcome = match tokio::spawn(work(ctx)).await {
                    Ok(outcome) => outcome,
                    Err(join_err) if join_err.is_panic() => Err(JobError::failed(format!(
                        "job panicked: {}",
                        panic_message(join_err.into_panic())
                    ))),
                    Err(join_err) => Err(JobError::failed(join_err.to_string())),
                };

                finish(&registry, &id, outcome).await;
                tokens.write().await.remove(&id);
            }
            .instrument(span),
        );

        Ok(handle)
    }

    /// 작업을 취소합니다.
    ///
    /// 레지스트리 상태를 Cancelled로 바꾸고, 이 프로세스에서 실행 중이면
    /// 취소 토큰도 신호합니다.
    pub async fn cancel(&self, task_id: &str) -> CancelOutcome {
        let outcome = self.registry.cancel(task_id).await;
        if let Some(token) = self.tokens.read().await.get(task_id) {
            token.cancel();
        }
        outcome
    }
}

/// 작업 단위 결과를 레지스트리에 기록합니다.
async fn finish(registry: &TaskRegistry, task_id: &str, outcome: Result<Value, JobError>) {
    match outcome {
        Ok(result) => {
            if registry
                .update(task_id, TaskUpdate::completed(result))
                .await
                .is_some()
            {
                info!("Job completed");
            } else {
                warn!("Job finished but the task was already closed or removed");
            }
        }
        Err(JobError::Cancelled) => {
            let already = matches!(
                registry.get(task_id).await,
                Some(task) if task.status == TaskStatus::Cancelled
            );
            if !already {
                registry
                    .update(
                        task_id,
                        TaskUpdate::new()
                            .status(TaskStatus::Cancelled)
                            .error(CANCELLED_BY_USER),
                    )
                    .await;
            }
            info!("Job cancelled");
        }
        Err(err) => {
            error!(error = %err, "Job failed");
            registry
                .update(task_id, TaskUpdate::failed(err.to_string()))
                .await;
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use insight_core::TaskSettings;
    use insight_data::InMemoryStore;
    use std::time::Duration;
    use tokio::sync::oneshot;

    async fn setup(max_in_flight: usize) -> (Arc<TaskRegistry>, JobRunner) {
        let registry = Arc::new(
            TaskRegistry::connect(Arc::new(InMemoryStore::new()), TaskSettings::default()).await,
        );
        let runner = JobRunner::new(Arc::clone(&registry), max_in_flight);
        (registry, runner)
    }

    #[tokio::test]
    async fn test_successful_job() {
        let (registry, runner) = setup(4).await;
        let task = registry.create("Stock analysis", json!({})).await.unwrap();

        let handle = runner
            .spawn(&task.id, 10, |ctx| async move {
                ctx.report_progress(50, "indicators").await?;
                Ok(json!({"score": 72}))
            })
            .await
            .unwrap();
        handle.await.unwrap();

        let done = registry.get(&task.id).await.unwrap();
        assert_eq!(done.status, TaskStatus::Completed);
        assert_eq!(done.progress, 100);
        assert_eq!(done.result, Some(json!({"score": 72})));
        assert!(done.error.is_none());
        assert!(!runner.is_running(&task.id).await);
        assert_eq!(runner.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_job_marks_running_with_initial_progress() {
        let (registry, runner) = setup(4).await;
        let task = registry.create("A", json!({})).await.unwrap();
        let (seen_tx, seen_rx) = oneshot::channel();
        let (go_tx, go_rx) = oneshot::channel::<()>();

        let handle = runner
            .spawn(&task.id, 10, move |ctx| async move {
                let current = ctx.registry().get(ctx.task_id()).await;
                let _ = seen_tx.send(current);
                let _ = go_rx.await;
                Ok(json!({}))
            })
            .await
            .unwrap();

        let running = seen_rx.await.unwrap().unwrap();
        assert_eq!(running.status, TaskStatus::Running);
        assert_eq!(running.progress, 10);
        assert!(runner.is_running(&task.id).await);

        go_tx.send(()).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_failed_job_records_error() {
        let (registry, runner) = setup(4).await;
        let task = registry.create("A", json!({})).await.unwrap();

        runner
            .spawn(&task.id, 10, |_| async { Err(JobError::failed("no data for 000000")) })
            .await
            .unwrap()
            .await
            .unwrap();

        let failed = registry.get(&task.id).await.unwrap();
        assert_eq!(failed.status, TaskStatus::Failed);
        assert_eq!(failed.error.as_deref(), Some("no data for 000000"));
    }

    #[tokio::test]
    async fn test_panicking_job_is_recorded_as_failed() {
        let (registry, runner) = setup(4).await;
        let task = registry.create("A", json!({})).await.unwrap();

        runner
            .spawn(&task.id, 0, |_| async {
                if true {
                    panic!("division by zero");
                }
                Ok(json!({}))
            })
            .await
            .unwrap()
            .await
            .unwrap();

        let failed = registry.get(&task.id).await.unwrap();
        assert_eq!(failed.status, TaskStatus::Failed);
        assert_eq!(failed.error.as_deref(), Some("job panicked: division by zero"));
        assert_eq!(runner.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_cancel_running_job() {
        let (registry, runner) = setup(4).await;
        let task = registry.create("Market scan", json!({})).await.unwrap();
        let (started_tx, started_rx) = oneshot::channel();

        let handle = runner
            .spawn(&task.id, 0, move |ctx| async move {
                let _ = started_tx.send(());
                let mut step = 0u8;
                loop {
                    ctx.report_progress(step % 100, "scanning").await?;
                    step = step.wrapping_add(1);
                    tokio::time::sleep(Duration::from_millis(5)).await;
                }
            })
            .await
            .unwrap();

        started_rx.await.unwrap();
        assert!(matches!(runner.cancel(&task.id).await, CancelOutcome::Cancelled(_)));
        handle.await.unwrap();

        let cancelled = registry.get(&task.id).await.unwrap();
        assert_eq!(cancelled.status, TaskStatus::Cancelled);
        assert_eq!(cancelled.error.as_deref(), Some(CANCELLED_BY_USER));
    }

    #[tokio::test]
    async fn test_cancel_observed_through_registry() {
        let (registry, runner) = setup(4).await;
        let task = registry.create("A", json!({})).await.unwrap();
        let (go_tx, go_rx) = oneshot::channel::<()>();

        let handle = runner
            .spawn(&task.id, 0, move |ctx| async move {
                let _ = go_rx.await;
                ctx.checkpoint().await?;
                Ok(json!({"unreachable": true}))
            })
            .await
            .unwrap();

        // 실행기를 거치지 않은 취소 (다른 프로세스에서의 취소와 동일)
        registry.cancel(&task.id).await;
        go_tx.send(()).unwrap();
        handle.await.unwrap();

        let cancelled = registry.get(&task.id).await.unwrap();
        assert_eq!(cancelled.status, TaskStatus::Cancelled);
        assert!(cancelled.result.is_none());
    }

    #[tokio::test]
    async fn test_capacity_limit() {
        let (registry, runner) = setup(1).await;
        let first = registry.create("first", json!({})).await.unwrap();
        let second = registry.create("second", json!({})).await.unwrap();
        let (go_tx, go_rx) = oneshot::channel::<()>();

        let handle = runner
            .spawn(&first.id, 0, move |_| async move {
                let _ = go_rx.await;
                Ok(json!({}))
            })
            .await
            .unwrap();
        assert_eq!(runner.in_flight(), 1);

        let err = runner
            .spawn(&second.id, 0, |_| async { Ok(json!({})) })
            .await
            .unwrap_err();
        assert!(matches!(err, JobError::TooManyInFlight(1)));

        let rejected = registry.get(&second.id).await.unwrap();
        assert_eq!(rejected.status, TaskStatus::Failed);
        assert_eq!(rejected.error.as_deref(), Some("too many tasks in flight (limit 1)"));

        go_tx.send(()).unwrap();
        handle.await.unwrap();
        assert_eq!(runner.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_spawn_rejects_unknown_or_finished_task() {
        let (registry, runner) = setup(2).await;
        assert!(runner
            .spawn("missing", 0, |_| async { Ok(json!({})) })
            .await
            .is_err());

        let task = registry.create("A", json!({})).await.unwrap();
        registry.cancel(&task.id).await;
        assert!(runner
            .spawn(&task.id, 0, |_| async { Ok(json!({})) })
            .await
            .is_err());
        assert_eq!(runner.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_disabled_registry_rejects_jobs() {
        let runner = JobRunner::new(Arc::new(TaskRegistry::disabled()), 2);
        let err = runner
            .spawn("any", 0, |_| async { Ok(json!({})) })
            .await
            .unwrap_err();
        assert!(matches!(err, JobError::RegistryUnavailable));
    }
}
