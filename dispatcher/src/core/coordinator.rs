//! Runs a task set through the worker pool and gates post-processing

use std::future::Future;
use chrono::Utc;

use shared::{run_error, run_info, run_warn, Task};
use crate::core::pool::WorkerPool;
use crate::core::task_set::TaskSet;
use crate::error::DispatchResult;
use crate::traits::PostProcessor;
use crate::types::{RunReport, TaskOutcome};

/// Dispatches a batch and decides whether downstream work may proceed
#[derive(Debug, Clone, Copy, Default)]
pub struct RunCoordinator {
    pool: WorkerPool,
}

impl RunCoordinator {
    pub fn new(concurrency: usize) -> DispatchResult<Self> {
        Ok(Self { pool: WorkerPool::new(concurrency)? })
    }

    pub fn with_pool(pool: WorkerPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> WorkerPool {
        self.pool
    }

    /// Dispatch every task and tally completions; per-task failures are logged, never raised
    pub async fn run_all<T, F, Fut>(&self, tasks: TaskSet, worker: F) -> DispatchResult<RunReport>
    where
        T: Send + 'static,
        F: Fn(Task) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = DispatchResult<T>> + Send + 'static,
    {
        let total = tasks.len();
        let started_at = Utc::now();

        run_info!("⚙️ Running {} tasks ({} workers)", total, self.pool.concurrency());

        let results = self.pool.run(tasks.into_tasks(), worker).await?;

        for result in &results {
            match &result.outcome {
                TaskOutcome::Success(_) => {
                    run_info!("✅ Completed {}", result.task);
                }
                TaskOutcome::Failure { kind, message } => {
                    run_error!(kind = %kind, "❌ Failed {}: {}", result.task, message);
                }
            }
        }

        let report = RunReport::from_results(&results, total, started_at);
        run_info!("📊 Completed {}/{} tasks", report.completed, report.total);
        Ok(report)
    }

    /// Dispatch the batch, then hand a complete report to `post`
    ///
    /// An incomplete batch is returned without invoking `post`.
    pub async fn run_with_post_processing<T, F, Fut, P>(
        &self,
        tasks: TaskSet,
        worker: F,
        post: &P,
    ) -> DispatchResult<RunReport>
    where
        T: Send + 'static,
        F: Fn(Task) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = DispatchResult<T>> + Send + 'static,
        P: PostProcessor + ?Sized,
    {
        let report = self.run_all(tasks, worker).await?;

        if report.is_complete() {
            post.process(&report).await?;
        } else {
            run_warn!(
                "Some tasks failed ({}/{} completed). Check logs for details. Skipping post-processing",
                report.completed,
                report.total
            );
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DispatchError;
    use crate::traits::MockPostProcessor;
    use shared::{ApiFailure, ProviderId};

    fn task_set(n: usize) -> TaskSet {
        TaskSet::from(
            (1..=n)
                .map(|i| Task::functions(format!("region{i}"), None, "dummy"))
                .collect::<Vec<_>>(),
        )
    }

    #[tokio::test]
    async fn test_complete_run_invokes_post_processing() {
        let mut post = MockPostProcessor::new();
        post.expect_process()
            .withf(|report| report.completed == 3 && report.total == 3)
            .times(1)
            .returning(|_| Ok(()));

        let report = RunCoordinator::new(2)
            .unwrap()
            .run_with_post_processing(task_set(3), |_task| async { Ok(()) }, &post)
            .await
            .unwrap();

        assert!(report.is_complete());
        assert!(report.failures.is_empty());
    }

    #[tokio::test]
    async fn test_incomplete_run_skips_post_processing() {
        let mut post = MockPostProcessor::new();
        post.expect_process().times(0);

        let report = RunCoordinator::new(2)
            .unwrap()
            .run_with_post_processing(
                task_set(4),
                |task| async move {
                    if task.region == "region4" {
                        Err(DispatchError::Provider {
                            provider: ProviderId::Gemini,
                            reason: ApiFailure::ServiceUnavailable,
                        })
                    } else {
                        Ok(())
                    }
                },
                &post,
            )
            .await
            .unwrap();

        assert_eq!(report.completed, 3);
        assert_eq!(report.total, 4);
        assert!(!report.is_complete());
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].kind, "service_unavailable");
    }

    #[tokio::test]
    async fn test_post_processing_error_propagates() {
        let mut post = MockPostProcessor::new();
        post.expect_process()
            .times(1)
            .returning(|_| Err(DispatchError::config("summary directory missing")));

        let result = RunCoordinator::default()
            .run_with_post_processing(task_set(1), |_task| async { Ok(()) }, &post)
            .await;

        assert!(matches!(result, Err(DispatchError::Config { .. })));
    }
}
