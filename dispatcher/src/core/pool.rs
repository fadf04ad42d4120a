//! Bounded-concurrency task executor

use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use shared::{run_debug, run_error, Task};
use crate::error::{DispatchError, DispatchResult};
use crate::types::TaskResult;

/// Executes tasks with at most `concurrency` workers in flight
///
/// A concurrency of 1 runs tasks strictly one after another.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerPool {
    concurrency: usize,
}

impl WorkerPool {
    pub const DEFAULT_CONCURRENCY: usize = 4;

    pub fn new(concurrency: usize) -> DispatchResult<Self> {
        if concurrency == 0 {
            return Err(DispatchError::config("concurrency must be a positive integer"));
        }
        Ok(Self { concurrency })
    }

    pub fn sequential() -> Self {
        Self { concurrency: 1 }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Run every task through `worker` and wait for all of them to finish
    ///
    /// Per-task errors become [`TaskResult`] failures. A fatal error stops
    /// further dispatch; tasks already running are awaited, then the fatal
    /// error is returned.
    pub async fn run<T, F, Fut>(&self, tasks: Vec<Task>, worker: F) -> DispatchResult<Vec<TaskResult<T>>>
    where
        T: Send + 'static,
        F: Fn(Task) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = DispatchResult<T>> + Send + 'static,
    {
        let total = tasks.len();
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let worker = Arc::new(worker);
        let mut in_flight = JoinSet::new();
        let mut results = Vec::with_capacity(total);
        let mut fatal: Option<DispatchError> = None;

        run_debug!("Dispatching {} tasks with {} workers", total, self.concurrency);

        for task in tasks {
            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|e| DispatchError::config(format!("worker pool closed: {e}")))?;

            while let Some(joined) = in_flight.try_join_next() {
                Self::collect(joined?, &mut results, &mut fatal);
            }
            if fatal.is_some() {
                break;
            }

            let worker = Arc::clone(&worker);
            in_flight.spawn(async move {
                let _permit = permit;
                // Inner spawn isolates panics so they are attributed to this task
                let outcome = match tokio::spawn(worker(task.clone())).await {
                    Ok(outcome) => outcome,
                    Err(e) => Err(DispatchError::Join(e)),
                };
                (task, outcome)
            });
        }

        while let Some(joined) = in_flight.join_next().await {
            Self::collect(joined?, &mut results, &mut fatal);
        }

        match fatal {
            Some(error) => Err(error),
            None => Ok(results),
        }
    }

    fn collect<T>(
        (task, outcome): (Task, DispatchResult<T>),
        results: &mut Vec<TaskResult<T>>,
        fatal: &mut Option<DispatchError>,
    ) {
        match outcome {
            Ok(payload) => results.push(TaskResult::success(task, payload)),
            Err(error) if error.is_fatal() => {
                run_error!("💀 Fatal error in task {}: {}", task, error);
                results.push(TaskResult::failure(task, &error));
                fatal.get_or_insert(error);
            }
            Err(error) => results.push(TaskResult::failure(task, &error)),
        }
    }
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self { concurrency: Self::DEFAULT_CONCURRENCY }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use shared::ApiFailure;

    fn tasks(n: usize) -> Vec<Task> {
        (0..n).map(|i| Task::functions(format!("region{i}"), None, "dummy")).collect()
    }

    /// Tracks how many workers are inside the critical section at once
    #[derive(Default)]
    struct Overlap {
        current: AtomicUsize,
        peak: AtomicUsize,
    }

    impl Overlap {
        async fn observe(&self, hold: Duration) {
            let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(hold).await;
            self.current.fetch_sub(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        assert!(matches!(WorkerPool::new(0), Err(DispatchError::Config { .. })));
        assert_eq!(WorkerPool::default().concurrency(), 4);
    }

    #[tokio::test]
    async fn test_sequential_pool_never_overlaps() {
        let overlap = Arc::new(Overlap::default());
        let tracker = overlap.clone();

        let results = WorkerPool::sequential()
            .run(tasks(6), move |task| {
                let tracker = tracker.clone();
                async move {
                    tracker.observe(Duration::from_millis(10)).await;
                    Ok(task.region)
                }
            })
            .await
            .unwrap();

        assert_eq!(results.len(), 6);
        assert_eq!(overlap.peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_pool_bounds_overlap() {
        let overlap = Arc::new(Overlap::default());
        let tracker = overlap.clone();

        let results = WorkerPool::new(3)
            .unwrap()
            .run(tasks(12), move |_task| {
                let tracker = tracker.clone();
                async move {
                    tracker.observe(Duration::from_millis(25)).await;
                    Ok(())
                }
            })
            .await
            .unwrap();

        assert_eq!(results.len(), 12);
        let peak = overlap.peak.load(Ordering::SeqCst);
        assert!(peak <= 3, "peak overlap {peak} exceeds concurrency");
        assert!(peak >= 2, "pool never ran tasks in parallel");
    }

    #[tokio::test]
    async fn test_failures_do_not_stop_siblings() {
        let results = WorkerPool::new(2)
            .unwrap()
            .run(tasks(5), |task| async move {
                if task.region == "region2" {
                    Err(DispatchError::RetriesExhausted {
                        provider: shared::ProviderId::OpenAI,
                        attempts: 5,
                        last: ApiFailure::RateLimitExceeded,
                    })
                } else {
                    Ok(task.region)
                }
            })
            .await
            .unwrap();

        assert_eq!(results.len(), 5);
        let failed: Vec<_> = results.iter().filter(|r| !r.is_success()).collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].task.region, "region2");
    }

    #[tokio::test]
    async fn test_panicking_worker_is_recorded() {
        let results = WorkerPool::new(2)
            .unwrap()
            .run(tasks(3), |task| async move {
                if task.region == "region1" {
                    panic!("worker bug");
                }
                Ok(())
            })
            .await
            .unwrap();

        assert_eq!(results.iter().filter(|r| r.is_success()).count(), 2);
    }

    #[tokio::test]
    async fn test_fatal_error_stops_dispatch() {
        let started = Arc::new(AtomicUsize::new(0));
        let counter = started.clone();

        let result = WorkerPool::sequential()
            .run(tasks(10), move |task| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    if task.region == "region1" {
                        return Err(DispatchError::LockUnavailable {
                            path: PathBuf::from("region1.json"),
                            attempts: 3,
                        });
                    }
                    Ok(())
                }
            })
            .await;

        assert!(matches!(result, Err(DispatchError::LockUnavailable { .. })));
        assert!(started.load(Ordering::SeqCst) < 10);
    }

    #[tokio::test]
    async fn test_empty_task_list() {
        let results: Vec<TaskResult<()>> = WorkerPool::default()
            .run(Vec::new(), |_task| async { Ok(()) })
            .await
            .unwrap();
        assert!(results.is_empty());
    }
}
