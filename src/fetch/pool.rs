use std::future::Future;
use thiserror::Error;
use tokio::task::{JoinError, JoinSet};

/// Failure of a single pool task. Never propagated past the pool as a panic.
#[derive(Debug, Error)]
pub enum TaskError<E> {
    #[error("{0}")]
    Failed(E),

    #[error("worker task aborted: {0}")]
    Aborted(#[from] JoinError),
}

/// Runs independent tasks with a fixed concurrency ceiling.
///
/// Each task's error (or panic) is captured in its own result slot; the
/// pool always drives every task to completion before returning.
#[derive(Debug, Clone, Copy)]
pub struct WorkerPool {
    width: usize,
}

impl WorkerPool {
    /// A width of zero is treated as one.
    pub fn new(width: usize) -> Self {
        Self {
            width: width.max(1),
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Run every task, at most `width` at a time.
    ///
    /// Results are returned in completion order. `on_complete` is called
    /// with `(completed, total)` after each task finishes.
    pub async fn run<T, E, Fut, P>(&self, tasks: Vec<Fut>, mut on_complete: P) -> Vec<Result<T, TaskError<E>>>
    where
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Send + 'static,
        P: FnMut(usize, usize),
    {
        let total = tasks.len();
        let mut pending = tasks.into_iter();
        let mut in_flight = JoinSet::new();
        let mut results = Vec::with_capacity(total);

        loop {
            while in_flight.len() < self.width {
                match pending.next() {
                    Some(task) => {
                        in_flight.spawn(task);
                    }
                    None => break,
                }
            }

            let Some(joined) = in_flight.join_next().await else {
                break;
            };
            let result = match joined {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(err)) => Err(TaskError::Failed(err)),
                Err(join_err) => Err(TaskError::Aborted(join_err)),
            };
            results.push(result);
            on_complete(results.len(), total);
        }

        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_run_collects_every_result() {
        let pool = WorkerPool::new(3);
        let tasks: Vec<_> = (0..10u32)
            .map(|i| async move {
                if i % 4 == 0 {
                    Err(format!("task {} failed", i))
                } else {
                    Ok(i)
                }
            })
            .collect();

        let results = pool.run(tasks, |_, _| {}).await;
        assert_eq!(results.len(), 10);
        assert_eq!(results.iter().filter(|r| r.is_err()).count(), 3);
    }

    #[tokio::test]
    async fn test_run_respects_width() {
        let pool = WorkerPool::new(2);
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let active = Arc::clone(&active);
                let peak = Arc::clone(&peak);
                async move {
                    let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    active.fetch_sub(1, Ordering::SeqCst);
                    Ok::<_, String>(())
                }
            })
            .collect();

        pool.run(tasks, |_, _| {}).await;
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    async fn succeed(value: u32) -> Result<u32, String> {
        Ok(value)
    }

    async fn explode() -> Result<u32, String> {
        panic!("boom")
    }

    #[tokio::test]
    async fn test_panicking_task_is_isolated() {
        let pool = WorkerPool::new(4);
        let tasks: Vec<std::pin::Pin<Box<dyn Future<Output = Result<u32, String>> + Send>>> =
            vec![Box::pin(succeed(1)), Box::pin(explode()), Box::pin(succeed(3))];

        let results = pool.run(tasks, |_, _| {}).await;
        assert_eq!(results.len(), 3);
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 2);
        assert!(results
            .iter()
            .any(|r| matches!(r, Err(TaskError::Aborted(_)))));
    }

    #[tokio::test]
    async fn test_progress_callback_counts_up_to_total() {
        let pool = WorkerPool::new(8);
        let tasks: Vec<_> = (0..5).map(|i| async move { Ok::<_, String>(i) }).collect();
        let mut seen = Vec::new();
        pool.run(tasks, |done, total| seen.push((done, total))).await;
        assert_eq!(seen, vec![(1, 5), (2, 5), (3, 5), (4, 5), (5, 5)]);
    }

    #[test]
    fn test_zero_width_becomes_one() {
        assert_eq!(WorkerPool::new(0).width(), 1);
    }
}
