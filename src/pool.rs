//! Bounded worker pool with blocking fan-in.
//!
//! This module provides [`WorkerPool`], which runs a batch of keyed units
//! with at most `capacity` of them in flight. Every unit is submitted up
//! front and the caller awaits all of them; results come back through a
//! single `JoinSet`, so units never share mutable state.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};

/// Default number of concurrent units per pool.
pub const DEFAULT_POOL_CAPACITY: usize = 100;

/// A unit that panicked or was cancelled, identified by its key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskFailure {
    pub key: String,
    pub message: String,
}

impl std::fmt::Display for TaskFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "task '{}' failed: {}", self.key, self.message)
    }
}

/// Outcome of a batch: completed units in completion order plus failures.
#[derive(Debug)]
pub struct PoolResults<R> {
    pub completed: Vec<(String, R)>,
    pub failures: Vec<TaskFailure>,
}

impl<R> Default for PoolResults<R> {
    fn default() -> Self {
        Self {
            completed: Vec::new(),
            failures: Vec::new(),
        }
    }
}

/// Semaphore-bounded executor for keyed units of work.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    name: &'static str,
    capacity: usize,
    semaphore: Arc<Semaphore>,
}

impl WorkerPool {
    pub fn new(name: &'static str, capacity: usize) -> Self {
        let permits = capacity.max(1);
        Self {
            name,
            capacity: permits,
            semaphore: Arc::new(Semaphore::new(permits)),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Runs async units. Each holds a permit for its whole lifetime.
    pub async fn map<T, R, F, Fut>(&self, units: Vec<(String, T)>, work: F) -> PoolResults<R>
    where
        T: Send + 'static,
        R: Send + 'static,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
    {
        let work = Arc::new(work);
        let mut set = JoinSet::new();
        for (key, unit) in units {
            let semaphore = Arc::clone(&self.semaphore);
            let work = Arc::clone(&work);
            set.spawn(async move {
                let outcome = match semaphore.acquire_owned().await {
                    Ok(_permit) => tokio::spawn(work(unit)).await.map_err(describe_join_error),
                    Err(_) => Err("worker pool closed".to_string()),
                };
                (key, outcome)
            });
        }
        self.collect(set).await
    }

    /// Runs CPU-bound units on the blocking thread pool.
    pub async fn map_blocking<T, R, F>(&self, units: Vec<(String, T)>, work: F) -> PoolResults<R>
    where
        T: Send + 'static,
        R: Send + 'static,
        F: Fn(T) -> R + Send + Sync + 'static,
    {
        let work = Arc::new(work);
        let mut set = JoinSet::new();
        for (key, unit) in units {
            let semaphore = Arc::clone(&self.semaphore);
            let work = Arc::clone(&work);
            set.spawn(async move {
                let outcome = match semaphore.acquire_owned().await {
                    Ok(_permit) => tokio::task::spawn_blocking(move || work(unit))
                        .await
                        .map_err(describe_join_error),
                    Err(_) => Err("worker pool closed".to_string()),
                };
                (key, outcome)
            });
        }
        self.collect(set).await
    }

    async fn collect<R: Send + 'static>(
        &self,
        mut set: JoinSet<(String, Result<R, String>)>,
    ) -> PoolResults<R> {
        let mut results = PoolResults::default();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((key, Ok(value))) => results.completed.push((key, value)),
                Ok((key, Err(message))) => {
                    tracing::warn!(pool = self.name, key = %key, error = %message, "unit failed");
                    results.failures.push(TaskFailure { key, message });
                }
                // The wrapper task only awaits; it fails only when the runtime shuts down.
                Err(err) => {
                    tracing::warn!(pool = self.name, error = %err, "pool task lost");
                    results.failures.push(TaskFailure {
                        key: String::new(),
                        message: describe_join_error(err),
                    });
                }
            }
        }
        tracing::debug!(
            pool = self.name,
            completed = results.completed.len(),
            failed = results.failures.len(),
            "pool batch finished"
        );
        results
    }
}

fn describe_join_error(err: JoinError) -> String {
    if err.is_panic() {
        let payload = err.into_panic();
        if let Some(message) = payload.downcast_ref::<&str>() {
            format!("panicked: {message}")
        } else if let Some(message) = payload.downcast_ref::<String>() {
            format!("panicked: {message}")
        } else {
            "panicked".to_string()
        }
    } else {
        err.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn map_never_exceeds_capacity() {
        let pool = WorkerPool::new("test", 3);
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let units = (0..30).map(|i| (i.to_string(), i)).collect();
        let (flight, max_seen) = (Arc::clone(&in_flight), Arc::clone(&peak));
        let results = pool
            .map(units, move |i: usize| {
                let flight = Arc::clone(&flight);
                let max_seen = Arc::clone(&max_seen);
                async move {
                    let now = flight.fetch_add(1, Ordering::SeqCst) + 1;
                    max_seen.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    flight.fetch_sub(1, Ordering::SeqCst);
                    i * 2
                }
            })
            .await;

        assert_eq!(results.completed.len(), 30);
        assert!(results.failures.is_empty());
        assert!(peak.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn map_blocking_returns_every_unit_once() {
        let pool = WorkerPool::new("blocking", 16);
        let units = (0..500).map(|i| (format!("unit-{i}"), i)).collect();

        let results = pool.map_blocking(units, |i: u32| i + 1).await;

        assert_eq!(results.completed.len(), 500);
        let keys: HashSet<_> = results.completed.iter().map(|(k, _)| k.clone()).collect();
        assert_eq!(keys.len(), 500);
        let sum: u64 = results.completed.iter().map(|(_, v)| u64::from(*v)).sum();
        assert_eq!(sum, (1..=500).sum::<u64>());
    }

    #[tokio::test]
    async fn panicking_unit_becomes_keyed_failure() {
        let pool = WorkerPool::new("panics", 2);
        let units = vec![("ok".to_string(), false), ("boom".to_string(), true)];

        let results = pool
            .map_blocking(units, |explode: bool| {
                if explode {
                    panic!("element exploded");
                }
                1
            })
            .await;

        assert_eq!(results.completed, vec![("ok".to_string(), 1)]);
        assert_eq!(results.failures.len(), 1);
        assert_eq!(results.failures[0].key, "boom");
        assert!(results.failures[0].message.contains("element exploded"));
    }

    #[test]
    fn zero_capacity_is_raised_to_one() {
        assert_eq!(WorkerPool::new("tiny", 0).capacity(), 1);
    }
}
