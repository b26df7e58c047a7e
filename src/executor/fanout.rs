// src/executor/fanout.rs

//! Bounded fan-out with cancel-on-failure.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, error, info};

use super::active::ActiveSet;
use super::work_item::{FailureKind, ItemResult, WorkContext, WorkItem};
use super::{ExecutorConfig, RunReport};

/// Runs sets of independent [`WorkItem`]s.
///
/// Every call to [`run_all`](Self::run_all) builds its own shared state, so
/// one executor can be reused and concurrent calls never interfere.
#[derive(Debug, Clone)]
pub struct Executor {
    config: ExecutorConfig,
}

impl Executor {
    pub fn new(config: ExecutorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Run `items` with the worker count chosen by the configured policy.
    pub async fn run_all(&self, items: Vec<Box<dyn WorkItem>>) -> RunReport {
        let workers = self.config.policy.workers_for(items.len());
        self.run_all_with_workers(items, workers).await
    }

    /// Run `items` with at most `max_workers` in flight.
    ///
    /// On the first hard failure (when `cancel_on_failure` is set) pending
    /// items are never started, in-flight process items are killed and the
    /// call returns straight away. Results are in completion order.
    pub async fn run_all_with_workers(
        &self,
        items: Vec<Box<dyn WorkItem>>,
        max_workers: usize,
    ) -> RunReport {
        let total = items.len();
        if total == 0 {
            return RunReport::empty();
        }
        let workers = max_workers.clamp(1, total);
        info!(items = total, workers, "fan-out started");

        let active = Arc::new(ActiveSet::new());
        let permits = Arc::new(Semaphore::new(workers));
        let mut set: JoinSet<ItemResult> = JoinSet::new();
        let mut names = Vec::with_capacity(total);

        for item in items {
            let name = item.name().to_string();
            names.push(name.clone());
            let active = Arc::clone(&active);
            let permits = Arc::clone(&permits);
            let timeout = self.config.item_timeout;
            let cancel_on_failure = self.config.cancel_on_failure;

            set.spawn(async move {
                let queued_at = Instant::now();
                let Ok(_permit) = permits.acquire_owned().await else {
                    return ItemResult::cancelled(name, queued_at.elapsed());
                };
                if active.is_cancelled() {
                    return ItemResult::cancelled(name, queued_at.elapsed());
                }
                debug!(item = %name, "worker picked up item");
                let result = item
                    .run(WorkContext::new(name, Arc::clone(&active), timeout))
                    .await;
                // Cancel while still holding the permit, so the next queued
                // item sees the flag as soon as it acquires one.
                if cancel_on_failure && result.is_hard_failure() {
                    active.cancel_with(result.clone());
                }
                result
            });
        }

        let mut results = Vec::with_capacity(total);
        while let Some(joined) = set.join_next().await {
            let result = match joined {
                Ok(result) => result,
                Err(e) if e.is_cancelled() => continue,
                Err(e) => {
                    error!(error = %e, "worker panicked");
                    ItemResult::hard_failure(
                        "<unknown>",
                        FailureKind::Panic,
                        None,
                        format!("worker panicked: {e}"),
                        Duration::ZERO,
                    )
                }
            };

            let hard = result.is_hard_failure();
            results.push(result.clone());

            if hard && self.config.cancel_on_failure {
                permits.close();
                let first = active.cancel_with(result);
                set.abort_all();
                let not_finished = names.len() - results.len();
                info!(failed = %first.name, not_finished, "fan-out aborted");
                return RunReport {
                    overall_ok: false,
                    results,
                    first_error: Some(first),
                };
            }
        }

        let overall_ok = results.iter().all(ItemResult::is_success);
        let first_error = results.iter().find(|r| !r.is_success()).cloned();
        info!(items = total, overall_ok, "fan-out finished");
        RunReport {
            overall_ok,
            results,
            first_error,
        }
    }
}
