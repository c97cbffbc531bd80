// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker pool draining the durable task spool.
//!
//! Each worker claims the oldest pending task, drives it through the
//! executor, and acks late, only after the run finished. A worker that
//! dies mid-task leaves its claim file for redelivery on the next
//! startup.

use crate::run::Executor;
use ni_storage::TaskSpool;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Default task-worker concurrency.
pub const DEFAULT_CONCURRENCY: usize = 2;

const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// A pool of durable task workers.
pub struct WorkerPool {
    shutdown: CancellationToken,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `concurrency` workers on the current runtime.
    pub fn spawn(executor: Arc<Executor>, spool: Arc<TaskSpool>, concurrency: usize) -> Self {
        let shutdown = CancellationToken::new();
        let handles = (0..concurrency.max(1))
            .map(|worker_id| {
                let executor = Arc::clone(&executor);
                let spool = Arc::clone(&spool);
                let shutdown = shutdown.clone();
                tokio::spawn(async move {
                    worker_loop(worker_id, executor, spool, shutdown).await;
                })
            })
            .collect();
        Self { shutdown, handles }
    }

    /// Stop claiming new tasks and wait for in-flight ones to finish.
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        for handle in self.handles {
            let _ = handle.await;
        }
    }
}

async fn worker_loop(
    worker_id: usize,
    executor: Arc<Executor>,
    spool: Arc<TaskSpool>,
    shutdown: CancellationToken,
) {
    tracing::info!(worker_id, "task worker started");
    loop {
        if shutdown.is_cancelled() {
            break;
        }

        let claimed = match spool.claim() {
            Ok(task) => task,
            Err(e) => {
                tracing::error!(worker_id, error = %e, "spool claim failed");
                None
            }
        };

        match claimed {
            Some(task) => {
                tracing::info!(worker_id, job_id = %task.job_id, kind = %task.kind, "task claimed");
                executor.run_task(&task).await;
                if let Err(e) = spool.ack(&task) {
                    tracing::error!(worker_id, job_id = %task.job_id, error = %e, "task ack failed");
                }
            }
            None => {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = tokio::time::sleep(POLL_INTERVAL) => {}
                }
            }
        }
    }
    tracing::info!(worker_id, "task worker stopped");
}

#[cfg(test)]
#[path = "worker_tests.rs"]
mod tests;
