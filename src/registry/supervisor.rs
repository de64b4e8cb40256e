// Package registry provides the per-identity table of supervision tasks.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::model::Identity;

/// Supervisor owns the background tasks spawned for each identity so they
/// can be awaited on shutdown. Cancellation goes through each task's own
/// scope token; the table only tracks handles.
#[derive(Default)]
pub struct Supervisor {
    tasks: Mutex<HashMap<Identity, Vec<JoinHandle<()>>>>,
}

impl Supervisor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawns `task` for `identity`, pruning handles of finished tasks.
    pub fn spawn<F>(&self, identity: Identity, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(task);
        let mut tasks = self.tasks.lock();
        let slot = tasks.entry(identity).or_default();
        slot.retain(|h| !h.is_finished());
        slot.push(handle);
    }

    /// Number of tasks for `identity` that have not finished yet.
    pub fn running(&self, identity: &Identity) -> usize {
        self.tasks
            .lock()
            .get(identity)
            .map(|slot| slot.iter().filter(|h| !h.is_finished()).count())
            .unwrap_or(0)
    }

    /// Awaits every tracked task. Callers cancel the tasks' scopes first.
    pub async fn join_all(&self) {
        let handles: Vec<JoinHandle<()>> = self
            .tasks
            .lock()
            .drain()
            .flat_map(|(_, slot)| slot)
            .collect();
        for handle in handles {
            if let Err(e) = handle.await {
                warn!(
                    component = "supervisor",
                    event = "task_failed",
                    panicked = e.is_panic(),
                    error = %e,
                    "supervision task did not finish cleanly"
                );
            }
        }
    }
}
