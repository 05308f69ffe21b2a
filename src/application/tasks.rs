//! Bounded background queue for post-write side effects.
//!
//! CDN purges and backup exports run off the request path. Submission never blocks:
//! when the queue is full or closed the task is dropped with a warning and a counter,
//! so delivery is best-effort.

use std::{collections::BTreeSet, sync::Arc};

use metrics::counter;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info, warn};

use crate::{
    application::export::ExportService, cache::EdgeCache, infra::telemetry::TASK_DROPPED_TOTAL,
};

const SOURCE: &str = "toggleboard::application::tasks";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Task {
    /// Purge CDN copies of these paths.
    InvalidateCdn { paths: Vec<String> },
    /// Rewrite the full toggle backup.
    Export { exported_by: String },
}

impl Task {
    fn kind(&self) -> &'static str {
        match self {
            Task::InvalidateCdn { .. } => "invalidate_cdn",
            Task::Export { .. } => "export",
        }
    }
}

/// Cloneable submission handle.
#[derive(Clone, Debug)]
pub struct TaskQueue {
    sender: mpsc::Sender<Task>,
}

pub struct TaskReceiver {
    receiver: mpsc::Receiver<Task>,
}

impl TaskQueue {
    pub fn bounded(capacity: usize) -> (Self, TaskReceiver) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, TaskReceiver { receiver })
    }

    /// Enqueue without waiting. Returns `false` when the task was dropped.
    pub fn submit(&self, task: Task) -> bool {
        let kind = task.kind();
        match self.sender.try_send(task) {
            Ok(()) => {
                debug!(target = SOURCE, task = kind, "background task enqueued");
                true
            }
            Err(TrySendError::Full(_)) => {
                counter!(TASK_DROPPED_TOTAL, "reason" => "full").increment(1);
                warn!(
                    target = SOURCE,
                    task = kind,
                    reason = "full",
                    "background task dropped"
                );
                false
            }
            Err(TrySendError::Closed(_)) => {
                counter!(TASK_DROPPED_TOTAL, "reason" => "closed").increment(1);
                warn!(
                    target = SOURCE,
                    task = kind,
                    reason = "closed",
                    "background task dropped"
                );
                false
            }
        }
    }
}

impl TaskReceiver {
    /// Wait for the next task, then take whatever else is already queued.
    ///
    /// Returns `None` once every [`TaskQueue`] handle is gone and the queue is empty.
    pub async fn next_batch(&mut self) -> Option<Vec<Task>> {
        let first = self.receiver.recv().await?;
        let mut batch = vec![first];
        batch.extend(self.drain_now());
        Some(batch)
    }

    /// Take all queued tasks without waiting.
    pub fn drain_now(&mut self) -> Vec<Task> {
        let mut tasks = Vec::new();
        while let Ok(task) = self.receiver.try_recv() {
            tasks.push(task);
        }
        tasks
    }
}

/// A batch reduced to the work it implies: unique purge paths and at most one export.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct CoalescedBatch {
    pub paths: Vec<String>,
    pub export: Option<String>,
}

impl CoalescedBatch {
    pub fn from_tasks(tasks: Vec<Task>) -> Self {
        let mut paths = BTreeSet::new();
        let mut export = None;
        for task in tasks {
            match task {
                Task::InvalidateCdn { paths: batch } => paths.extend(batch),
                Task::Export { exported_by } => export = Some(exported_by),
            }
        }
        Self {
            paths: paths.into_iter().collect(),
            export,
        }
    }
}

/// Executes queued tasks until the queue closes.
pub struct TaskWorker {
    edge: Option<Arc<EdgeCache>>,
    exporter: Option<Arc<ExportService>>,
}

impl TaskWorker {
    pub fn new(edge: Option<Arc<EdgeCache>>, exporter: Option<Arc<ExportService>>) -> Self {
        Self { edge, exporter }
    }

    pub async fn run(self, mut receiver: TaskReceiver) {
        while let Some(batch) = receiver.next_batch().await {
            self.process(batch).await;
        }
        info!(target = SOURCE, "task queue closed; worker stopping");
    }

    pub async fn process(&self, tasks: Vec<Task>) {
        let submitted = tasks.len();
        let batch = CoalescedBatch::from_tasks(tasks);
        debug!(
            target = SOURCE,
            submitted,
            paths = batch.paths.len(),
            export = batch.export.is_some(),
            "processing task batch"
        );

        if let Some(edge) = self.edge.as_ref() {
            edge.invalidate(&batch.paths).await;
        }

        if let (Some(exported_by), Some(exporter)) = (batch.export, self.exporter.as_ref()) {
            if let Err(err) = exporter.export_to_store(&exported_by).await {
                warn!(target = SOURCE, error = %err, "backup export failed");
            }
        }
    }
}
