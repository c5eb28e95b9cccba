//! Task queue seam.
//!
//! The engine hands its asynchronous work — cascade triggers and close
//! sweeps — to an at-least-once queue. Handlers are idempotent, so
//! redelivery is safe; retry and dead-letter policy belong to the queue,
//! not to this crate.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::sync::Mutex;
use uuid::Uuid;

use crate::types::EngineError;

/// Work delivered through the task queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Task {
    /// A bid was accepted (or auto-bid was activated) on this auction;
    /// run the cascade.
    CascadeTrigger { auction_id: Uuid },
    /// Periodic tick: close every auction expired as of `now`.
    CloseSweep { now: DateTime<Utc> },
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Task::CascadeTrigger { auction_id } => write!(f, "cascade-trigger({auction_id})"),
            Task::CloseSweep { now } => write!(f, "close-sweep({now})"),
        }
    }
}

/// At-least-once task delivery.
#[async_trait]
pub trait TaskQueue: Send + Sync {
    async fn enqueue(&self, task: Task) -> Result<(), EngineError>;

    /// Pop the next task, or `None` when the queue is drained.
    async fn dequeue(&self) -> Result<Option<Task>, EngineError>;
}

/// FIFO in-process queue.
#[derive(Default)]
pub struct MemoryQueue {
    tasks: Mutex<VecDeque<Task>>,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tasks.lock().map(|t| t.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl TaskQueue for MemoryQueue {
    async fn enqueue(&self, task: Task) -> Result<(), EngineError> {
        let mut tasks = self
            .tasks
            .lock()
            .map_err(|e| EngineError::Queue(format!("queue lock poisoned: {e}")))?;
        tasks.push_back(task);
        Ok(())
    }

    async fn dequeue(&self) -> Result<Option<Task>, EngineError> {
        let mut tasks = self
            .tasks
            .lock()
            .map_err(|e| EngineError::Queue(format!("queue lock poisoned: {e}")))?;
        Ok(tasks.pop_front())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
