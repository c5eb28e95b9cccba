//! Queue worker.
//!
//! Dequeues tasks and dispatches them to the cascade resolver and the
//! auction closer. A sliding-window governor caps how many cascade
//! triggers one auction may consume per window; triggers over the cap are
//! dropped with a warning rather than re-queued, which bounds how much
//! work a bidding duel can generate even though every accepted bid
//! enqueues a fresh trigger.

use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::CascadeConfig;
use crate::engine::cascade::CascadeResolver;
use crate::engine::closer::AuctionCloser;
use crate::queue::{Task, TaskQueue};
use crate::types::EngineError;

/// Sliding-window rate cap on cascade triggers, per auction.
pub struct TriggerGovernor {
    max_triggers: u32,
    window: Duration,
    history: Mutex<HashMap<Uuid, VecDeque<DateTime<Utc>>>>,
}

impl TriggerGovernor {
    pub fn new(config: &CascadeConfig) -> Self {
        Self {
            max_triggers: config.max_triggers_per_auction,
            window: Duration::seconds(config.trigger_window_secs as i64),
            history: Mutex::new(HashMap::new()),
        }
    }

    /// Record a trigger for the auction if capacity remains in the current
    /// window. Returns `false` when the trigger must be dropped.
    pub fn admit(&self, auction_id: Uuid, now: DateTime<Utc>) -> bool {
        let Ok(mut history) = self.history.lock() else {
            return true;
        };
        let timestamps = history.entry(auction_id).or_default();

        let cutoff = now - self.window;
        while timestamps.front().is_some_and(|t| *t <= cutoff) {
            timestamps.pop_front();
        }

        if timestamps.len() >= self.max_triggers as usize {
            return false;
        }
        timestamps.push_back(now);
        true
    }
}

pub struct TaskWorker {
    queue: Arc<dyn TaskQueue>,
    resolver: Arc<CascadeResolver>,
    closer: Arc<AuctionCloser>,
    governor: TriggerGovernor,
}

impl TaskWorker {
    pub fn new(
        queue: Arc<dyn TaskQueue>,
        resolver: Arc<CascadeResolver>,
        closer: Arc<AuctionCloser>,
        governor: TriggerGovernor,
    ) -> Self {
        Self {
            queue,
            resolver,
            closer,
            governor,
        }
    }

    /// Process queued tasks until the queue is empty. Returns the number
    /// of tasks handled, dropped triggers included.
    ///
    /// Cascade rounds enqueue follow-up triggers, so a drain can run many
    /// rounds of a duel back to back; the governor guarantees it still
    /// terminates.
    pub async fn drain(&self, now: DateTime<Utc>) -> Result<u32, EngineError> {
        let mut handled = 0;
        while let Some(task) = self.queue.dequeue().await? {
            self.handle(task, now).await?;
            handled += 1;
        }
        Ok(handled)
    }

    async fn handle(&self, task: Task, now: DateTime<Utc>) -> Result<(), EngineError> {
        debug!(task = %task, "Handling task");
        match task {
            Task::CascadeTrigger { auction_id } => {
                if !self.governor.admit(auction_id, now) {
                    warn!(auction_id = %auction_id, "Cascade trigger dropped by governor");
                    return Ok(());
                }
                self.resolver.resolve_cascade(auction_id, now).await?;
                Ok(())
            }
            Task::CloseSweep { now } => {
                self.closer.close_expired(now).await?;
                Ok(())
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
