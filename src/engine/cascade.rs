//! Auto-Bid Cascade Resolver.
//!
//! Consumes cascade triggers and walks the auction's subscribers in FIFO
//! order (earliest opt-in responds first). Each eligible subscriber gets
//! one counter-bid attempt per invocation: reserve budget headroom, place
//! through the Bid Ledger, then run the alert check. Per-subscriber
//! failures are expected steady-state outcomes — logged and skipped, never
//! aborting the walk. Every accepted bid re-enqueues a trigger, so rounds
//! repeat until no subscriber can improve on the highest bid: either they
//! already lead or their budget is spent. That, plus finite budgets, is
//! the termination guarantee.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::engine::budget::BudgetTracker;
use crate::engine::ledger::{BidLedger, BidRequest};
use crate::notify::{budget_alert_message, Notifier};
use crate::queue::{Task, TaskQueue};
use crate::store::EntityStore;
use crate::types::{AlertKind, AuctionStatus, AutoBidSubscription, BidOrigin, EngineError, NotificationKind};

/// What one cascade invocation did, for logging and assertions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CascadeReport {
    pub placed: u32,
    pub skipped_leading: u32,
    pub skipped_budget: u32,
    pub skipped_no_config: u32,
    pub failed: u32,
}

impl CascadeReport {
    /// A converged round: nothing changed, so no further trigger follows.
    pub fn is_quiet(&self) -> bool {
        self.placed == 0
    }
}

impl fmt::Display for CascadeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "placed={} leading={} budget={} no_config={} failed={}",
            self.placed, self.skipped_leading, self.skipped_budget, self.skipped_no_config, self.failed,
        )
    }
}

pub struct CascadeResolver {
    store: Arc<dyn EntityStore>,
    queue: Arc<dyn TaskQueue>,
    notifier: Arc<dyn Notifier>,
    ledger: BidLedger,
    budget: BudgetTracker,
    min_increment: Decimal,
}

impl CascadeResolver {
    pub fn new(
        store: Arc<dyn EntityStore>,
        queue: Arc<dyn TaskQueue>,
        notifier: Arc<dyn Notifier>,
        ledger: BidLedger,
        budget: BudgetTracker,
        min_increment: Decimal,
    ) -> Self {
        Self {
            store,
            queue,
            notifier,
            ledger,
            budget,
            min_increment,
        }
    }

    /// Run one cascade round for the auction.
    ///
    /// Idempotent and safe under at-least-once redelivery: a stale trigger
    /// finds every subscriber either leading or out of headroom and exits
    /// quietly.
    pub async fn resolve_cascade(
        &self,
        auction_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<CascadeReport, EngineError> {
        let auction = self.store.auction(auction_id).await?;
        let mut report = CascadeReport::default();

        if auction.status != AuctionStatus::Active {
            debug!(auction_id = %auction_id, "Stale cascade trigger on closed auction");
            return Ok(report);
        }

        let subscriptions = self.store.subscriptions_for_auction(auction_id).await?;
        for sub in &subscriptions {
            self.resolve_subscriber(sub, auction.starting_price, now, &mut report)
                .await?;
        }

        info!(auction_id = %auction_id, report = %report, "Cascade round complete");
        Ok(report)
    }

    /// One subscriber's counter-bid attempt. Returns Err only on
    /// infrastructure failures; every per-subscriber outcome is folded
    /// into the report.
    async fn resolve_subscriber(
        &self,
        sub: &AutoBidSubscription,
        starting_price: Decimal,
        now: DateTime<Utc>,
        report: &mut CascadeReport,
    ) -> Result<(), EngineError> {
        let highest = self.store.highest_active_bid(sub.auction_id).await?;

        // No self-outbidding: the current leader sits the round out. This
        // rule is what keeps consecutive rounds from running away.
        if highest.as_ref().is_some_and(|b| b.bidder_id == sub.bidder_id) {
            debug!(
                auction_id = %sub.auction_id,
                bidder_id = %sub.bidder_id,
                "Auto-bid skipped, subscriber already leads"
            );
            report.skipped_leading += 1;
            return Ok(());
        }

        let floor = highest.map(|b| b.amount).unwrap_or(starting_price);
        let proposed = floor + self.min_increment;

        let reservation = match self.budget.reserve(sub.bidder_id, sub.auction_id, proposed).await {
            Ok(r) => r,
            Err(EngineError::MissingBudgetConfig(_)) => {
                info!(
                    auction_id = %sub.auction_id,
                    bidder_id = %sub.bidder_id,
                    "Auto-bid skipped, no budget configuration"
                );
                report.skipped_no_config += 1;
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        if !reservation.approved {
            info!(
                auction_id = %sub.auction_id,
                bidder_id = %sub.bidder_id,
                proposed = %proposed,
                "Auto-bid skipped, would exceed max budget"
            );
            report.skipped_budget += 1;
            return Ok(());
        }

        let request = BidRequest {
            auction_id: sub.auction_id,
            bidder_id: sub.bidder_id,
            amount: proposed,
            submitted_at: now,
            origin: BidOrigin::Auto,
        };

        match self.ledger.place_bid(request).await {
            Ok(bid) => {
                info!(
                    auction_id = %sub.auction_id,
                    bidder_id = %sub.bidder_id,
                    amount = %bid.amount,
                    reserved = %reservation.reserved,
                    "Auto-bid placed"
                );
                report.placed += 1;
                self.dispatch_alert(sub.bidder_id).await?;
                Ok(())
            }
            // Closed mid-cascade, superseded by a concurrent bid, or the
            // race lost outright: move on to the next subscriber.
            Err(e) if e.is_validation() || matches!(e, EngineError::Conflict(_)) => {
                warn!(
                    auction_id = %sub.auction_id,
                    bidder_id = %sub.bidder_id,
                    error = %e,
                    "Auto-bid placement failed"
                );
                report.failed += 1;
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Fire the budget alert when the check says so — at most once per
    /// config lifetime, gated and persisted by the tracker before the
    /// notification leaves.
    async fn dispatch_alert(&self, user_id: Uuid) -> Result<(), EngineError> {
        let kind = self.budget.check_alert(user_id).await?;
        if kind == AlertKind::None {
            return Ok(());
        }
        if let Some(config) = self.store.budget_config(user_id).await? {
            info!(user_id = %user_id, kind = %kind, "Budget alert raised");
            self.notifier
                .send(user_id, NotificationKind::BidAlert, budget_alert_message(&config))
                .await;
        }
        Ok(())
    }

    /// Opt a user into auto-bidding on an auction.
    ///
    /// Requires an existing budget configuration. Creating the
    /// subscription is idempotent — an existing one keeps its FIFO slot —
    /// and activation always enqueues a cascade trigger so the new agent
    /// competes immediately.
    pub async fn activate_auto_bid(
        &self,
        auction_id: Uuid,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<(), EngineError> {
        if self.store.budget_config(user_id).await?.is_none() {
            return Err(EngineError::MissingBudgetConfig(user_id));
        }
        // Fail early on a dangling auction reference.
        self.store.auction(auction_id).await?;

        if self.store.subscription(auction_id, user_id).await?.is_none() {
            self.store
                .insert_subscription(AutoBidSubscription::new(auction_id, user_id, now))
                .await?;
            info!(auction_id = %auction_id, user_id = %user_id, "Auto-bid activated");
        }

        self.queue.enqueue(Task::CascadeTrigger { auction_id }).await
    }

    /// Opt a user out. Removing a missing subscription is a no-op.
    pub async fn deactivate_auto_bid(
        &self,
        auction_id: Uuid,
        user_id: Uuid,
    ) -> Result<(), EngineError> {
        self.store.remove_subscription(auction_id, user_id).await?;
        info!(auction_id = %auction_id, user_id = %user_id, "Auto-bid deactivated");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
