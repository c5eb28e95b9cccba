//! Auction Closer.
//!
//! Settles auctions whose end time has passed: picks the winner (the
//! highest Active bid, if any), flips the terminal bid statuses and the
//! auction status in one conditional commit, then fans out the win/loss
//! notifications. Closure is idempotent — the commit is conditional on
//! the auction version, and only the invocation that actually performed
//! the settlement sends notifications, so redelivered sweeps stay quiet.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::notify::{loser_message, winner_message, Notifier};
use crate::store::EntityStore;
use crate::types::{Auction, Bid, EngineError, NotificationKind};

pub struct AuctionCloser {
    store: Arc<dyn EntityStore>,
    notifier: Arc<dyn Notifier>,
    conflict_retries: u32,
}

impl AuctionCloser {
    pub fn new(store: Arc<dyn EntityStore>, notifier: Arc<dyn Notifier>, conflict_retries: u32) -> Self {
        Self {
            store,
            notifier,
            conflict_retries,
        }
    }

    /// Sweep every Active auction whose end time is at or before `now`.
    ///
    /// Per-auction failures are logged and skipped so one bad auction
    /// cannot stall the rest of the sweep; the next sweep retries it.
    /// Returns the number of auctions this call settled.
    pub async fn close_expired(&self, now: DateTime<Utc>) -> Result<u32, EngineError> {
        let due = self.store.expired_active_auctions(now).await?;
        let mut closed = 0;

        for auction in &due {
            match self.close_auction(auction.id, now).await {
                Ok(true) => closed += 1,
                Ok(false) => {}
                Err(e) => {
                    warn!(auction_id = %auction.id, error = %e, "Auction closure failed, will retry next sweep");
                }
            }
        }

        if !due.is_empty() {
            info!(due = due.len(), closed, "Closure sweep complete");
        }
        Ok(closed)
    }

    /// Close a single auction. Returns `Ok(true)` when this call performed
    /// the settlement, `Ok(false)` when the auction was already closed or
    /// is not yet due.
    pub async fn close_auction(&self, auction_id: Uuid, now: DateTime<Utc>) -> Result<bool, EngineError> {
        for attempt in 0..=self.conflict_retries {
            let auction = self.store.auction(auction_id).await?;

            if !auction.is_expired_at(now) {
                debug!(auction_id = %auction_id, status = %auction.status, "Closure skipped, not due");
                return Ok(false);
            }

            let winner = self.store.highest_active_bid(auction_id).await?;
            let all_bids = self.store.bids_for_auction(auction_id).await?;

            match self
                .store
                .settle_auction(auction_id, auction.version, winner.as_ref().map(|b| b.id))
                .await
            {
                Ok(()) => {
                    info!(
                        auction_id = %auction_id,
                        winner = winner.as_ref().map(|b| b.bidder_id.to_string()).unwrap_or_else(|| "none".to_string()),
                        "Auction closed"
                    );
                    if let Some(winning_bid) = winner {
                        self.notify_outcome(&auction, &winning_bid, &all_bids).await;
                    }
                    return Ok(true);
                }
                // A last-second bid bumped the version; reload and retry
                // with the fresh winner.
                Err(EngineError::Conflict(_)) => {
                    debug!(auction_id = %auction_id, attempt, "Closure lost the version race, reloading");
                    continue;
                }
                Err(e) => return Err(e),
            }
        }

        warn!(auction_id = %auction_id, retries = self.conflict_retries, "Closure conflict retries exhausted");
        Err(EngineError::Conflict(auction_id))
    }

    /// Winner and per-loser notifications. Runs only after the settlement
    /// has committed; each distinct losing bidder gets exactly one message
    /// quoting their own highest bid.
    async fn notify_outcome(&self, auction: &Auction, winning_bid: &Bid, all_bids: &[Bid]) {
        let bill_reference = format!("BILL-{}", Uuid::new_v4().simple());
        self.notifier
            .send(
                winning_bid.bidder_id,
                NotificationKind::AuctionWon,
                winner_message(auction, winning_bid.amount, &bill_reference),
            )
            .await;

        let mut highest_by_loser: HashMap<Uuid, Decimal> = HashMap::new();
        for bid in all_bids {
            if bid.bidder_id == winning_bid.bidder_id {
                continue;
            }
            let entry = highest_by_loser.entry(bid.bidder_id).or_insert(bid.amount);
            if bid.amount > *entry {
                *entry = bid.amount;
            }
        }

        for (bidder_id, own_highest) in highest_by_loser {
            self.notifier
                .send(
                    bidder_id,
                    NotificationKind::AuctionLost,
                    loser_message(auction, winning_bid.amount, own_highest),
                )
                .await;
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
