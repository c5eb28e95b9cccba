//! Bid Ledger.
//!
//! The single write path for bids: validates against the auction window
//! and the current price floor, commits the bid conditionally on the
//! auction version, and enqueues the cascade trigger once the commit
//! holds. Nothing else in the engine mutates bid rows outside closure.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::queue::{Task, TaskQueue};
use crate::store::EntityStore;
use crate::types::{Bid, BidOrigin, EngineError};

/// A bid submission, before validation.
#[derive(Debug, Clone)]
pub struct BidRequest {
    pub auction_id: Uuid,
    pub bidder_id: Uuid,
    pub amount: Decimal,
    pub submitted_at: DateTime<Utc>,
    pub origin: BidOrigin,
}

pub struct BidLedger {
    store: Arc<dyn EntityStore>,
    queue: Arc<dyn TaskQueue>,
    /// Internal reload-and-revalidate retries on version conflicts.
    conflict_retries: u32,
}

impl BidLedger {
    pub fn new(store: Arc<dyn EntityStore>, queue: Arc<dyn TaskQueue>, conflict_retries: u32) -> Self {
        Self {
            store,
            queue,
            conflict_retries,
        }
    }

    /// Validate and record a bid.
    ///
    /// Validation order, first failure wins:
    /// 1. the auction is Active and `submitted_at` is within its window,
    ///    else `AuctionClosed`;
    /// 2. the amount strictly exceeds the current highest Active bid (the
    ///    starting price when no bid exists), else `BidTooLow` — ties lose.
    ///
    /// On success the bid is committed together with the flip of every
    /// other Active bid to Lost, conditional on the auction version, and
    /// a cascade trigger is enqueued after the commit. A lost race reloads
    /// and re-validates up to `conflict_retries` times; the new floor may
    /// then reject the bid with `BidTooLow`.
    pub async fn place_bid(&self, request: BidRequest) -> Result<Bid, EngineError> {
        for attempt in 0..=self.conflict_retries {
            let auction = self.store.auction(request.auction_id).await?;

            if !auction.accepts_bids_at(request.submitted_at) {
                return Err(EngineError::AuctionClosed(auction.id));
            }

            let highest = self.store.highest_active_bid(auction.id).await?;
            let floor = highest
                .as_ref()
                .map(|b| b.amount)
                .unwrap_or(auction.starting_price);
            if request.amount <= floor {
                return Err(EngineError::BidTooLow { floor });
            }

            let bid = Bid::new(
                auction.id,
                request.bidder_id,
                request.amount,
                request.submitted_at,
                request.origin,
            );

            match self.store.commit_bid(auction.version, bid).await {
                Ok(committed) => {
                    self.queue
                        .enqueue(Task::CascadeTrigger { auction_id: auction.id })
                        .await?;
                    info!(
                        auction_id = %auction.id,
                        bidder_id = %committed.bidder_id,
                        amount = %committed.amount,
                        origin = %committed.origin,
                        "Bid accepted"
                    );
                    return Ok(committed);
                }
                Err(EngineError::Conflict(_)) => {
                    debug!(
                        auction_id = %auction.id,
                        attempt,
                        "Concurrent bid won the commit, reloading"
                    );
                    continue;
                }
                Err(e) => return Err(e),
            }
        }

        warn!(
            auction_id = %request.auction_id,
            retries = self.conflict_retries,
            "Bid conflict retries exhausted"
        );
        Err(EngineError::Conflict(request.auction_id))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
