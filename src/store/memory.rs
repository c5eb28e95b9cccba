//! In-memory entity store.
//!
//! All state lives behind a single mutex, which is what gives the
//! conditional operations their per-auction serializability: a commit
//! checks the auction version and applies its whole effect under one
//! lock acquisition. Deterministic and dependency-free — the test
//! substrate and the default wiring of the binary.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

use super::EntityStore;
use crate::types::{Auction, AuctionStatus, AutoBidSubscription, Bid, BidStatus, BudgetConfig, EngineError};

#[derive(Default)]
struct State {
    auctions: HashMap<Uuid, Auction>,
    bids: HashMap<Uuid, Bid>,
    subscriptions: Vec<AutoBidSubscription>,
    budgets: HashMap<Uuid, BudgetConfig>,
}

/// Reference `EntityStore` backed by process memory.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, State>, EngineError> {
        self.state
            .lock()
            .map_err(|e| EngineError::Store(format!("store lock poisoned: {e}")))
    }
}

#[async_trait]
impl EntityStore for MemoryStore {
    async fn insert_auction(&self, auction: Auction) -> Result<(), EngineError> {
        let mut state = self.lock()?;
        state.auctions.insert(auction.id, auction);
        Ok(())
    }

    async fn auction(&self, auction_id: Uuid) -> Result<Auction, EngineError> {
        let state = self.lock()?;
        state
            .auctions
            .get(&auction_id)
            .cloned()
            .ok_or(EngineError::AuctionNotFound(auction_id))
    }

    async fn remove_auction(&self, auction_id: Uuid) -> Result<(), EngineError> {
        let mut state = self.lock()?;
        state.auctions.remove(&auction_id);
        state.bids.retain(|_, b| b.auction_id != auction_id);
        state.subscriptions.retain(|s| s.auction_id != auction_id);
        Ok(())
    }

    async fn expired_active_auctions(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<Auction>, EngineError> {
        let state = self.lock()?;
        let mut expired: Vec<Auction> = state
            .auctions
            .values()
            .filter(|a| a.is_expired_at(now))
            .cloned()
            .collect();
        expired.sort_by_key(|a| a.end_time);
        Ok(expired)
    }

    async fn bids_for_auction(&self, auction_id: Uuid) -> Result<Vec<Bid>, EngineError> {
        let state = self.lock()?;
        let mut bids: Vec<Bid> = state
            .bids
            .values()
            .filter(|b| b.auction_id == auction_id)
            .cloned()
            .collect();
        bids.sort_by_key(|b| b.submitted_at);
        Ok(bids)
    }

    async fn highest_active_bid(&self, auction_id: Uuid) -> Result<Option<Bid>, EngineError> {
        let state = self.lock()?;
        Ok(state
            .bids
            .values()
            .filter(|b| b.auction_id == auction_id && b.status == BidStatus::Active)
            .max_by_key(|b| b.amount)
            .cloned())
    }

    async fn highest_bid_by(
        &self,
        auction_id: Uuid,
        bidder_id: Uuid,
    ) -> Result<Option<Bid>, EngineError> {
        let state = self.lock()?;
        Ok(state
            .bids
            .values()
            .filter(|b| b.auction_id == auction_id && b.bidder_id == bidder_id)
            .max_by_key(|b| b.amount)
            .cloned())
    }

    async fn commit_bid(&self, expected_version: u64, bid: Bid) -> Result<Bid, EngineError> {
        let mut state = self.lock()?;
        let auction = state
            .auctions
            .get_mut(&bid.auction_id)
            .ok_or(EngineError::AuctionNotFound(bid.auction_id))?;

        if auction.version != expected_version {
            return Err(EngineError::Conflict(bid.auction_id));
        }
        if auction.status != AuctionStatus::Active {
            return Err(EngineError::AuctionClosed(bid.auction_id));
        }
        auction.version += 1;

        let auction_id = bid.auction_id;
        for other in state.bids.values_mut() {
            if other.auction_id == auction_id && other.status == BidStatus::Active {
                other.status = BidStatus::Lost;
            }
        }
        state.bids.insert(bid.id, bid.clone());
        Ok(bid)
    }

    async fn settle_auction(
        &self,
        auction_id: Uuid,
        expected_version: u64,
        winning_bid_id: Option<Uuid>,
    ) -> Result<(), EngineError> {
        let mut state = self.lock()?;
        let auction = state
            .auctions
            .get_mut(&auction_id)
            .ok_or(EngineError::AuctionNotFound(auction_id))?;

        // Re-settling an already closed auction is a no-op.
        if auction.status == AuctionStatus::Expired {
            return Ok(());
        }
        if auction.version != expected_version {
            return Err(EngineError::Conflict(auction_id));
        }

        auction.status = AuctionStatus::Expired;
        auction.version += 1;

        for bid in state.bids.values_mut() {
            if bid.auction_id != auction_id {
                continue;
            }
            bid.status = if Some(bid.id) == winning_bid_id {
                BidStatus::Won
            } else {
                BidStatus::Lost
            };
        }
        Ok(())
    }

    async fn insert_subscription(&self, sub: AutoBidSubscription) -> Result<(), EngineError> {
        let mut state = self.lock()?;
        let exists = state
            .subscriptions
            .iter()
            .any(|s| s.auction_id == sub.auction_id && s.bidder_id == sub.bidder_id);
        if !exists {
            state.subscriptions.push(sub);
        }
        Ok(())
    }

    async fn remove_subscription(
        &self,
        auction_id: Uuid,
        bidder_id: Uuid,
    ) -> Result<(), EngineError> {
        let mut state = self.lock()?;
        state
            .subscriptions
            .retain(|s| !(s.auction_id == auction_id && s.bidder_id == bidder_id));
        Ok(())
    }

    async fn subscription(
        &self,
        auction_id: Uuid,
        bidder_id: Uuid,
    ) -> Result<Option<AutoBidSubscription>, EngineError> {
        let state = self.lock()?;
        Ok(state
            .subscriptions
            .iter()
            .find(|s| s.auction_id == auction_id && s.bidder_id == bidder_id)
            .cloned())
    }

    async fn subscriptions_for_auction(
        &self,
        auction_id: Uuid,
    ) -> Result<Vec<AutoBidSubscription>, EngineError> {
        let state = self.lock()?;
        let mut subs: Vec<AutoBidSubscription> = state
            .subscriptions
            .iter()
            .filter(|s| s.auction_id == auction_id)
            .cloned()
            .collect();
        subs.sort_by_key(|s| s.created_at);
        Ok(subs)
    }

    async fn budget_config(&self, user_id: Uuid) -> Result<Option<BudgetConfig>, EngineError> {
        let state = self.lock()?;
        Ok(state.budgets.get(&user_id).cloned())
    }

    async fn upsert_budget_config(&self, config: BudgetConfig) -> Result<(), EngineError> {
        let mut state = self.lock()?;
        state.budgets.insert(config.user_id, config);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
