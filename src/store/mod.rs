//! Entity store seam.
//!
//! Defines the `EntityStore` trait the engine is written against and an
//! in-memory reference implementation. A SQL adapter would implement the
//! same trait with a row lock or compare-and-set on `Auction::version`
//! for the conditional operations.

pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::types::{Auction, AutoBidSubscription, Bid, BudgetConfig, EngineError};

#[cfg(test)]
use mockall::automock;

/// Transactional key-based entity store.
///
/// `commit_bid` and `settle_auction` are the two compound, conditional
/// operations: both compare `expected_version` against the stored auction
/// version and apply their whole effect atomically or not at all, returning
/// `EngineError::Conflict` when a concurrent writer got there first.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait EntityStore: Send + Sync {
    // -- Auctions --

    async fn insert_auction(&self, auction: Auction) -> Result<(), EngineError>;

    async fn auction(&self, auction_id: Uuid) -> Result<Auction, EngineError>;

    /// Explicit removal. Cascade-deletes the auction's bids and
    /// subscriptions; entities reference the auction by id only.
    async fn remove_auction(&self, auction_id: Uuid) -> Result<(), EngineError>;

    /// Auctions still Active whose `end_time` is at or before `now`.
    async fn expired_active_auctions(&self, now: DateTime<Utc>)
        -> Result<Vec<Auction>, EngineError>;

    // -- Bids --

    async fn bids_for_auction(&self, auction_id: Uuid) -> Result<Vec<Bid>, EngineError>;

    /// The single Active bid on the auction, if any. The commit path keeps
    /// at most one bid Active per auction.
    async fn highest_active_bid(&self, auction_id: Uuid) -> Result<Option<Bid>, EngineError>;

    /// The given bidder's highest bid on the auction, any status.
    async fn highest_bid_by(
        &self,
        auction_id: Uuid,
        bidder_id: Uuid,
    ) -> Result<Option<Bid>, EngineError>;

    /// Insert `bid` as Active, flip every other Active bid on the same
    /// auction to Lost in the same scoped update, and bump the auction
    /// version — one atomic unit.
    async fn commit_bid(&self, expected_version: u64, bid: Bid) -> Result<Bid, EngineError>;

    /// Close an auction: mark `winning_bid_id` Won (when present), every
    /// other bid Lost, and the auction Expired — one atomic unit.
    async fn settle_auction(
        &self,
        auction_id: Uuid,
        expected_version: u64,
        winning_bid_id: Option<Uuid>,
    ) -> Result<(), EngineError>;

    // -- Auto-bid subscriptions --

    /// Insert a subscription. A no-op if one already exists for the same
    /// (auction, bidder) pair — the first subscription keeps its place in
    /// the FIFO order.
    async fn insert_subscription(&self, sub: AutoBidSubscription) -> Result<(), EngineError>;

    async fn remove_subscription(
        &self,
        auction_id: Uuid,
        bidder_id: Uuid,
    ) -> Result<(), EngineError>;

    async fn subscription(
        &self,
        auction_id: Uuid,
        bidder_id: Uuid,
    ) -> Result<Option<AutoBidSubscription>, EngineError>;

    /// All subscriptions for the auction, ordered by `created_at` ascending.
    async fn subscriptions_for_auction(
        &self,
        auction_id: Uuid,
    ) -> Result<Vec<AutoBidSubscription>, EngineError>;

    // -- Budget configs --

    async fn budget_config(&self, user_id: Uuid) -> Result<Option<BudgetConfig>, EngineError>;

    async fn upsert_budget_config(&self, config: BudgetConfig) -> Result<(), EngineError>;
}
