//! Shared types for the GAVEL engine.
//!
//! These types form the data model used across all modules.
//! They are plain data — no framework or storage types leak through —
//! so the ledger, budget, cascade, and closer modules can depend on
//! them without circular references.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Auction
// ---------------------------------------------------------------------------

/// An item under auction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Auction {
    pub id: Uuid,
    pub title: String,
    pub starting_price: Decimal,
    pub start_time: DateTime<Utc>,
    /// Bids submitted after this instant are rejected.
    pub end_time: DateTime<Utc>,
    pub status: AuctionStatus,
    /// Optimistic lock token. Bumped by every accepted bid and by closure;
    /// conditional store updates compare against it.
    pub version: u64,
}

impl Auction {
    pub fn new(
        title: &str,
        starting_price: Decimal,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.to_string(),
            starting_price,
            start_time,
            end_time,
            status: AuctionStatus::Active,
            version: 0,
        }
    }

    /// Whether the auction can still accept a bid submitted at `at`.
    pub fn accepts_bids_at(&self, at: DateTime<Utc>) -> bool {
        self.status == AuctionStatus::Active && at <= self.end_time
    }

    /// Whether the auction is past its deadline but not yet closed.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.status == AuctionStatus::Active && self.end_time <= now
    }
}

impl fmt::Display for Auction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} \"{}\" (start: {} | ends: {} | {})",
            self.id, self.title, self.starting_price, self.end_time, self.status,
        )
    }
}

/// Auction lifecycle status. `Expired` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuctionStatus {
    Active,
    Expired,
}

impl fmt::Display for AuctionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuctionStatus::Active => write!(f, "ACTIVE"),
            AuctionStatus::Expired => write!(f, "EXPIRED"),
        }
    }
}

// ---------------------------------------------------------------------------
// Bid
// ---------------------------------------------------------------------------

/// A single bid on an auction. Immutable once created except for `status`,
/// which is write-once-per-transition (Active→Lost or Active→Won).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bid {
    pub id: Uuid,
    pub auction_id: Uuid,
    pub bidder_id: Uuid,
    pub amount: Decimal,
    pub submitted_at: DateTime<Utc>,
    pub origin: BidOrigin,
    pub status: BidStatus,
}

impl Bid {
    pub fn new(
        auction_id: Uuid,
        bidder_id: Uuid,
        amount: Decimal,
        submitted_at: DateTime<Utc>,
        origin: BidOrigin,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            auction_id,
            bidder_id,
            amount,
            submitted_at,
            origin,
            status: BidStatus::Active,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == BidStatus::Active
    }
}

impl fmt::Display for Bid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} on {} by {} ({} | {} | {})",
            self.amount,
            self.auction_id,
            self.bidder_id,
            self.origin,
            self.status,
            self.submitted_at,
        )
    }
}

/// How a bid entered the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BidOrigin {
    Manual,
    Auto,
}

impl fmt::Display for BidOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BidOrigin::Manual => write!(f, "manual"),
            BidOrigin::Auto => write!(f, "auto"),
        }
    }
}

/// Bid outcome status. Exactly one bid per auction may hold `Won`,
/// set only at closure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BidStatus {
    Active,
    Lost,
    Won,
}

impl fmt::Display for BidStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BidStatus::Active => write!(f, "active"),
            BidStatus::Lost => write!(f, "lost"),
            BidStatus::Won => write!(f, "won"),
        }
    }
}

// ---------------------------------------------------------------------------
// Auto-bid subscription
// ---------------------------------------------------------------------------

/// A standing opt-in letting the engine bid on a user's behalf.
///
/// Its existence, not its content, drives cascade participation. Unique per
/// (auction, bidder); `created_at` defines FIFO cascade iteration order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoBidSubscription {
    pub id: Uuid,
    pub auction_id: Uuid,
    pub bidder_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl AutoBidSubscription {
    pub fn new(auction_id: Uuid, bidder_id: Uuid, created_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            auction_id,
            bidder_id,
            created_at,
        }
    }
}

// ---------------------------------------------------------------------------
// Budget config
// ---------------------------------------------------------------------------

/// Per-user auto-bid budget. One per user, covering every auction the user
/// has auto-bid enabled on.
///
/// Invariant: `0 ≤ reserved_amount ≤ max_budget` after every successful
/// reserve. The reserved amount only ever increases; it is not reconciled
/// downward when the user is outbid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetConfig {
    pub user_id: Uuid,
    pub max_budget: Decimal,
    /// Alert fires once the reserved percentage reaches this value.
    /// `None` disables the threshold alert (the 100% alert still fires).
    pub alert_threshold_percent: Option<u32>,
    pub reserved_amount: Decimal,
    /// Gate ensuring the budget alert fires at most once per config
    /// lifetime. Reset only by external reconfiguration.
    pub alert_sent: bool,
}

impl BudgetConfig {
    pub fn new(user_id: Uuid, max_budget: Decimal, alert_threshold_percent: Option<u32>) -> Self {
        Self {
            user_id,
            max_budget,
            alert_threshold_percent,
            reserved_amount: Decimal::ZERO,
            alert_sent: false,
        }
    }

    /// Reserved budget as a percentage of the maximum. Zero for an empty
    /// budget rather than a division error.
    pub fn reserved_percent(&self) -> Decimal {
        if self.max_budget <= Decimal::ZERO {
            Decimal::ZERO
        } else {
            self.reserved_amount / self.max_budget * Decimal::ONE_HUNDRED
        }
    }

    /// Budget not yet committed to auto-bid positions.
    pub fn headroom(&self) -> Decimal {
        self.max_budget - self.reserved_amount
    }
}

impl fmt::Display for BudgetConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "user {} reserved {}/{} ({:.1}%)",
            self.user_id,
            self.reserved_amount,
            self.max_budget,
            self.reserved_percent(),
        )
    }
}

/// Outcome of a budget alert check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlertKind {
    None,
    ThresholdReached,
    BudgetExhausted,
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertKind::None => write!(f, "none"),
            AlertKind::ThresholdReached => write!(f, "threshold reached"),
            AlertKind::BudgetExhausted => write!(f, "budget exhausted"),
        }
    }
}

// ---------------------------------------------------------------------------
// Notification
// ---------------------------------------------------------------------------

/// A user-facing message. Content is write-once; the read flag belongs to
/// the external read-receipt path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub kind: NotificationKind,
    pub message: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(user_id: Uuid, kind: NotificationKind, message: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            kind,
            message,
            read: false,
            created_at: Utc::now(),
        }
    }
}

/// Notification categories dispatched by this engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NotificationKind {
    BidAlert,
    AuctionWon,
    AuctionLost,
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotificationKind::BidAlert => write!(f, "bid_alert"),
            NotificationKind::AuctionWon => write!(f, "auction_won"),
            NotificationKind::AuctionLost => write!(f, "auction_lost"),
        }
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Domain-specific error types for GAVEL.
///
/// Validation errors (`AuctionClosed`, `BidTooLow`, `MissingBudgetConfig`)
/// are returned synchronously, never retried automatically, and mutate no
/// state. `Conflict` means a concurrent writer won the race after internal
/// retries were exhausted. `Store` and `Queue` are infrastructure failures
/// and always propagate.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Bidding has closed for auction {0}")]
    AuctionClosed(Uuid),

    #[error("Bid amount must exceed {floor}")]
    BidTooLow { floor: Decimal },

    #[error("User {0} has no auto-bid budget configuration")]
    MissingBudgetConfig(Uuid),

    #[error("Auction not found: {0}")]
    AuctionNotFound(Uuid),

    #[error("Concurrent update conflict on auction {0}")]
    Conflict(Uuid),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Queue error: {0}")]
    Queue(String),
}

impl EngineError {
    /// Whether this error is an expected per-bid outcome rather than a
    /// fault. The cascade logs these and moves on to the next subscriber.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            EngineError::AuctionClosed(_)
                | EngineError::BidTooLow { .. }
                | EngineError::MissingBudgetConfig(_)
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
