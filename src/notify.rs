//! Notification dispatch seam.
//!
//! Sends are fire-and-forget: they run only after the engine's own
//! transactional effect has committed, and a delivery failure can never
//! roll a bid or a closure back. The real transport (email, push) is an
//! external collaborator; this module ships a log-based dispatcher and a
//! recording one for tests, plus the message formatting shared by both.

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::sync::Mutex;
use tracing::info;
use uuid::Uuid;

use crate::types::{Auction, BudgetConfig, Notification, NotificationKind};

/// Fire-and-forget notification sink.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, user_id: Uuid, kind: NotificationKind, message: String);
}

// ---------------------------------------------------------------------------
// Message formatting
// ---------------------------------------------------------------------------

/// Budget alert body, e.g. "95.00% ($95.00) of your maximum bid amount
/// ($100.00) has been reserved for bids."
pub fn budget_alert_message(config: &BudgetConfig) -> String {
    format!(
        "{:.2}% (${:.2}) of your maximum bid amount (${:.2}) has been reserved for bids.",
        config.reserved_percent(),
        config.reserved_amount,
        config.max_budget,
    )
}

pub fn winner_message(auction: &Auction, amount: Decimal, bill_reference: &str) -> String {
    format!(
        "Congratulations! You won the auction for \"{}\" at ${:.2}. Your bill reference is {}.",
        auction.title, amount, bill_reference,
    )
}

pub fn loser_message(auction: &Auction, winning_amount: Decimal, own_highest: Decimal) -> String {
    format!(
        "The auction for \"{}\" has ended. The winning bid was ${:.2}; your highest bid was ${:.2}.",
        auction.title, winning_amount, own_highest,
    )
}

// ---------------------------------------------------------------------------
// Dispatchers
// ---------------------------------------------------------------------------

/// Dispatcher that writes notifications to the structured log. The default
/// wiring of the binary until a real transport adapter is attached.
#[derive(Default)]
pub struct LogNotifier;

impl LogNotifier {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, user_id: Uuid, kind: NotificationKind, message: String) {
        info!(user_id = %user_id, kind = %kind, message = %message, "Notification dispatched");
    }
}

/// Dispatcher that records every send in memory, for assertions in tests.
#[derive(Default)]
pub struct MemoryNotifier {
    sent: Mutex<Vec<Notification>>,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn sent_to(&self, user_id: Uuid) -> Vec<Notification> {
        self.sent()
            .into_iter()
            .filter(|n| n.user_id == user_id)
            .collect()
    }

    pub fn count_of(&self, kind: NotificationKind) -> usize {
        self.sent().iter().filter(|n| n.kind == kind).count()
    }
}

#[async_trait]
impl Notifier for MemoryNotifier {
    async fn send(&self, user_id: Uuid, kind: NotificationKind, message: String) {
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(Notification::new(user_id, kind, message));
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
