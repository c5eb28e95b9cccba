//! Budget Tracker.
//!
//! Per-user reserved/maximum budget bookkeeping across every auction the
//! user has auto-bid enabled on. A reservation must land before the
//! cascade may place the bid; reservation and bid placement are separate
//! transactions, so the reserved ledger can drift conservative when a
//! placement fails after approval. That drift is tolerated by design.

use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::store::EntityStore;
use crate::types::{AlertKind, EngineError};

/// Outcome of a reservation attempt. A rejection leaves the stored
/// reserved amount untouched.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reservation {
    pub approved: bool,
    pub reserved: Decimal,
}

pub struct BudgetTracker {
    store: Arc<dyn EntityStore>,
}

impl BudgetTracker {
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        Self { store }
    }

    /// Reserve headroom for a proposed auto-bid.
    ///
    /// The delta is measured against the user's highest previous bid on
    /// the same auction (zero if none): raising one's own bid only
    /// reserves the difference. Approves iff the updated reserved amount
    /// stays within `max_budget`, and persists it only on approval.
    pub async fn reserve(
        &self,
        user_id: Uuid,
        auction_id: Uuid,
        proposed: Decimal,
    ) -> Result<Reservation, EngineError> {
        let mut config = self
            .store
            .budget_config(user_id)
            .await?
            .ok_or(EngineError::MissingBudgetConfig(user_id))?;

        let previous = self
            .store
            .highest_bid_by(auction_id, user_id)
            .await?
            .map(|b| b.amount)
            .unwrap_or(Decimal::ZERO);
        let delta = proposed - previous;
        let new_reserved = config.reserved_amount + delta;

        if new_reserved > config.max_budget {
            info!(
                user_id = %user_id,
                auction_id = %auction_id,
                proposed = %proposed,
                reserved = %config.reserved_amount,
                max_budget = %config.max_budget,
                "Reservation rejected, would exceed max budget"
            );
            return Ok(Reservation {
                approved: false,
                reserved: config.reserved_amount,
            });
        }

        config.reserved_amount = new_reserved;
        self.store.upsert_budget_config(config).await?;

        debug!(
            user_id = %user_id,
            auction_id = %auction_id,
            delta = %delta,
            reserved = %new_reserved,
            "Reservation approved"
        );
        Ok(Reservation {
            approved: true,
            reserved: new_reserved,
        })
    }

    /// Compare the reserved percentage against the user's alert threshold
    /// and 100%.
    ///
    /// Fires at most once per config lifetime: the `alert_sent` gate is
    /// persisted before this returns a non-`None` kind, and is reset only
    /// by external reconfiguration. Exhaustion takes precedence over the
    /// threshold when both apply.
    pub async fn check_alert(&self, user_id: Uuid) -> Result<AlertKind, EngineError> {
        let mut config = self
            .store
            .budget_config(user_id)
            .await?
            .ok_or(EngineError::MissingBudgetConfig(user_id))?;

        if config.alert_sent {
            return Ok(AlertKind::None);
        }

        let percent = config.reserved_percent();
        let kind = if percent >= Decimal::ONE_HUNDRED {
            AlertKind::BudgetExhausted
        } else if config
            .alert_threshold_percent
            .map(|t| percent >= Decimal::from(t))
            .unwrap_or(false)
        {
            AlertKind::ThresholdReached
        } else {
            AlertKind::None
        };

        if kind != AlertKind::None {
            config.alert_sent = true;
            self.store.upsert_budget_config(config).await?;
        }
        Ok(kind)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
