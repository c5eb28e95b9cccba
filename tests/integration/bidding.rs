//! Bidding and cascade flows, end to end: manual bids through the ledger,
//! queue-driven cascades through the worker, budgets enforced throughout.

use chrono::{Duration, Utc};
use futures::future::join_all;
use rust_decimal_macros::dec;
use std::sync::Arc;
use uuid::Uuid;

use gavel::config::CascadeConfig;
use gavel::engine::budget::BudgetTracker;
use gavel::engine::cascade::CascadeResolver;
use gavel::engine::closer::AuctionCloser;
use gavel::engine::ledger::{BidLedger, BidRequest};
use gavel::engine::worker::{TaskWorker, TriggerGovernor};
use gavel::notify::MemoryNotifier;
use gavel::queue::MemoryQueue;
use gavel::store::memory::MemoryStore;
use gavel::store::EntityStore;
use gavel::types::{Auction, BidOrigin, BidStatus, BudgetConfig, EngineError, NotificationKind};

struct Engine {
    store: Arc<MemoryStore>,
    queue: Arc<MemoryQueue>,
    notifier: Arc<MemoryNotifier>,
    ledger: Arc<BidLedger>,
    resolver: Arc<CascadeResolver>,
    worker: TaskWorker,
}

fn engine() -> Engine {
    let store = Arc::new(MemoryStore::new());
    let queue = Arc::new(MemoryQueue::new());
    let notifier = Arc::new(MemoryNotifier::new());
    let ledger = Arc::new(BidLedger::new(store.clone(), queue.clone(), 3));
    let resolver = Arc::new(CascadeResolver::new(
        store.clone(),
        queue.clone(),
        notifier.clone(),
        BidLedger::new(store.clone(), queue.clone(), 3),
        BudgetTracker::new(store.clone()),
        rust_decimal::Decimal::ONE,
    ));
    let closer = Arc::new(AuctionCloser::new(store.clone(), notifier.clone(), 3));
    let worker = TaskWorker::new(
        queue.clone(),
        resolver.clone(),
        closer,
        TriggerGovernor::new(&CascadeConfig {
            max_triggers_per_auction: 500,
            trigger_window_secs: 60,
        }),
    );
    Engine {
        store,
        queue,
        notifier,
        ledger,
        resolver,
        worker,
    }
}

async fn open_auction(e: &Engine, starting_price: rust_decimal::Decimal) -> Uuid {
    let auction = Auction::new(
        "Regency card table",
        starting_price,
        Utc::now() - Duration::hours(1),
        Utc::now() + Duration::hours(1),
    );
    let id = auction.id;
    e.store.insert_auction(auction).await.unwrap();
    id
}

fn manual(auction_id: Uuid, bidder: Uuid, amount: rust_decimal::Decimal) -> BidRequest {
    BidRequest {
        auction_id,
        bidder_id: bidder,
        amount,
        submitted_at: Utc::now(),
        origin: BidOrigin::Manual,
    }
}

#[tokio::test]
async fn test_manual_bid_cascade_and_budget_end_to_end() {
    let e = engine();
    let auction_id = open_auction(&e, dec!(100)).await;
    let now = Utc::now();

    let alice = Uuid::new_v4();
    let bob = Uuid::new_v4();
    e.store
        .upsert_budget_config(BudgetConfig::new(alice, dec!(500), Some(80)))
        .await
        .unwrap();
    e.store
        .upsert_budget_config(BudgetConfig::new(bob, dec!(200), Some(80)))
        .await
        .unwrap();

    // Alice opens at 150 and turns auto-bidding on; Bob joins the agents
    // and then bids 160 by hand.
    e.ledger.place_bid(manual(auction_id, alice, dec!(150))).await.unwrap();
    e.resolver
        .activate_auto_bid(auction_id, alice, now - Duration::minutes(1))
        .await
        .unwrap();
    e.resolver.activate_auto_bid(auction_id, bob, now).await.unwrap();
    e.ledger.place_bid(manual(auction_id, bob, dec!(160))).await.unwrap();

    // Drain everything the bids and activations enqueued, cascade rounds
    // included.
    e.worker.drain(Utc::now()).await.unwrap();
    assert!(e.queue.is_empty());

    // Bob's reservation tracks his amount above his manual 160 and caps at
    // 200; Alice retakes the lead one increment past Bob's last possible
    // bid of 360.
    let highest = e.store.highest_active_bid(auction_id).await.unwrap().unwrap();
    assert_eq!(highest.bidder_id, alice);
    assert_eq!(highest.amount, dec!(361));
    assert_eq!(highest.origin, BidOrigin::Auto);

    let alice_cfg = e.store.budget_config(alice).await.unwrap().unwrap();
    let bob_cfg = e.store.budget_config(bob).await.unwrap().unwrap();
    assert!(alice_cfg.reserved_amount <= alice_cfg.max_budget);
    assert_eq!(bob_cfg.reserved_amount, bob_cfg.max_budget);

    // Only Bob crossed his 80% threshold (Alice's 211 reserved is well
    // under 80% of 500), and the alert fired exactly once.
    assert_eq!(e.notifier.count_of(NotificationKind::BidAlert), 1);
    assert_eq!(e.notifier.sent_to(bob).len(), 1);

    // Exactly one Active bid at any time, everything else Lost.
    let bids = e.store.bids_for_auction(auction_id).await.unwrap();
    assert_eq!(bids.iter().filter(|b| b.status == BidStatus::Active).count(), 1);
}

#[tokio::test]
async fn test_concurrent_equal_bids_one_winner() {
    let e = engine();
    let auction_id = open_auction(&e, dec!(100)).await;

    // Ten bidders race with the same amount; exactly one commit can land,
    // everyone else re-validates into a tie and loses.
    let attempts = join_all((0..10).map(|_| {
        let ledger = e.ledger.clone();
        async move { ledger.place_bid(manual(auction_id, Uuid::new_v4(), dec!(150))).await }
    }))
    .await;

    let accepted = attempts.iter().filter(|r| r.is_ok()).count();
    assert_eq!(accepted, 1);
    for result in &attempts {
        if let Err(e) = result {
            assert!(
                matches!(e, EngineError::BidTooLow { .. } | EngineError::Conflict(_)),
                "unexpected rejection: {e}"
            );
        }
    }

    let bids = e.store.bids_for_auction(auction_id).await.unwrap();
    assert_eq!(bids.len(), 1);
    assert_eq!(bids[0].status, BidStatus::Active);
}

#[tokio::test]
async fn test_concurrent_increasing_bids_keep_single_active() {
    let e = engine();
    let auction_id = open_auction(&e, dec!(100)).await;

    let amounts: Vec<_> = (1..=20).map(|i| dec!(100) + rust_decimal::Decimal::from(i)).collect();
    let attempts = join_all(amounts.into_iter().map(|amount| {
        let ledger = e.ledger.clone();
        async move { ledger.place_bid(manual(auction_id, Uuid::new_v4(), amount)).await }
    }))
    .await;

    assert!(attempts.iter().any(|r| r.is_ok()));

    let bids = e.store.bids_for_auction(auction_id).await.unwrap();
    let active: Vec<_> = bids.iter().filter(|b| b.status == BidStatus::Active).collect();
    assert_eq!(active.len(), 1);

    // The surviving Active bid is the highest accepted one.
    let max_accepted = bids.iter().map(|b| b.amount).max().unwrap();
    assert_eq!(active[0].amount, max_accepted);
}

#[tokio::test]
async fn test_reserved_budget_never_exceeds_max_under_cascade_pressure() {
    let e = engine();
    let auction_id = open_auction(&e, dec!(10)).await;
    let now = Utc::now();

    // Three agents with tight budgets fighting over a cheap item.
    let agents: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();
    for (i, agent) in agents.iter().enumerate() {
        e.store
            .upsert_budget_config(BudgetConfig::new(*agent, dec!(40), None))
            .await
            .unwrap();
        e.resolver
            .activate_auto_bid(auction_id, *agent, now + Duration::seconds(i as i64))
            .await
            .unwrap();
    }

    e.worker.drain(Utc::now()).await.unwrap();

    for agent in &agents {
        let cfg = e.store.budget_config(*agent).await.unwrap().unwrap();
        assert!(
            cfg.reserved_amount <= cfg.max_budget,
            "agent over budget: {} > {}",
            cfg.reserved_amount,
            cfg.max_budget
        );
    }

    // Converged: a fresh trigger changes nothing.
    let report = e.resolver.resolve_cascade(auction_id, Utc::now()).await.unwrap();
    assert!(report.is_quiet());
}
