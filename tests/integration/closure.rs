//! Auction lifecycle: bidding, expiry, the closure sweep, and the win/loss
//! fan-out.

use chrono::{Duration, Utc};
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
use gavel::queue::{MemoryQueue, Task, TaskQueue};
use gavel::store::memory::MemoryStore;
use gavel::store::EntityStore;
use gavel::types::{Auction, AuctionStatus, BidOrigin, BidStatus, EngineError, NotificationKind};

struct Engine {
    store: Arc<MemoryStore>,
    queue: Arc<MemoryQueue>,
    notifier: Arc<MemoryNotifier>,
    ledger: BidLedger,
    worker: TaskWorker,
}

fn engine() -> Engine {
    let store = Arc::new(MemoryStore::new());
    let queue = Arc::new(MemoryQueue::new());
    let notifier = Arc::new(MemoryNotifier::new());
    let ledger = BidLedger::new(store.clone(), queue.clone(), 3);
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
        resolver,
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
        worker,
    }
}

async fn bid(e: &Engine, auction_id: Uuid, bidder: Uuid, amount: rust_decimal::Decimal) {
    e.ledger
        .place_bid(BidRequest {
            auction_id,
            bidder_id: bidder,
            amount,
            submitted_at: Utc::now(),
            origin: BidOrigin::Manual,
        })
        .await
        .unwrap();
}

#[tokio::test]
async fn test_full_lifecycle_bid_expire_sweep_notify() {
    let e = engine();

    // Ends in an hour; bids land inside the window.
    let auction = Auction::new(
        "Art deco floor lamp",
        dec!(100),
        Utc::now() - Duration::hours(1),
        Utc::now() + Duration::hours(1),
    );
    let auction_id = auction.id;
    e.store.insert_auction(auction).await.unwrap();

    let alice = Uuid::new_v4();
    let bob = Uuid::new_v4();
    let carol = Uuid::new_v4();
    bid(&e, auction_id, alice, dec!(110)).await;
    bid(&e, auction_id, bob, dec!(125)).await;
    bid(&e, auction_id, alice, dec!(140)).await;
    bid(&e, auction_id, carol, dec!(160)).await;

    // Sweep as of a time past the end: the worker settles the auction.
    let later = Utc::now() + Duration::hours(2);
    e.queue.enqueue(Task::CloseSweep { now: later }).await.unwrap();
    e.worker.drain(later).await.unwrap();

    let settled = e.store.auction(auction_id).await.unwrap();
    assert_eq!(settled.status, AuctionStatus::Expired);

    let bids = e.store.bids_for_auction(auction_id).await.unwrap();
    assert_eq!(bids.iter().filter(|b| b.status == BidStatus::Won).count(), 1);
    assert!(bids
        .iter()
        .all(|b| b.status == BidStatus::Won || b.status == BidStatus::Lost));

    // Carol won; Alice and Bob each get exactly one loss message quoting
    // their own highest bid.
    let won = e.notifier.sent_to(carol);
    assert_eq!(won.len(), 1);
    assert_eq!(won[0].kind, NotificationKind::AuctionWon);
    assert!(won[0].message.contains("BILL-"));

    let alice_lost = e.notifier.sent_to(alice);
    assert_eq!(alice_lost.len(), 1);
    assert!(alice_lost[0].message.contains("$140.00"));
    assert!(alice_lost[0].message.contains("$160.00"));

    let bob_lost = e.notifier.sent_to(bob);
    assert_eq!(bob_lost.len(), 1);
    assert!(bob_lost[0].message.contains("$125.00"));

    // Closed means closed: late bids bounce, repeated sweeps stay quiet.
    let late = e
        .ledger
        .place_bid(BidRequest {
            auction_id,
            bidder_id: Uuid::new_v4(),
            amount: dec!(500),
            submitted_at: later,
            origin: BidOrigin::Manual,
        })
        .await;
    assert!(matches!(late, Err(EngineError::AuctionClosed(_))));

    let sent_before = e.notifier.sent().len();
    e.queue.enqueue(Task::CloseSweep { now: later }).await.unwrap();
    e.worker.drain(later).await.unwrap();
    assert_eq!(e.notifier.sent().len(), sent_before);
}

#[tokio::test]
async fn test_sweep_ignores_running_auctions() {
    let e = engine();

    let running = Auction::new(
        "Bronze sundial",
        dec!(50),
        Utc::now() - Duration::hours(1),
        Utc::now() + Duration::hours(1),
    );
    let running_id = running.id;
    e.store.insert_auction(running).await.unwrap();
    bid(&e, running_id, Uuid::new_v4(), dec!(60)).await;

    e.queue.enqueue(Task::CloseSweep { now: Utc::now() }).await.unwrap();
    e.worker.drain(Utc::now()).await.unwrap();

    let auction = e.store.auction(running_id).await.unwrap();
    assert_eq!(auction.status, AuctionStatus::Active);
    assert!(e
        .store
        .bids_for_auction(running_id)
        .await
        .unwrap()
        .iter()
        .any(|b| b.status == BidStatus::Active));
    assert!(e.notifier.sent().is_empty());
}

#[tokio::test]
async fn test_stale_cascade_trigger_after_closure() {
    let e = engine();

    let auction = Auction::new(
        "Marble bust",
        dec!(100),
        Utc::now() - Duration::hours(3),
        Utc::now() - Duration::hours(1),
    );
    let auction_id = auction.id;
    e.store.insert_auction(auction).await.unwrap();

    // The auction settles with no bids; a leftover trigger for it must be
    // a harmless no-op.
    e.queue.enqueue(Task::CloseSweep { now: Utc::now() }).await.unwrap();
    e.queue.enqueue(Task::CascadeTrigger { auction_id }).await.unwrap();
    e.worker.drain(Utc::now()).await.unwrap();

    assert_eq!(e.store.auction(auction_id).await.unwrap().status, AuctionStatus::Expired);
    assert!(e.store.bids_for_auction(auction_id).await.unwrap().is_empty());
}
