//! GAVEL — Live Auction Bidding & Auto-Bid Engine
//!
//! Entry point. Loads configuration, initialises structured logging,
//! wires the engine components onto the in-process store and queue, and
//! runs the worker loop with periodic closure sweeps and graceful
//! shutdown.

use anyhow::Result;
use chrono::{Duration as ChronoDuration, Utc};
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use gavel::config;
use gavel::engine::budget::BudgetTracker;
use gavel::engine::cascade::CascadeResolver;
use gavel::engine::closer::AuctionCloser;
use gavel::engine::ledger::{BidLedger, BidRequest};
use gavel::engine::worker::{TaskWorker, TriggerGovernor};
use gavel::notify::LogNotifier;
use gavel::queue::{MemoryQueue, Task, TaskQueue};
use gavel::store::memory::MemoryStore;
use gavel::store::EntityStore;
use gavel::types::{Auction, BidOrigin, BudgetConfig};

const BANNER: &str = r#"
  ____    ___     _______ _
 / ___|  / \ \   / / ____| |
| |  _  / _ \ \ / /|  _| | |
| |_| |/ ___ \ V / | |___| |___
 \____/_/   \_\_/  |_____|_____|

  Live Auction Bidding & Auto-Bid Engine
  v0.1.0
"#;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    // Load configuration from TOML, defaults if absent
    let cfg = config::AppConfig::load_or_default("config.toml")?;

    // Initialise structured logging
    init_logging();

    // Print startup banner
    println!("{BANNER}");
    info!(
        currency = %cfg.engine.currency,
        min_increment = %cfg.engine.min_increment,
        sweep_interval_secs = cfg.closer.sweep_interval_secs,
        "GAVEL starting up"
    );

    // -- Wire components --------------------------------------------------

    let store: Arc<MemoryStore> = Arc::new(MemoryStore::new());
    let queue: Arc<MemoryQueue> = Arc::new(MemoryQueue::new());
    let notifier = Arc::new(LogNotifier::new());

    let ledger = BidLedger::new(store.clone(), queue.clone(), cfg.engine.conflict_retries);
    let resolver = Arc::new(CascadeResolver::new(
        store.clone(),
        queue.clone(),
        notifier.clone(),
        BidLedger::new(store.clone(), queue.clone(), cfg.engine.conflict_retries),
        BudgetTracker::new(store.clone()),
        cfg.engine.min_increment,
    ));
    let closer = Arc::new(AuctionCloser::new(
        store.clone(),
        notifier,
        cfg.engine.conflict_retries,
    ));
    let worker = TaskWorker::new(
        queue.clone(),
        resolver.clone(),
        closer,
        TriggerGovernor::new(&cfg.cascade),
    );

    // Until a persistent store adapter is attached the engine starts
    // empty; seed a demonstration auction so the loop has work to show.
    seed_demo(&*store, &ledger, &resolver).await?;

    // -- Worker loop -------------------------------------------------------

    let mut poll = tokio::time::interval(Duration::from_millis(500));
    let mut sweep = tokio::time::interval(Duration::from_secs(cfg.closer.sweep_interval_secs));
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    info!("Entering worker loop. Press Ctrl+C to stop.");

    loop {
        tokio::select! {
            _ = poll.tick() => {
                match worker.drain(Utc::now()).await {
                    Ok(handled) if handled > 0 => {
                        info!(handled, "Queue drained");
                    }
                    Ok(_) => {}
                    Err(e) => {
                        error!(error = %e, "Task handling failed — continuing");
                    }
                }
            }
            _ = sweep.tick() => {
                if let Err(e) = queue.enqueue(Task::CloseSweep { now: Utc::now() }).await {
                    error!(error = %e, "Failed to enqueue close sweep");
                }
            }
            _ = &mut shutdown => {
                info!("Shutdown signal received.");
                break;
            }
        }
    }

    info!("GAVEL shut down cleanly.");
    Ok(())
}

/// Seed one short-lived auction with an opening manual bid and two
/// auto-bid agents, so a fresh start exercises the cascade and, once the
/// end time passes, the closer.
async fn seed_demo(
    store: &dyn EntityStore,
    ledger: &BidLedger,
    resolver: &CascadeResolver,
) -> Result<()> {
    let now = Utc::now();
    let auction = Auction::new(
        "Victorian mantel clock",
        dec!(100),
        now,
        now + ChronoDuration::minutes(5),
    );
    let auction_id = auction.id;
    store.insert_auction(auction).await?;

    let opener = uuid::Uuid::new_v4();
    let agent_a = uuid::Uuid::new_v4();
    let agent_b = uuid::Uuid::new_v4();

    store
        .upsert_budget_config(BudgetConfig::new(agent_a, dec!(200), Some(80)))
        .await?;
    store
        .upsert_budget_config(BudgetConfig::new(agent_b, dec!(150), Some(80)))
        .await?;

    ledger
        .place_bid(BidRequest {
            auction_id,
            bidder_id: opener,
            amount: dec!(110),
            submitted_at: now,
            origin: BidOrigin::Manual,
        })
        .await?;
    resolver.activate_auto_bid(auction_id, agent_a, now).await?;
    resolver.activate_auto_bid(auction_id, agent_b, now).await?;

    info!(auction_id = %auction_id, "Demo auction seeded");
    Ok(())
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("gavel=info"));

    let json_logging = std::env::var("GAVEL_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}
