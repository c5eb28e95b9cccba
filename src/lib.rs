//! GAVEL — Live Auction Bidding & Auto-Bid Engine
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod config;
pub mod types;
pub mod store;
pub mod queue;
pub mod notify;
pub mod engine;
