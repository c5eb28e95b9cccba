//! Core engine — bid acceptance, budget tracking, auto-bid cascades,
//! and auction closure.

pub mod budget;
pub mod cascade;
pub mod closer;
pub mod ledger;
pub mod worker;
