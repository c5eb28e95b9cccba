//! Integration suite: full engine flows over the in-process store, queue,
//! and notifier.

mod bidding;
mod closure;
