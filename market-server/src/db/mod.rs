//! Database access layer
//!
//! All multi-row mutations (fulfillment, cancellation, refund, review
//! aggregates) run inside a single transaction with guarded UPDATEs.

pub mod analytics;
pub mod audit;
pub mod email_verifications;
pub mod orders;
pub mod payments;
pub mod products;
pub mod reviews;
pub mod subscriptions;
pub mod users;
pub mod webhook_events;
