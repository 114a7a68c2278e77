//! Shared types for the Zero Waste Marketplace
//!
//! Domain model types (roles, product/order/payment state), the unified
//! error system, and response structures used by the server crate.

pub mod error;
pub mod models;
pub mod response;
pub mod util;

// Re-exports
pub use http;
pub use serde::{Deserialize, Serialize};
