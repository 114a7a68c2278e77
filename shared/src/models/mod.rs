//! Data models
//!
//! Domain enums and state machines shared between the server and clients.
//! Enum values map to lowercase database strings via `as_db`/`from_db`.

pub mod order;
pub mod payment;
pub mod product;
pub mod role;
pub mod subscription;

// Re-exports
pub use order::*;
pub use payment::*;
pub use product::*;
pub use role::*;
pub use subscription::*;
