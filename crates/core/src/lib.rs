//! `smis-core` — shared domain building blocks.
//!
//! Pure primitives only (no storage, no HTTP).

pub mod entity;
pub mod error;
pub mod id;

pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::{SparePartId, StockInId, StockOutId, UserId};
