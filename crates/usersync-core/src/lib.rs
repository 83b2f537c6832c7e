//! Core domain types for the user sync service.
//!
//! Provides the mirrored user model, error taxonomy, clock abstraction,
//! and the user store port with its Postgres and in-memory implementations.
//! The API crate depends on these foundational types; nothing here knows
//! about HTTP.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod models;
pub mod store;
pub mod time;

pub use error::{CoreError, Result};
pub use models::{User, UserId, UserUpdate};
pub use store::{MemoryUserStore, PgUserStore, UserStore};
pub use time::{Clock, RealClock, TestClock};
