//! User store port and its implementations.
//!
//! The sync handler talks to the store through the `UserStore` trait so
//! handler logic can be exercised without a database. Production uses
//! `PgUserStore`; tests use `MemoryUserStore`.

use async_trait::async_trait;

use crate::{
    error::Result,
    models::{User, UserId, UserUpdate},
};

mod memory;
mod postgres;

pub use memory::MemoryUserStore;
pub use postgres::PgUserStore;

/// Store operations required by the sync handler.
///
/// All implementations must be safe to call concurrently; events for the
/// same id race with last-write-wins semantics.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Inserts a record, replacing the synced fields if the id already
    /// exists. The `resume` field is only written on first insert.
    async fn upsert(&self, user: &User) -> Result<()>;

    /// Applies a partial update to the record with the given id.
    ///
    /// Updating a missing id is a no-op, not an error.
    async fn update(&self, id: &UserId, changes: &UserUpdate) -> Result<()>;

    /// Removes the record with the given id.
    ///
    /// Deleting a missing id is a no-op, not an error.
    async fn delete(&self, id: &UserId) -> Result<()>;

    /// Looks up a record by id.
    async fn find(&self, id: &UserId) -> Result<Option<User>>;

    /// Verifies the store is reachable.
    async fn health_check(&self) -> Result<()>;
}
