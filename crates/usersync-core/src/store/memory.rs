//! In-memory user store for tests.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        RwLock,
    },
};

use async_trait::async_trait;

use crate::{
    error::Result,
    models::{User, UserId, UserUpdate},
    store::UserStore,
};

/// In-memory `UserStore` used by handler tests.
///
/// Counts the operations issued against it so tests can assert the store
/// was never touched on a rejected delivery. `health_check` is excluded
/// from the count.
#[derive(Debug, Default)]
pub struct MemoryUserStore {
    users: RwLock<HashMap<UserId, User>>,
    ops: AtomicU64,
}

impl MemoryUserStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns how many store operations have been issued.
    pub fn operation_count(&self) -> u64 {
        self.ops.load(Ordering::Acquire)
    }

    /// Returns the number of records currently held.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Returns true when no records are held.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<UserId, User>> {
        self.users.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<UserId, User>> {
        self.users.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn upsert(&self, user: &User) -> Result<()> {
        self.ops.fetch_add(1, Ordering::AcqRel);

        let mut users = self.write();
        match users.get_mut(&user.id) {
            Some(existing) => {
                existing.email = user.email.clone();
                existing.name = user.name.clone();
                existing.image = user.image.clone();
            },
            None => {
                users.insert(user.id.clone(), user.clone());
            },
        }

        Ok(())
    }

    async fn update(&self, id: &UserId, changes: &UserUpdate) -> Result<()> {
        self.ops.fetch_add(1, Ordering::AcqRel);

        if let Some(user) = self.write().get_mut(id) {
            if let Some(email) = &changes.email {
                user.email = email.clone();
            }
            if let Some(name) = &changes.name {
                user.name = name.clone();
            }
            if let Some(image) = &changes.image {
                user.image = image.clone();
            }
        }

        Ok(())
    }

    async fn delete(&self, id: &UserId) -> Result<()> {
        self.ops.fetch_add(1, Ordering::AcqRel);
        self.write().remove(id);

        Ok(())
    }

    async fn find(&self, id: &UserId) -> Result<Option<User>> {
        self.ops.fetch_add(1, Ordering::AcqRel);

        Ok(self.read().get(id).cloned())
    }

    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}
