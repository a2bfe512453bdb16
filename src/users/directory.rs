//! User directory collaborator.
//!
//! The admission layer only needs to look users up and apply validated
//! updates. Persistence lives behind [`UserDirectory`]; the in-memory
//! implementation backs the binary and tests.

use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use serde::Serialize;

use crate::auth::identity::Role;
use crate::users::validation::UserUpdate;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserRecord {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub role: Role,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DirectoryError {
    #[error("email already in use")]
    EmailTaken,
}

#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_by_id(&self, id: i64) -> Option<UserRecord>;
    async fn find_by_email(&self, email: &str) -> Option<UserRecord>;
    async fn list(&self) -> Vec<UserRecord>;
    /// `Ok(None)` when no user has `id`.
    async fn update(&self, id: i64, update: UserUpdate) -> Result<Option<UserRecord>, DirectoryError>;
}

#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    users: DashMap<i64, UserRecord>,
    next_id: AtomicI64,
}

impl InMemoryDirectory {
    /// Create an empty directory.
    pub fn new() -> Self {
        Self {
            users: DashMap::new(),
            next_id: AtomicI64::new(1),
        }
    }

    /// Add a user under the next free id.
    pub fn insert(&self, name: &str, email: &str, role: Role) -> UserRecord {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let record = UserRecord {
            id,
            name: name.to_string(),
            email: email.to_lowercase(),
            role,
        };
        self.users.insert(id, record.clone());
        record
    }
}

#[async_trait]
impl UserDirectory for InMemoryDirectory {
    async fn find_by_id(&self, id: i64) -> Option<UserRecord> {
        self.users.get(&id).map(|r| r.value().clone())
    }

    async fn find_by_email(&self, email: &str) -> Option<UserRecord> {
        let email = email.to_lowercase();
        self.users
            .iter()
            .find(|r| r.value().email == email)
            .map(|r| r.value().clone())
    }

    async fn list(&self) -> Vec<UserRecord> {
        let mut users: Vec<_> = self.users.iter().map(|r| r.value().clone()).collect();
        users.sort_by_key(|u| u.id);
        users
    }

    async fn update(&self, id: i64, update: UserUpdate) -> Result<Option<UserRecord>, DirectoryError> {
        if let Some(email) = &update.email {
            if let Some(owner) = self.find_by_email(email).await {
                if owner.id != id {
                    return Err(DirectoryError::EmailTaken);
                }
            }
        }

        let Some(mut entry) = self.users.get_mut(&id) else {
            return Ok(None);
        };
        let record = entry.value_mut();
        if let Some(name) = update.name {
            record.name = name;
        }
        if let Some(email) = update.email {
            record.email = email;
        }
        if let Some(role) = update.role {
            record.role = role;
        }
        Ok(Some(record.clone()))
    }
}
