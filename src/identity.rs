//! Identity and credential lookup
//!
//! The platform's user accounts and credential hashing stay behind the
//! [`IdentityProvider`] trait: the gateway resolves a login name to an
//! account and asks for a boolean password check against the account's
//! "plain password" credential. An in-memory implementation backs tests
//! and standalone runs.

use crate::index::RecordId;
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Resolved identity bound to a session after authentication
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserInfo {
    /// Account id, None for guests
    pub user: Option<RecordId>,
    /// Display name used in logs
    pub name: String,
    /// Preferred locale, if the account has one
    pub locale: Option<String>,
}

impl UserInfo {
    /// The anonymous identity used before (or without) authentication
    #[must_use]
    pub fn guest() -> Self {
        Self {
            user: None,
            name: "guest".to_string(),
            locale: None,
        }
    }
}

/// Platform identity/credential subsystem
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Resolve a login name to an account id
    async fn find_user(&self, nick: &str) -> Result<Option<RecordId>>;

    /// Verify a password against the account's plain-password credential
    ///
    /// Returns false when the account has no such credential; the hash
    /// comparison itself happens on the platform side.
    async fn verify_plain(&self, user: RecordId, password: &str) -> Result<bool>;

    /// Full identity data for an account
    async fn user_info(&self, user: RecordId) -> Result<UserInfo>;
}

struct AccountRecord {
    id: RecordId,
    password: Option<String>,
    locale: Option<String>,
}

/// In-memory [`IdentityProvider`] for tests and standalone runs
#[derive(Default)]
pub struct MemoryIdentityProvider {
    accounts: RwLock<HashMap<String, AccountRecord>>,
}

impl MemoryIdentityProvider {
    /// Create an empty provider
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an account; `password: None` models a user without a
    /// plain-password credential (federated login only)
    pub async fn add_account(
        &self,
        nick: &str,
        password: Option<&str>,
        locale: Option<&str>,
    ) -> RecordId {
        let id = RecordId::generate();
        self.accounts.write().await.insert(
            nick.to_string(),
            AccountRecord {
                id,
                password: password.map(str::to_string),
                locale: locale.map(str::to_string),
            },
        );
        id
    }
}

#[async_trait]
impl IdentityProvider for MemoryIdentityProvider {
    async fn find_user(&self, nick: &str) -> Result<Option<RecordId>> {
        Ok(self.accounts.read().await.get(nick).map(|a| a.id))
    }

    async fn verify_plain(&self, user: RecordId, password: &str) -> Result<bool> {
        let accounts = self.accounts.read().await;
        let Some(account) = accounts.values().find(|a| a.id == user) else {
            return Ok(false);
        };
        Ok(account.password.as_deref() == Some(password))
    }

    async fn user_info(&self, user: RecordId) -> Result<UserInfo> {
        let accounts = self.accounts.read().await;
        let entry = accounts.iter().find(|(_, a)| a.id == user);
        Ok(match entry {
            Some((nick, account)) => UserInfo {
                user: Some(account.id),
                name: nick.clone(),
                locale: account.locale.clone(),
            },
            None => UserInfo::guest(),
        })
    }
}
