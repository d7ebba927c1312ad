use std::fmt::Debug;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tempmail_core::{MailProvider, MailProviderRef, MailboxInfo, ProviderError};
use thiserror::Error;

/// Error type for session store operations
#[derive(Error, Debug)]
pub enum SessionStoreError {
    /// Provider warm-up failed while building a new session
    #[error("Failed to initialize session: {0}")]
    Init(#[source] ProviderError),
    /// Error occurred during a store operation
    #[error("Storage error: {0}")]
    StorageError(String),
}

/// Mailbox address handed out by the provider, with the times that govern
/// whether it can still be served from cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailboxLease {
    pub address: String,
    pub expires_at: DateTime<Utc>,
    pub fetched_at: DateTime<Utc>,
}

impl MailboxLease {
    pub fn from_info(info: MailboxInfo, fetched_at: DateTime<Utc>) -> Self {
        Self {
            address: info.address,
            expires_at: info.expires_at,
            fetched_at,
        }
    }

    /// Whether the provider considers this address gone at `now`
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Fetched less than `window` ago and not yet expired
    pub fn is_fresh(&self, now: DateTime<Utc>, window: Duration) -> bool {
        let within_window = match (now - self.fetched_at).to_std() {
            Ok(age) => age < window,
            // fetched_at in the future, clock went backwards
            Err(_) => true,
        };
        within_window && now < self.expires_at
    }
}

/// Per-caller session: a provider with its own cookie jar plus the cached
/// mailbox lease.
#[derive(Debug)]
pub struct Session {
    identity: String,
    provider: MailProviderRef,
    created_at: DateTime<Utc>,
    mailbox: RwLock<Option<MailboxLease>>,
}

impl Session {
    pub fn new(identity: String, provider: MailProviderRef, created_at: DateTime<Utc>) -> Self {
        Self {
            identity,
            provider,
            created_at,
            mailbox: RwLock::new(None),
        }
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn provider(&self) -> &dyn MailProvider {
        self.provider.as_ref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Snapshot of the current lease
    pub fn mailbox(&self) -> Option<MailboxLease> {
        self.mailbox
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace the lease as a whole
    pub fn set_mailbox(&self, lease: MailboxLease) {
        *self.mailbox.write().unwrap_or_else(PoisonError::into_inner) = Some(lease);
    }

    /// Whether the session is older than `ttl` at `now`
    pub fn is_older_than(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        match (now - self.created_at).to_std() {
            Ok(age) => age > ttl,
            Err(_) => false,
        }
    }
}

/// Trait defining the interface for session stores
#[async_trait]
pub trait SessionStore: Send + Sync + Debug {
    /// Return the session for `identity`, building and registering one if absent
    async fn get_or_create(&self, identity: &str) -> Result<Arc<Session>, SessionStoreError>;

    /// Drop any existing session for `identity` and register a brand-new one
    async fn reset(&self, identity: &str) -> Result<Arc<Session>, SessionStoreError>;

    /// Remove a session; returns whether one was present
    async fn remove(&self, identity: &str) -> Result<bool, SessionStoreError>;

    /// Remove every session created more than `ttl` before `now`
    async fn sweep_expired(&self, ttl: Duration, now: DateTime<Utc>) -> Result<usize, SessionStoreError>;

    /// Number of registered sessions
    async fn len(&self) -> Result<usize, SessionStoreError>;

    /// Drop every session, returning how many were removed
    async fn clear(&self) -> Result<usize, SessionStoreError>;
}

/// Type alias for Arc-wrapped SessionStore trait objects
pub type SessionStoreRef = Arc<dyn SessionStore>;
