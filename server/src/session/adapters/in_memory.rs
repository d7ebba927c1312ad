use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, warn};
use tempmail_core::ProviderFactory;

use crate::session::store::{Session, SessionStore, SessionStoreError};

/// In-memory implementation of SessionStore
#[derive(Debug)]
pub struct InMemorySessionStore {
    /// Thread-safe storage of sessions
    sessions: Arc<RwLock<HashMap<String, Arc<Session>>>>,
    /// Builds the cookie-isolated provider for each new session
    factory: Arc<dyn ProviderFactory>,
}

impl InMemorySessionStore {
    /// Create a new InMemorySessionStore
    pub fn new(factory: Arc<dyn ProviderFactory>) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            factory,
        }
    }

    /// Register an already-built session, replacing any previous one
    pub fn insert(&self, session: Arc<Session>) -> Result<(), SessionStoreError> {
        let mut sessions = self.write()?;
        sessions.insert(session.identity().to_string(), session);
        Ok(())
    }

    /// Build a warmed-up session. Nothing is registered here, so a failed
    /// warm-up leaves the store untouched.
    async fn build_session(&self, identity: &str) -> Result<Arc<Session>, SessionStoreError> {
        let provider = self.factory.create().map_err(SessionStoreError::Init)?;
        provider.warm_up().await.map_err(|e| {
            warn!("Warm-up failed for session {}: {}", identity, e);
            SessionStoreError::Init(e)
        })?;
        Ok(Arc::new(Session::new(identity.to_string(), provider, Utc::now())))
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<String, Arc<Session>>>, SessionStoreError> {
        self.sessions.read().map_err(|e| {
            SessionStoreError::StorageError(format!("Failed to acquire read lock: {}", e))
        })
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<String, Arc<Session>>>, SessionStoreError> {
        self.sessions.write().map_err(|e| {
            SessionStoreError::StorageError(format!("Failed to acquire write lock: {}", e))
        })
    }
}

#[cfg(test)]
impl InMemorySessionStore {
    pub(crate) fn session(&self, identity: &str) -> Option<Arc<Session>> {
        self.sessions.read().unwrap().get(identity).cloned()
    }

    /// Registered identities, sorted
    pub(crate) fn identities(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.sessions.read().unwrap().keys().cloned().collect();
        ids.sort();
        ids
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get_or_create(&self, identity: &str) -> Result<Arc<Session>, SessionStoreError> {
        let existing = self.read()?.get(identity).cloned();
        if let Some(session) = existing {
            return Ok(session);
        }

        let session = self.build_session(identity).await?;

        // A concurrent request may have registered this identity while we
        // were warming up; keep theirs so there is only ever one session.
        let mut sessions = self.write()?;
        let registered = sessions
            .entry(identity.to_string())
            .or_insert_with(|| session.clone())
            .clone();

        if Arc::ptr_eq(&registered, &session) {
            debug!("Created session: {}", identity);
        }
        Ok(registered)
    }

    async fn reset(&self, identity: &str) -> Result<Arc<Session>, SessionStoreError> {
        self.remove(identity).await?;
        let session = self.build_session(identity).await?;
        self.insert(session.clone())?;
        debug!("Reset session: {}", identity);
        Ok(session)
    }

    async fn remove(&self, identity: &str) -> Result<bool, SessionStoreError> {
        let removed = self.write()?.remove(identity).is_some();
        if removed {
            debug!("Deleted session: {}", identity);
        }
        Ok(removed)
    }

    async fn sweep_expired(&self, ttl: Duration, now: DateTime<Utc>) -> Result<usize, SessionStoreError> {
        let mut sessions = self.write()?;

        let before = sessions.len();
        sessions.retain(|id, session| {
            let keep = !session.is_older_than(ttl, now);
            if !keep {
                debug!("Cleaned up expired session: {}", id);
            }
            keep
        });
        let count = before - sessions.len();

        if count > 0 {
            warn!("Cleaned up {} expired sessions", count);
        }

        Ok(count)
    }

    async fn len(&self) -> Result<usize, SessionStoreError> {
        Ok(self.read()?.len())
    }

    async fn clear(&self) -> Result<usize, SessionStoreError> {
        let mut sessions = self.write()?;
        let count = sessions.len();
        sessions.clear();
        debug!("Cleared {} sessions", count);
        Ok(count)
    }
}
