//! Cache and refresh policy for a session's mailbox address.
//!
//! An address is served from cache while it was fetched less than the cache
//! window ago and the provider has not expired it. Address acquisition runs
//! under the configured retry policy; inbox reads are attempted once, since
//! callers poll again anyway.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tempmail_core::{parser, AppConfig, InboxMessage, RetryPolicy};
use tracing::{debug, info, warn};

use crate::error::{MailboxError, MailboxResult};
use crate::session::{MailboxLease, Session};

/// Outcome of an address lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressResult {
    pub email: String,
    pub expires_at: DateTime<Utc>,
    pub cached: bool,
}

/// Outcome of an inbox read
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboxResult {
    /// The provider answered but nothing has arrived yet
    Empty { email: String },
    Messages {
        email: String,
        messages: Vec<InboxMessage>,
    },
}

impl InboxResult {
    pub fn email(&self) -> &str {
        match self {
            InboxResult::Empty { email } | InboxResult::Messages { email, .. } => email,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MailboxCache {
    window: Duration,
    address_retry: RetryPolicy,
    inbox_retry: RetryPolicy,
}

impl MailboxCache {
    pub fn new(window: Duration, address_retry: RetryPolicy) -> Self {
        Self {
            window,
            address_retry,
            inbox_retry: RetryPolicy::none(),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.cache.window(), RetryPolicy::from_config(&config.retry))
    }

    /// Return the session's address, fetching a new one when the cache is
    /// stale or `force_new` is set.
    pub async fn get_address(&self, session: &Session, force_new: bool) -> MailboxResult<AddressResult> {
        self.get_address_at(session, force_new, Utc::now()).await
    }

    pub async fn get_address_at(
        &self,
        session: &Session,
        force_new: bool,
        now: DateTime<Utc>,
    ) -> MailboxResult<AddressResult> {
        if !force_new {
            if let Some(lease) = session.mailbox().filter(|l| l.is_fresh(now, self.window)) {
                debug!(identity = %session.identity(), "Serving cached mailbox address");
                return Ok(AddressResult {
                    email: lease.address,
                    expires_at: lease.expires_at,
                    cached: true,
                });
            }
        }

        let provider = session.provider();
        let info = self
            .address_retry
            .run(provider, || provider.fetch_mailbox(now))
            .await
            .map_err(|e| {
                warn!(identity = %session.identity(), error = %e, "Mailbox address retrieval failed");
                MailboxError::EmailRetrievalFailed(e)
            })?;

        let lease = MailboxLease::from_info(info, now);
        session.set_mailbox(lease.clone());
        info!(identity = %session.identity(), email = %lease.address, "Assigned mailbox address");

        Ok(AddressResult {
            email: lease.address,
            expires_at: lease.expires_at,
            cached: false,
        })
    }

    /// Read the session's inbox, refreshing the address first if it is
    /// missing or expired.
    pub async fn get_inbox_messages(&self, session: &Session) -> MailboxResult<InboxResult> {
        self.get_inbox_messages_at(session, Utc::now()).await
    }

    pub async fn get_inbox_messages_at(
        &self,
        session: &Session,
        now: DateTime<Utc>,
    ) -> MailboxResult<InboxResult> {
        let email = match session.mailbox() {
            Some(lease) if !lease.is_expired(now) => lease.address,
            _ => self.get_address_at(session, true, now).await?.email,
        };

        let provider = session.provider();
        let raw = self
            .inbox_retry
            .run(provider, || provider.fetch_inbox_messages(now))
            .await
            .map_err(|e| {
                warn!(identity = %session.identity(), error = %e, "Inbox retrieval failed");
                MailboxError::InboxRetrievalFailed(e)
            })?;

        if raw.is_empty() {
            return Ok(InboxResult::Empty { email });
        }

        Ok(InboxResult::Messages {
            email,
            messages: parser::parse(raw),
        })
    }
}

impl Default for MailboxCache {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}
