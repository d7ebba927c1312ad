use tempmail_core::ProviderError;
use thiserror::Error;

use crate::session::SessionStoreError;

/// Failures surfaced to HTTP callers
#[derive(Error, Debug)]
pub enum MailboxError {
    /// Cookie warm-up for a new session failed
    #[error("Failed to initialize session: {0}")]
    SessionInit(#[source] ProviderError),

    /// Address acquisition failed, retries included
    #[error("Failed to retrieve email address: {0}")]
    EmailRetrievalFailed(#[source] ProviderError),

    /// Inbox read failed; not retried
    #[error("Failed to check inbox: {0}")]
    InboxRetrievalFailed(#[source] ProviderError),

    #[error("Session storage error: {0}")]
    Storage(String),
}

impl From<SessionStoreError> for MailboxError {
    fn from(e: SessionStoreError) -> Self {
        match e {
            SessionStoreError::Init(cause) => MailboxError::SessionInit(cause),
            SessionStoreError::StorageError(msg) => MailboxError::Storage(msg),
        }
    }
}

pub type MailboxResult<T> = Result<T, MailboxError>;
