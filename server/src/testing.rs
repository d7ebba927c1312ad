//! Scripted provider doubles shared by the unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::Barrier;
use tempmail_core::{
    MailProvider, MailProviderRef, MailboxInfo, ProviderError, ProviderFactory, ProviderResult,
    RawMessage,
};

/// Provider that replays queued results. With an empty queue, mailbox
/// fetches hand out `boxN@tempmail.so` valid for an hour and inbox reads
/// return no messages.
#[derive(Debug, Default)]
pub struct ScriptedProvider {
    warm_ups: AtomicUsize,
    mailbox_calls: AtomicUsize,
    inbox_calls: AtomicUsize,
    warm_up_error: Mutex<Option<ProviderError>>,
    warm_up_gate: Mutex<Option<Arc<Barrier>>>,
    mailbox_error: Mutex<Option<ProviderError>>,
    mailbox_results: Mutex<VecDeque<ProviderResult<MailboxInfo>>>,
    inbox_results: Mutex<VecDeque<ProviderResult<Vec<RawMessage>>>>,
}

impl ScriptedProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn shared() -> MailProviderRef {
        Self::new()
    }

    pub fn fail_warm_up(&self, error: ProviderError) {
        *self.warm_up_error.lock().unwrap() = Some(error);
    }

    /// Hold every warm-up until the barrier releases
    pub fn gate_warm_up(&self, gate: Arc<Barrier>) {
        *self.warm_up_gate.lock().unwrap() = Some(gate);
    }

    /// Fail every mailbox fetch not covered by a queued result
    pub fn fail_mailbox(&self, error: ProviderError) {
        *self.mailbox_error.lock().unwrap() = Some(error);
    }

    pub fn push_mailbox(&self, result: ProviderResult<MailboxInfo>) {
        self.mailbox_results.lock().unwrap().push_back(result);
    }

    pub fn push_inbox(&self, result: ProviderResult<Vec<RawMessage>>) {
        self.inbox_results.lock().unwrap().push_back(result);
    }

    pub fn warm_ups(&self) -> usize {
        self.warm_ups.load(Ordering::SeqCst)
    }

    pub fn mailbox_calls(&self) -> usize {
        self.mailbox_calls.load(Ordering::SeqCst)
    }

    pub fn inbox_calls(&self) -> usize {
        self.inbox_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MailProvider for ScriptedProvider {
    async fn warm_up(&self) -> ProviderResult<()> {
        self.warm_ups.fetch_add(1, Ordering::SeqCst);
        let gate = self.warm_up_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.wait().await;
        }
        match self.warm_up_error.lock().unwrap().clone() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    async fn fetch_mailbox(&self, now: DateTime<Utc>) -> ProviderResult<MailboxInfo> {
        let n = self.mailbox_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(result) = self.mailbox_results.lock().unwrap().pop_front() {
            return result;
        }
        match self.mailbox_error.lock().unwrap().clone() {
            Some(e) => Err(e),
            None => Ok(MailboxInfo {
                address: format!("box{}@tempmail.so", n),
                expires_at: now + Duration::hours(1),
            }),
        }
    }

    async fn fetch_inbox_messages(&self, _now: DateTime<Utc>) -> ProviderResult<Vec<RawMessage>> {
        self.inbox_calls.fetch_add(1, Ordering::SeqCst);
        match self.inbox_results.lock().unwrap().pop_front() {
            Some(result) => result,
            None => Ok(Vec::new()),
        }
    }
}

/// Factory recording every provider it hands out
#[derive(Debug, Default)]
pub struct ScriptedFactory {
    created: Mutex<Vec<Arc<ScriptedProvider>>>,
    warm_up_error: Mutex<Option<ProviderError>>,
    warm_up_gate: Mutex<Option<Arc<Barrier>>>,
    mailbox_error: Mutex<Option<ProviderError>>,
}

impl ScriptedFactory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make providers created from now on fail their warm-up
    pub fn fail_warm_up(&self, error: ProviderError) {
        *self.warm_up_error.lock().unwrap() = Some(error);
    }

    /// Gate the warm-up of providers created from now on
    pub fn gate_warm_ups(&self, gate: Arc<Barrier>) {
        *self.warm_up_gate.lock().unwrap() = Some(gate);
    }

    /// Make providers created from now on fail their mailbox fetches
    pub fn fail_mailbox(&self, error: ProviderError) {
        *self.mailbox_error.lock().unwrap() = Some(error);
    }

    pub fn created(&self) -> Vec<Arc<ScriptedProvider>> {
        self.created.lock().unwrap().clone()
    }

    pub fn last(&self) -> Arc<ScriptedProvider> {
        self.created.lock().unwrap().last().cloned().unwrap()
    }
}

impl ProviderFactory for ScriptedFactory {
    fn create(&self) -> ProviderResult<MailProviderRef> {
        let provider = ScriptedProvider::new();
        if let Some(e) = self.warm_up_error.lock().unwrap().clone() {
            provider.fail_warm_up(e);
        }
        if let Some(gate) = self.warm_up_gate.lock().unwrap().clone() {
            provider.gate_warm_up(gate);
        }
        if let Some(e) = self.mailbox_error.lock().unwrap().clone() {
            provider.fail_mailbox(e);
        }
        self.created.lock().unwrap().push(provider.clone());
        let provider: MailProviderRef = provider;
        Ok(provider)
    }
}

pub fn raw_message(from: &str, subject: &str, body: &str) -> RawMessage {
    RawMessage {
        from: from.to_string(),
        subject: subject.to_string(),
        text_body: body.to_string(),
    }
}
